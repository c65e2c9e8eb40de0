//! Order aggregate and its lifecycle status.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::actor::{ActorContext, ActorRole};

/// Every status an order can be in. Legal moves between them live in
/// `services::state_machine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
    Processing,
    AssignedToTransporter,
    AcceptedByTransporter,
    InTransit,
    Delivered,
    Certified,
    Disputed,
    ReturnToWholesaler,
    ReturnAccepted,
    ReturnRejected,
    CancelledByRetailer,
    CancelledByWholesaler,
    CancelledByTransporter,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 16] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Rejected,
        OrderStatus::Processing,
        OrderStatus::AssignedToTransporter,
        OrderStatus::AcceptedByTransporter,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Certified,
        OrderStatus::Disputed,
        OrderStatus::ReturnToWholesaler,
        OrderStatus::ReturnAccepted,
        OrderStatus::ReturnRejected,
        OrderStatus::CancelledByRetailer,
        OrderStatus::CancelledByWholesaler,
        OrderStatus::CancelledByTransporter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Processing => "processing",
            OrderStatus::AssignedToTransporter => "assigned_to_transporter",
            OrderStatus::AcceptedByTransporter => "accepted_by_transporter",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Certified => "certified",
            OrderStatus::Disputed => "disputed",
            OrderStatus::ReturnToWholesaler => "return_to_wholesaler",
            OrderStatus::ReturnAccepted => "return_accepted",
            OrderStatus::ReturnRejected => "return_rejected",
            OrderStatus::CancelledByRetailer => "cancelled_by_retailer",
            OrderStatus::CancelledByWholesaler => "cancelled_by_wholesaler",
            OrderStatus::CancelledByTransporter => "cancelled_by_transporter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// The cancellation status a given role produces.
    pub fn cancelled_by(role: ActorRole) -> Self {
        match role {
            ActorRole::Retailer => OrderStatus::CancelledByRetailer,
            ActorRole::Wholesaler => OrderStatus::CancelledByWholesaler,
            ActorRole::Transporter => OrderStatus::CancelledByTransporter,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            OrderStatus::CancelledByRetailer
                | OrderStatus::CancelledByWholesaler
                | OrderStatus::CancelledByTransporter
        )
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.is_cancellation()
            || matches!(
                self,
                OrderStatus::Certified
                    | OrderStatus::Rejected
                    | OrderStatus::ReturnAccepted
                    | OrderStatus::ReturnRejected
            )
    }

    /// Statuses in which the order must not hold a stock reservation.
    pub fn is_stock_released(&self) -> bool {
        self.is_cancellation()
            || matches!(self, OrderStatus::Rejected | OrderStatus::ReturnAccepted)
    }

    /// Statuses from which the order record may be hard-deleted. None of them
    /// can carry an outstanding stock movement or an unresolved delivery.
    pub fn is_deletable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Rejected
                | OrderStatus::ReturnAccepted
                | OrderStatus::ReturnRejected
                | OrderStatus::CancelledByWholesaler
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    #[validate(length(min = 1, max = 200))]
    pub recipient_name: String,
    #[validate(length(min = 5, max = 32))]
    pub phone: String,
    #[validate(length(min = 1, max = 500))]
    pub address_line: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub actor_role: ActorRole,
    pub actor_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDispute {
    pub reason: String,
    pub disputed_at: DateTime<Utc>,
}

/// Order placed by a retailer against a wholesaler's stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub retailer_id: String,
    pub wholesaler_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transporter_id: Option<String>,
    pub product_id: String,
    pub quantity: u32,
    pub measurement_unit: String,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub shipping_details: ShippingDetails,
    pub status: OrderStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_dispute: Option<DeliveryDispute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_certification_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_delivery_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented on every persisted change; updates are conditional on it.
    pub version: i64,
}

/// Input for creating an order once the product has been resolved.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub retailer_id: String,
    pub wholesaler_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub measurement_unit: String,
    pub unit_price: Decimal,
    pub shipping_details: ShippingDetails,
}

impl Order {
    /// Create a `pending` order. The total is fixed here and never recomputed.
    pub fn create(input: NewOrder, now: DateTime<Utc>) -> Self {
        let total_price = input.unit_price * Decimal::from(input.quantity);
        let history = vec![StatusHistoryEntry {
            status: OrderStatus::Pending,
            actor_role: ActorRole::Retailer,
            actor_id: input.retailer_id.clone(),
            timestamp: now,
            reason: None,
        }];

        Self {
            id: Uuid::new_v4(),
            retailer_id: input.retailer_id,
            wholesaler_id: input.wholesaler_id,
            transporter_id: None,
            product_id: input.product_id,
            quantity: input.quantity,
            measurement_unit: input.measurement_unit,
            unit_price: input.unit_price,
            total_price,
            shipping_details: input.shipping_details,
            status: OrderStatus::Pending,
            status_history: history,
            cancellation_reason: None,
            rejection_reason: None,
            return_reason: None,
            delivery_dispute: None,
            delivery_certification_date: None,
            actual_delivery_date: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// The actor id bound to `role` on this order, if any.
    pub fn party_id(&self, role: ActorRole) -> Option<&str> {
        match role {
            ActorRole::Retailer => Some(self.retailer_id.as_str()),
            ActorRole::Wholesaler => Some(self.wholesaler_id.as_str()),
            ActorRole::Transporter => self.transporter_id.as_deref(),
        }
    }

    pub fn is_party(&self, actor: &ActorContext) -> bool {
        self.party_id(actor.role) == Some(actor.id.as_str())
    }

    /// Everyone attached to the order other than `actor_id`.
    pub fn counterparties(&self, actor_id: &str) -> Vec<String> {
        let parties = [
            Some(self.retailer_id.as_str()),
            Some(self.wholesaler_id.as_str()),
            self.transporter_id.as_deref(),
        ];
        let mut ids: Vec<String> = Vec::with_capacity(parties.len());
        for id in parties.into_iter().flatten() {
            if id != actor_id && !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
        ids
    }
}
