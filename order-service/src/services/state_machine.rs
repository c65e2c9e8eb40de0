//! Order lifecycle state machine.
//!
//! Every legal move is an entry in [`TRANSITIONS`], keyed by
//! `(from, to)`. [`OrderStateMachine::transition`] is pure: it validates a
//! request against the table and returns the updated aggregate plus the stock
//! side effect the caller must execute. Locking, persistence and the ledger
//! are the job of `OrderService`.
//!
//! ```text
//! pending ─accept─► accepted ─process─► processing ─assign─► assigned_to_transporter
//!    │                                                            │ accept (transporter)
//!    ├─reject─► rejected                                          ▼
//!    └─cancel─► cancelled_by_*  ◄── (any pre-delivery status) accepted_by_transporter
//!                                                                 │ start (or deliver)
//!                                                                 ▼
//!            certified ◄─certify─ delivered ◄─deliver─ in_transit
//!                                    │ dispute/return
//!                                    ▼
//!          disputed ─return─► return_to_wholesaler ─► return_accepted | return_rejected
//! ```

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::models::{
    ActorContext, ActorRole, DeliveryDispute, Order, OrderStatus, StatusHistoryEntry,
};
use crate::services::error::OrderError;

/// What a transition does to the stock ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Commit point: decrement stock for the order, exactly once.
    Reserve,
    /// Give a previous reservation back (cancel after commit, accepted return).
    Release,
}

/// Named business action behind an edge, used for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Accept,
    Reject,
    Cancel,
    Process,
    Assign,
    AcceptAssignment,
    StartTransit,
    Deliver,
    Certify,
    Dispute,
    Return,
    AcceptReturn,
    RejectReturn,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::Reject => "reject",
            Action::Cancel => "cancel",
            Action::Process => "process",
            Action::Assign => "assign",
            Action::AcceptAssignment => "accept_assignment",
            Action::StartTransit => "start_transit",
            Action::Deliver => "deliver",
            Action::Certify => "certify",
            Action::Dispute => "dispute",
            Action::Return => "return",
            Action::AcceptReturn => "accept_return",
            Action::RejectReturn => "reject_return",
        }
    }
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub action: Action,
    pub role: ActorRole,
    pub requires_reason: bool,
    pub stock: StockEffect,
}

const fn edge(
    from: OrderStatus,
    to: OrderStatus,
    action: Action,
    role: ActorRole,
    requires_reason: bool,
    stock: StockEffect,
) -> Edge {
    Edge {
        from,
        to,
        action,
        role,
        requires_reason,
        stock,
    }
}

/// Statuses an order can be cancelled from, with the roles allowed to do it.
/// Every cancellation gives back whatever stock the order holds.
const CANCELLABLE: [(OrderStatus, &[ActorRole]); 6] = [
    (OrderStatus::Pending, &[ActorRole::Retailer]),
    (
        OrderStatus::Accepted,
        &[ActorRole::Retailer, ActorRole::Wholesaler],
    ),
    (
        OrderStatus::Processing,
        &[ActorRole::Retailer, ActorRole::Wholesaler],
    ),
    (
        OrderStatus::AssignedToTransporter,
        &[
            ActorRole::Retailer,
            ActorRole::Wholesaler,
            ActorRole::Transporter,
        ],
    ),
    (
        OrderStatus::AcceptedByTransporter,
        &[
            ActorRole::Retailer,
            ActorRole::Wholesaler,
            ActorRole::Transporter,
        ],
    ),
    (
        OrderStatus::InTransit,
        &[
            ActorRole::Retailer,
            ActorRole::Wholesaler,
            ActorRole::Transporter,
        ],
    ),
];

/// The transition table, keyed by `(from, to)`.
pub static TRANSITIONS: Lazy<HashMap<(OrderStatus, OrderStatus), Edge>> = Lazy::new(|| {
    use ActorRole::*;
    use OrderStatus::*;

    let mut edges = vec![
        edge(Pending, Accepted, Action::Accept, Wholesaler, false, StockEffect::Reserve),
        edge(Pending, Rejected, Action::Reject, Wholesaler, true, StockEffect::Release),
        edge(Accepted, Processing, Action::Process, Wholesaler, false, StockEffect::None),
        edge(Processing, AssignedToTransporter, Action::Assign, Wholesaler, false, StockEffect::None),
        edge(AssignedToTransporter, AcceptedByTransporter, Action::AcceptAssignment, Transporter, false, StockEffect::None),
        edge(AcceptedByTransporter, InTransit, Action::StartTransit, Transporter, false, StockEffect::None),
        edge(AcceptedByTransporter, Delivered, Action::Deliver, Transporter, false, StockEffect::None),
        edge(InTransit, Delivered, Action::Deliver, Transporter, false, StockEffect::None),
        edge(Delivered, Certified, Action::Certify, Retailer, false, StockEffect::None),
        edge(Delivered, Disputed, Action::Dispute, Retailer, true, StockEffect::None),
        edge(Delivered, ReturnToWholesaler, Action::Return, Retailer, true, StockEffect::None),
        edge(Disputed, ReturnToWholesaler, Action::Return, Wholesaler, false, StockEffect::None),
        edge(ReturnToWholesaler, ReturnAccepted, Action::AcceptReturn, Wholesaler, false, StockEffect::Release),
        edge(ReturnToWholesaler, ReturnRejected, Action::RejectReturn, Wholesaler, false, StockEffect::None),
    ];

    for (from, roles) in CANCELLABLE {
        for &role in roles {
            edges.push(edge(
                from,
                OrderStatus::cancelled_by(role),
                Action::Cancel,
                role,
                true,
                StockEffect::Release,
            ));
        }
    }

    edges.into_iter().map(|e| ((e.from, e.to), e)).collect()
});

/// A caller's request to move an order to `target`.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub target: OrderStatus,
    pub actor: ActorContext,
    pub reason: Option<String>,
    pub transporter_id: Option<String>,
}

impl TransitionRequest {
    pub fn new(target: OrderStatus, actor: ActorContext) -> Self {
        Self {
            target,
            actor,
            reason: None,
            transporter_id: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_transporter(mut self, transporter_id: impl Into<String>) -> Self {
        self.transporter_id = Some(transporter_id.into());
        self
    }
}

/// Result of a validated transition, not yet persisted.
#[derive(Debug, Clone)]
pub struct Transition {
    pub order: Order,
    pub edge: Edge,
}

pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Look up the edge for `(from, to)`.
    pub fn edge(from: OrderStatus, to: OrderStatus) -> Option<&'static Edge> {
        TRANSITIONS.get(&(from, to))
    }

    /// Validate `request` against `order` and build the updated aggregate.
    ///
    /// Checks run in a fixed order so the error is deterministic: unknown edge,
    /// wrong role, wrong actor id, missing reason, missing transporter.
    pub fn transition(
        order: &Order,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> Result<Transition, OrderError> {
        let edge = Self::edge(order.status, request.target).ok_or(
            OrderError::InvalidTransition {
                current: order.status,
                target: request.target,
            },
        )?;

        if request.actor.role != edge.role {
            return Err(OrderError::forbidden(format!(
                "a {} cannot {} an order that is {}",
                request.actor.role,
                edge.action.as_str(),
                order.status
            )));
        }

        if !order.is_party(&request.actor) {
            return Err(OrderError::forbidden(format!(
                "{} {} is not the {} on this order",
                request.actor.role, request.actor.id, request.actor.role
            )));
        }

        let reason = request
            .reason
            .clone()
            .filter(|r| !r.trim().is_empty());
        if edge.requires_reason && reason.is_none() {
            return Err(OrderError::MissingReason(edge.to));
        }

        let transporter_id = match edge.action {
            Action::Assign => Some(
                request
                    .transporter_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or(OrderError::MissingTransporter)?
                    .to_string(),
            ),
            _ => None,
        };

        let mut updated = order.clone();
        updated.status = edge.to;
        updated.updated_at = now;
        updated.status_history.push(StatusHistoryEntry {
            status: edge.to,
            actor_role: request.actor.role,
            actor_id: request.actor.id.clone(),
            timestamp: now,
            reason: reason.clone(),
        });

        match edge.action {
            Action::Assign => updated.transporter_id = transporter_id,
            Action::Reject => updated.rejection_reason = reason,
            Action::Cancel => updated.cancellation_reason = reason,
            Action::Dispute => {
                updated.delivery_dispute = reason.map(|reason| DeliveryDispute {
                    reason,
                    disputed_at: now,
                })
            }
            Action::Return if edge.from == OrderStatus::Delivered => {
                updated.return_reason = reason
            }
            Action::Deliver => updated.actual_delivery_date = Some(now),
            Action::Certify => updated.delivery_certification_date = Some(now),
            _ => {}
        }

        Ok(Transition {
            order: updated,
            edge: *edge,
        })
    }
}
