//! Order use cases: the facade the HTTP layer talks to.

use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    ActorContext, ActorRole, NewOrder, Order, OrderStatus, ShippingDetails, StockItem,
};
use crate::services::error::{OrderError, RepositoryError, StockError};
use crate::services::locks::OrderLocks;
use crate::services::metrics::{record_order_placed, record_stock_operation, record_transition};
use crate::services::notification::{Notifier, StatusChangeEvent};
use crate::services::repository::{OrderFilter, OrderRepository};
use crate::services::state_machine::{OrderStateMachine, StockEffect, TransitionRequest};
use crate::services::stock::{ReserveOutcome, RestoreOutcome, StockLedger};

/// Tunables for the order engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub lock_timeout: Duration,
    pub ledger_timeout: Duration,
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            ledger_timeout: Duration::from_secs(5),
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Input for placing an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub product_id: String,
    pub quantity: u32,
    pub shipping_details: ShippingDetails,
}

/// Input for a wholesaler's stock record.
#[derive(Debug, Clone)]
pub struct StockUpdate {
    pub quantity: u32,
    pub unit_price: Decimal,
    pub measurement_unit: String,
    pub min_order_quantity: u32,
}

/// Status narrowing for listings; `all` disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(OrderStatus),
}

impl FromStr for StatusFilter {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(StatusFilter::All),
            other => OrderStatus::parse(other)
                .map(StatusFilter::Only)
                .ok_or_else(|| OrderError::InvalidStatus(other.to_string())),
        }
    }
}

impl StatusFilter {
    fn status(self) -> Option<OrderStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Only(status) => Some(status),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Clone)]
pub struct OrderService {
    repository: Arc<dyn OrderRepository>,
    ledger: Arc<dyn StockLedger>,
    notifier: Notifier,
    locks: OrderLocks,
    settings: EngineSettings,
}

fn repository_error(order_id: Uuid) -> impl Fn(RepositoryError) -> OrderError {
    move |err| match err {
        RepositoryError::VersionConflict => OrderError::ConcurrencyConflict(order_id),
        RepositoryError::Storage(e) => OrderError::Storage(e),
    }
}

impl OrderService {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        ledger: Arc<dyn StockLedger>,
        notifier: Notifier,
        settings: EngineSettings,
    ) -> Self {
        Self {
            repository,
            ledger,
            notifier,
            locks: OrderLocks::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Create a `pending` order. Stock is checked but not touched; it is only
    /// committed when the wholesaler accepts.
    #[instrument(skip(self, actor, input), fields(retailer_id = %actor.id, product_id = %input.product_id, quantity = input.quantity))]
    pub async fn place_order(
        &self,
        actor: &ActorContext,
        input: PlaceOrder,
    ) -> Result<Order, OrderError> {
        if actor.role != ActorRole::Retailer {
            return Err(OrderError::forbidden("only retailers can place orders"));
        }

        let item = self
            .ledger_call("lookup", self.ledger.lookup(&input.product_id))
            .await?
            .ok_or_else(|| OrderError::ProductNotFound(input.product_id.clone()))?;

        if input.quantity == 0 {
            record_order_placed("invalid_quantity");
            return Err(OrderError::InvalidQuantity(
                "quantity must be at least 1".to_string(),
            ));
        }
        if input.quantity < item.min_order_quantity {
            record_order_placed("invalid_quantity");
            return Err(OrderError::InvalidQuantity(format!(
                "minimum order for {} is {} {}",
                item.product_id, item.min_order_quantity, item.measurement_unit
            )));
        }
        if input.quantity > item.quantity {
            record_order_placed("invalid_quantity");
            return Err(OrderError::InvalidQuantity(format!(
                "only {} {} of {} available",
                item.quantity, item.measurement_unit, item.product_id
            )));
        }

        let order = Order::create(
            NewOrder {
                retailer_id: actor.id.clone(),
                wholesaler_id: item.wholesaler_id,
                product_id: item.product_id,
                quantity: input.quantity,
                measurement_unit: item.measurement_unit,
                unit_price: item.unit_price,
                shipping_details: input.shipping_details,
            },
            Utc::now(),
        );

        self.repository
            .create(&order)
            .await
            .map_err(repository_error(order.id))?;

        record_order_placed("placed");
        info!(
            order_id = %order.id,
            wholesaler_id = %order.wholesaler_id,
            total_price = %order.total_price,
            "Order placed"
        );

        self.notifier.dispatch(vec![StatusChangeEvent {
            recipient_id: order.wholesaler_id.clone(),
            order_id: order.id,
            previous_status: None,
            new_status: order.status,
            actor_role: actor.role,
            actor_id: actor.id.clone(),
            occurred_at: order.created_at,
        }]);

        Ok(order)
    }

    /// Orders visible to `actor`, newest first.
    #[instrument(skip(self, actor), fields(actor_role = %actor.role, actor_id = %actor.id))]
    pub async fn list_orders(
        &self,
        actor: &ActorContext,
        status: StatusFilter,
        page: Option<u64>,
        page_size: Option<u64>,
    ) -> Result<OrderPage, OrderError> {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size
            .unwrap_or(self.settings.default_page_size)
            .clamp(1, self.settings.max_page_size);

        let filter = OrderFilter::for_actor(actor, status.status());
        let (orders, total) = self
            .repository
            .list(&filter, (page - 1).saturating_mul(page_size), page_size)
            .await
            .map_err(|e| match e {
                RepositoryError::Storage(e) => OrderError::Storage(e),
                RepositoryError::VersionConflict => {
                    OrderError::Storage(anyhow::anyhow!("unexpected version conflict on list"))
                }
            })?;

        Ok(OrderPage {
            orders,
            page,
            page_size,
            total,
            total_pages: total.div_ceil(page_size),
        })
    }

    /// Fetch one order; only its parties may see it.
    pub async fn get_order(&self, actor: &ActorContext, order_id: Uuid) -> Result<Order, OrderError> {
        let order = self
            .repository
            .get(order_id)
            .await
            .map_err(repository_error(order_id))?
            .ok_or(OrderError::NotFound(order_id))?;

        if !order.is_party(actor) {
            return Err(OrderError::forbidden(format!(
                "{} {} is not a party to order {}",
                actor.role, actor.id, order_id
            )));
        }
        Ok(order)
    }

    /// Apply one lifecycle transition under the order's lock.
    ///
    /// A version conflict from storage is retried once against a fresh read;
    /// the retry sees the new status and normally fails with
    /// `InvalidTransition`.
    #[instrument(
        skip(self, request),
        fields(
            actor_role = %request.actor.role,
            actor_id = %request.actor.id,
            target_status = %request.target
        )
    )]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        request: TransitionRequest,
    ) -> Result<Order, OrderError> {
        let _lock = self
            .locks
            .acquire(order_id, self.settings.lock_timeout)
            .await?;

        match self.try_transition(order_id, &request).await {
            Err(OrderError::ConcurrencyConflict(_)) => {
                warn!("Version conflict while updating order, retrying once");
                self.try_transition(order_id, &request).await
            }
            result => result,
        }
    }

    async fn try_transition(
        &self,
        order_id: Uuid,
        request: &TransitionRequest,
    ) -> Result<Order, OrderError> {
        let current = self
            .repository
            .get(order_id)
            .await
            .map_err(repository_error(order_id))?
            .ok_or(OrderError::NotFound(order_id))?;

        let transition = OrderStateMachine::transition(&current, request, Utc::now())
            .inspect_err(|e| {
                record_transition(current.status.as_str(), request.target.as_str(), e.code())
            })?;
        let edge = transition.edge;
        let mut updated = transition.order;
        updated.version = current.version + 1;

        let reserved = match edge.stock {
            StockEffect::Reserve => Some(self.reserve(&current).await?),
            _ => None,
        };

        if let Err(err) = self.repository.update(&updated, current.version).await {
            if reserved == Some(ReserveOutcome::Reserved) {
                self.reconcile_reservation(order_id).await;
            }
            let err = repository_error(order_id)(err);
            if let OrderError::Storage(cause) = &err {
                tracing::error!(
                    order_id = %order_id,
                    from = %current.status,
                    to = %edge.to,
                    error = %cause,
                    "Failed to persist order transition"
                );
            }
            return Err(err);
        }

        if edge.stock == StockEffect::Release {
            self.release(&updated).await;
        }

        record_transition(current.status.as_str(), edge.to.as_str(), "ok");
        info!(
            order_id = %order_id,
            action = edge.action.as_str(),
            from = %current.status,
            to = %edge.to,
            "Order transitioned"
        );

        self.notify_transition(&current, &updated, &request.actor);
        Ok(updated)
    }

    /// Hard-delete an order that never moved stock or reached delivery.
    #[instrument(skip(self, actor), fields(actor_role = %actor.role, actor_id = %actor.id))]
    pub async fn delete_order(&self, actor: &ActorContext, order_id: Uuid) -> Result<(), OrderError> {
        let _lock = self
            .locks
            .acquire(order_id, self.settings.lock_timeout)
            .await?;

        let order = self
            .repository
            .get(order_id)
            .await
            .map_err(repository_error(order_id))?
            .ok_or(OrderError::NotFound(order_id))?;

        if !order.is_party(actor) {
            return Err(OrderError::forbidden(format!(
                "{} {} is not a party to order {}",
                actor.role, actor.id, order_id
            )));
        }
        if !order.status.is_deletable() {
            return Err(OrderError::forbidden(format!(
                "orders that are {} cannot be deleted",
                order.status
            )));
        }

        self.repository
            .delete(order_id, order.version)
            .await
            .map_err(repository_error(order_id))?;

        if order.status == OrderStatus::Pending {
            // A timed-out reserve may still have landed for this order.
            self.release(&order).await;
        }

        info!(order_id = %order_id, status = %order.status, "Order deleted");
        Ok(())
    }

    /// Create or replace the acting wholesaler's stock record for a product.
    #[instrument(skip(self, actor, update), fields(wholesaler_id = %actor.id))]
    pub async fn put_stock(
        &self,
        actor: &ActorContext,
        product_id: &str,
        update: StockUpdate,
    ) -> Result<StockItem, OrderError> {
        if actor.role != ActorRole::Wholesaler {
            return Err(OrderError::forbidden("only wholesalers manage stock"));
        }
        if let Some(existing) = self.ledger_call("lookup", self.ledger.lookup(product_id)).await? {
            if existing.wholesaler_id != actor.id {
                return Err(OrderError::forbidden(format!(
                    "product {} belongs to another wholesaler",
                    product_id
                )));
            }
        }

        let item = StockItem {
            product_id: product_id.to_string(),
            wholesaler_id: actor.id.clone(),
            quantity: update.quantity,
            unit_price: update.unit_price,
            measurement_unit: update.measurement_unit,
            min_order_quantity: update.min_order_quantity,
        };
        self.ledger_call("upsert", self.ledger.upsert(item)).await
    }

    pub async fn get_stock(&self, product_id: &str) -> Result<StockItem, OrderError> {
        self.ledger_call("lookup", self.ledger.lookup(product_id))
            .await?
            .ok_or_else(|| OrderError::ProductNotFound(product_id.to_string()))
    }

    async fn ledger_call<T, F>(&self, operation: &'static str, call: F) -> Result<T, OrderError>
    where
        F: Future<Output = Result<T, StockError>>,
    {
        match tokio::time::timeout(self.settings.ledger_timeout, call).await {
            Ok(result) => result.map_err(OrderError::from),
            Err(_) => {
                record_stock_operation(operation, "timeout");
                Err(OrderError::Unavailable(format!(
                    "stock ledger {} timed out",
                    operation
                )))
            }
        }
    }

    /// Commit stock for `order`. A timeout is not compensated here: the
    /// order stays `pending`, and every way out of `pending` either reuses
    /// or releases whatever reservation the ledger ended up holding.
    async fn reserve(&self, order: &Order) -> Result<ReserveOutcome, OrderError> {
        let result = self
            .ledger_call(
                "reserve",
                self.ledger
                    .reserve(order.id, &order.product_id, order.quantity),
            )
            .await;

        match result {
            Ok(ReserveOutcome::Reserved) => {
                record_stock_operation("reserve", "reserved");
                Ok(ReserveOutcome::Reserved)
            }
            Ok(ReserveOutcome::AlreadyReserved) => {
                record_stock_operation("reserve", "already_reserved");
                warn!(order_id = %order.id, "Stock already reserved for order");
                Ok(ReserveOutcome::AlreadyReserved)
            }
            Err(err) => {
                if !matches!(err, OrderError::Unavailable(_)) {
                    record_stock_operation("reserve", err.code());
                }
                Err(err)
            }
        }
    }

    /// Decide who owns a reservation this call made after its own persist
    /// failed. Another writer may have committed the order in the meantime,
    /// so the reservation is only rolled back when the stored order can no
    /// longer hold stock.
    async fn reconcile_reservation(&self, order_id: Uuid) {
        match self.repository.get(order_id).await {
            Ok(Some(stored)) if !stored.status.is_stock_released() => {
                info!(
                    order_id = %order_id,
                    status = %stored.status,
                    "Keeping stock reservation for order"
                );
            }
            Ok(_) => self.compensate_reservation(order_id).await,
            Err(e) => {
                record_stock_operation("compensate", "error");
                tracing::error!(
                    order_id = %order_id,
                    error = %e,
                    "Failed to re-read order, stock reservation left in place"
                );
            }
        }
    }

    async fn compensate_reservation(&self, order_id: Uuid) {
        match self.ledger.restore(order_id).await {
            Ok(RestoreOutcome::Restored(quantity)) => {
                record_stock_operation("compensate", "restored");
                info!(order_id = %order_id, quantity, "Rolled back stock reservation");
            }
            Ok(RestoreOutcome::NothingReserved) => {}
            Err(e) => {
                record_stock_operation("compensate", "error");
                tracing::error!(
                    order_id = %order_id,
                    error = %e,
                    "Failed to roll back stock reservation"
                );
            }
        }
    }

    /// Return committed stock after a cancellation or accepted return. The
    /// transition is already persisted, so a failure here is logged for
    /// replay rather than surfaced; `restore` is idempotent per order.
    async fn release(&self, order: &Order) {
        match self
            .ledger_call("restore", self.ledger.restore(order.id))
            .await
        {
            Ok(RestoreOutcome::Restored(quantity)) => {
                record_stock_operation("restore", "restored");
                info!(order_id = %order.id, quantity, "Stock restored");
            }
            Ok(RestoreOutcome::NothingReserved) => {
                record_stock_operation("restore", "nothing_reserved");
            }
            Err(e) => {
                record_stock_operation("restore", "error");
                tracing::error!(
                    order_id = %order.id,
                    product_id = %order.product_id,
                    status = %order.status,
                    error = %e,
                    "Failed to restore stock after transition"
                );
            }
        }
    }

    fn notify_transition(&self, before: &Order, after: &Order, actor: &ActorContext) {
        let events = after
            .counterparties(&actor.id)
            .into_iter()
            .map(|recipient_id| StatusChangeEvent {
                recipient_id,
                order_id: after.id,
                previous_status: Some(before.status),
                new_status: after.status,
                actor_role: actor.role,
                actor_id: actor.id.clone(),
                occurred_at: after.updated_at,
            })
            .collect();
        self.notifier.dispatch(events);
    }
}
