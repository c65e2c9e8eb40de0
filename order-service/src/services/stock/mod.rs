//! Stock ledger: the only place product quantities change.
//!
//! Reservations are keyed by order id, so a retried `reserve` or `restore`
//! for the same order never moves stock twice.

mod memory;
mod mongo;

pub use memory::InMemoryStockLedger;
pub use mongo::MongoStockLedger;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::StockItem;
use crate::services::error::StockError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Stock was decremented by the requested quantity.
    Reserved,
    /// The order already holds a reservation; nothing changed.
    AlreadyReserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The reservation was returned to stock.
    Restored(u32),
    /// The order held no reservation; nothing changed.
    NothingReserved,
}

/// Stock held back for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub order_id: Uuid,
    pub product_id: String,
    pub quantity: u32,
}

#[async_trait]
pub trait StockLedger: Send + Sync {
    async fn lookup(&self, product_id: &str) -> Result<Option<StockItem>, StockError>;

    /// Create or replace a product's stock record.
    async fn upsert(&self, item: StockItem) -> Result<StockItem, StockError>;

    /// Atomically decrement `quantity` of `product_id` on behalf of `order_id`.
    async fn reserve(
        &self,
        order_id: Uuid,
        product_id: &str,
        quantity: u32,
    ) -> Result<ReserveOutcome, StockError>;

    /// Give back whatever `order_id` reserved.
    async fn restore(&self, order_id: Uuid) -> Result<RestoreOutcome, StockError>;
}
