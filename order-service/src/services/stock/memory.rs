use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{Reservation, ReserveOutcome, RestoreOutcome, StockLedger};
use crate::models::StockItem;
use crate::services::error::StockError;

/// Process-local ledger. Each operation holds the reservation entry and then
/// the product entry, always in that order.
#[derive(Clone, Default)]
pub struct InMemoryStockLedger {
    items: Arc<DashMap<String, StockItem>>,
    reservations: Arc<DashMap<Uuid, Reservation>>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reservation(&self, order_id: Uuid) -> Option<Reservation> {
        self.reservations.get(&order_id).map(|r| r.clone())
    }
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn lookup(&self, product_id: &str) -> Result<Option<StockItem>, StockError> {
        Ok(self.items.get(product_id).map(|item| item.clone()))
    }

    async fn upsert(&self, item: StockItem) -> Result<StockItem, StockError> {
        self.items.insert(item.product_id.clone(), item.clone());
        Ok(item)
    }

    async fn reserve(
        &self,
        order_id: Uuid,
        product_id: &str,
        quantity: u32,
    ) -> Result<ReserveOutcome, StockError> {
        let slot = match self.reservations.entry(order_id) {
            Entry::Occupied(_) => return Ok(ReserveOutcome::AlreadyReserved),
            Entry::Vacant(slot) => slot,
        };

        let mut item = self
            .items
            .get_mut(product_id)
            .ok_or_else(|| StockError::UnknownProduct(product_id.to_string()))?;

        if item.quantity < quantity {
            return Err(StockError::InsufficientStock {
                product_id: product_id.to_string(),
                requested: quantity,
                available: item.quantity,
            });
        }

        item.quantity -= quantity;
        slot.insert(Reservation {
            order_id,
            product_id: product_id.to_string(),
            quantity,
        });

        Ok(ReserveOutcome::Reserved)
    }

    async fn restore(&self, order_id: Uuid) -> Result<RestoreOutcome, StockError> {
        let Some((_, reservation)) = self.reservations.remove(&order_id) else {
            return Ok(RestoreOutcome::NothingReserved);
        };

        match self.items.get_mut(&reservation.product_id) {
            Some(mut item) => {
                item.quantity += reservation.quantity;
                Ok(RestoreOutcome::Restored(reservation.quantity))
            }
            None => {
                // Product record was removed; keep the reservation so it can be replayed.
                let product_id = reservation.product_id.clone();
                self.reservations.insert(order_id, reservation);
                Err(StockError::UnknownProduct(product_id))
            }
        }
    }
}
