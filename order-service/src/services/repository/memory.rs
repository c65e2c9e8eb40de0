use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{OrderFilter, OrderRepository};
use crate::models::Order;
use crate::services::error::RepositoryError;

/// Process-local repository. Used by tests and when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<DashMap<Uuid, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: &Order) -> Result<(), RepositoryError> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(RepositoryError::Storage(anyhow::anyhow!(
                "order {} already exists",
                order.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(order.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.get(&id).map(|o| o.clone()))
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Order>, u64), RepositoryError> {
        let mut matches: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| filter.matches(o.value()))
            .map(|o| o.value().clone())
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matches.len() as u64;
        let page = matches
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn update(&self, order: &Order, expected_version: i64) -> Result<(), RepositoryError> {
        match self.orders.get_mut(&order.id) {
            Some(mut stored) if stored.version == expected_version => {
                *stored = order.clone();
                Ok(())
            }
            _ => Err(RepositoryError::VersionConflict),
        }
    }

    async fn delete(&self, id: Uuid, expected_version: i64) -> Result<(), RepositoryError> {
        self.orders
            .remove_if(&id, |_, stored| stored.version == expected_version)
            .map(|_| ())
            .ok_or(RepositoryError::VersionConflict)
    }
}
