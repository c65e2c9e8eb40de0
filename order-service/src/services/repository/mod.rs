//! Order persistence boundary.

mod memory;
mod mongo;

pub use memory::InMemoryOrderRepository;
pub use mongo::MongoOrderRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{ActorContext, ActorRole, Order, OrderStatus};
use crate::services::error::RepositoryError;

/// Which orders a listing may see and which status it is narrowed to.
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub role: ActorRole,
    pub actor_id: String,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn for_actor(actor: &ActorContext, status: Option<OrderStatus>) -> Self {
        Self {
            role: actor.role,
            actor_id: actor.id.clone(),
            status,
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        order.party_id(self.role) == Some(self.actor_id.as_str())
            && self.status.map_or(true, |s| order.status == s)
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;

    /// Newest first. Returns the page and the total number of matches.
    async fn list(
        &self,
        filter: &OrderFilter,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Order>, u64), RepositoryError>;

    /// Replace the stored order iff its version still equals
    /// `expected_version`. `order.version` must already be bumped.
    async fn update(&self, order: &Order, expected_version: i64) -> Result<(), RepositoryError>;

    /// Hard delete iff the stored version equals `expected_version`.
    async fn delete(&self, id: Uuid, expected_version: i64) -> Result<(), RepositoryError>;
}
