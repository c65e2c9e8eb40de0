use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson, Bson, Document};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Collection, Database, IndexModel};
use uuid::Uuid;

use super::{OrderFilter, OrderRepository};
use crate::models::{ActorRole, Order};
use crate::services::error::RepositoryError;

/// MongoDB-backed repository. Documents are stored in their JSON shape with a
/// unique index on `id`; `_id` is left to the driver.
#[derive(Clone)]
pub struct MongoOrderRepository {
    collection: Collection<Order>,
}

fn bson_of<T: serde::Serialize>(value: &T) -> Result<Bson, RepositoryError> {
    to_bson(value).map_err(|e| RepositoryError::Storage(anyhow::Error::new(e)))
}

fn party_field(role: ActorRole) -> &'static str {
    match role {
        ActorRole::Retailer => "retailerId",
        ActorRole::Wholesaler => "wholesalerId",
        ActorRole::Transporter => "transporterId",
    }
}

impl MongoOrderRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("orders"),
        }
    }

    /// Create the id index and one `(party, status)` index per role.
    pub async fn init_indexes(&self) -> Result<(), RepositoryError> {
        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .name("order_id_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let mut indexes = vec![id_index];
        for role in [
            ActorRole::Retailer,
            ActorRole::Wholesaler,
            ActorRole::Transporter,
        ] {
            let field = party_field(role);
            indexes.push(
                IndexModel::builder()
                    .keys(doc! { field: 1, "status": 1, "createdAt": -1 })
                    .options(
                        IndexOptions::builder()
                            .name(format!("{}_status_idx", role.as_str()))
                            .build(),
                    )
                    .build(),
            );
        }

        self.collection.create_indexes(indexes, None).await?;

        tracing::info!("Order repository indexes initialized");
        Ok(())
    }

    fn list_filter(filter: &OrderFilter) -> Result<Document, RepositoryError> {
        let field = party_field(filter.role);
        let mut query = doc! { field: filter.actor_id.as_str() };
        if let Some(status) = filter.status {
            query.insert("status", bson_of(&status)?);
        }
        Ok(query)
    }
}

#[async_trait]
impl OrderRepository for MongoOrderRepository {
    async fn create(&self, order: &Order) -> Result<(), RepositoryError> {
        self.collection.insert_one(order, None).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let filter = doc! { "id": bson_of(&id)? };
        Ok(self.collection.find_one(filter, None).await?)
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Order>, u64), RepositoryError> {
        let query = Self::list_filter(filter)?;

        let total = self
            .collection
            .count_documents(query.clone(), None)
            .await?;
        if offset >= total {
            return Ok((Vec::new(), total));
        }

        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .skip(offset)
            .limit(limit as i64)
            .build();

        let cursor = self.collection.find(query, Some(options)).await?;
        let orders: Vec<Order> = cursor.try_collect().await?;

        Ok((orders, total))
    }

    async fn update(&self, order: &Order, expected_version: i64) -> Result<(), RepositoryError> {
        let filter = doc! {
            "id": bson_of(&order.id)?,
            "version": expected_version,
        };
        let result = self.collection.replace_one(filter, order, None).await?;
        if result.matched_count == 0 {
            return Err(RepositoryError::VersionConflict);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid, expected_version: i64) -> Result<(), RepositoryError> {
        let filter = doc! {
            "id": bson_of(&id)?,
            "version": expected_version,
        };
        let result = self.collection.delete_one(filter, None).await?;
        if result.deleted_count == 0 {
            return Err(RepositoryError::VersionConflict);
        }
        Ok(())
    }
}
