use async_trait::async_trait;
use mongodb::bson::{doc, to_bson, Bson};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReplaceOptions};
use mongodb::{Collection, Database, IndexModel};
use uuid::Uuid;

use super::{Reservation, ReserveOutcome, RestoreOutcome, StockLedger};
use crate::models::StockItem;
use crate::services::error::StockError;

const DUPLICATE_KEY: i32 = 11000;

/// MongoDB-backed ledger. Decrements are a single conditional `$inc`, and the
/// reservation document's unique `orderId` is the idempotency guard.
#[derive(Clone)]
pub struct MongoStockLedger {
    items: Collection<StockItem>,
    reservations: Collection<Reservation>,
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

fn order_key(order_id: Uuid) -> Result<Bson, StockError> {
    to_bson(&order_id).map_err(|e| StockError::Storage(anyhow::Error::new(e)))
}

impl MongoStockLedger {
    pub fn new(db: &Database) -> Self {
        Self {
            items: db.collection("stock_items"),
            reservations: db.collection("stock_reservations"),
        }
    }

    pub async fn init_indexes(&self) -> Result<(), StockError> {
        let product_index = IndexModel::builder()
            .keys(doc! { "productId": 1 })
            .options(
                IndexOptions::builder()
                    .name("stock_product_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.items.create_indexes([product_index], None).await?;

        let reservation_index = IndexModel::builder()
            .keys(doc! { "orderId": 1 })
            .options(
                IndexOptions::builder()
                    .name("reservation_order_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.reservations
            .create_indexes([reservation_index], None)
            .await?;

        tracing::info!("Stock ledger indexes initialized");
        Ok(())
    }
}

#[async_trait]
impl StockLedger for MongoStockLedger {
    async fn lookup(&self, product_id: &str) -> Result<Option<StockItem>, StockError> {
        Ok(self
            .items
            .find_one(doc! { "productId": product_id }, None)
            .await?)
    }

    async fn upsert(&self, item: StockItem) -> Result<StockItem, StockError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.items
            .replace_one(doc! { "productId": item.product_id.as_str() }, &item, options)
            .await?;
        Ok(item)
    }

    async fn reserve(
        &self,
        order_id: Uuid,
        product_id: &str,
        quantity: u32,
    ) -> Result<ReserveOutcome, StockError> {
        let reservation = Reservation {
            order_id,
            product_id: product_id.to_string(),
            quantity,
        };
        match self.reservations.insert_one(&reservation, None).await {
            Ok(_) => {}
            Err(e) if is_duplicate_key(&e) => return Ok(ReserveOutcome::AlreadyReserved),
            Err(e) => return Err(e.into()),
        }

        let requested = i64::from(quantity);
        let decremented = self
            .items
            .find_one_and_update(
                doc! { "productId": product_id, "quantity": { "$gte": requested } },
                doc! { "$inc": { "quantity": -requested } },
                None,
            )
            .await;

        match decremented {
            Ok(Some(_)) => Ok(ReserveOutcome::Reserved),
            outcome => {
                self.reservations
                    .delete_one(doc! { "orderId": order_key(order_id)? }, None)
                    .await?;
                outcome?;
                match self.lookup(product_id).await? {
                    Some(item) => Err(StockError::InsufficientStock {
                        product_id: product_id.to_string(),
                        requested: quantity,
                        available: item.quantity,
                    }),
                    None => Err(StockError::UnknownProduct(product_id.to_string())),
                }
            }
        }
    }

    async fn restore(&self, order_id: Uuid) -> Result<RestoreOutcome, StockError> {
        let Some(reservation) = self
            .reservations
            .find_one_and_delete(doc! { "orderId": order_key(order_id)? }, None)
            .await?
        else {
            return Ok(RestoreOutcome::NothingReserved);
        };

        let returned = i64::from(reservation.quantity);
        let result = self
            .items
            .update_one(
                doc! { "productId": reservation.product_id.as_str() },
                doc! { "$inc": { "quantity": returned } },
                None,
            )
            .await?;

        if result.matched_count == 0 {
            let product_id = reservation.product_id.clone();
            self.reservations.insert_one(&reservation, None).await?;
            return Err(StockError::UnknownProduct(product_id));
        }

        Ok(RestoreOutcome::Restored(reservation.quantity))
    }
}
