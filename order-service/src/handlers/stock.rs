use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::{
    dtos::{PutStockRequest, StockResponse},
    models::ActorContext,
    services::OrderError,
    AppState,
};

/// Create or replace the calling wholesaler's stock for a product.
pub async fn put_stock(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(product_id): Path<String>,
    Json(payload): Json<PutStockRequest>,
) -> Result<Json<StockResponse>, OrderError> {
    payload.validate()?;

    let item = state
        .orders
        .put_stock(&actor, &product_id, payload.into())
        .await?;
    Ok(Json(item))
}

pub async fn get_stock(
    State(state): State<AppState>,
    _actor: ActorContext,
    Path(product_id): Path<String>,
) -> Result<Json<StockResponse>, OrderError> {
    let item = state.orders.get_stock(&product_id).await?;
    Ok(Json(item))
}
