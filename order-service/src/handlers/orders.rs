//! Order endpoints. Every call is scoped to the actor in the request headers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{ListOrdersQuery, OrderListResponse, PlaceOrderRequest, UpdateStatusRequest},
    models::{ActorContext, Order},
    services::{OrderError, StatusFilter, TransitionRequest},
    AppState,
};

pub async fn place_order(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>), OrderError> {
    payload.validate()?;

    let order = state.orders.place_order(&actor, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderListResponse>, OrderError> {
    let status = match query.status.as_deref() {
        Some(raw) => raw.parse::<StatusFilter>()?,
        None => StatusFilter::All,
    };

    let page = state
        .orders
        .list_orders(&actor, status, query.page, query.page_size)
        .await?;
    Ok(Json(page.into()))
}

pub async fn get_order(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, OrderError> {
    let order = state.orders.get_order(&actor, order_id).await?;
    Ok(Json(order))
}

pub async fn update_status(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, OrderError> {
    payload.validate()?;

    tracing::info!(
        order_id = %order_id,
        target_status = %payload.target_status,
        "Updating order status"
    );

    let mut request = TransitionRequest::new(payload.target_status, actor);
    request.reason = payload.reason;
    request.transporter_id = payload.transporter_id;

    let order = state.orders.update_status(order_id, request).await?;
    Ok(Json(order))
}

pub async fn delete_order(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, OrderError> {
    state.orders.delete_order(&actor, order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
