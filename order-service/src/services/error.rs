use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use service_core::error::{AppError, ErrorResponse};
use thiserror::Error;
use uuid::Uuid;

use crate::models::OrderStatus;

/// Domain errors returned by the order engine.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order {0} not found")]
    NotFound(Uuid),

    #[error("Product {0} not found")]
    ProductNotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot move order from {current} to {target}")]
    InvalidTransition {
        current: OrderStatus,
        target: OrderStatus,
    },

    #[error("A reason is required to move an order to {0}")]
    MissingReason(OrderStatus),

    #[error("A transporter id is required to assign an order")]
    MissingTransporter,

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Unknown order status: {0}")]
    InvalidStatus(String),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },

    #[error("Order {0} was modified concurrently, retry the request")]
    ConcurrencyConflict(Uuid),

    #[error("Timed out waiting for order {0}, retry the request")]
    LockTimeout(Uuid),

    #[error("Stock ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl OrderError {
    /// Stable machine-readable kind, also used as a metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::NotFound(_) | OrderError::ProductNotFound(_) => "not_found",
            OrderError::Forbidden(_) => "forbidden",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::MissingReason(_) => "missing_reason",
            OrderError::MissingTransporter => "missing_transporter",
            OrderError::InvalidQuantity(_) => "invalid_quantity",
            OrderError::InvalidStatus(_) => "invalid_status",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::ConcurrencyConflict(_) => "concurrency_conflict",
            OrderError::LockTimeout(_) => "lock_timeout",
            OrderError::Unavailable(_) => "unavailable",
            OrderError::Validation(_) => "validation_error",
            OrderError::Storage(_) => "storage_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrderError::ConcurrencyConflict(_)
                | OrderError::LockTimeout(_)
                | OrderError::Unavailable(_)
        )
    }

    pub(crate) fn forbidden(msg: impl Into<String>) -> Self {
        OrderError::Forbidden(msg.into())
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let code = self.code();
        let message = self.to_string();

        match self {
            OrderError::NotFound(_) | OrderError::ProductNotFound(_) => {
                ErrorResponse::new(code, message).into_response_with(StatusCode::NOT_FOUND, None)
            }
            OrderError::Forbidden(_) => {
                ErrorResponse::new(code, message).into_response_with(StatusCode::FORBIDDEN, None)
            }
            OrderError::InvalidTransition { current, .. } => ErrorResponse::new(code, message)
                .with_current_status(current.as_str())
                .into_response_with(StatusCode::CONFLICT, None),
            OrderError::MissingReason(_)
            | OrderError::MissingTransporter
            | OrderError::InvalidQuantity(_)
            | OrderError::InvalidStatus(_) => ErrorResponse::new(code, message)
                .into_response_with(StatusCode::UNPROCESSABLE_ENTITY, None),
            OrderError::InsufficientStock { .. } | OrderError::ConcurrencyConflict(_) => {
                ErrorResponse::new(code, message).into_response_with(StatusCode::CONFLICT, None)
            }
            OrderError::LockTimeout(_) | OrderError::Unavailable(_) => {
                ErrorResponse::new(code, message)
                    .into_response_with(StatusCode::SERVICE_UNAVAILABLE, Some(1))
            }
            OrderError::Validation(errors) => AppError::ValidationError(errors).into_response(),
            OrderError::Storage(err) => AppError::DatabaseError(err).into_response(),
        }
    }
}

/// Failures reported by an `OrderRepository`.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("stored version does not match the expected version")]
    VersionConflict,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<mongodb::error::Error> for RepositoryError {
    fn from(err: mongodb::error::Error) -> Self {
        RepositoryError::Storage(err.into())
    }
}

/// Failures reported by a `StockLedger`.
#[derive(Debug, Error)]
pub enum StockError {
    #[error("Product {0} is not stocked")]
    UnknownProduct(String),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<mongodb::error::Error> for StockError {
    fn from(err: mongodb::error::Error) -> Self {
        StockError::Storage(err.into())
    }
}

impl From<StockError> for OrderError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::UnknownProduct(id) => OrderError::ProductNotFound(id),
            StockError::InsufficientStock {
                product_id,
                requested,
                available,
            } => OrderError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StockError::Storage(e) => OrderError::Storage(e),
        }
    }
}
