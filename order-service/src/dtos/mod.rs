use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::{Order, OrderStatus, ShippingDetails, StockItem};
use crate::services::{OrderPage, PlaceOrder, StockUpdate};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1, max = 128))]
    pub product_id: String,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[validate(nested)]
    pub shipping_details: ShippingDetails,
}

impl From<PlaceOrderRequest> for PlaceOrder {
    fn from(req: PlaceOrderRequest) -> Self {
        Self {
            product_id: req.product_id,
            quantity: req.quantity,
            shipping_details: req.shipping_details,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub target_status: OrderStatus,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub transporter_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    /// An order status, or `all`.
    pub status: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl From<OrderPage> for OrderListResponse {
    fn from(page: OrderPage) -> Self {
        Self {
            orders: page.orders,
            page: page.page,
            page_size: page.page_size,
            total: page.total,
            total_pages: page.total_pages,
        }
    }
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("negative_price"));
    }
    Ok(())
}

fn default_min_order_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PutStockRequest {
    pub quantity: u32,
    #[validate(custom(function = "non_negative"))]
    pub unit_price: Decimal,
    #[validate(length(min = 1, max = 32))]
    pub measurement_unit: String,
    #[serde(default = "default_min_order_quantity")]
    #[validate(range(min = 1))]
    pub min_order_quantity: u32,
}

impl From<PutStockRequest> for StockUpdate {
    fn from(req: PutStockRequest) -> Self {
        Self {
            quantity: req.quantity,
            unit_price: req.unit_price,
            measurement_unit: req.measurement_unit,
            min_order_quantity: req.min_order_quantity,
        }
    }
}

pub type StockResponse = StockItem;
