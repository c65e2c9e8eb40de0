use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stock on hand for one product, owned by one wholesaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub product_id: String,
    pub wholesaler_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub measurement_unit: String,
    pub min_order_quantity: u32,
}
