//! Domain models for order-service.

mod actor;
mod order;
mod stock;

pub use actor::{ActorContext, ActorRole};
pub use order::{
    DeliveryDispute, NewOrder, Order, OrderStatus, ShippingDetails, StatusHistoryEntry,
};
pub use stock::StockItem;
