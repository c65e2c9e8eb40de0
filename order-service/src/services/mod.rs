pub mod error;
pub mod locks;
pub mod metrics;
pub mod notification;
pub mod orders;
pub mod repository;
pub mod state_machine;
pub mod stock;

pub use error::{OrderError, RepositoryError, StockError};
pub use locks::OrderLocks;
pub use metrics::{get_metrics, init_metrics};
pub use notification::{LogChannel, NotificationChannel, Notifier, StatusChangeEvent, WebhookChannel};
pub use orders::{EngineSettings, OrderPage, OrderService, PlaceOrder, StatusFilter, StockUpdate};
pub use repository::{InMemoryOrderRepository, MongoOrderRepository, OrderFilter, OrderRepository};
pub use state_machine::{OrderStateMachine, StockEffect, Transition, TransitionRequest};
pub use stock::{InMemoryStockLedger, MongoStockLedger, StockLedger};
