//! Order service settings.
//!
//! Layered the same way as every service: optional `configuration` file, then
//! `ORDER__*` environment variables (e.g. `ORDER__PORT=3010`,
//! `ORDER__DATABASE__URL=mongodb://...`, `ORDER__ORDERS__LOCK_TIMEOUT_MS=2000`).

use secrecy::Secret;
use serde::Deserialize;
use service_core::error::AppError;
use std::time::Duration;

use crate::services::EngineSettings;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: service_core::config::Config,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// MongoDB storage. Without it orders and stock are kept in memory.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub orders: OrdersConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_db_name")]
    pub db_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct OrdersConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_ledger_timeout_ms")]
    pub ledger_timeout_ms: u64,
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            ledger_timeout_ms: default_ledger_timeout_ms(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl OrdersConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        let max_page_size = self.max_page_size.max(1);
        EngineSettings {
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            ledger_timeout: Duration::from_millis(self.ledger_timeout_ms),
            default_page_size: self.default_page_size.clamp(1, max_page_size),
            max_page_size,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct NotificationConfig {
    /// Events are POSTed here when set, otherwise only logged.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_notification_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: default_notification_timeout_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            common: service_core::config::Config::default(),
            service_name: default_service_name(),
            database: None,
            orders: OrdersConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "order-service".to_string()
}

fn default_db_name() -> String {
    "order_db".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_ledger_timeout_ms() -> u64 {
    3_000
}

fn default_page_size() -> u64 {
    20
}

fn default_max_page_size() -> u64 {
    100
}

fn default_notification_timeout_ms() -> u64 {
    2_000
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        service_core::config::load_layered("ORDER")
    }
}
