//! Application startup and lifecycle management.

use axum::middleware::from_fn;
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{Config, DatabaseConfig};
use crate::handlers;
use crate::services::{
    init_metrics, InMemoryOrderRepository, InMemoryStockLedger, LogChannel, MongoOrderRepository,
    MongoStockLedger, NotificationChannel, Notifier, OrderRepository, OrderService, StockLedger,
    WebhookChannel,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub orders: OrderService,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    ///
    /// Orders and stock live in MongoDB when `database` is configured and in
    /// process memory otherwise.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        init_metrics().map_err(AppError::InternalError)?;

        let (repository, ledger): (Arc<dyn OrderRepository>, Arc<dyn StockLedger>) =
            match &config.database {
                Some(database) => connect_mongo(database).await?,
                None => {
                    tracing::warn!("No database configured - orders and stock are kept in memory");
                    (
                        Arc::new(InMemoryOrderRepository::new()),
                        Arc::new(InMemoryStockLedger::new()),
                    )
                }
            };

        let channel: Arc<dyn NotificationChannel> = match &config.notifications.webhook_url {
            Some(url) => {
                let webhook = WebhookChannel::new(
                    url.clone(),
                    Duration::from_millis(config.notifications.timeout_ms),
                )
                .map_err(|e| AppError::ConfigError(e.into()))?;
                tracing::info!(url = %url, "Order notifications will be posted to webhook");
                Arc::new(webhook)
            }
            None => Arc::new(LogChannel),
        };

        let orders = OrderService::new(
            repository,
            ledger,
            Notifier::new(channel),
            config.orders.engine_settings(),
        );

        Self::with_service(config, orders).await
    }

    /// Build around an already wired `OrderService`.
    pub async fn with_service(config: Config, orders: OrderService) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Order service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            state: AppState { config, orders },
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = router(self.state);
        axum::serve(self.listener, router).await
    }
}

async fn connect_mongo(
    database: &DatabaseConfig,
) -> Result<(Arc<dyn OrderRepository>, Arc<dyn StockLedger>), AppError> {
    let mut client_options = ClientOptions::parse(database.url.expose_secret())
        .await
        .map_err(|e| {
            tracing::error!("Failed to parse MongoDB connection string: {}", e);
            AppError::DatabaseError(e.into())
        })?;
    client_options.app_name = Some("order-service".to_string());

    let client = Client::with_options(client_options).map_err(|e| {
        tracing::error!("Failed to create MongoDB client: {}", e);
        AppError::DatabaseError(e.into())
    })?;
    let db = client.database(&database.db_name);

    let repository = MongoOrderRepository::new(&db);
    repository.init_indexes().await.map_err(|e| {
        tracing::error!("Failed to initialize order indexes: {}", e);
        AppError::DatabaseError(e.into())
    })?;

    let ledger = MongoStockLedger::new(&db);
    ledger.init_indexes().await.map_err(|e| {
        tracing::error!("Failed to initialize stock indexes: {}", e);
        AppError::DatabaseError(e.into())
    })?;

    tracing::info!(db_name = %database.db_name, "Connected to MongoDB");
    Ok((Arc::new(repository), Arc::new(ledger)))
}

/// HTTP routes with request-id, metrics and tracing layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/orders",
            post(handlers::orders::place_order).get(handlers::orders::list_orders),
        )
        .route(
            "/orders/:id",
            get(handlers::orders::get_order).delete(handlers::orders::delete_order),
        )
        .route("/orders/:id/status", patch(handlers::orders::update_status))
        .route(
            "/stock/:product_id",
            put(handlers::stock::put_stock).get(handlers::stock::get_stock),
        )
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    actor_role = tracing::field::Empty,
                    actor_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
