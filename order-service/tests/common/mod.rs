#![allow(dead_code)]

use order_service::config::Config;
use order_service::models::ActorContext;
use order_service::startup::Application;
use order_service::AppState;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Value};

pub const RETAILER_ID: &str = "R1";
pub const WHOLESALER_ID: &str = "W1";
pub const TRANSPORTER_ID: &str = "T1";
pub const PRODUCT_ID: &str = "rice-25kg";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    pub state: AppState,
}

impl TestApp {
    /// Spawn the service on a random port with in-memory storage.
    pub async fn spawn() -> Self {
        let mut config = Config::default();
        config.common.port = 0;
        config.orders.lock_timeout_ms = 1_000;
        config.orders.ledger_timeout_ms = 1_000;

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);
        let state = app.state();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
            state,
        }
    }

    /// A request carrying the actor headers for `actor`.
    pub fn request(&self, method: Method, path: &str, actor: &ActorContext) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.address, path))
            .header("X-Actor-Role", actor.role.as_str())
            .header("X-Actor-ID", actor.id.as_str())
    }

    pub async fn seed_stock(&self, quantity: u32, unit_price: &str, min_order_quantity: u32) {
        let response = self
            .request(
                Method::PUT,
                &format!("/stock/{}", PRODUCT_ID),
                &ActorContext::wholesaler(WHOLESALER_ID),
            )
            .json(&json!({
                "quantity": quantity,
                "unitPrice": unit_price,
                "measurementUnit": "bag",
                "minOrderQuantity": min_order_quantity
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert!(response.status().is_success(), "seeding stock failed");
    }

    pub async fn stock_quantity(&self) -> u64 {
        let body: Value = self
            .request(
                Method::GET,
                &format!("/stock/{}", PRODUCT_ID),
                &ActorContext::wholesaler(WHOLESALER_ID),
            )
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .expect("Failed to parse JSON");
        body["quantity"].as_u64().expect("quantity missing")
    }

    pub async fn place_order(&self, quantity: u32) -> Response {
        self.request(Method::POST, "/orders", &ActorContext::retailer(RETAILER_ID))
            .json(&json!({
                "productId": PRODUCT_ID,
                "quantity": quantity,
                "shippingDetails": {
                    "recipientName": "Asha Traders",
                    "phone": "+919800000000",
                    "addressLine": "12 Market Road",
                    "city": "Pune"
                }
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Place an order and return its id.
    pub async fn pending_order(&self, quantity: u32) -> String {
        let body: Value = self
            .place_order(quantity)
            .await
            .json()
            .await
            .expect("Failed to parse JSON");
        body["id"].as_str().expect("id missing").to_string()
    }

    pub async fn transition(&self, order_id: &str, actor: &ActorContext, body: Value) -> Response {
        self.request(Method::PATCH, &format!("/orders/{}/status", order_id), actor)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}
