//! Fire-and-forget status-change notifications.

mod logging;
mod webhook;

pub use logging::LogChannel;
pub use webhook::WebhookChannel;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ActorRole, OrderStatus};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Send error: {0}")]
    SendFailed(String),

    #[error("Recipient rejected event with status {0}")]
    Rejected(u16),
}

/// Delivered to one recipient when an order changes status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeEvent {
    pub recipient_id: String,
    pub order_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub actor_role: ActorRole,
    pub actor_id: String,
    pub occurred_at: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, event: &StatusChangeEvent) -> Result<(), NotifyError>;
}

/// Dispatches events on background tasks. Callers never wait for delivery
/// and delivery failures never reach them.
#[derive(Clone)]
pub struct Notifier {
    channel: Arc<dyn NotificationChannel>,
}

impl Notifier {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self { channel }
    }

    pub fn dispatch(&self, events: Vec<StatusChangeEvent>) {
        for event in events {
            let channel = self.channel.clone();
            tokio::spawn(async move {
                if let Err(e) = channel.notify(&event).await {
                    metrics::counter!("order_notifications_failed_total", "channel" => channel.name())
                        .increment(1);
                    tracing::warn!(
                        channel = channel.name(),
                        order_id = %event.order_id,
                        recipient_id = %event.recipient_id,
                        new_status = %event.new_status,
                        error = %e,
                        "Failed to deliver order notification"
                    );
                }
            });
        }
    }
}
