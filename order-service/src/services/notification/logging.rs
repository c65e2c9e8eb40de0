use async_trait::async_trait;

use super::{NotificationChannel, NotifyError, StatusChangeEvent};

/// Writes events to the service log. Default when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, event: &StatusChangeEvent) -> Result<(), NotifyError> {
        tracing::info!(
            recipient_id = %event.recipient_id,
            order_id = %event.order_id,
            previous_status = ?event.previous_status,
            new_status = %event.new_status,
            actor_role = %event.actor_role,
            actor_id = %event.actor_id,
            "Order status notification"
        );
        Ok(())
    }
}
