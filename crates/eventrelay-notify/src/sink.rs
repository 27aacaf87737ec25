//! The outbound messaging seam.

use async_trait::async_trait;
use thiserror::Error;

use crate::notification::Notification;

/// Errors returned by a [`MessageSink`]. Delivery is best-effort and never retried.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("messaging API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Something that can render a [`Notification`] into a channel.
#[async_trait]
pub trait MessageSink: Send + Sync + 'static {
    async fn send_message(&self, channel_id: &str, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Writes notifications to the log instead of a chat platform.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn send_message(&self, channel_id: &str, notification: &Notification) -> Result<(), DeliveryError> {
        let body = serde_json::to_string(notification)?;
        tracing::info!(
            channel_id,
            title = %notification.title,
            notification = %body,
            "notification"
        );
        Ok(())
    }
}
