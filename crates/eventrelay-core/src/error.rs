//! Error taxonomy for the event stream and its consumers.

use thiserror::Error;

/// Errors raised while configuring, connecting to or reading an event stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Configuration is unusable (e.g. malformed base URL). Never retried.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport failure (DNS, TCP, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The endpoint answered 2xx but not with an event stream.
    #[error("unexpected content type: {0}")]
    UnexpectedContentType(String),

    /// A single line exceeded the read buffer bound.
    #[error("line exceeds {limit} byte limit")]
    LineTooLong { limit: usize },

    /// The body ended while the connection was expected to stay open.
    #[error("stream closed unexpectedly")]
    StreamClosed,

    /// The `data` field of a frame was not valid JSON.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StreamError {
    /// Returns `true` if the client should back off and reconnect.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }

    /// Returns `true` if the error concerns a single frame rather than the connection.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Errors reported by event handlers. Logged by the registry, never propagated.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler '{handler}' failed: {reason}")]
    Failed { handler: String, reason: String },

    #[error("payload decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("delivery to channel {channel} failed: {reason}")]
    Delivery { channel: String, reason: String },

    #[error("handler '{handler}' panicked")]
    Panicked { handler: String },
}

impl HandlerError {
    /// Convenience constructor for ad-hoc handler failures.
    pub fn failed(handler: impl Into<String>, reason: impl ToString) -> Self {
        Self::Failed {
            handler: handler.into(),
            reason: reason.to_string(),
        }
    }
}
