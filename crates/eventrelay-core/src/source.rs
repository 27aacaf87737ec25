//! The `EventSource` trait, the transport seam under [`StreamClient`](crate::StreamClient).

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::StreamError;

/// Body of one open connection, as raw byte chunks.
///
/// Dropping the stream must close the underlying connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Opens connections to an event-stream endpoint.
///
/// Implementations perform the handshake (status and content-type checks) in
/// [`open`](EventSource::open) and return the response body. Reconnection is
/// handled by the stream client, which calls `open` again after a failure.
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    /// Connect and return the streaming body.
    async fn open(&self) -> Result<ByteStream, StreamError>;

    /// Endpoint identifier for logs (URL or name).
    fn endpoint(&self) -> &str;

    /// Reject configuration that can never connect. Called once by `start`.
    fn validate(&self) -> Result<(), StreamError> {
        Ok(())
    }
}
