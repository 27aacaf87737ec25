//! eventrelay-core: framing, backoff and dispatch for server-pushed event streams.
//!
//! # Overview
//!
//! ```text
//! EventSource (HTTP GET, text/event-stream)
//!       │  byte chunks
//!       ▼
//! LineBuffer ──► FrameParser ──► StreamEvent::from_frame
//!                                      │
//!                                      ▼
//!                              HandlerRegistry::dispatch
//! ```
//!
//! - [`StreamClient`]: the single reconnect/read/dispatch worker
//! - [`BackoffPolicy`]: exponential reconnect delays
//! - [`HandlerRegistry`]: event-type → ordered handler list
//! - [`EventSource`]: the transport seam (see `eventrelay-http`)

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod parser;
pub mod source;

pub use backoff::{BackoffConfig, BackoffPolicy, BackoffState};
pub use client::{ConnectionState, ConnectionStatus, StreamClient, StreamStats};
pub use config::ClientConfig;
pub use error::{HandlerError, StreamError};
pub use event::{Frame, StreamEvent};
pub use handler::{EventHandler, FnHandler, HandlerRegistry};
pub use parser::{FrameParser, LineBuffer};
pub use source::{ByteStream, EventSource};
