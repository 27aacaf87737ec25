//! eventrelay-http: `text/event-stream` over HTTP, backed by `reqwest`.
//!
//! [`HttpEventSource`] implements [`eventrelay_core::EventSource`]: each call
//! to `open` performs one GET handshake and hands the streaming body to the
//! [`StreamClient`](eventrelay_core::StreamClient), which owns reconnection.

pub mod source;

pub use source::HttpEventSource;
