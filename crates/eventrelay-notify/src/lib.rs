//! eventrelay-notify: typed notification payloads and the router that delivers them.
//!
//! # Overview
//!
//! ```text
//! StreamEvent ──► NotificationPayload::decode ──► Notification::render
//!                                                        │
//!                                   ChannelConfig::resolve (normal / test)
//!                                                        │
//!                                                        ▼
//!                                       MessageSink::send_message
//! ```
//!
//! - [`NotificationRouter`]: registers one handler per routed event type
//! - [`NotificationPayload`]: the eight payload schemas
//! - [`Notification`]: embed-shaped rendered message
//! - [`MessageSink`]: delivery seam; [`LogSink`] and [`DiscordSink`] provided

pub mod discord;
pub mod format;
pub mod notification;
pub mod payload;
pub mod router;
pub mod sink;

pub use discord::DiscordSink;
pub use notification::{Notification, NotificationField};
pub use payload::{EventKind, NotificationPayload};
pub use router::{ChannelConfig, NotificationRouter, RouteOutcome};
pub use sink::{DeliveryError, LogSink, MessageSink};
