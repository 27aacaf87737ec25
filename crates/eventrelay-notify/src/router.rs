//! Routes decoded stream events to a messaging channel.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use eventrelay_core::{EventHandler, HandlerError, HandlerRegistry, StreamEvent};

use crate::notification::Notification;
use crate::payload::{EventKind, NotificationPayload};
use crate::sink::{DeliveryError, MessageSink};

/// Destination channel identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub notification_channel: Option<String>,
    /// Receives events flagged `is_test`. Falls back to `notification_channel`.
    #[serde(default)]
    pub test_channel: Option<String>,
}

impl ChannelConfig {
    pub fn new(notification_channel: Option<String>, test_channel: Option<String>) -> Self {
        let non_empty = |c: Option<String>| c.filter(|c| !c.is_empty());
        Self {
            notification_channel: non_empty(notification_channel),
            test_channel: non_empty(test_channel),
        }
    }

    /// Pick the destination for an event. The flag is `true` only when the
    /// dedicated test channel was chosen.
    pub fn resolve(&self, is_test: bool) -> Option<(&str, bool)> {
        if is_test {
            if let Some(ch) = self.test_channel.as_deref() {
                return Some((ch, true));
            }
        }
        self.notification_channel.as_deref().map(|ch| (ch, false))
    }
}

/// Outcome of routing one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered { channel_id: String },
    /// The event type is deliberately quiet for this payload.
    NotAnnounced,
    NoChannel,
}

/// Turns stream events into notifications and hands them to a [`MessageSink`].
#[derive(Clone)]
pub struct NotificationRouter {
    sink: Arc<dyn MessageSink>,
    channels: ChannelConfig,
}

impl NotificationRouter {
    pub fn new(sink: Arc<dyn MessageSink>, channels: ChannelConfig) -> Self {
        Self { sink, channels }
    }

    pub fn channels(&self) -> &ChannelConfig {
        &self.channels
    }

    /// Register one handler per routed event type.
    pub fn register(&self, registry: &HandlerRegistry) {
        for kind in EventKind::ALL {
            registry.on_event(
                kind.as_str(),
                Arc::new(RouteHandler {
                    kind,
                    name: format!("notify:{kind}"),
                    router: self.clone(),
                }),
            );
        }
    }

    /// Render and deliver a decoded payload.
    pub async fn route(&self, payload: &NotificationPayload) -> Result<RouteOutcome, DeliveryError> {
        let Some(mut notification) = Notification::render(payload) else {
            return Ok(RouteOutcome::NotAnnounced);
        };
        let Some((channel_id, test_route)) = self.channels.resolve(payload.is_test()) else {
            return Ok(RouteOutcome::NoChannel);
        };
        if test_route {
            notification.mark_test();
        }

        self.sink.send_message(channel_id, &notification).await?;
        Ok(RouteOutcome::Delivered {
            channel_id: channel_id.to_string(),
        })
    }
}

impl std::fmt::Debug for NotificationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRouter")
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

struct RouteHandler {
    kind: EventKind,
    name: String,
    router: NotificationRouter,
}

#[async_trait]
impl EventHandler for RouteHandler {
    async fn handle(&self, event: &StreamEvent) -> Result<(), HandlerError> {
        let payload = match NotificationPayload::decode(self.kind, &event.payload) {
            Ok(p) => p,
            Err(e) => {
                warn!(event_type = %self.kind, error = %e, "malformed payload, skipping");
                return Ok(());
            }
        };

        match self.router.route(&payload).await {
            Ok(RouteOutcome::Delivered { channel_id }) => {
                info!(event_type = %self.kind, channel_id = %channel_id, is_test = payload.is_test(), "notification sent");
                Ok(())
            }
            Ok(RouteOutcome::NotAnnounced) => {
                debug!(event_type = %self.kind, "not announced");
                Ok(())
            }
            Ok(RouteOutcome::NoChannel) => {
                debug!(event_type = %self.kind, "no destination channel configured");
                Ok(())
            }
            // Reported by the registry together with the handler name.
            Err(e) => {
                Err(HandlerError::Delivery {
                    channel: self
                        .router
                        .channels
                        .resolve(payload.is_test())
                        .map(|(ch, _)| ch.to_string())
                        .unwrap_or_default(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, Notification)>>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<(String, Notification)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send_message(&self, channel_id: &str, n: &Notification) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push((channel_id.to_string(), n.clone()));
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl MessageSink for FailingSink {
        async fn send_message(&self, _: &str, _: &Notification) -> Result<(), DeliveryError> {
            Err(DeliveryError::Status {
                status: 403,
                body: "Missing Access".into(),
            })
        }
    }

    fn channels() -> ChannelConfig {
        ChannelConfig::new(Some("C_NORMAL".into()), Some("C_TEST".into()))
    }

    fn setup(channels: ChannelConfig) -> (Arc<RecordingSink>, HandlerRegistry) {
        let sink = Arc::new(RecordingSink::default());
        let registry = HandlerRegistry::new();
        NotificationRouter::new(sink.clone(), channels).register(&registry);
        (sink, registry)
    }

    #[test]
    fn resolve_prefers_test_channel_for_test_traffic() {
        let c = channels();
        assert_eq!(c.resolve(false), Some(("C_NORMAL", false)));
        assert_eq!(c.resolve(true), Some(("C_TEST", true)));

        let only_normal = ChannelConfig::new(Some("C_NORMAL".into()), Some(String::new()));
        assert_eq!(only_normal.resolve(true), Some(("C_NORMAL", false)));
        assert_eq!(ChannelConfig::default().resolve(false), None);
    }

    #[tokio::test]
    async fn registers_every_routed_type() {
        let (_, registry) = setup(channels());
        for kind in EventKind::ALL {
            assert_eq!(registry.handler_count(kind.as_str()), 1);
        }
    }

    #[tokio::test]
    async fn level_up_goes_to_normal_channel() {
        let (sink, registry) = setup(channels());
        let ev = StreamEvent::new(
            "job.level_up",
            r#"{"user_id":"u1","job_key":"miner","old_level":4,"new_level":5,"is_test":false}"#,
        );
        assert_eq!(registry.dispatch(&ev).await, 0);

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "C_NORMAL");
        assert_eq!(sent[0].1.title, "Level Up! Miner");
        assert!(sent[0].1.fields.iter().any(|f| f.name == "New Level" && f.value == "5"));
    }

    #[tokio::test]
    async fn test_traffic_is_prefixed_and_diverted() {
        let (sink, registry) = setup(channels());
        let ev = StreamEvent::new(
            "gamble.completed",
            r#"{"gamble_id":"g1","winner_id":"u2","total_value":1000,"participant_count":3,"is_test":true}"#,
        );
        registry.dispatch(&ev).await;

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "C_TEST");
        assert_eq!(sent[0].1.title, "[TEST] Gamble Completed!");
    }

    #[tokio::test]
    async fn test_traffic_without_test_channel_is_not_prefixed() {
        let (sink, registry) = setup(ChannelConfig::new(Some("C_NORMAL".into()), None));
        let ev = StreamEvent::new("gamble.completed", r#"{"gamble_id":"g1","is_test":true}"#);
        registry.dispatch(&ev).await;

        let sent = sink.sent();
        assert_eq!(sent[0].0, "C_NORMAL");
        assert_eq!(sent[0].1.title, "Gamble Ended (No Winner)");
    }

    #[tokio::test]
    async fn malformed_payload_is_skipped() {
        let (sink, registry) = setup(channels());
        let ev = StreamEvent::new("expedition.turn", r#"{"turn_number":"five"}"#);
        assert_eq!(registry.dispatch(&ev).await, 0);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn quiet_turns_and_missing_channels_send_nothing() {
        let (sink, registry) = setup(channels());
        let ev = StreamEvent::new("expedition.turn", r#"{"expedition_id":"e","turn_number":3}"#);
        registry.dispatch(&ev).await;
        assert!(sink.sent().is_empty());

        let (sink, registry) = setup(ChannelConfig::default());
        let ev = StreamEvent::new("progression.all_unlocked", "{}");
        registry.dispatch(&ev).await;
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_surfaces_as_handler_error() {
        let router = NotificationRouter::new(Arc::new(FailingSink), channels());
        let registry = HandlerRegistry::new();
        router.register(&registry);

        let ev = StreamEvent::new("expedition.started", r#"{"expedition_id":"e1","join_deadline":"soon"}"#);
        assert_eq!(registry.dispatch(&ev).await, 1);
    }

    #[tokio::test]
    async fn delivery_failure_names_the_channel() {
        let handler = RouteHandler {
            kind: EventKind::AllUnlocked,
            name: "notify:progression.all_unlocked".into(),
            router: NotificationRouter::new(Arc::new(FailingSink), channels()),
        };
        let ev = StreamEvent::new("progression.all_unlocked", r#"{"is_test":true}"#);
        match handler.handle(&ev).await {
            Err(HandlerError::Delivery { channel, reason }) => {
                assert_eq!(channel, "C_TEST");
                assert!(reason.contains("403"));
            }
            other => panic!("expected delivery error, got {other:?}"),
        }
    }
}
