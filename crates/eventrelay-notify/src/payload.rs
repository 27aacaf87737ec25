//! Payload schemas for the routed event types.

use serde::{Deserialize, Serialize};

use eventrelay_core::StreamEvent;

/// Event types the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JobLevelUp,
    VotingStarted,
    CycleCompleted,
    AllUnlocked,
    GambleCompleted,
    ExpeditionStarted,
    ExpeditionTurn,
    ExpeditionCompleted,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        Self::JobLevelUp,
        Self::VotingStarted,
        Self::CycleCompleted,
        Self::AllUnlocked,
        Self::GambleCompleted,
        Self::ExpeditionStarted,
        Self::ExpeditionTurn,
        Self::ExpeditionCompleted,
    ];

    /// Wire name carried in the frame's `event:` line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JobLevelUp => "job.level_up",
            Self::VotingStarted => "progression.voting_started",
            Self::CycleCompleted => "progression.cycle_completed",
            Self::AllUnlocked => "progression.all_unlocked",
            Self::GambleCompleted => "gamble.completed",
            Self::ExpeditionStarted => "expedition.started",
            Self::ExpeditionTurn => "expedition.turn",
            Self::ExpeditionCompleted => "expedition.completed",
        }
    }

    pub fn from_type(event_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == event_type)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLevelUp {
    #[serde(default)]
    pub user_id: String,
    pub job_key: String,
    #[serde(default)]
    pub old_level: i32,
    pub new_level: i32,
    /// Activity that caused the level-up (e.g. `"search"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub is_test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingOption {
    pub node_key: String,
    #[serde(default)]
    pub display_name: String,
}

impl VotingOption {
    pub fn label(&self) -> String {
        if self.display_name.is_empty() {
            crate::format::node_name(&self.node_key)
        } else {
            self.display_name.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingStarted {
    #[serde(default)]
    pub session_id: i64,
    /// Set when the target was auto-selected.
    #[serde(default)]
    pub node_key: String,
    #[serde(default)]
    pub target_level: i32,
    #[serde(default)]
    pub auto_selected: bool,
    #[serde(default)]
    pub options: Vec<VotingOption>,
    #[serde(default)]
    pub previous_unlock: String,
    #[serde(default)]
    pub is_test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_key: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingSessionInfo {
    #[serde(default)]
    pub session_id: i64,
    #[serde(default)]
    pub options: Vec<VotingOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCompleted {
    pub unlocked_node: NodeInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voting_session: Option<VotingSessionInfo>,
    #[serde(default)]
    pub is_test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllUnlocked {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GambleCompleted {
    pub gamble_id: String,
    #[serde(default)]
    pub winner_id: String,
    #[serde(default)]
    pub total_value: i64,
    #[serde(default)]
    pub participant_count: i64,
    #[serde(default)]
    pub is_test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpeditionStarted {
    pub expedition_id: String,
    #[serde(default)]
    pub join_deadline: String,
    #[serde(default)]
    pub is_test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpeditionTurn {
    pub expedition_id: String,
    pub turn_number: i64,
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub fatigue: i64,
    #[serde(default)]
    pub purse: i64,
    #[serde(default)]
    pub is_test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpeditionCompleted {
    pub expedition_id: String,
    #[serde(default)]
    pub total_turns: i64,
    #[serde(default)]
    pub won: bool,
    #[serde(default)]
    pub all_ko: bool,
    #[serde(default)]
    pub is_test: bool,
}

/// A decoded payload, tagged by event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationPayload {
    JobLevelUp(JobLevelUp),
    VotingStarted(VotingStarted),
    CycleCompleted(CycleCompleted),
    AllUnlocked(AllUnlocked),
    GambleCompleted(GambleCompleted),
    ExpeditionStarted(ExpeditionStarted),
    ExpeditionTurn(ExpeditionTurn),
    ExpeditionCompleted(ExpeditionCompleted),
}

impl NotificationPayload {
    /// Decode raw payload bytes with the schema for `kind`.
    pub fn decode(kind: EventKind, payload: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EventKind::JobLevelUp => Self::JobLevelUp(serde_json::from_slice(payload)?),
            EventKind::VotingStarted => Self::VotingStarted(serde_json::from_slice(payload)?),
            EventKind::CycleCompleted => Self::CycleCompleted(serde_json::from_slice(payload)?),
            EventKind::AllUnlocked => Self::AllUnlocked(serde_json::from_slice(payload)?),
            EventKind::GambleCompleted => Self::GambleCompleted(serde_json::from_slice(payload)?),
            EventKind::ExpeditionStarted => Self::ExpeditionStarted(serde_json::from_slice(payload)?),
            EventKind::ExpeditionTurn => Self::ExpeditionTurn(serde_json::from_slice(payload)?),
            EventKind::ExpeditionCompleted => {
                Self::ExpeditionCompleted(serde_json::from_slice(payload)?)
            }
        })
    }

    /// Decode a stream event; `Ok(None)` if its type is not routed.
    pub fn from_event(event: &StreamEvent) -> Result<Option<Self>, serde_json::Error> {
        match EventKind::from_type(&event.event_type) {
            Some(kind) => Self::decode(kind, &event.payload).map(Some),
            None => Ok(None),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::JobLevelUp(_) => EventKind::JobLevelUp,
            Self::VotingStarted(_) => EventKind::VotingStarted,
            Self::CycleCompleted(_) => EventKind::CycleCompleted,
            Self::AllUnlocked(_) => EventKind::AllUnlocked,
            Self::GambleCompleted(_) => EventKind::GambleCompleted,
            Self::ExpeditionStarted(_) => EventKind::ExpeditionStarted,
            Self::ExpeditionTurn(_) => EventKind::ExpeditionTurn,
            Self::ExpeditionCompleted(_) => EventKind::ExpeditionCompleted,
        }
    }

    /// `true` if the event was produced by test traffic.
    pub fn is_test(&self) -> bool {
        match self {
            Self::JobLevelUp(p) => p.is_test,
            Self::VotingStarted(p) => p.is_test,
            Self::CycleCompleted(p) => p.is_test,
            Self::AllUnlocked(p) => p.is_test,
            Self::GambleCompleted(p) => p.is_test,
            Self::ExpeditionStarted(p) => p.is_test,
            Self::ExpeditionTurn(p) => p.is_test,
            Self::ExpeditionCompleted(p) => p.is_test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_wire_names() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_type(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_type("keepalive"), None);
    }

    #[test]
    fn level_up_defaults_is_test_to_false() {
        let p = NotificationPayload::decode(
            EventKind::JobLevelUp,
            br#"{"user_id":"u1","job_key":"miner","new_level":5}"#,
        )
        .unwrap();
        assert!(!p.is_test());
        let NotificationPayload::JobLevelUp(p) = p else { panic!("wrong variant") };
        assert_eq!(p.job_key, "miner");
        assert_eq!(p.new_level, 5);
        assert_eq!(p.source, None);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        assert!(NotificationPayload::decode(EventKind::GambleCompleted, br#"{"winner_id":"x"}"#).is_err());
        assert!(NotificationPayload::decode(EventKind::ExpeditionTurn, b"[]").is_err());
    }

    #[test]
    fn from_event_ignores_unrouted_types() {
        let ev = StreamEvent::new("timeout.applied", "{}");
        assert_eq!(NotificationPayload::from_event(&ev).unwrap(), None);

        let ev = StreamEvent::new("gamble.completed", r#"{"gamble_id":"g","is_test":true}"#);
        let p = NotificationPayload::from_event(&ev).unwrap().unwrap();
        assert_eq!(p.kind(), EventKind::GambleCompleted);
        assert!(p.is_test());
    }
}
