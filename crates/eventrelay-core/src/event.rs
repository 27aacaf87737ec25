//! Framed events as they come off the wire and as they are handed to consumers.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Event types that belong to the protocol itself and are never dispatched.
pub const META_EVENT_TYPES: &[&str] = &["", "keepalive", "connected"];

/// One blank-line-terminated unit of the event-stream wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
}

impl Frame {
    /// The frame's `event:` value, or `""` when absent.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("")
    }

    /// `true` for keepalive / connection-acknowledgement frames.
    pub fn is_meta(&self) -> bool {
        META_EVENT_TYPES.contains(&self.event_type())
    }
}

/// An event dispatched to registered handlers.
///
/// Immutable once built; `payload` is shared between handlers and decoded
/// lazily by each one via [`StreamEvent::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub id: Option<String>,
    pub event_type: String,
    /// Epoch seconds.
    pub timestamp: i64,
    pub payload: Bytes,
}

/// Server-side envelope carried in `data`.
#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "type")]
    event_type: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    payload: Value,
}

impl StreamEvent {
    pub fn new(event_type: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: None,
            event_type: event_type.into(),
            timestamp: now_epoch_secs(),
            payload: payload.into(),
        }
    }

    /// Build an event from a completed frame.
    ///
    /// `data` is either the envelope `{id, type, timestamp, payload}` or a bare
    /// payload object. Frame `id:`/`event:` lines take precedence over the
    /// envelope's fields. Returns `Ok(None)` for protocol meta-events.
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>, serde_json::Error> {
        if frame.event.as_deref().is_some_and(|t| !t.is_empty()) && frame.is_meta() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&frame.data)?;
        let is_envelope = value.as_object().is_some_and(|o| o.contains_key("payload"));

        let (id, event_type, timestamp, payload) = if is_envelope {
            let env: Envelope = serde_json::from_value(value)?;
            let payload = Bytes::from(serde_json::to_vec(&env.payload)?);
            (env.id, env.event_type, env.timestamp, payload)
        } else {
            let timestamp = value.get("timestamp").and_then(Value::as_i64);
            (None, None, timestamp, Bytes::from(frame.data.clone().into_bytes()))
        };

        let event_type = frame
            .event
            .clone()
            .filter(|t| !t.is_empty())
            .or(event_type)
            .unwrap_or_default();
        if META_EVENT_TYPES.contains(&event_type.as_str()) {
            return Ok(None);
        }

        Ok(Some(Self {
            id: frame.id.clone().filter(|i| !i.is_empty()).or(id.filter(|i| !i.is_empty())),
            event_type,
            timestamp: timestamp.unwrap_or_else(now_epoch_secs),
            payload,
        }))
    }

    /// Decode the payload into the handler's expected schema.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: Option<&str>, event: Option<&str>, data: &str) -> Frame {
        Frame {
            id: id.map(String::from),
            event: event.map(String::from),
            data: data.to_string(),
        }
    }

    #[test]
    fn bare_payload_uses_frame_fields() {
        let f = frame(Some("7"), Some("job.level_up"), r#"{"job_key":"miner","new_level":5}"#);
        let ev = StreamEvent::from_frame(&f).unwrap().unwrap();
        assert_eq!(ev.id.as_deref(), Some("7"));
        assert_eq!(ev.event_type, "job.level_up");
        let v: Value = ev.decode().unwrap();
        assert_eq!(v["new_level"], 5);
    }

    #[test]
    fn envelope_is_unwrapped() {
        let f = frame(
            None,
            None,
            r#"{"id":"abc","type":"gamble.completed","timestamp":1700000000,"payload":{"gamble_id":"g1"}}"#,
        );
        let ev = StreamEvent::from_frame(&f).unwrap().unwrap();
        assert_eq!(ev.id.as_deref(), Some("abc"));
        assert_eq!(ev.event_type, "gamble.completed");
        assert_eq!(ev.timestamp, 1_700_000_000);
        assert_eq!(&ev.payload[..], br#"{"gamble_id":"g1"}"#);
    }

    #[test]
    fn frame_event_line_overrides_envelope_type() {
        let f = frame(Some("f-1"), Some("expedition.turn"), r#"{"id":"e-1","type":"other","payload":{}}"#);
        let ev = StreamEvent::from_frame(&f).unwrap().unwrap();
        assert_eq!(ev.event_type, "expedition.turn");
        assert_eq!(ev.id.as_deref(), Some("f-1"));
    }

    #[test]
    fn meta_events_are_filtered() {
        for t in ["keepalive", "connected"] {
            assert!(StreamEvent::from_frame(&frame(None, Some(t), "{}")).unwrap().is_none());
        }
        // No type anywhere.
        assert!(StreamEvent::from_frame(&frame(None, None, r#"{"a":1}"#)).unwrap().is_none());
        // Meta type inside the envelope.
        let f = frame(None, None, r#"{"type":"keepalive","payload":null}"#);
        assert!(StreamEvent::from_frame(&f).unwrap().is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(StreamEvent::from_frame(&frame(None, Some("job.level_up"), "{not json")).is_err());
    }
}
