//! Stream client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::backoff::BackoffConfig;
use crate::error::StreamError;

/// Connection settings for a [`StreamClient`](crate::StreamClient) and its event source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `"http://localhost:8080"`.
    pub base_url: String,
    /// Path of the event-stream endpoint, appended to `base_url`.
    #[serde(default = "default_events_path")]
    pub events_path: String,
    /// Optional API key sent with every connection attempt.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Header carrying `api_key`.
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// Event types to request from the server (empty = all).
    #[serde(default)]
    pub event_types: Vec<String>,
    /// Reconnect backoff.
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Largest single line accepted from the stream.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Timeout for establishing the connection (not for reading the body).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_events_path() -> String { "/api/v1/events".into() }
fn default_api_key_header() -> String { "X-API-Key".into() }
fn default_max_line_bytes() -> usize { 64 * 1024 }
fn default_connect_timeout_ms() -> u64 { 10_000 }

impl ClientConfig {
    /// Config for `base_url` with every other field defaulted.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            events_path: default_events_path(),
            api_key: None,
            api_key_header: default_api_key_header(),
            event_types: vec![],
            backoff: BackoffConfig::default(),
            max_line_bytes: default_max_line_bytes(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn with_event_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.event_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Resolve the full endpoint URL, including the `types` filter.
    pub fn events_url(&self) -> Result<Url, StreamError> {
        let base = Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| StreamError::Config(format!("invalid base URL '{}': {e}", self.base_url)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(StreamError::Config(format!(
                "unsupported URL scheme '{}'",
                base.scheme()
            )));
        }

        let mut url = base;
        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            self.events_path.trim_start_matches('/')
        );
        url.set_path(&path);

        if !self.event_types.is_empty() {
            url.query_pairs_mut()
                .append_pair("types", &self.event_types.join(","));
        }
        Ok(url)
    }

    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), StreamError> {
        self.events_url()?;
        if self.max_line_bytes == 0 {
            return Err(StreamError::Config("max_line_bytes must be positive".into()));
        }
        if self.api_key.is_some() && self.api_key_header.trim().is_empty() {
            return Err(StreamError::Config("api_key_header is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_url_joins_path_and_types() {
        let cfg = ClientConfig::new("http://localhost:8080/")
            .with_event_types(["job.level_up", "gamble.completed"]);
        let url = cfg.events_url().unwrap();
        assert_eq!(url.path(), "/api/v1/events");
        assert_eq!(
            url.query_pairs().find(|(k, _)| k == "types").map(|(_, v)| v.into_owned()),
            Some("job.level_up,gamble.completed".to_string())
        );
    }

    #[test]
    fn events_url_keeps_base_prefix() {
        let cfg = ClientConfig::new("https://api.example.com/bot");
        assert_eq!(cfg.events_url().unwrap().as_str(), "https://api.example.com/bot/api/v1/events");
    }

    #[test]
    fn malformed_base_url_is_config_error() {
        let err = ClientConfig::new("not a url").validate().unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
        let err = ClientConfig::new("ftp://example.com").validate().unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let cfg = ClientConfig::new("http://localhost").with_api_key("");
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: ClientConfig = serde_json::from_str(r#"{"base_url":"http://x"}"#).unwrap();
        assert_eq!(cfg.events_path, "/api/v1/events");
        assert_eq!(cfg.max_line_bytes, 65_536);
        assert_eq!(cfg.api_key_header, "X-API-Key");
    }
}
