//! Discord REST delivery.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::notification::Notification;
use crate::sink::{DeliveryError, MessageSink};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

#[derive(Serialize)]
struct CreateMessage<'a> {
    embeds: [&'a Notification; 1],
}

/// Posts notifications as embeds via `POST /channels/{id}/messages`.
pub struct DiscordSink {
    api_base: String,
    token: String,
    http: reqwest::Client,
}

impl DiscordSink {
    pub fn new(token: impl Into<String>) -> Result<Self, DeliveryError> {
        Self::with_api_base(DEFAULT_API_BASE, token)
    }

    /// Point the sink at a different API root (proxies, tests).
    pub fn with_api_base(api_base: impl Into<String>, token: impl Into<String>) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DeliveryError::Http(e.to_string()))?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        })
    }

    fn messages_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{channel_id}/messages", self.api_base)
    }
}

#[async_trait]
impl MessageSink for DiscordSink {
    async fn send_message(&self, channel_id: &str, notification: &Notification) -> Result<(), DeliveryError> {
        let resp = self
            .http
            .post(self.messages_url(channel_id))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .json(&CreateMessage { embeds: [notification] })
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Status { status, body });
        }
        Ok(())
    }
}

impl std::fmt::Debug for DiscordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSink").field("api_base", &self.api_base).finish()
    }
}
