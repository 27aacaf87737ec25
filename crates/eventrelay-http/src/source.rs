//! HTTP event source.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::StatusCode;

use eventrelay_core::config::ClientConfig;
use eventrelay_core::error::StreamError;
use eventrelay_core::source::{ByteStream, EventSource};

/// Maximum number of error-body bytes kept in a [`StreamError::Status`].
const ERROR_BODY_LIMIT: usize = 1024;

/// How long a rejected handshake may spend delivering its error body.
const ERROR_BODY_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens `GET {base_url}{events_path}?types=…` with event-stream headers.
pub struct HttpEventSource {
    url: String,
    headers: HeaderMap,
    http: reqwest::Client,
}

impl HttpEventSource {
    /// Build a source from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Config`] for a malformed URL or API key header,
    /// or if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let url = config.events_url()?.to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if let Some(key) = &config.api_key {
            let name = HeaderName::from_bytes(config.api_key_header.as_bytes())
                .map_err(|e| StreamError::Config(format!("invalid API key header name: {e}")))?;
            let mut value = HeaderValue::from_str(key)
                .map_err(|e| StreamError::Config(format!("invalid API key: {e}")))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        // No overall timeout: the body is expected to stay open indefinitely.
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| StreamError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { url, headers, http })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn open(&self) -> Result<ByteStream, StreamError> {
        let resp = self
            .http
            .get(&self.url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| StreamError::Http(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(StreamError::Status {
                status: status.as_u16(),
                body: read_error_body(resp).await,
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.contains("text/event-stream") {
            let found = if content_type.is_empty() { "<missing>" } else { content_type };
            return Err(StreamError::UnexpectedContentType(found.to_string()));
        }

        tracing::debug!(url = %self.url, status = status.as_u16(), "event stream handshake complete");

        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StreamError::Http(e.to_string())));
        Ok(Box::pin(body))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Collect at most [`ERROR_BODY_LIMIT`] bytes, giving up after
/// [`ERROR_BODY_TIMEOUT`]. The response is dropped afterwards, closing the connection.
async fn read_error_body(resp: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut chunks = resp.bytes_stream();
    let read = async {
        while let Some(Ok(chunk)) = chunks.next().await {
            body.extend_from_slice(&chunk);
            if body.len() >= ERROR_BODY_LIMIT {
                break;
            }
        }
    };
    if tokio::time::timeout(ERROR_BODY_TIMEOUT, read).await.is_err() {
        tracing::debug!("error body still streaming, keeping what arrived");
    }
    body.truncate(ERROR_BODY_LIMIT);
    truncate_body(String::from_utf8_lossy(&body).into_owned())
}

fn truncate_body(mut body: String) -> String {
    if body.len() > ERROR_BODY_LIMIT {
        let mut end = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}
