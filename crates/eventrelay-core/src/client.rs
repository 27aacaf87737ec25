//! `StreamClient`: owns the reconnect → read → dispatch loop.
//!
//! A single background task:
//! 1. opens a connection through the [`EventSource`],
//! 2. splits the body into lines and frames,
//! 3. dispatches each decoded event to the [`HandlerRegistry`] in wire order,
//! 4. on any connection failure sleeps per [`BackoffPolicy`] and retries.
//!
//! The task is the only writer of [`ConnectionState`] and the backoff state.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::backoff::{BackoffConfig, BackoffPolicy};
use crate::error::StreamError;
use crate::event::{Frame, StreamEvent};
use crate::handler::{EventHandler, HandlerRegistry};
use crate::parser::{FrameParser, LineBuffer};
use crate::source::{ByteStream, EventSource};

/// Connection lifecycle as seen from outside the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Reconnecting,
            _ => Self::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Reconnecting => 3,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Cheap, cloneable read handle on a client's [`ConnectionState`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionStatus(Arc<AtomicU8>);

impl ConnectionStatus {
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    fn set(&self, state: ConnectionState) {
        let prev = self.0.swap(state.as_u8(), Ordering::AcqRel);
        if prev != state.as_u8() {
            trace!(from = %ConnectionState::from_u8(prev), to = %state, "connection state");
        }
    }
}

/// Counters snapshot for the stream client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub connections: u64,
    pub connection_failures: u64,
    pub events_dispatched: u64,
    pub meta_events: u64,
    pub decode_errors: u64,
    pub handler_failures: u64,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Resilient event-stream client.
///
/// ```no_run
/// # async fn example(source: std::sync::Arc<dyn eventrelay_core::EventSource>) {
/// use eventrelay_core::StreamClient;
/// use tokio_util::sync::CancellationToken;
///
/// let client = StreamClient::new(source);
/// client.registry().on_fn("job.level_up", "print", |ev| {
///     println!("{ev:?}");
///     Ok(())
/// });
/// client.start(CancellationToken::new()).unwrap();
/// // ...
/// client.stop().await;
/// # }
/// ```
pub struct StreamClient {
    source: Arc<dyn EventSource>,
    registry: Arc<HandlerRegistry>,
    backoff: BackoffPolicy,
    max_line_bytes: usize,
    status: ConnectionStatus,
    stats: Arc<Mutex<StreamStats>>,
    worker: Mutex<Option<Worker>>,
}

impl StreamClient {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            registry: Arc::new(HandlerRegistry::new()),
            backoff: BackoffPolicy::default(),
            max_line_bytes: 64 * 1024,
            status: ConnectionStatus::default(),
            stats: Arc::new(Mutex::new(StreamStats::default())),
            worker: Mutex::new(None),
        }
    }

    pub fn with_backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = BackoffPolicy::new(config);
        self
    }

    pub fn with_max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit.max(1);
        self
    }

    /// Share an existing registry (e.g. one populated before the client was built).
    pub fn with_registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Register a handler for `event_type`. Safe before or after [`start`](Self::start).
    pub fn on_event(&self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.registry.on_event(event_type, handler);
    }

    pub fn state(&self) -> ConnectionState {
        self.status.get()
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Read-only handle on the connection state, usable after the client moves.
    pub fn status(&self) -> ConnectionStatus {
        self.status.clone()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Spawn the processing loop and return immediately.
    ///
    /// Cancelling `cancel` stops the loop just like [`stop`](Self::stop).
    /// Calling `start` while a loop is running is a no-op. Must be called from
    /// within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Config`] if the source is misconfigured.
    pub fn start(&self, cancel: CancellationToken) -> Result<(), StreamError> {
        self.source.validate()?;

        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            warn!(endpoint = self.source.endpoint(), "stream client already running");
            return Ok(());
        }

        let cancel = cancel.child_token();
        let ctx = LoopContext {
            source: Arc::clone(&self.source),
            registry: Arc::clone(&self.registry),
            backoff: self.backoff.clone(),
            max_line_bytes: self.max_line_bytes,
            status: self.status.clone(),
            stats: Arc::clone(&self.stats),
        };
        let handle = tokio::spawn(run_loop(ctx, cancel.clone()));
        *worker = Some(Worker { cancel, handle });
        Ok(())
    }

    /// Signal shutdown and wait for the worker to exit.
    ///
    /// On return no dispatch is in flight and the connection is closed.
    /// Calling `stop` again (or without `start`) returns immediately.
    pub async fn stop(&self) {
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(worker) = worker else {
            return;
        };
        worker.cancel.cancel();
        if let Err(e) = worker.handle.await {
            error!(error = %e, "stream client worker terminated abnormally");
        }
        self.status.set(ConnectionState::Disconnected);
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(w) = worker.take() {
                w.cancel.cancel();
            }
        }
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("endpoint", &self.source.endpoint())
            .field("state", &self.state())
            .finish()
    }
}

// ─── Worker loop ─────────────────────────────────────────────────────────────

struct LoopContext {
    source: Arc<dyn EventSource>,
    registry: Arc<HandlerRegistry>,
    backoff: BackoffPolicy,
    max_line_bytes: usize,
    status: ConnectionStatus,
    stats: Arc<Mutex<StreamStats>>,
}

impl LoopContext {
    fn bump(&self, f: impl FnOnce(&mut StreamStats)) {
        f(&mut self.stats.lock().unwrap_or_else(|e| e.into_inner()));
    }
}

enum ReadOutcome {
    Cancelled,
    Failed(StreamError),
}

async fn run_loop(ctx: LoopContext, cancel: CancellationToken) {
    let endpoint = ctx.source.endpoint().to_string();
    let mut backoff = ctx.backoff.reset();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        ctx.status.set(ConnectionState::Connecting);
        info!(endpoint = %endpoint, "connecting to event stream");

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            opened = ctx.source.open() => opened,
        };

        let err = match opened {
            Ok(body) => {
                ctx.status.set(ConnectionState::Connected);
                ctx.bump(|s| s.connections += 1);
                backoff = ctx.backoff.reset();
                info!(endpoint = %endpoint, "event stream connected");

                match read_stream(&ctx, body, &cancel).await {
                    ReadOutcome::Cancelled => break,
                    ReadOutcome::Failed(e) => e,
                }
            }
            Err(e) => e,
        };

        ctx.bump(|s| s.connection_failures += 1);
        if !err.is_retryable() {
            error!(endpoint = %endpoint, error = %err, "event stream failed permanently");
            break;
        }

        ctx.status.set(ConnectionState::Reconnecting);
        let (next, delay) = ctx.backoff.next_delay(backoff);
        backoff = next;
        warn!(
            endpoint = %endpoint,
            error = %err,
            delay_ms = delay.as_millis() as u64,
            consecutive_failures = backoff.consecutive_failures,
            "event stream connection lost, reconnecting"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    ctx.status.set(ConnectionState::Disconnected);
    info!(endpoint = %endpoint, "event stream client stopped");
}

async fn read_stream(ctx: &LoopContext, mut body: ByteStream, cancel: &CancellationToken) -> ReadOutcome {
    let mut lines = LineBuffer::new(ctx.max_line_bytes);
    let mut parser = FrameParser::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReadOutcome::Cancelled,
            chunk = body.next() => chunk,
        };

        let bytes = match chunk {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => return ReadOutcome::Failed(e),
            None => {
                if lines.has_remainder() || parser.has_partial() {
                    debug!("discarding unterminated frame at end of stream");
                }
                return ReadOutcome::Failed(StreamError::StreamClosed);
            }
        };

        let batch = match lines.push(&bytes) {
            Ok(batch) => batch,
            Err(e) => return ReadOutcome::Failed(e),
        };
        for line in batch {
            let Some(frame) = parser.feed(&line) else {
                continue;
            };
            if cancel.is_cancelled() {
                return ReadOutcome::Cancelled;
            }
            dispatch_frame(ctx, &frame).await;
        }
    }
}

async fn dispatch_frame(ctx: &LoopContext, frame: &Frame) {
    match StreamEvent::from_frame(frame) {
        Ok(Some(event)) => {
            debug!(
                event_type = %event.event_type,
                event_id = event.id.as_deref().unwrap_or(""),
                "dispatching event"
            );
            let failures = ctx.registry.dispatch(&event).await;
            ctx.bump(|s| {
                s.events_dispatched += 1;
                s.handler_failures += failures as u64;
            });
        }
        Ok(None) => {
            trace!(event_type = frame.event_type(), "meta event consumed");
            ctx.bump(|s| s.meta_events += 1);
        }
        Err(e) => {
            warn!(
                event_type = frame.event_type(),
                error = %e,
                data = %truncate(&frame.data, 120),
                "failed to decode event data"
            );
            ctx.bump(|s| s.decode_errors += 1);
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
