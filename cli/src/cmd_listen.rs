//! `eventrelay listen`: run the stream client until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use eventrelay_core::{ClientConfig, StreamClient};
use eventrelay_http::HttpEventSource;
use eventrelay_notify::{ChannelConfig, DiscordSink, EventKind, LogSink, MessageSink, NotificationRouter};

use crate::ListenArgs;

pub async fn run(args: ListenArgs) -> Result<()> {
    let types: Vec<String> = if args.types.is_empty() {
        EventKind::ALL.iter().map(|k| k.as_str().to_string()).collect()
    } else {
        args.types.iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect()
    };

    let config = ClientConfig::new(&args.api_url)
        .with_api_key(args.api_key.unwrap_or_default())
        .with_event_types(types);
    let source = HttpEventSource::new(&config).context("invalid event stream configuration")?;

    let sink: Arc<dyn MessageSink> = match args.discord_token.filter(|t| !t.is_empty()) {
        Some(token) => Arc::new(DiscordSink::new(token)?),
        None => {
            warn!("DISCORD_TOKEN not set, notifications will only be logged");
            Arc::new(LogSink)
        }
    };
    let channels = ChannelConfig::new(args.notification_channel, args.dev_channel);
    if channels.notification_channel.is_none() && channels.test_channel.is_none() {
        warn!("no notification channel configured, events will be received but not delivered");
    }

    let client = StreamClient::new(Arc::new(source))
        .with_backoff(config.backoff.clone())
        .with_max_line_bytes(config.max_line_bytes);
    NotificationRouter::new(sink, channels).register(client.registry());

    let cancel = CancellationToken::new();
    client.start(cancel.clone())?;
    info!(url = %args.api_url, types = ?config.event_types, "listening for events");

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("shutting down");
    cancel.cancel();
    client.stop().await;

    let stats = client.stats();
    info!(
        connections = stats.connections,
        connection_failures = stats.connection_failures,
        events_dispatched = stats.events_dispatched,
        handler_failures = stats.handler_failures,
        "stopped"
    );
    Ok(())
}
