//! EventRelay CLI: relays server-pushed events to notification channels.
//!
//! # Commands
//! ```text
//! eventrelay listen  [--api-url <url>] [--api-key <key>] [--types a,b]
//! eventrelay decode  --type <event-type> --data <json>
//! eventrelay types
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod cmd_decode;
mod cmd_listen;
mod logging;

#[derive(Parser)]
#[command(
    name = "eventrelay",
    about = "Resilient event-stream listener and notification relay",
    long_about = "
EventRelay: subscribes to the API's server-sent event stream, reconnects with
exponential backoff, and turns routed events into channel notifications.

ENVIRONMENT VARIABLES:
  API_URL                          Base URL of the event API
  API_KEY                          Key sent as X-API-Key
  DISCORD_TOKEN                    Bot token (notifications are only logged when unset)
  DISCORD_NOTIFICATION_CHANNEL_ID  Channel for normal notifications
  DISCORD_DEV_CHANNEL_ID           Channel for test traffic
  EVENTRELAY_TYPES                 Comma-separated event types to subscribe to
  EVENTRELAY_LOG_JSON              Emit JSON logs
  RUST_LOG                         Log filter (default: info)
",
    version
)]
struct Cli {
    /// Emit structured JSON logs
    #[arg(long, global = true, env = "EVENTRELAY_LOG_JSON")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the event stream and relay notifications until Ctrl-C
    Listen(ListenArgs),

    /// Render a notification for a payload without connecting anywhere
    Decode {
        /// Event type, e.g. job.level_up
        #[arg(long = "type")]
        event_type: String,
        /// Payload JSON
        #[arg(long)]
        data: String,
        /// Print the embed as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the event types the router handles
    Types,
}

#[derive(Args)]
pub struct ListenArgs {
    /// Base URL of the event API
    #[arg(long, env = "API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,
    /// API key for the event stream
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: Option<String>,
    /// Channel receiving normal notifications
    #[arg(long, env = "DISCORD_NOTIFICATION_CHANNEL_ID")]
    pub notification_channel: Option<String>,
    /// Channel receiving test traffic
    #[arg(long, env = "DISCORD_DEV_CHANNEL_ID")]
    pub dev_channel: Option<String>,
    /// Event types to subscribe to (default: every routed type)
    #[arg(long, env = "EVENTRELAY_TYPES", value_delimiter = ',')]
    pub types: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Listen(args) => {
            logging::init(cli.json_logs);
            cmd_listen::run(args).await
        }
        Commands::Decode { event_type, data, json } => cmd_decode::run(&event_type, &data, json),
        Commands::Types => {
            cmd_types();
            Ok(())
        }
    }
}

fn cmd_types() {
    println!("Routed event types:");
    for kind in eventrelay_notify::EventKind::ALL {
        println!("  {kind}");
    }
    println!("\nIgnored meta types: {}", eventrelay_core::event::META_EVENT_TYPES[1..].join(", "));
}
