use std::io::BufRead;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;

use tether_client::{Channel, ChannelRegistry, DEFAULT_CHANNEL};
use tether_core::{ConnectOptions, JsonHandler, StatusSink};
use tether_ws::WsTransport;

/// Interactive client for a command/data WebSocket endpoint.
///
/// Reads `cmd [json-data]` lines from stdin and prints correlated
/// responses; the connection self-heals per the retry budget.
#[derive(Parser)]
#[command(name = "tether")]
struct Args {
    /// Endpoint to dial, e.g. ws://127.0.0.1:9000
    url: String,

    /// Automatic reconnect attempts before giving up
    #[arg(long, default_value_t = 3)]
    max_retries: u32,
}

/// Status signals rendered as log lines.
struct LogSink;

impl StatusSink for LogSink {
    fn connecting(&self, active: bool) {
        tracing::info!(active, "status: connecting");
    }

    fn reconnecting(&self, active: bool) {
        tracing::info!(active, "status: reconnecting");
    }

    fn requesting(&self, active: bool) {
        tracing::debug!(active, "status: requesting");
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let registry = Arc::new(ChannelRegistry::new());
    let channel = Channel::new(Box::new(WsTransport::new()), Arc::new(JsonHandler))
        .with_status(Arc::new(LogSink));
    if let Err(err) = registry.add(channel, DEFAULT_CHANNEL) {
        tracing::error!(error = %err, "failed to register channel");
        return;
    }

    if let Err(err) = registry.connect(
        ConnectOptions::new(&args.url, args.max_retries),
        DEFAULT_CHANNEL,
    ) {
        tracing::error!(error = %err, "connect failed");
        return;
    }
    tracing::info!(url = %args.url, "dialing");

    // Stdin is blocking; keep the runtime free of it.
    let stdin = tokio::task::spawn_blocking({
        let registry = Arc::clone(&registry);
        move || read_loop(&registry)
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
        _ = stdin => {
            tracing::info!("stdin closed, shutting down");
        }
    }

    registry.close_all();
}

/// One request per line: `cmd` or `cmd {"some":"json"}`.
fn read_loop(registry: &ChannelRegistry) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cmd, rest) = match line.split_once(' ') {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };
        let data = if rest.is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(rest) {
                Ok(data) => data,
                Err(err) => {
                    tracing::warn!(error = %err, "data is not valid json");
                    continue;
                }
            }
        };

        let result = registry.request(
            cmd,
            data,
            Arc::new(|envelope| {
                println!("{} {}", envelope.cmd, envelope.data);
            }),
            true,
            DEFAULT_CHANNEL,
        );
        if let Err(err) = result {
            tracing::warn!(cmd, error = %err, "request failed");
        }
    }
}
