//! Watches a printer backend's real-time link and prints what the status card would show.
//!
//! This example shows how to:
//! 1. Build the WebSocket endpoint from a discovered `host:port`
//! 2. Register state, message and error handlers
//! 3. Subscribe to inbound payloads and print the connection summary periodically
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info,printer_realtime=debug cargo run --example status_monitor --features tracing -- localhost:8080
//! ```
//!
//! Optionally log to a file and pass a bearer token:
//! ```sh
//! LOG_FILE=status_monitor.log PRINTER_TOKEN=... cargo run --example status_monitor --features tracing -- localhost:8080
//! ```

use std::fs::File;
use std::time::Duration;

use printer_realtime::ws::{ConnectionManager, ConnectionState};
use printer_realtime::ws_endpoint;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const TOKEN_VAR: &str = "PRINTER_TOKEN";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Ok(path) = std::env::var("LOG_FILE") {
        let file = File::create(path)?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }

    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "localhost:8080".to_owned());
    let manager: ConnectionManager = ConnectionManager::with_defaults(&ws_endpoint(&host))?;

    if let Ok(token) = std::env::var(TOKEN_VAR) {
        manager.set_auth_token(&token);
    }

    manager
        .handlers()
        .set_on_state_change(|state: ConnectionState| {
            info!(%state, "connection state changed");
        });
    manager.handlers().set_on_error(|e| {
        if e.is_authentication() {
            error!(error = %e, "credential rejected, set {TOKEN_VAR} and restart");
        } else {
            warn!(error = %e, "connection error");
        }
    });

    let mut updates = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(payload) => info!(
                    endpoint = "status",
                    payload = %String::from_utf8_lossy(&payload)
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "status consumer lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Err(e) = manager.connect().await {
        warn!(error = %e, "initial connect failed");
    }

    // Queued if the link is down, flushed once it comes up
    let outcome = manager
        .send(json!({ "type": "subscribe", "topics": ["temperatures", "position", "job"] }))
        .await;
    info!(?outcome, "subscription request submitted");

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let stats = manager.stats();
                info!(details = %stats.details(), "{stats}");
                if let Some(last) = &stats.last_error {
                    info!(kind = ?last.kind, "last error: {last}");
                }
            }
        }
    }

    manager.disconnect();
    info!("disconnected");
    Ok(())
}
