//! Tenant session example
//!
//! Keeps a channel open against a local backend, prints every notification,
//! and reports when live updates are paused.
//!
//! Run with: cargo run --example session -- [identifier]
//!
//! Set OTEL_EXPORTER_OTLP_ENDPOINT to also export traces and metrics.

use rentwire::core::ObservabilityConfig;
use rentwire::{ChannelBuilder, ConnectionState, Endpoint, Envelope};
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let export = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok();
    let otel_config = ObservabilityConfig::new("rentwire-session")
        .with_log_level("info")
        .with_traces(export)
        .with_metrics(export);
    rentwire::core::init_observability(otel_config)
        .map_err(|e| format!("Failed to initialize observability: {e}"))?;

    let identifier = std::env::args().nth(1).unwrap_or_else(|| "tenant-1".into());

    let mut builder = ChannelBuilder::new(identifier.clone(), |message| {
        println!("[{}] {}", message.kind, message.data.unwrap_or_default());
    })
    .endpoint(Endpoint::local())
    .on_connected(|| println!("Live updates on"))
    .on_disconnected(|| println!("Live updates paused"))
    .on_error(|e| eprintln!("Channel error: {e}"))
    .on_reconnect_exhausted(|attempts| {
        eprintln!("Gave up after {attempts} attempts; refresh to retry")
    });
    if export {
        builder = builder.with_metrics("rentwire-session");
    }
    let manager = builder.build()?;

    manager.connect();
    manager.send(
        Envelope::new("subscribe")
            .with_identifier(identifier)
            .with_data(json!({ "topics": ["payments", "maintenance"] })),
    );

    // Fall back to polling hints when the channel stays down
    let mut state = manager.subscribe_state();
    let watcher = tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            if current == ConnectionState::Closed {
                tokio::time::sleep(Duration::from_secs(10)).await;
                if *state.borrow() == ConnectionState::Closed {
                    tracing::warn!("Channel down for 10s; poll for updates instead");
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;

    manager.disconnect().await;
    watcher.abort();
    rentwire::core::shutdown_observability();

    Ok(())
}
