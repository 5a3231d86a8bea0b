//! Self-healing real-time channel client
//!
//! This crate keeps a persistent WebSocket channel between a property
//! management front end and its backend alive for the lifetime of a session.
//! It survives network interruptions without the owner having to intervene.
//!
//! # Core Features
//!
//! - **Connection Manager**: one event loop per channel, owning all state
//! - **Heartbeat**: periodic `ping` while open; remote pings answered with `pong`
//! - **Auto-Reconnection**: exponential backoff with jitter, bounded attempts
//! - **Outbound Queue**: messages sent while closed are flushed in order on open
//! - **Pluggable Transport**: tokio-tungstenite by default, swappable for tests
//! - **Observability**: structured tracing and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rentwire_client::{ChannelBuilder, Endpoint};
//! use rentwire_core::Envelope;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ChannelBuilder::new("tenant-42", |message| {
//!         println!("{}: {:?}", message.kind, message.data);
//!     })
//!     .endpoint(Endpoint::local())
//!     .on_connected(|| println!("connected"))
//!     .on_error(|e| eprintln!("channel error: {e}"))
//!     .build()?;
//!
//!     manager.connect();
//!     manager.send(
//!         Envelope::new("maintenance_request").with_data(json!({"unit": "4B"})),
//!     );
//!
//!     tokio::signal::ctrl_c().await?;
//!     manager.disconnect().await;
//!     Ok(())
//! }
//! ```

mod channel_builder;
mod config;
mod connection_state;
mod endpoint;
mod heartbeat;
mod manager;
mod metrics;
mod queue;
mod reconnect;
mod timer;
mod transport;

pub use channel_builder::ChannelBuilder;
pub use config::{
    ChannelConfig, ErrorCallback, ExhaustedCallback, MessageCallback, StateCallback,
    DEFAULT_MAX_RECONNECT_ATTEMPTS,
};
pub use connection_state::{ChannelStatus, ConnectionState};
pub use endpoint::{Endpoint, DEFAULT_PATH, IDENTIFIER_PARAM, LOCAL_HOST};
pub use heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
pub use manager::ChannelManager;
pub use metrics::ChannelMetrics;
pub use reconnect::{
    ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy, DEFAULT_BASE_DELAY,
    DEFAULT_JITTER, DEFAULT_MAX_DELAY,
};
pub use transport::{Transport, TransportEvent, TransportEvents, TransportLink, WebSocketTransport};
