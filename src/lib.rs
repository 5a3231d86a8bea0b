//! Rentwire - resilient real-time channel
//!
//! This is the main convenience crate that re-exports the rentwire
//! sub-crates. Use it if you want a single dependency for the whole channel.
//!
//! # Architecture
//!
//! Rentwire is organized into modular crates:
//!
//! - **rentwire-core**: wire envelope, codec, error handling, observability
//! - **rentwire-client**: connection manager, transport adapter, heartbeat,
//!   reconnection and outbound queue
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rentwire::{ChannelBuilder, Endpoint, Envelope};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ChannelBuilder::new("tenant-42", |message| {
//!         println!("{}: {:?}", message.kind, message.data);
//!     })
//!     .endpoint(Endpoint::from_page("https://portal.example.com/")?)
//!     .build()?;
//!
//!     manager.connect();
//!     manager.send(Envelope::new("message_read"));
//!
//!     tokio::signal::ctrl_c().await?;
//!     manager.disconnect().await;
//!     Ok(())
//! }
//! ```

pub use rentwire_client as client;
pub use rentwire_core as core;

// Convenience re-exports of the most commonly used types
pub use rentwire_client::{ChannelBuilder, ChannelManager, ConnectionState, Endpoint};
pub use rentwire_core::{Envelope, Error, Result};
