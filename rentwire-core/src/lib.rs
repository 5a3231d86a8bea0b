//! Core types for the rentwire real-time channel
//!
//! This crate holds everything both ends of the channel agree on:
//!
//! - **Envelope**: the JSON frame carried on the wire, and the classification
//!   of its `type` into protocol-internal and application messages
//! - **Codec**: text encoding and decoding of envelopes
//! - **Error handling**: the error type shared by all rentwire crates
//! - **Observability**: tracing subscriber and OpenTelemetry bootstrap
//!
//! The connection manager, transport adapters and timers live in
//! `rentwire-client`.
//!
//! # Example
//!
//! ```rust
//! use rentwire_core::{codec, Envelope, Inbound};
//!
//! let text = r#"{"type":"payment_received","data":{"amount":950}}"#;
//! let envelope = codec::decode(text).unwrap();
//!
//! match envelope.classify() {
//!     Inbound::Application(message) => assert_eq!(message.kind, "payment_received"),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod observability;

pub use envelope::{is_reserved, Envelope, Inbound, CONNECTED, PING, PONG};
pub use error::{Error, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
