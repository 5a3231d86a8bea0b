//! Wire envelope and protocol classification
//!
//! Every frame exchanged over the channel is a single JSON object:
//!
//! ```text
//! { "type": string, "data"?: any, "timestamp"?: ISO-8601, "identifier"?: string }
//! ```
//!
//! # Reserved Types
//!
//! Three `type` values belong to the channel protocol itself and are never
//! handed to the application:
//!
//! - `ping` / `pong`: heartbeat. Either side may originate a `ping`; the
//!   receiver answers with a `pong`.
//! - `connected`: one-time handshake acknowledgment sent by the server after
//!   the transport-level connect succeeds.
//!
//! Any other `type` (for example `payment_received` or `lease_status_changed`)
//! is an application message. Its `data` and `timestamp` are opaque to the
//! channel and are forwarded untouched.
//!
//! # Examples
//!
//! ```rust
//! use rentwire_core::{Envelope, Inbound};
//!
//! let ping = Envelope::ping();
//! assert!(matches!(ping.classify(), Inbound::Ping));
//!
//! let notice = Envelope::new("invoice_paid").with_data(serde_json::json!({"invoice": 42}));
//! assert!(matches!(notice.classify(), Inbound::Application(_)));
//! ```

use serde::{Deserialize, Serialize};

/// Heartbeat request
pub const PING: &str = "ping";

/// Heartbeat reply
pub const PONG: &str = "pong";

/// Server handshake acknowledgment
pub const CONNECTED: &str = "connected";

/// A single message on the channel
///
/// Application messages round-trip unchanged: fields that are absent stay
/// absent on re-encoding, and `data` is kept as a raw JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type; see the reserved values above
    #[serde(rename = "type")]
    pub kind: String,

    /// Opaque payload; an explicit `null` is kept as `Some(Value::Null)`
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<serde_json::Value>,

    /// ISO-8601 timestamp, carried as text so it is never reformatted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Session identifier, when the sender chose to include it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl Envelope {
    /// Create an envelope with only a type
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
            timestamp: None,
            identifier: None,
        }
    }

    /// Attach a payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach a timestamp
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Attach the session identifier
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Heartbeat request stamped with the current time
    pub fn ping() -> Self {
        Self::new(PING).with_timestamp(now_rfc3339())
    }

    /// Heartbeat reply stamped with the current time
    pub fn pong() -> Self {
        Self::new(PONG).with_timestamp(now_rfc3339())
    }

    /// Returns true for `ping`, `pong` and `connected`
    pub fn is_protocol(&self) -> bool {
        is_reserved(&self.kind)
    }

    /// Route this envelope to the protocol layer or the application
    pub fn classify(self) -> Inbound {
        if !self.is_protocol() {
            return Inbound::Application(self);
        }
        match self.kind.as_str() {
            PING => Inbound::Ping,
            PONG => Inbound::Pong,
            _ => Inbound::Handshake,
        }
    }
}

/// Classified inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Remote keep-alive; must be answered with a pong
    Ping,
    /// Reply to one of our pings
    Pong,
    /// Server handshake acknowledgment
    Handshake,
    /// Anything else, forwarded verbatim
    Application(Envelope),
}

/// Returns true if `kind` is one of the reserved protocol types
pub fn is_reserved(kind: &str) -> bool {
    matches!(kind, PING | PONG | CONNECTED)
}

/// `Some` for any value present on the wire, `null` included; absence is
/// handled by `#[serde(default)]`
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
