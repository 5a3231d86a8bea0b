//! Error types for rentwire
//!
//! Almost every failure on a live channel is contained inside the connection
//! manager: it is logged, counted, and at most reported through the
//! `on_error` callback. The caller's control flow only ever sees an `Err`
//! from configuration and setup (building a manager, parsing an endpoint,
//! initializing observability).
//!
//! # Error Categories
//!
//! - **Runtime, contained**: Transport, Decode, Send, Serialization,
//!   ReconnectExhausted, ConnectionClosed
//! - **Setup, returned**: InvalidEndpoint, InvalidConfig
//!
//! # Examples
//!
//! ```rust
//! use rentwire_core::Error;
//!
//! let error = Error::ReconnectExhausted { attempts: 10 };
//! assert_eq!(error.to_string(), "Reconnect attempts exhausted after 10 attempts");
//! assert_eq!(error.kind(), "reconnect_exhausted");
//! ```

use thiserror::Error;

/// Result type for rentwire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared by all rentwire crates
///
/// Payloads are kept as strings so the error stays `Clone` and can be handed
/// to callbacks while also being logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Transport adapter reported an error
    ///
    /// Non-fatal: the connection state only changes when the adapter also
    /// reports a close.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound payload could not be decoded into an envelope
    #[error("Decode error: {0}")]
    Decode(String),

    /// Outbound transmission failed; the envelope was requeued
    #[error("Send error: {0}")]
    Send(String),

    /// Outbound envelope could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The reconnect scheduler refused to schedule another attempt
    #[error("Reconnect attempts exhausted after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of retries that were scheduled before giving up
        attempts: u32,
    },

    /// The transport link is no longer usable
    #[error("Connection closed")]
    ConnectionClosed,

    /// The endpoint could not be derived or parsed
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Configuration rejected at build time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Short label used as the `error_type` metric attribute
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transport(_) => "transport",
            Error::Decode(_) => "decode",
            Error::Send(_) => "send",
            Error::Serialization(_) => "serialization",
            Error::ReconnectExhausted { .. } => "reconnect_exhausted",
            Error::ConnectionClosed => "connection_closed",
            Error::InvalidEndpoint(_) => "invalid_endpoint",
            Error::InvalidConfig(_) => "invalid_config",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
