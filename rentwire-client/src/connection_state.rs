//! Connection state
//!
//! # States
//!
//! - **Closed**: initial state; also reached after every close, intended or not
//! - **Connecting**: the transport has been asked to open
//! - **Open**: the transport reported open; heartbeat running, queue flushed
//!
//! # Transitions
//!
//! ```text
//! Closed ──connect()──▶ Connecting ──open──▶ Open
//!   ▲                       │                 │
//!   └────────close──────────┴──────close──────┘
//! ```
//!
//! From `Closed` the reconnect scheduler moves the channel back to
//! `Connecting` unless the close was intentional or the attempt cap was
//! reached; in both cases it stays `Closed` until the owner calls `connect()`.

use std::fmt;

/// Logical state of the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live link
    #[default]
    Closed,
    /// Waiting for the transport to open
    Connecting,
    /// Link is open
    Open,
}

impl ConnectionState {
    /// Returns true only in the `Open` state
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns true while a link exists, open or not
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }

    /// Numeric encoding used by the connection state gauge
    pub const fn as_gauge(self) -> i64 {
        match self {
            Self::Closed => 0,
            Self::Connecting => 1,
            Self::Open => 2,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Open => "open",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the manager, taken on its event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus {
    /// Current connection state
    pub state: ConnectionState,
    /// Retries scheduled since the last successful open
    pub reconnect_attempts: u32,
    /// Envelopes waiting in the outbound queue
    pub queued: usize,
    /// Whether the heartbeat timer is armed
    pub heartbeat_active: bool,
    /// Whether a reconnect timer is armed
    pub reconnect_pending: bool,
    /// Whether the last teardown was requested by the owner
    pub intentional: bool,
}
