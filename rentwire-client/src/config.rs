//! Channel configuration and owner callbacks
//!
//! [`ChannelConfig`] holds the plain settings; [`Callbacks`] holds the
//! owner's hooks. Both are frozen when the manager is built.
//!
//! All callbacks run on the manager's event loop, one at a time, in the
//! order the underlying events happened. They must return quickly: forward
//! heavy work to a task or channel.

use crate::endpoint::Endpoint;
use crate::heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
use rentwire_core::{Envelope, Error, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default cap on scheduled reconnect attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Receives every application envelope
pub type MessageCallback = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Notified on open or close
pub type StateCallback = Arc<dyn Fn() + Send + Sync>;

/// Receives transport errors and reconnect exhaustion
pub type ErrorCallback = Arc<dyn Fn(Error) + Send + Sync>;

/// Receives the attempt count once reconnection gives up
pub type ExhaustedCallback = Arc<dyn Fn(u32) + Send + Sync>;

/// Settings of one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Session identifier sent as the endpoint query parameter
    pub identifier: String,
    /// Where to connect
    pub endpoint: Endpoint,
    /// Retries allowed between two successful opens
    pub max_reconnect_attempts: u32,
    /// Time between heartbeat pings while open
    pub heartbeat_interval: Duration,
    /// Outbound queue capacity; `None` is unbounded
    pub max_queued: Option<usize>,
}

impl ChannelConfig {
    /// Defaults for `identifier`
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            endpoint: Endpoint::default(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            max_queued: None,
        }
    }

    /// Reject settings the manager cannot run with
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for an empty identifier, a zero
    /// heartbeat interval, or a zero queue capacity.
    pub fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() {
            return Err(Error::InvalidConfig("identifier must not be empty".to_string()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "heartbeat interval must be greater than zero".to_string(),
            ));
        }
        if self.max_queued == Some(0) {
            return Err(Error::InvalidConfig(
                "queue capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Owner hooks
#[derive(Clone)]
pub struct Callbacks {
    pub(crate) on_message: MessageCallback,
    pub(crate) on_connected: Option<StateCallback>,
    pub(crate) on_disconnected: Option<StateCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) on_reconnect_exhausted: Option<ExhaustedCallback>,
}

impl Callbacks {
    pub(crate) fn new(on_message: MessageCallback) -> Self {
        Self {
            on_message,
            on_connected: None,
            on_disconnected: None,
            on_error: None,
            on_reconnect_exhausted: None,
        }
    }

    pub(crate) fn message(&self, envelope: Envelope) {
        (self.on_message)(envelope);
    }

    pub(crate) fn connected(&self) {
        if let Some(cb) = &self.on_connected {
            cb();
        }
    }

    pub(crate) fn disconnected(&self) {
        if let Some(cb) = &self.on_disconnected {
            cb();
        }
    }

    pub(crate) fn error(&self, error: Error) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn reconnect_exhausted(&self, attempts: u32) {
        if let Some(cb) = &self.on_reconnect_exhausted {
            cb(attempts);
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_connected", &self.on_connected.is_some())
            .field("on_disconnected", &self.on_disconnected.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_reconnect_exhausted", &self.on_reconnect_exhausted.is_some())
            .finish_non_exhaustive()
    }
}
