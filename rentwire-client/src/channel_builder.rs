//! Channel builder
//!
//! The `ChannelBuilder` provides a fluent API for configuring a channel
//! before it is created. It allows you to:
//! - Point the channel at an endpoint
//! - Register the owner callbacks
//! - Tune reconnection, heartbeat and queueing
//! - Swap the transport and enable metrics
//!
//! Building never touches the network; call
//! [`ChannelManager::connect`](crate::ChannelManager::connect) afterwards.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rentwire_client::{ChannelBuilder, Endpoint, FixedDelay};
//! use std::time::Duration;
//!
//! # async fn example() -> rentwire_core::Result<()> {
//! let manager = ChannelBuilder::new("tenant-42", |message| {
//!     println!("notification: {}", message.kind);
//! })
//! .endpoint(Endpoint::new(true, "portal.example.com"))
//! .on_disconnected(|| eprintln!("live updates paused"))
//! .max_reconnect_attempts(5)
//! .with_reconnect(Box::new(FixedDelay::new(Duration::from_secs(2))))
//! .build()?;
//!
//! manager.connect();
//! # Ok(())
//! # }
//! ```

use crate::config::{Callbacks, ChannelConfig};
use crate::endpoint::Endpoint;
use crate::manager::ChannelManager;
use crate::metrics::ChannelMetrics;
use crate::reconnect::{ExponentialBackoff, NoReconnect, ReconnectionStrategy};
use crate::transport::{Transport, WebSocketTransport};
use rentwire_core::{Envelope, Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating a [`ChannelManager`]
pub struct ChannelBuilder {
    config: ChannelConfig,
    callbacks: Callbacks,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    transport: Option<Arc<dyn Transport>>,
    metrics_service: Option<String>,
}

impl ChannelBuilder {
    /// Create a builder for `identifier` with the mandatory message callback
    ///
    /// # Arguments
    ///
    /// * `identifier` - Session identifier sent as the `identifier` query
    ///   parameter; must not be blank
    /// * `on_message` - Receives every application message, in arrival order.
    ///   Protocol frames (`ping`, `pong`, `connected`) never reach it.
    ///
    /// Every other setting starts at its default: local endpoint, 10
    /// reconnect attempts with exponential backoff, a 30 s heartbeat, an
    /// unbounded queue and the WebSocket transport.
    pub fn new<F>(identifier: impl Into<String>, on_message: F) -> Self
    where
        F: Fn(Envelope) + Send + Sync + 'static,
    {
        Self {
            config: ChannelConfig::new(identifier),
            callbacks: Callbacks::new(Arc::new(on_message)),
            reconnect_strategy: None,
            transport: None,
            metrics_service: None,
        }
    }

    /// Connect to `endpoint` instead of the local development backend
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.config.endpoint = endpoint;
        self
    }

    /// Called each time the channel opens
    pub fn on_connected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.on_connected = Some(Arc::new(f));
        self
    }

    /// Called each time a live link closes
    pub fn on_disconnected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.on_disconnected = Some(Arc::new(f));
        self
    }

    /// Called with transport errors and reconnect exhaustion
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Some(Arc::new(f));
        self
    }

    /// Called once reconnection gives up, with the number of attempts made
    pub fn on_reconnect_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.callbacks.on_reconnect_exhausted = Some(Arc::new(f));
        self
    }

    /// Cap on retries between two successful opens (default 10)
    ///
    /// A cap of `n` allows exactly `n` scheduled retries; the next close
    /// reports exhaustion instead. `0` disables automatic retries.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Time between heartbeat pings while open (default 30 s)
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Bound the outbound queue; the oldest envelope is evicted when full
    pub fn max_queued(mut self, capacity: usize) -> Self {
        self.config.max_queued = Some(capacity);
        self
    }

    /// Use `strategy` to compute retry delays
    pub fn with_reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    /// Never reconnect automatically
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect_strategy = Some(Box::new(NoReconnect));
        self
    }

    /// Replace the WebSocket transport
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Record channel metrics on the global meter under `service_name`
    pub fn with_metrics(mut self, service_name: impl Into<String>) -> Self {
        self.metrics_service = Some(service_name.into());
        self
    }

    /// Validate the configuration and start the channel's event loop
    ///
    /// Must be called inside a tokio runtime. The channel starts closed and
    /// nothing touches the network until `connect()`.
    ///
    /// # Returns
    ///
    /// The owned [`ChannelManager`]. Dropping it tears the channel down
    /// without firing callbacks.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidConfig`: blank identifier, zero heartbeat interval or
    ///   zero queue capacity
    /// - `Error::InvalidEndpoint`: no URL can be formed from the endpoint
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rentwire_client::{ChannelBuilder, ConnectionState};
    /// use rentwire_core::Error;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let manager = ChannelBuilder::new("tenant-42", |_| {}).build().unwrap();
    /// assert_eq!(manager.connection_state(), ConnectionState::Closed);
    ///
    /// let blank = ChannelBuilder::new("  ", |_| {}).build();
    /// assert!(matches!(blank, Err(Error::InvalidConfig(_))));
    /// # }
    /// ```
    pub fn build(self) -> Result<ChannelManager> {
        self.config.validate()?;
        let url = self.config.endpoint.url_for(&self.config.identifier)?;

        let strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(ExponentialBackoff::default()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WebSocketTransport::new()));
        let metrics = self
            .metrics_service
            .map(|name| Arc::new(ChannelMetrics::new(name)));

        tracing::debug!(
            identifier = %self.config.identifier,
            url = %url,
            max_reconnect_attempts = self.config.max_reconnect_attempts,
            heartbeat_ms = self.config.heartbeat_interval.as_millis() as u64,
            "Channel built"
        );

        Ok(ChannelManager::spawn(
            self.config,
            self.callbacks,
            url,
            transport,
            strategy,
            metrics,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnect::FixedDelay;

    #[test]
    fn test_builder_creation() {
        let builder = ChannelBuilder::new("tenant-1", |_| {});
        assert_eq!(builder.config, ChannelConfig::new("tenant-1"));
        assert!(builder.reconnect_strategy.is_none());
        assert!(builder.transport.is_none());
        assert!(builder.metrics_service.is_none());
    }

    #[test]
    fn test_builder_settings() {
        let builder = ChannelBuilder::new("tenant-1", |_| {})
            .endpoint(Endpoint::new(true, "rent.example.com"))
            .max_reconnect_attempts(3)
            .heartbeat_interval(Duration::from_secs(5))
            .max_queued(50)
            .with_metrics("portal");

        assert!(builder.config.endpoint.is_secure());
        assert_eq!(builder.config.max_reconnect_attempts, 3);
        assert_eq!(builder.config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(builder.config.max_queued, Some(50));
        assert_eq!(builder.metrics_service.as_deref(), Some("portal"));
    }

    #[test]
    fn test_builder_callbacks() {
        let builder = ChannelBuilder::new("tenant-1", |_| {})
            .on_connected(|| {})
            .on_error(|_| {});
        assert!(builder.callbacks.on_connected.is_some());
        assert!(builder.callbacks.on_error.is_some());
        assert!(builder.callbacks.on_disconnected.is_none());
        assert!(builder.callbacks.on_reconnect_exhausted.is_none());
    }

    #[test]
    fn test_builder_reconnect_strategies() {
        let builder = ChannelBuilder::new("t", |_| {})
            .with_reconnect(Box::new(FixedDelay::new(Duration::from_millis(100))));
        assert!(builder.reconnect_strategy.is_some());

        let mut builder = ChannelBuilder::new("t", |_| {}).without_reconnect();
        let strategy = builder.reconnect_strategy.as_mut().unwrap();
        assert_eq!(strategy.next_delay(0), None);
    }

    #[test]
    fn test_build_rejects_empty_identifier() {
        let result = ChannelBuilder::new("", |_| {}).build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_build_rejects_zero_queue() {
        let result = ChannelBuilder::new("t", |_| {}).max_queued(0).build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_build_starts_closed() {
        let manager = ChannelBuilder::new("tenant-9", |_| {}).build().unwrap();
        assert_eq!(manager.identifier(), "tenant-9");
        assert!(!manager.is_connected());

        let status = manager.status().await.unwrap();
        assert_eq!(status.reconnect_attempts, 0);
        assert_eq!(status.queued, 0);
        assert!(!status.heartbeat_active);
        assert!(!status.reconnect_pending);
    }
}
