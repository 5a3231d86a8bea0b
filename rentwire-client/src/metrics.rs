//! Channel metrics definitions
//!
//! OpenTelemetry instruments describing channel health. They are recorded
//! through the global meter, so they cost nothing until the host installs a
//! meter provider (see `rentwire_core::init_observability`).
//!
//! # Metrics Collected
//!
//! - **connection_state**: 0=closed, 1=connecting, 2=open (gauge)
//! - **messages_sent**: envelopes written to the link, by kind (counter)
//! - **messages_received**: application envelopes delivered (counter)
//! - **queued**: outbound queue depth (gauge)
//! - **heartbeats_sent**: pings written (counter)
//! - **errors_total**: failures by `error_type` (counter)
//! - **reconnection_attempts**: retries scheduled (counter)
//! - **reconnection_success**: opens that followed a retry (counter)
//!
//! # Examples
//!
//! ```rust,no_run
//! use rentwire_client::ChannelBuilder;
//!
//! # fn example() -> rentwire_core::Result<()> {
//! let manager = ChannelBuilder::new("manager-12", |_| {})
//!     .with_metrics("landlord-portal")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::connection_state::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Meter},
    KeyValue,
};

/// Channel metrics for monitoring
pub struct ChannelMetrics {
    /// Connection state (0=closed, 1=connecting, 2=open)
    pub connection_state: Gauge<i64>,
    /// Envelopes written to the link
    pub messages_sent: Counter<u64>,
    /// Application envelopes delivered to the callback
    pub messages_received: Counter<u64>,
    /// Outbound queue depth
    pub queued: Gauge<u64>,
    /// Heartbeat pings written
    pub heartbeats_sent: Counter<u64>,
    /// Failures by type
    pub errors_total: Counter<u64>,
    /// Retries scheduled
    pub reconnection_attempts: Counter<u64>,
    /// Opens that followed at least one retry
    pub reconnection_success: Counter<u64>,
}

impl ChannelMetrics {
    /// Create metrics on the global meter named after `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let meter = global::meter_with_scope(
            opentelemetry::InstrumentationScope::builder(service_name.into()).build(),
        );
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a caller-supplied meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("rentwire.channel.connection.state")
                .with_description("Connection state (0=closed, 1=connecting, 2=open)")
                .build(),
            messages_sent: meter
                .u64_counter("rentwire.channel.messages.sent")
                .with_description("Envelopes written to the transport")
                .build(),
            messages_received: meter
                .u64_counter("rentwire.channel.messages.received")
                .with_description("Application envelopes delivered")
                .build(),
            queued: meter
                .u64_gauge("rentwire.channel.queue.depth")
                .with_description("Envelopes waiting for the next open")
                .build(),
            heartbeats_sent: meter
                .u64_counter("rentwire.channel.heartbeats.sent")
                .with_description("Heartbeat pings written")
                .build(),
            errors_total: meter
                .u64_counter("rentwire.channel.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            reconnection_attempts: meter
                .u64_counter("rentwire.channel.reconnection.attempts")
                .with_description("Reconnection attempts scheduled")
                .build(),
            reconnection_success: meter
                .u64_counter("rentwire.channel.reconnection.success")
                .with_description("Successful opens after a reconnection attempt")
                .build(),
        }
    }

    /// Update connection state
    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_gauge(), &[]);
    }

    /// Record an envelope written to the link
    pub fn record_sent(&self, kind: &str) {
        self.messages_sent
            .add(1, &[KeyValue::new("type", kind.to_string())]);
    }

    /// Record an application envelope delivered to the owner
    pub fn record_received(&self, kind: &str) {
        self.messages_received
            .add(1, &[KeyValue::new("type", kind.to_string())]);
    }

    /// Record the current queue depth
    pub fn record_queue_depth(&self, depth: usize) {
        self.queued.record(depth as u64, &[]);
    }

    /// Record a heartbeat ping
    pub fn record_heartbeat(&self) {
        self.heartbeats_sent.add(1, &[]);
    }

    /// Record an error
    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }

    /// Record a reconnection attempt
    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    /// Record a successful reconnection
    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }
}
