//! Connection manager
//!
//! [`ChannelManager`] is the owner's handle to one logical channel. All of
//! the channel's state lives in a single tokio task, the event loop, which
//! receives every input through one FIFO queue:
//!
//! - owner commands (`connect`, `disconnect`, `send`, `status`)
//! - transport events (`open`, `message`, `close`, `error`, and frames a
//!   dying link never wrote)
//! - heartbeat ticks and reconnect ticks
//!
//! Inputs are processed strictly one after another, so no lock guards the
//! state. Transport events and heartbeat ticks carry the generation of the
//! link they belong to, and reconnect ticks carry the ticket of the timer
//! that produced them; anything stale is dropped without side effects.
//!
//! # Lifecycle
//!
//! 1. **connect**: open a link through the transport
//! 2. **open**: reset the attempt counter, start the heartbeat, flush the
//!    outbound queue, notify the owner
//! 3. **close**: stop the heartbeat, notify the owner, schedule a retry
//!    unless the close was requested
//! 4. **disconnect**: cancel both timers, close the link, suppress retries
//!    until the next `connect`
//!
//! Dropping the handle tears the channel down like `disconnect()` but
//! without invoking any callback.
//!
//! # Example
//!
//! ```rust,no_run
//! use rentwire_client::{ChannelBuilder, Endpoint};
//! use rentwire_core::Envelope;
//!
//! # async fn example() -> rentwire_core::Result<()> {
//! let manager = ChannelBuilder::new("tenant-42", |message| {
//!     println!("{}: {:?}", message.kind, message.data);
//! })
//! .endpoint(Endpoint::from_page("https://portal.example.com/")?)
//! .on_connected(|| println!("live updates on"))
//! .build()?;
//!
//! manager.connect();
//! manager.send(Envelope::new("maintenance_request"));
//! // ...
//! manager.disconnect().await;
//! # Ok(())
//! # }
//! ```

use crate::config::{Callbacks, ChannelConfig};
use crate::connection_state::{ChannelStatus, ConnectionState};
use crate::heartbeat::Heartbeat;
use crate::metrics::ChannelMetrics;
use crate::queue::MessageQueue;
use crate::reconnect::{ReconnectScheduler, ReconnectionStrategy, Schedule};
use crate::transport::{Transport, TransportEvent, TransportEvents, TransportLink};
use rentwire_core::{codec, Envelope, Error, Inbound};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use url::Url;

/// Everything the event loop reacts to
#[derive(Debug)]
pub(crate) enum Input {
    Connect,
    Disconnect {
        intentional: bool,
        done: oneshot::Sender<()>,
    },
    Send(Envelope),
    Status(oneshot::Sender<ChannelStatus>),
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    HeartbeatDue {
        generation: u64,
    },
    ReconnectDue {
        ticket: u64,
    },
    Shutdown,
}

/// Owner's handle to a resilient channel
///
/// Create it with [`ChannelBuilder`](crate::ChannelBuilder). One manager
/// serves one session across any number of connect/disconnect cycles.
pub struct ChannelManager {
    identifier: String,
    inputs: mpsc::UnboundedSender<Input>,
    state: watch::Receiver<ConnectionState>,
}

impl ChannelManager {
    pub(crate) fn spawn(
        config: ChannelConfig,
        callbacks: Callbacks,
        url: Url,
        transport: Arc<dyn Transport>,
        strategy: Box<dyn ReconnectionStrategy>,
        metrics: Option<Arc<ChannelMetrics>>,
    ) -> Self {
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Closed);

        let event_loop = EventLoop {
            identifier: config.identifier.clone(),
            url,
            transport,
            callbacks,
            inputs: inputs_tx.clone(),
            state_tx,
            state: ConnectionState::Closed,
            link: None,
            generation: 0,
            intentional: false,
            retrying: false,
            heartbeat: Heartbeat::new(config.heartbeat_interval),
            scheduler: ReconnectScheduler::new(strategy, config.max_reconnect_attempts),
            queue: MessageQueue::new(config.max_queued),
            metrics,
        };
        tokio::spawn(event_loop.run(inputs_rx));

        Self {
            identifier: config.identifier,
            inputs: inputs_tx,
            state: state_rx,
        }
    }

    /// Open the channel
    ///
    /// No-op while already open or connecting. Cancels a pending automatic
    /// retry and re-enables reconnection after an intentional disconnect.
    /// Returns immediately; the outcome is reported through the callbacks.
    #[tracing::instrument(skip(self), fields(identifier = %self.identifier))]
    pub fn connect(&self) {
        self.post(Input::Connect);
    }

    /// Close the channel and suppress reconnection
    ///
    /// Cancels the heartbeat and any pending retry, and closes the live link.
    /// Once the future resolves, no callback of any kind fires until
    /// `connect()` is called again, even for events the old link had already
    /// reported. If a link was live, the disconnected callback fires once
    /// before the future resolves.
    /// Safe to call repeatedly or before ever connecting.
    pub async fn disconnect(&self) {
        self.disconnect_with(true).await;
    }

    /// Close the channel, choosing whether reconnection stays suppressed
    ///
    /// # Arguments
    ///
    /// * `intentional` - `true` behaves exactly like
    ///   [`disconnect`](Self::disconnect). `false` tears the live link down
    ///   the same way, then schedules a retry as if the link had been lost.
    #[tracing::instrument(skip(self), fields(identifier = %self.identifier))]
    pub async fn disconnect_with(&self, intentional: bool) {
        let (done_tx, done_rx) = oneshot::channel();
        self.post(Input::Disconnect {
            intentional,
            done: done_tx,
        });
        // An Err here means the loop is already gone, which is also torn down
        let _ = done_rx.await;
    }

    /// Transmit `envelope`, or queue it until the next open
    ///
    /// Never blocks and never fails: envelopes the link refuses are queued.
    /// Envelopes leave in submission order, including ones queued across a
    /// reconnect.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rentwire_client::ChannelBuilder;
    /// use rentwire_core::Envelope;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let manager = ChannelBuilder::new("tenant-42", |_| {}).build().unwrap();
    ///
    /// // Not connected yet, so this waits in the queue
    /// manager.send(Envelope::new("message_read").with_identifier("tenant-42"));
    /// assert_eq!(manager.status().await.unwrap().queued, 1);
    /// # }
    /// ```
    pub fn send(&self, envelope: Envelope) {
        self.post(Input::Send(envelope));
    }

    /// Whether the channel is open
    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_open()
    }

    /// Last published connection state
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes
    ///
    /// Lets the owner detect prolonged disconnection and degrade (for
    /// example, fall back to polling) without waiting on callbacks.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Snapshot taken on the event loop, after all earlier inputs
    ///
    /// # Returns
    ///
    /// The state, attempt counter, queue depth and timer activity as seen
    /// after every input posted before this call. `None` only if the event
    /// loop has stopped.
    pub async fn status(&self) -> Option<ChannelStatus> {
        let (tx, rx) = oneshot::channel();
        self.post(Input::Status(tx));
        rx.await.ok()
    }

    /// Session identifier of this channel
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    fn post(&self, input: Input) {
        if self.inputs.send(input).is_err() {
            tracing::warn!(identifier = %self.identifier, "Channel event loop has stopped");
        }
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        let _ = self.inputs.send(Input::Shutdown);
    }
}

struct EventLoop {
    identifier: String,
    url: Url,
    transport: Arc<dyn Transport>,
    callbacks: Callbacks,
    inputs: mpsc::UnboundedSender<Input>,
    state_tx: watch::Sender<ConnectionState>,
    state: ConnectionState,
    link: Option<Box<dyn TransportLink>>,
    generation: u64,
    intentional: bool,
    retrying: bool,
    heartbeat: Heartbeat,
    scheduler: ReconnectScheduler,
    queue: MessageQueue,
    metrics: Option<Arc<ChannelMetrics>>,
}

impl EventLoop {
    async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<Input>) {
        while let Some(input) = inputs.recv().await {
            match input {
                Input::Connect => self.connect(false),
                Input::Disconnect { intentional, done } => {
                    self.disconnect(intentional);
                    let _ = done.send(());
                }
                Input::Send(envelope) => self.send(envelope),
                Input::Status(reply) => {
                    let _ = reply.send(self.status());
                }
                Input::Transport { generation, event } => self.on_transport(generation, event),
                Input::HeartbeatDue { generation } => self.on_heartbeat(generation),
                Input::ReconnectDue { ticket } => self.on_reconnect_due(ticket),
                Input::Shutdown => break,
            }
        }
        self.shutdown();
    }

    fn connect(&mut self, retry: bool) {
        if self.state.is_live() {
            tracing::debug!(state = %self.state, "Connect ignored; channel already live");
            return;
        }

        self.intentional = false;
        self.retrying = retry;
        self.scheduler.cancel();
        self.generation += 1;
        self.set_state(ConnectionState::Connecting);

        tracing::info!(
            identifier = %self.identifier,
            url = %self.url,
            generation = self.generation,
            retry,
            "Connecting"
        );

        let events = TransportEvents::new(self.generation, self.inputs.clone());
        self.link = Some(self.transport.open(&self.url, events));
    }

    fn disconnect(&mut self, intentional: bool) {
        self.intentional = intentional;
        self.heartbeat.stop();
        self.scheduler.cancel();

        let Some(mut link) = self.link.take() else {
            tracing::debug!(intentional, "Disconnect with no live link");
            return;
        };
        link.close();
        self.set_state(ConnectionState::Closed);

        tracing::info!(identifier = %self.identifier, intentional, "Disconnected");
        self.callbacks.disconnected();

        if !intentional {
            self.schedule_reconnect();
        }
    }

    fn send(&mut self, envelope: Envelope) {
        // Anything still queued from an interrupted flush goes out first
        if self.state.is_open() && !self.queue.is_empty() {
            self.enqueue(envelope);
            self.flush_queue();
            return;
        }

        if self.state.is_open() {
            if let Some(link) = self.link.as_mut() {
                let text = match codec::encode(&envelope) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(kind = %envelope.kind, error = %e, "Dropping unencodable envelope");
                        self.record_error(&e);
                        return;
                    }
                };
                match link.send(text) {
                    Ok(()) => {
                        if let Some(m) = &self.metrics {
                            m.record_sent(&envelope.kind);
                        }
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(kind = %envelope.kind, error = %e, "Send failed; envelope queued");
                        self.record_error(&Error::Send(e.to_string()));
                    }
                }
            }
        }
        self.enqueue(envelope);
    }

    fn enqueue(&mut self, envelope: Envelope) {
        if let Some(evicted) = self.queue.push(envelope) {
            tracing::warn!(evicted = %evicted.kind, "Outbound queue full; dropped oldest envelope");
        }
        tracing::debug!(queued = self.queue.len(), "Envelope queued");
        if let Some(m) = &self.metrics {
            m.record_queue_depth(self.queue.len());
        }
    }

    fn on_transport(&mut self, generation: u64, event: TransportEvent) {
        // Unwritten frames are owner data; they are kept whatever link they
        // come from
        if let TransportEvent::Undelivered(texts) = event {
            self.on_undelivered(generation, texts);
            return;
        }

        if generation != self.generation || self.link.is_none() {
            tracing::trace!(generation, current = self.generation, ?event, "Stale transport event");
            return;
        }

        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Close => self.on_close(),
            TransportEvent::Undelivered(_) => {}
            TransportEvent::Error(e) => {
                tracing::warn!(error = %e, "Transport error");
                self.record_error(&e);
                self.callbacks.error(e);
            }
        }
    }

    fn on_undelivered(&mut self, generation: u64, texts: Vec<String>) {
        let envelopes: Vec<Envelope> = texts
            .iter()
            .filter_map(|text| codec::decode(text).ok())
            .filter(|envelope| !envelope.is_protocol())
            .collect();
        if envelopes.is_empty() {
            return;
        }

        tracing::warn!(
            generation,
            count = envelopes.len(),
            "Link dropped unwritten envelopes; queued again"
        );
        let evicted = self.queue.restore(envelopes);
        if evicted > 0 {
            tracing::warn!(evicted, "Outbound queue full; dropped oldest envelopes");
        }
        if let Some(m) = &self.metrics {
            m.record_queue_depth(self.queue.len());
        }

        // The reporting link is on its way out; only a newer open link
        // can take them now
        if generation != self.generation && self.state.is_open() {
            self.flush_queue();
        }
    }

    fn on_open(&mut self) {
        if self.state != ConnectionState::Connecting {
            tracing::debug!(state = %self.state, "Duplicate open ignored");
            return;
        }

        self.set_state(ConnectionState::Open);
        self.scheduler.reset();

        let inputs = self.inputs.clone();
        let generation = self.generation;
        self.heartbeat.start(move || {
            let _ = inputs.send(Input::HeartbeatDue { generation });
        });

        self.flush_queue();

        if std::mem::take(&mut self.retrying) {
            if let Some(m) = &self.metrics {
                m.record_reconnection_success();
            }
        }

        tracing::info!(identifier = %self.identifier, generation, "Channel open");
        self.callbacks.connected();
    }

    fn flush_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let Some(link) = self.link.as_mut() else {
            return;
        };

        let metrics = self.metrics.clone();
        let result = self.queue.flush(|envelope| -> rentwire_core::Result<()> {
            match codec::encode(envelope) {
                Ok(text) => {
                    link.send(text)?;
                    if let Some(m) = &metrics {
                        m.record_sent(&envelope.kind);
                    }
                }
                Err(e) => {
                    tracing::error!(kind = %envelope.kind, error = %e, "Dropping unencodable envelope");
                }
            }
            Ok(())
        });

        match result {
            Ok(sent) => tracing::debug!(sent, "Outbound queue flushed"),
            Err(e) => {
                tracing::warn!(error = %e, remaining = self.queue.len(), "Flush interrupted");
                self.record_error(&Error::Send(e.to_string()));
            }
        }
        if let Some(m) = &self.metrics {
            m.record_queue_depth(self.queue.len());
        }
    }

    fn on_message(&mut self, text: &str) {
        let envelope = match codec::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, len = text.len(), "Dropping undecodable message");
                self.record_error(&e);
                return;
            }
        };

        match envelope.classify() {
            Inbound::Ping => {
                tracing::debug!("Ping received; answering");
                self.write_protocol(Envelope::pong());
            }
            Inbound::Pong => tracing::debug!("Heartbeat acknowledged"),
            Inbound::Handshake => {
                tracing::info!(identifier = %self.identifier, "Server acknowledged connection")
            }
            Inbound::Application(envelope) => {
                tracing::debug!(kind = %envelope.kind, "Message received");
                if let Some(m) = &self.metrics {
                    m.record_received(&envelope.kind);
                }
                self.callbacks.message(envelope);
            }
        }
    }

    fn on_close(&mut self) {
        // Heartbeat must not outlive its link
        self.heartbeat.stop();
        self.link = None;
        self.set_state(ConnectionState::Closed);

        tracing::info!(identifier = %self.identifier, intentional = self.intentional, "Channel closed");
        self.callbacks.disconnected();

        if !self.intentional {
            self.schedule_reconnect();
        }
    }

    fn on_heartbeat(&mut self, generation: u64) {
        if generation != self.generation || !self.state.is_open() {
            return;
        }
        if self.write_protocol(Envelope::ping()) {
            if let Some(m) = &self.metrics {
                m.record_heartbeat();
            }
        }
    }

    fn on_reconnect_due(&mut self, ticket: u64) {
        if !self.scheduler.take_due(ticket) || self.intentional {
            return;
        }
        self.connect(true);
    }

    fn schedule_reconnect(&mut self) {
        let inputs = self.inputs.clone();
        let outcome = self.scheduler.schedule(move |ticket| {
            let _ = inputs.send(Input::ReconnectDue { ticket });
        });

        match outcome {
            Schedule::Armed { attempt, delay } => {
                tracing::info!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnect scheduled"
                );
                if let Some(m) = &self.metrics {
                    m.record_reconnection_attempt();
                }
            }
            Schedule::Exhausted { attempts } => {
                tracing::error!(
                    identifier = %self.identifier,
                    attempts,
                    "Reconnect attempts exhausted; channel stays closed until connect()"
                );
                let error = Error::ReconnectExhausted { attempts };
                self.record_error(&error);
                self.callbacks.error(error);
                self.callbacks.reconnect_exhausted(attempts);
            }
        }
    }

    /// Write a heartbeat frame; protocol frames are never queued
    fn write_protocol(&mut self, envelope: Envelope) -> bool {
        let Some(link) = self.link.as_mut() else {
            return false;
        };
        let result = codec::encode(&envelope).and_then(|text| link.send(text));
        if let Err(e) = &result {
            tracing::debug!(kind = %envelope.kind, error = %e, "Protocol frame dropped");
        }
        result.is_ok()
    }

    fn status(&self) -> ChannelStatus {
        ChannelStatus {
            state: self.state,
            reconnect_attempts: self.scheduler.attempts(),
            queued: self.queue.len(),
            heartbeat_active: self.heartbeat.is_active(),
            reconnect_pending: self.scheduler.is_pending(),
            intentional: self.intentional,
        }
    }

    fn shutdown(&mut self) {
        self.intentional = true;
        self.heartbeat.stop();
        self.scheduler.cancel();
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.set_state(ConnectionState::Closed);
        tracing::debug!(identifier = %self.identifier, queued = self.queue.len(), "Channel shut down");
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.state_tx.send_replace(state);
        if let Some(m) = &self.metrics {
            m.update_connection_state(state);
        }
    }

    fn record_error(&self, error: &Error) {
        if let Some(m) = &self.metrics {
            m.record_error(error.kind());
        }
    }
}
