//! Transport adapter
//!
//! The connection manager never touches a socket directly. It asks a
//! [`Transport`] to open a link and receives the link's lifecycle through a
//! [`TransportEvents`] handle:
//!
//! - `opened()` once the duplex connection is usable
//! - `message(text)` for every inbound text frame
//! - `error(err)` for adapter-level failures (informational only)
//! - `undelivered(texts)` for frames the link accepted but never wrote,
//!   reported before the close so the manager can queue them again
//! - `closed()` exactly once when the link is gone, including when opening
//!   failed
//!
//! Every event is tagged with the generation of the link that produced it,
//! so events from a link the manager already abandoned are ignored.
//!
//! [`WebSocketTransport`] is the production adapter built on
//! tokio-tungstenite. Tests plug in an in-memory adapter instead.

use crate::manager::Input;
use futures::{SinkExt, StreamExt};
use rentwire_core::{Error, Result};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// Lifecycle event reported by a transport link
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Link is open and writable
    Open,
    /// Inbound text frame
    Message(String),
    /// Frames accepted by `send` that never reached the wire, oldest first
    Undelivered(Vec<String>),
    /// Link is gone
    Close,
    /// Adapter-level error; does not by itself end the link
    Error(Error),
}

/// Sink for the events of one link
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<Input>,
}

impl TransportEvents {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<Input>) -> Self {
        Self { generation, tx }
    }

    /// Report that the link opened
    pub fn opened(&self) {
        self.emit(TransportEvent::Open);
    }

    /// Report an inbound text frame
    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    /// Report that the link closed
    pub fn closed(&self) {
        self.emit(TransportEvent::Close);
    }

    /// Report an adapter error
    pub fn error(&self, error: Error) {
        self.emit(TransportEvent::Error(error));
    }

    /// Hand back frames that were accepted but not written
    ///
    /// Must be reported before `closed()`. Nothing is emitted for an empty
    /// list.
    ///
    /// # Arguments
    ///
    /// * `texts` - The unwritten frames in the order `send` accepted them
    pub fn undelivered(&self, texts: Vec<String>) {
        if !texts.is_empty() {
            self.emit(TransportEvent::Undelivered(texts));
        }
    }

    /// Generation of the link these events belong to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn emit(&self, event: TransportEvent) {
        // The manager loop is gone once the owner dropped it; nothing to tell
        let _ = self.tx.send(Input::Transport {
            generation: self.generation,
            event,
        });
    }
}

/// Opens duplex links
///
/// The manager never talks to a socket directly. Tests swap in an
/// in-memory implementation through `ChannelBuilder::transport`.
pub trait Transport: Send + Sync + 'static {
    /// Start opening a link to `url`
    ///
    /// # Arguments
    ///
    /// * `url` - Endpoint URL, identifier query included
    /// * `events` - Sink for everything the link reports. It is tagged with
    ///   this link's generation, so reports from a replaced link are told
    ///   apart.
    ///
    /// # Returns
    ///
    /// The write half of the link. It must be returned immediately.
    /// Completion or failure is reported through `events`; a failed open
    /// reports `closed()` without `opened()`. Frames the link accepted but
    /// could not write go to `undelivered()` before `closed()`.
    fn open(&self, url: &Url, events: TransportEvents) -> Box<dyn TransportLink>;
}

/// Write half of an open (or opening) link
pub trait TransportLink: Send {
    /// Queue a text frame for transmission
    ///
    /// # Errors
    ///
    /// Returns an error if the link can no longer carry frames.
    fn send(&mut self, text: String) -> Result<()>;

    /// Begin closing the link
    ///
    /// The manager ignores later open, message, close and error reports from
    /// it. Frames handed back through `undelivered()` are still requeued.
    fn close(&mut self);
}

enum Outgoing {
    Text(String),
    Close,
}

/// WebSocket adapter over tokio-tungstenite
///
/// Each link runs one task that owns the socket. Writes are handed to the
/// task through an unbounded channel, so `send` never waits on the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create the adapter
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &Url, events: TransportEvents) -> Box<dyn TransportLink> {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(url.to_string(), events, outgoing_rx));
        Box::new(WebSocketLink {
            outgoing: outgoing_tx,
        })
    }
}

struct WebSocketLink {
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl TransportLink for WebSocketLink {
    fn send(&mut self, text: String) -> Result<()> {
        self.outgoing
            .send(Outgoing::Text(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&mut self) {
        let _ = self.outgoing.send(Outgoing::Close);
    }
}

#[tracing::instrument(skip(events, outgoing), fields(generation = events.generation()))]
async fn run_socket(
    url: String,
    events: TransportEvents,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
    // The manager only writes after `opened()`, so anything arriving while
    // the handshake is in flight is a close request
    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = outgoing.recv() => {
            tracing::debug!("Link closed before the handshake completed");
            return;
        }
    };

    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket connect failed");
            events.error(Error::Transport(e.to_string()));
            events.undelivered(drain_unsent(None, &mut outgoing));
            events.closed();
            return;
        }
    };

    events.opened();
    let (mut write, mut read) = ws_stream.split();
    let mut failed = None;

    loop {
        tokio::select! {
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => events.message(text),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "Server closed the connection");
                    break;
                }
                Some(Ok(_)) => {
                    // Binary frames are not part of the protocol; control
                    // frames are answered by tungstenite
                }
                Some(Err(e)) => {
                    events.error(Error::Transport(e.to_string()));
                    break;
                }
                None => break,
            },
            command = outgoing.recv() => match command {
                Some(Outgoing::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text.clone())).await {
                        events.error(Error::Transport(e.to_string()));
                        failed = Some(text);
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }

    let unsent = drain_unsent(failed, &mut outgoing);
    if !unsent.is_empty() {
        tracing::debug!(count = unsent.len(), "Returning unwritten frames");
    }
    events.undelivered(unsent);
    events.closed();
}

/// Stop accepting writes and collect every frame that was never written
///
/// Closing the receiver first makes later `send` calls fail, so each frame
/// either ends up here or is refused to the caller.
fn drain_unsent(
    failed: Option<String>,
    outgoing: &mut mpsc::UnboundedReceiver<Outgoing>,
) -> Vec<String> {
    outgoing.close();
    let mut unsent: Vec<String> = failed.into_iter().collect();
    while let Ok(command) = outgoing.try_recv() {
        if let Outgoing::Text(text) = command {
            unsent.push(text);
        }
    }
    unsent
}
