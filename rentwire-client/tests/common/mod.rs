//! Common test utilities for rentwire-client integration tests
//!
//! This module provides an in-memory transport that lets tests drive link
//! events by hand, a recorder for owner callbacks, and a small WebSocket
//! server speaking the channel protocol.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use rentwire_client::{
    ChannelBuilder, ChannelManager, ChannelStatus, Transport, TransportEvents, TransportLink,
};
use rentwire_core::{Envelope, Error, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// One link opened through [`FakeTransport`]
pub struct FakeLink {
    pub url: Url,
    events: TransportEvents,
    sent: Mutex<Vec<String>>,
    fail_sends: AtomicBool,
    closed: AtomicBool,
}

impl FakeLink {
    /// Complete the handshake
    pub fn open(&self) {
        self.events.opened();
    }

    /// Deliver an inbound text frame
    pub fn receive(&self, text: &str) {
        self.events.message(text);
    }

    /// Deliver an inbound envelope
    pub fn receive_envelope(&self, envelope: &Envelope) {
        self.events
            .message(serde_json::to_string(envelope).unwrap());
    }

    /// Lose the link from the remote side
    pub fn drop_link(&self) {
        self.events.closed();
    }

    /// Report an adapter error
    pub fn fail(&self, error: Error) {
        self.events.error(error);
    }

    /// Report frames this link accepted but never wrote
    pub fn hand_back(&self, texts: Vec<String>) {
        self.events.undelivered(texts);
    }

    /// Make every following write fail
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Whether the manager closed this link
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Raw frames written to this link
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Decoded frames written to this link
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    /// `type` of every frame written to this link
    pub fn sent_kinds(&self) -> Vec<String> {
        self.sent_envelopes().into_iter().map(|e| e.kind).collect()
    }
}

struct FakeLinkHandle(Arc<FakeLink>);

impl TransportLink for FakeLinkHandle {
    fn send(&mut self, text: String) -> Result<()> {
        if self.0.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.0.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn close(&mut self) {
        self.0.closed.store(true, Ordering::SeqCst);
        // A real socket reports its close asynchronously; the manager must
        // ignore it
        self.0.events.closed();
    }
}

/// In-memory transport; links only change state when a test says so
#[derive(Clone, Default)]
pub struct FakeTransport {
    links: Arc<Mutex<Vec<Arc<FakeLink>>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of links opened so far
    pub fn opens(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    /// The `index`-th link opened
    pub fn link(&self, index: usize) -> Arc<FakeLink> {
        Arc::clone(&self.links.lock().unwrap()[index])
    }

    /// The most recent link
    pub fn last(&self) -> Arc<FakeLink> {
        Arc::clone(self.links.lock().unwrap().last().expect("no link opened"))
    }
}

impl Transport for FakeTransport {
    fn open(&self, url: &Url, events: TransportEvents) -> Box<dyn TransportLink> {
        let link = Arc::new(FakeLink {
            url: url.clone(),
            events,
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });
        self.links.lock().unwrap().push(Arc::clone(&link));
        Box::new(FakeLinkHandle(link))
    }
}

/// Owner callback invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Message(Envelope),
    Connected,
    Disconnected,
    Error(Error),
    Exhausted(u32),
}

/// Records every callback in invocation order
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.seen.lock().unwrap().clear();
    }

    pub fn messages(&self) -> Vec<Envelope> {
        self.all()
            .into_iter()
            .filter_map(|seen| match seen {
                Seen::Message(envelope) => Some(envelope),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Seen) -> usize {
        self.all().iter().filter(|seen| *seen == wanted).count()
    }

    fn push(&self, seen: Seen) {
        self.seen.lock().unwrap().push(seen);
    }
}

/// Builder wired to `transport` with every callback feeding `recorder`
pub fn builder(identifier: &str, transport: &FakeTransport, recorder: &Recorder) -> ChannelBuilder {
    let on_message = recorder.clone();
    let on_connected = recorder.clone();
    let on_disconnected = recorder.clone();
    let on_error = recorder.clone();
    let on_exhausted = recorder.clone();

    ChannelBuilder::new(identifier, move |envelope| {
        on_message.push(Seen::Message(envelope))
    })
    .on_connected(move || on_connected.push(Seen::Connected))
    .on_disconnected(move || on_disconnected.push(Seen::Disconnected))
    .on_error(move |e| on_error.push(Seen::Error(e)))
    .on_reconnect_exhausted(move |attempts| on_exhausted.push(Seen::Exhausted(attempts)))
    .transport(transport.clone())
}

/// Wait until the manager has processed everything posted so far
pub async fn settle(manager: &ChannelManager) -> ChannelStatus {
    manager.status().await.expect("event loop stopped")
}

/// Let just over `ms` of (paused) time pass, then settle
///
/// The extra millisecond lets timers due at exactly `ms` fire and reach the
/// event loop before the status request does.
pub async fn elapse(manager: &ChannelManager, ms: u64) -> ChannelStatus {
    tokio::time::sleep(Duration::from_millis(ms + 1)).await;
    settle(manager).await
}

/// Mock WebSocket server speaking the channel protocol
///
/// Sends the configured greeting frames to every client, answers `ping`
/// with `pong`, and reports every text frame it receives.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: mpsc::UnboundedReceiver<String>,
    request_rx: mpsc::UnboundedReceiver<String>,
}

impl MockWsServer {
    /// Start a server greeting clients with `{"type":"connected"}`
    pub async fn new() -> Self {
        Self::with_greetings(vec![r#"{"type":"connected"}"#.to_string()]).await
    }

    /// Start a server sending `greetings` after each handshake
    pub async fn with_greetings(greetings: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, message_rx) = mpsc::unbounded_channel::<String>();
        let (req_tx, request_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { continue };
                        let msg_tx = msg_tx.clone();
                        let req_tx = req_tx.clone();
                        let greetings = greetings.clone();

                        tokio::spawn(async move {
                            let record_request = |req: &Request, resp: Response| {
                                let _ = req_tx.send(req.uri().to_string());
                                Ok::<_, ErrorResponse>(resp)
                            };
                            let Ok(ws_stream) = accept_hdr_async(stream, record_request).await else {
                                return;
                            };
                            let (mut write, mut read) = ws_stream.split();

                            for greeting in greetings {
                                let _ = write.send(Message::Text(greeting)).await;
                            }

                            while let Some(Ok(msg)) = read.next().await {
                                if let Message::Text(text) = msg {
                                    let _ = msg_tx.send(text.clone());
                                    if text.contains(r#""type":"ping""#) {
                                        let pong = r#"{"type":"pong"}"#.to_string();
                                        let _ = write.send(Message::Text(pong)).await;
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            message_rx,
            request_rx,
        }
    }

    /// `host:port` of this server
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Wait for the next text frame a client sent
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Wait for the request URI of the next handshake
    pub async fn wait_for_request(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.request_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Stop accepting connections
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
