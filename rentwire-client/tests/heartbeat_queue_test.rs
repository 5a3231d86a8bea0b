//! Heartbeat and outbound queue integration tests

mod common;

use common::{builder, elapse, settle, FakeTransport, Recorder};
use rentwire_client::{ConnectionState, FixedDelay};
use rentwire_core::Envelope;
use serde_json::json;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_heartbeat_runs_only_while_open() {
    let transport = FakeTransport::new();
    let recorder = Recorder::new();
    let manager = builder("tenant-7", &transport, &recorder)
        .heartbeat_interval(Duration::from_secs(10))
        .with_reconnect(Box::new(FixedDelay::new(Duration::from_secs(1))))
        .build()
        .unwrap();

    manager.connect();
    let status = settle(&manager).await;
    assert!(!status.heartbeat_active, "connecting is not open");

    let first = transport.last();
    first.open();
    assert!(settle(&manager).await.heartbeat_active);

    // First ping one interval after open, then every interval
    elapse(&manager, 9_990).await;
    assert!(first.sent().is_empty());
    elapse(&manager, 10).await;
    assert_eq!(first.sent_kinds(), vec!["ping"]);
    elapse(&manager, 20_000).await;
    assert_eq!(first.sent_kinds(), vec!["ping", "ping", "ping"]);

    let ping = &first.sent_envelopes()[0];
    assert!(ping.timestamp.is_some());
    assert!(ping.data.is_none());

    first.drop_link();
    let status = settle(&manager).await;
    assert!(!status.heartbeat_active);
    assert_eq!(status.state, ConnectionState::Closed);

    // Retry opens a new link; nothing more is written to the old one
    elapse(&manager, 1_000).await;
    let second = transport.last();
    assert!(!settle(&manager).await.heartbeat_active);
    second.open();
    assert!(settle(&manager).await.heartbeat_active);
    elapse(&manager, 10_000).await;

    assert_eq!(first.sent_kinds().len(), 3);
    assert_eq!(second.sent_kinds(), vec!["ping"]);

    manager.disconnect().await;
    assert!(!settle(&manager).await.heartbeat_active);
    elapse(&manager, 60_000).await;
    assert_eq!(second.sent_kinds(), vec!["ping"]);
}

#[tokio::test(start_paused = true)]
async fn test_ping_answered_with_single_pong() {
    let transport = FakeTransport::new();
    let recorder = Recorder::new();
    let manager = builder("tenant-7", &transport, &recorder).build().unwrap();

    manager.connect();
    settle(&manager).await;
    let link = transport.last();
    link.open();
    link.receive(r#"{"type":"ping","timestamp":"2024-03-01T09:30:00.000Z"}"#);
    link.receive(r#"{"type":"rent_reminder","data":{"due":"2024-04-01"}}"#);
    settle(&manager).await;

    assert_eq!(link.sent_kinds(), vec!["pong"]);
    assert!(link.sent_envelopes()[0].timestamp.is_some());
    assert_eq!(
        recorder.messages(),
        vec![Envelope::new("rent_reminder").with_data(json!({"due": "2024-04-01"}))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_queued_messages_flushed_in_order_after_open() {
    let transport = FakeTransport::new();
    let recorder = Recorder::new();
    let manager = builder("tenant-7", &transport, &recorder).build().unwrap();

    // Queued before the first connect and while connecting
    manager.send(Envelope::new("maintenance_request").with_data(json!({"n": 1})));
    manager.connect();
    manager.send(Envelope::new("maintenance_request").with_data(json!({"n": 2})));
    manager.send(Envelope::new("maintenance_request").with_data(json!({"n": 3})));
    let status = settle(&manager).await;
    assert_eq!(status.queued, 3);

    let link = transport.last();
    assert!(link.sent().is_empty());

    link.open();
    let status = settle(&manager).await;
    assert_eq!(status.queued, 0);

    let sent: Vec<_> = link
        .sent_envelopes()
        .into_iter()
        .map(|e| e.data.unwrap()["n"].as_u64().unwrap())
        .collect();
    assert_eq!(sent, vec![1, 2, 3]);

    // Open bookkeeping completed before the flush
    assert!(status.heartbeat_active);
    assert_eq!(status.reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_send_while_open_is_immediate() {
    let transport = FakeTransport::new();
    let recorder = Recorder::new();
    let manager = builder("tenant-7", &transport, &recorder).build().unwrap();

    manager.connect();
    settle(&manager).await;
    transport.last().open();
    manager.send(Envelope::new("message_read").with_identifier("tenant-7"));
    let status = settle(&manager).await;

    assert_eq!(status.queued, 0);
    assert_eq!(
        transport.last().sent(),
        vec![r#"{"type":"message_read","identifier":"tenant-7"}"#.to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_send_is_requeued() {
    let transport = FakeTransport::new();
    let recorder = Recorder::new();
    let manager = builder("tenant-7", &transport, &recorder)
        .with_reconnect(Box::new(FixedDelay::new(Duration::from_millis(100))))
        .build()
        .unwrap();

    manager.connect();
    settle(&manager).await;
    let first = transport.last();
    first.open();
    first.fail_sends(true);
    manager.send(Envelope::new("lease_renewal").with_data(json!({"n": 1})));
    manager.send(Envelope::new("lease_renewal").with_data(json!({"n": 2})));
    let status = settle(&manager).await;

    assert_eq!(status.queued, 2);
    assert!(first.sent().is_empty());

    first.drop_link();
    elapse(&manager, 100).await;
    let second = transport.last();
    second.open();
    let status = settle(&manager).await;

    assert_eq!(status.queued, 0);
    let sent: Vec<_> = second
        .sent_envelopes()
        .into_iter()
        .map(|e| e.data.unwrap()["n"].as_u64().unwrap())
        .collect();
    assert_eq!(sent, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_flush_interrupted_keeps_remaining() {
    let transport = FakeTransport::new();
    let recorder = Recorder::new();
    let manager = builder("tenant-7", &transport, &recorder).build().unwrap();

    manager.connect();
    for n in 1..=3 {
        manager.send(Envelope::new("notice").with_data(json!({"n": n})));
    }
    settle(&manager).await;

    let link = transport.last();
    link.fail_sends(true);
    link.open();
    let status = settle(&manager).await;

    assert_eq!(status.state, ConnectionState::Open);
    assert_eq!(status.queued, 3);

    // The next send drains the backlog ahead of itself
    link.fail_sends(false);
    manager.send(Envelope::new("notice").with_data(json!({"n": 4})));
    let status = settle(&manager).await;
    assert_eq!(status.queued, 0);

    let sent: Vec<_> = link
        .sent_envelopes()
        .into_iter()
        .map(|e| e.data.unwrap()["n"].as_u64().unwrap())
        .collect();
    assert_eq!(sent, vec![1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_queue_capacity_evicts_oldest() {
    let transport = FakeTransport::new();
    let recorder = Recorder::new();
    let manager = builder("tenant-7", &transport, &recorder)
        .max_queued(2)
        .build()
        .unwrap();

    for n in 1..=4 {
        manager.send(Envelope::new("notice").with_data(json!({"n": n})));
    }
    manager.connect();
    assert_eq!(settle(&manager).await.queued, 2);

    let link = transport.last();
    link.open();
    settle(&manager).await;

    let sent: Vec<_> = link
        .sent_envelopes()
        .into_iter()
        .map(|e| e.data.unwrap()["n"].as_u64().unwrap())
        .collect();
    assert_eq!(sent, vec![3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_unwritten_frames_requeued_ahead_of_new_sends() {
    let transport = FakeTransport::new();
    let recorder = Recorder::new();
    let manager = builder("tenant-7", &transport, &recorder)
        .with_reconnect(Box::new(FixedDelay::new(Duration::from_millis(100))))
        .build()
        .unwrap();

    manager.connect();
    settle(&manager).await;
    let first = transport.last();
    first.open();
    manager.send(Envelope::new("notice").with_data(json!({"n": 1})));
    manager.send(Envelope::new("notice").with_data(json!({"n": 2})));
    settle(&manager).await;

    // The socket died with both frames still buffered, plus a heartbeat
    let mut unwritten = first.sent();
    unwritten.push(r#"{"type":"ping","timestamp":"2024-03-01T09:30:00.000Z"}"#.to_string());
    first.hand_back(unwritten);
    first.drop_link();
    manager.send(Envelope::new("notice").with_data(json!({"n": 3})));
    let status = settle(&manager).await;
    assert_eq!(status.queued, 3, "protocol frames are not requeued");

    elapse(&manager, 100).await;
    let second = transport.last();
    second.open();
    let status = settle(&manager).await;

    assert_eq!(status.queued, 0);
    let sent: Vec<_> = second
        .sent_envelopes()
        .into_iter()
        .map(|e| e.data.unwrap()["n"].as_u64().unwrap())
        .collect();
    assert_eq!(sent, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_unwritten_frames_from_dropped_link_kept_after_disconnect() {
    let transport = FakeTransport::new();
    let recorder = Recorder::new();
    let manager = builder("tenant-7", &transport, &recorder).build().unwrap();

    manager.connect();
    settle(&manager).await;
    let first = transport.last();
    first.open();
    manager.send(Envelope::new("notice").with_data(json!({"n": 1})));
    settle(&manager).await;

    manager.disconnect().await;
    recorder.clear();
    first.hand_back(first.sent());
    let status = settle(&manager).await;

    assert_eq!(status.queued, 1);
    assert!(recorder.all().is_empty());

    manager.connect();
    settle(&manager).await;
    let second = transport.last();
    second.open();
    settle(&manager).await;
    assert_eq!(second.sent(), first.sent());
}

#[tokio::test(start_paused = true)]
async fn test_late_hand_back_goes_to_newer_link() {
    let transport = FakeTransport::new();
    let recorder = Recorder::new();
    let manager = builder("tenant-7", &transport, &recorder).build().unwrap();

    manager.connect();
    settle(&manager).await;
    let first = transport.last();
    first.open();
    manager.send(Envelope::new("notice").with_data(json!({"n": 1})));
    settle(&manager).await;

    manager.disconnect().await;
    manager.connect();
    settle(&manager).await;
    let second = transport.last();
    second.open();
    settle(&manager).await;

    first.hand_back(first.sent());
    let status = settle(&manager).await;

    assert_eq!(status.queued, 0);
    assert_eq!(second.sent(), first.sent());
}
