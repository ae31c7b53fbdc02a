//! Synthesis session integration tests
//!
//! Drives the session state machine through mock playback sinks and
//! in-process transports; no audio hardware or sockets involved.

use std::sync::Arc;

use voicewire::session::{SynthesisSession, SynthesisState};
use voicewire::transport::{Outbound, TransportEvent, TransportPeer};
use voicewire::Error;

mod common;

use common::{FailingConnector, MockConnector, MockSink, SinkHandle, wait_for};

struct Harness {
    session: SynthesisSession<MockSink>,
    peer: TransportPeer,
    sink: SinkHandle,
}

async fn start_session(text: &str) -> Harness {
    let (connector, mut peers) = MockConnector::new();
    let sink = MockSink::new();
    let handle = sink.handle();

    let mut session = SynthesisSession::new(connector, sink);
    session.start(text).await.unwrap();

    let (path, peer) = peers.recv().await.unwrap();
    assert_eq!(path, "/tts");

    Harness {
        session,
        peer,
        sink: handle,
    }
}

fn completion_event(elapsed: f64) -> TransportEvent {
    TransportEvent::Text(format!(r#"{{"elapsed":{elapsed}}}"#))
}

#[tokio::test]
async fn test_utterance_sent_as_single_text_message() {
    let mut h = start_session("hello world").await;

    assert_eq!(
        h.peer.outbound.next().await,
        Some(Outbound::Text("hello world".to_string()))
    );
    assert_eq!(h.session.state(), SynthesisState::StreamingPlayback);
    assert!(h.sink.started());
}

#[tokio::test]
async fn test_completion_gates_elapsed_result() {
    let mut h = start_session("speak").await;

    // Binary frames do not complete the session.
    assert!(h.peer.events.emit(TransportEvent::Binary(vec![0, 1, 2, 3])).await);
    assert!(h.peer.events.emit(TransportEvent::Binary(vec![4, 5])).await);

    let sink = h.sink.clone();
    wait_for(move || sink.fed().len() == 2).await;
    assert_eq!(h.session.elapsed(), None);
    assert!(h.session.is_busy());

    // The single completion message is the only finish signal.
    assert!(h.peer.events.emit(completion_event(1.25)).await);
    let elapsed = h.session.finished().await;
    assert_eq!(elapsed, Some(1.25));
    assert_eq!(h.session.state(), SynthesisState::Complete);
    assert!(!h.session.is_busy());
}

#[tokio::test]
async fn test_frames_played_in_receipt_order() {
    let mut h = start_session("order").await;

    // Arbitrary chunk sizes, little-endian pairs per message.
    assert!(h.peer.events.emit(TransportEvent::Binary(vec![1, 0, 2, 0])).await);
    assert!(h.peer.events.emit(TransportEvent::Binary(vec![3, 0])).await);
    assert!(h.peer.events.emit(completion_event(0.5)).await);

    h.session.finished().await;
    assert_eq!(h.sink.fed(), vec![vec![1_i16, 2], vec![3]]);
}

#[tokio::test]
async fn test_zero_frame_synthesis_completes() {
    let mut h = start_session("empty").await;

    assert!(h.peer.events.emit(completion_event(0.05)).await);

    assert_eq!(h.session.finished().await, Some(0.05));
    assert_eq!(h.session.state(), SynthesisState::Complete);
    assert!(h.sink.fed().is_empty());
}

#[tokio::test]
async fn test_playback_left_running_until_close() {
    let mut h = start_session("drain").await;

    assert!(h.peer.events.emit(completion_event(1.0)).await);
    h.session.finished().await;

    // Complete does not release the device; close() does.
    assert!(!h.sink.stopped());
    h.session.close().await;
    assert!(h.sink.stopped());
    assert_eq!(h.session.state(), SynthesisState::Closed);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut h = start_session("twice").await;

    h.session.close().await;
    assert_eq!(h.session.state(), SynthesisState::Closed);

    h.session.close().await;
    assert_eq!(h.session.state(), SynthesisState::Closed);
}

#[tokio::test]
async fn test_reentrant_start_rejected_while_busy() {
    let mut h = start_session("busy").await;

    assert!(h.session.is_busy());
    let err = h.session.start("again").await.unwrap_err();
    assert!(matches!(err, Error::Session(_)));

    // The in-flight request is unaffected.
    assert!(h.peer.events.emit(completion_event(2.0)).await);
    assert_eq!(h.session.finished().await, Some(2.0));
}

#[tokio::test]
async fn test_completed_session_rejects_start() {
    let mut h = start_session("done").await;

    assert!(h.peer.events.emit(completion_event(1.0)).await);
    h.session.finished().await;

    let err = h.session.start("again").await.unwrap_err();
    assert!(matches!(err, Error::Session(_)));
}

#[tokio::test]
async fn test_malformed_completion_dropped() {
    let mut h = start_session("tolerant").await;

    assert!(
        h.peer
            .events
            .emit(TransportEvent::Text("garbage".to_string()))
            .await
    );
    assert!(h.peer.events.emit(TransportEvent::Binary(vec![9, 0])).await);
    assert!(h.peer.events.emit(completion_event(3.0)).await);

    assert_eq!(h.session.finished().await, Some(3.0));
    assert_eq!(h.sink.fed(), vec![vec![9_i16]]);
}

#[tokio::test]
async fn test_transport_loss_before_completion() {
    let mut h = start_session("lost").await;

    assert!(h.peer.events.emit(TransportEvent::Binary(vec![1, 0])).await);
    assert!(
        h.peer
            .events
            .emit(TransportEvent::Failed("connection reset".to_string()))
            .await
    );

    assert_eq!(h.session.finished().await, None);
    assert_eq!(h.session.state(), SynthesisState::Closed);
    assert!(h.sink.stopped());
}

#[tokio::test]
async fn test_playback_failure_closes_session() {
    let (connector, mut peers) = MockConnector::new();
    let sink = MockSink::new().failing();
    let handle = sink.handle();

    let mut session = SynthesisSession::new(connector, sink);
    session.start("doomed").await.unwrap();
    let (_, peer) = peers.recv().await.unwrap();

    assert!(peer.events.emit(TransportEvent::Binary(vec![1, 0])).await);

    let h = handle.clone();
    wait_for(move || h.stopped()).await;
    assert_eq!(session.state(), SynthesisState::Closed);
    assert_eq!(session.finished().await, None);
}

#[tokio::test]
async fn test_connect_failure_releases_playback() {
    let sink = MockSink::new();
    let handle = sink.handle();
    let mut session = SynthesisSession::new(Arc::new(FailingConnector), sink);

    let err = session.start("unreachable").await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(session.state(), SynthesisState::Closed);
    assert!(handle.stopped());
}
