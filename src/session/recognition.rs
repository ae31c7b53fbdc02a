//! Recognition session
//!
//! Owns one capture pipeline and one transport to the `/asr` endpoint.
//! Capture frames go out as binary messages; incoming text events drive the
//! incremental transcript. All state lives behind tagged transitions on
//! [`RecognitionState`]; the pump task and the caller-facing methods mutate
//! it only through the handlers on the shared core.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::audio::{CaptureSource, FrameReceiver, convert};
use crate::results::ResultsStore;
use crate::session::transcript::{
    SegmentMessage, StopPolicy, TranscriptLog, TranscriptSegment,
};
use crate::transport::{Connector, EventStream, MessageSender, TransportEvent};
use crate::{Error, Result};

/// Recognition endpoint path
const ASR_PATH: &str = "/asr";

/// Lifecycle of a recognition session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionState {
    /// Created, not yet started
    Idle,
    /// Waiting for microphone access
    RequestingPermission,
    /// Capturing and exchanging messages
    Streaming,
    /// `stop()` in progress
    Stopping,
    /// Terminal; a new session is required to stream again
    Closed,
}

/// Incremental updates surfaced to the rendering layer
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionUpdate {
    /// The in-progress text was replaced
    Partial(String),
    /// A segment was finalized and appended to the log
    Finalized(TranscriptSegment),
    /// The session reached Closed (stop, transport loss, or device failure)
    Closed,
}

/// Outcome of applying one segment event
enum Applied {
    /// Event arrived outside Streaming and was dropped
    Ignored,
    /// The in-progress text was replaced
    Partial(String),
    /// A segment was finalized
    Finalized(TranscriptSegment),
}

/// Shared session core; every mutation goes through a transition handler
struct Core {
    state: RecognitionState,
    log: TranscriptLog,
}

impl Core {
    /// Streaming begins with an empty finalized log
    fn begin_streaming(&mut self) {
        self.log.reset();
        self.state = RecognitionState::Streaming;
    }

    /// Apply a segment event; ignored outside Streaming
    fn on_segment(&mut self, message: SegmentMessage) -> Applied {
        if self.state != RecognitionState::Streaming {
            return Applied::Ignored;
        }
        match self.log.apply(message) {
            Some(segment) => Applied::Finalized(segment),
            None => Applied::Partial(self.log.partial().unwrap_or_default().to_string()),
        }
    }

    /// Transport or device loss mid-stream; returns true if this call
    /// performed the transition to Closed
    fn close_from_stream(&mut self) -> bool {
        if self.state == RecognitionState::Streaming {
            self.state = RecognitionState::Closed;
            true
        } else {
            false
        }
    }
}

/// A recognition session over one capture pipeline and one transport
///
/// Sessions are single-use: once Closed (by `stop()` or by a mid-stream
/// failure) a new session must be created to stream again.
pub struct RecognitionSession<S: CaptureSource> {
    source: Arc<Mutex<S>>,
    connector: Arc<dyn Connector>,
    store: Option<Arc<ResultsStore>>,
    policy: StopPolicy,
    core: Arc<Mutex<Core>>,
    sender: Option<MessageSender>,
    pump: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
    updates_tx: mpsc::UnboundedSender<RecognitionUpdate>,
    updates_rx: Option<mpsc::UnboundedReceiver<RecognitionUpdate>>,
}

impl<S: CaptureSource + 'static> RecognitionSession<S> {
    /// Create a session; nothing is acquired until `start()`
    pub fn new(
        connector: Arc<dyn Connector>,
        source: S,
        store: Option<Arc<ResultsStore>>,
        policy: StopPolicy,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            source: Arc::new(Mutex::new(source)),
            connector,
            store,
            policy,
            core: Arc::new(Mutex::new(Core {
                state: RecognitionState::Idle,
                log: TranscriptLog::new(),
            })),
            sender: None,
            pump: None,
            stop_tx: None,
            updates_tx,
            updates_rx: Some(updates_rx),
        }
    }

    /// Take the update stream (once); rendering layers consume this
    pub fn updates(&mut self) -> Option<mpsc::UnboundedReceiver<RecognitionUpdate>> {
        self.updates_rx.take()
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> RecognitionState {
        self.core.lock().unwrap().state
    }

    /// Current in-progress text, if any
    #[must_use]
    pub fn partial(&self) -> Option<String> {
        self.core.lock().unwrap().log.partial().map(str::to_string)
    }

    /// Snapshot of the finalized log
    #[must_use]
    pub fn segments(&self) -> Vec<TranscriptSegment> {
        self.core.lock().unwrap().log.segments().to_vec()
    }

    /// Start streaming: acquire the microphone, open the transport, begin
    /// forwarding frames
    ///
    /// Suspends until permission and connection setup resolve.
    ///
    /// # Errors
    ///
    /// [`Error::Permission`] if microphone access is denied,
    /// [`Error::Transport`] if the connection cannot be opened,
    /// [`Error::Session`] if the session was already started. Any error
    /// leaves the session Closed; there is no retry.
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut core = self.core.lock().unwrap();
            if core.state != RecognitionState::Idle {
                return Err(Error::Session(
                    "recognition session already started".to_string(),
                ));
            }
            core.state = RecognitionState::RequestingPermission;
        }

        // Permission denial surfaces here and is terminal.
        let frames = match self.source.lock().unwrap().start() {
            Ok(frames) => frames,
            Err(e) => {
                self.core.lock().unwrap().state = RecognitionState::Closed;
                return Err(e);
            }
        };

        let channel = match self.connector.connect(ASR_PATH).await {
            Ok(channel) => channel,
            Err(e) => {
                self.source.lock().unwrap().stop();
                self.core.lock().unwrap().state = RecognitionState::Closed;
                return Err(e);
            }
        };

        let (sender, events) = channel.split();
        self.core.lock().unwrap().begin_streaming();
        self.sender = Some(sender.clone());

        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        self.pump = Some(tokio::spawn(pump(
            frames,
            events,
            sender,
            Arc::clone(&self.core),
            Arc::clone(&self.source),
            self.store.clone(),
            self.updates_tx.clone(),
            stop_rx,
        )));

        tracing::info!("recognition session streaming");
        Ok(())
    }

    /// Stop streaming: release the microphone (stop barrier), resolve the
    /// pending partial per the stop policy, close the transport
    ///
    /// Idempotent: a no-op on a session that is Idle, Closed, or already
    /// stopping.
    pub async fn stop(&mut self) {
        {
            let mut core = self.core.lock().unwrap();
            if core.state != RecognitionState::Streaming {
                return;
            }
            core.state = RecognitionState::Stopping;
        }

        // Barrier first: no frame is delivered past this point.
        self.source.lock().unwrap().stop();

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }

        // The pump has quiesced; the pending partial is resolved exactly once.
        let finalized = self.core.lock().unwrap().log.resolve_pending(self.policy);
        if let Some(segment) = finalized {
            let _ = self
                .updates_tx
                .send(RecognitionUpdate::Finalized(segment));
            if let Some(store) = &self.store {
                let snapshot = self.core.lock().unwrap().log.segments().to_vec();
                store.save(&snapshot).await;
            }
        }

        // Dropping the sender closes the transport.
        self.sender = None;
        self.core.lock().unwrap().state = RecognitionState::Closed;
        let _ = self.updates_tx.send(RecognitionUpdate::Closed);

        tracing::info!("recognition session closed");
    }
}

/// Session pump: one task reacting to frame deliveries and transport events
#[allow(clippy::too_many_arguments)]
async fn pump<S: CaptureSource>(
    mut frames: FrameReceiver,
    mut events: EventStream,
    sender: MessageSender,
    core: Arc<Mutex<Core>>,
    source: Arc<Mutex<S>>,
    store: Option<Arc<ResultsStore>>,
    updates: mpsc::UnboundedSender<RecognitionUpdate>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop_rx => break,

            frame = frames.recv() => match frame {
                Some(frame) => {
                    let bytes = convert::pcm16_to_bytes(&frame);
                    if sender.send_binary(bytes).await.is_err() {
                        teardown(&core, &source, &updates, "transport closed while sending");
                        break;
                    }
                }
                // Gate closed: either stop() is in progress (state already
                // Stopping) or the capture device failed mid-stream.
                None => {
                    teardown(&core, &source, &updates, "capture pipeline ended");
                    break;
                }
            },

            event = events.next() => match event {
                Some(TransportEvent::Text(raw)) => {
                    handle_segment(&raw, &core, &store, &updates).await;
                }
                Some(TransportEvent::Binary(_)) => {
                    tracing::warn!("dropping unexpected binary message on recognition transport");
                }
                Some(TransportEvent::Closed) => {
                    teardown(&core, &source, &updates, "transport closed by remote");
                    break;
                }
                Some(TransportEvent::Failed(reason)) => {
                    teardown(&core, &source, &updates, &reason);
                    break;
                }
                None => {
                    teardown(&core, &source, &updates, "transport event stream ended");
                    break;
                }
            },
        }
    }
}

/// Parse and apply one recognition event; malformed events are dropped and
/// the session continues
async fn handle_segment(
    raw: &str,
    core: &Arc<Mutex<Core>>,
    store: &Option<Arc<ResultsStore>>,
    updates: &mpsc::UnboundedSender<RecognitionUpdate>,
) {
    let message = match SegmentMessage::parse(raw) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed recognition event");
            return;
        }
    };

    let (applied, snapshot) = {
        let mut core = core.lock().unwrap();
        let applied = core.on_segment(message);
        let snapshot =
            matches!(applied, Applied::Finalized(_)).then(|| core.log.segments().to_vec());
        (applied, snapshot)
    };

    match applied {
        Applied::Finalized(segment) => {
            let _ = updates.send(RecognitionUpdate::Finalized(segment));
            if let (Some(store), Some(snapshot)) = (store, snapshot) {
                store.save(&snapshot).await;
            }
        }
        Applied::Partial(partial) => {
            let _ = updates.send(RecognitionUpdate::Partial(partial));
        }
        Applied::Ignored => {}
    }
}

/// Mid-stream loss of transport or device: transition to Closed and release
/// the capture pipeline
fn teardown<S: CaptureSource>(
    core: &Arc<Mutex<Core>>,
    source: &Arc<Mutex<S>>,
    updates: &mpsc::UnboundedSender<RecognitionUpdate>,
    reason: &str,
) {
    let transitioned = core.lock().unwrap().close_from_stream();
    if transitioned {
        tracing::warn!(reason, "recognition session closed mid-stream");
        source.lock().unwrap().stop();
        let _ = updates.send(RecognitionUpdate::Closed);
    }
}
