//! Synthesis session
//!
//! Owns one transport to the `/tts` endpoint and one playback pipeline. The
//! utterance goes out as a single text message immediately after open; every
//! binary message that follows is a PCM16 frame fed to playback in receipt
//! order. The one-and-only completion signal is the final `{elapsed}` text
//! message.

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::audio::{PlaybackSink, convert};
use crate::transport::{Connector, EventStream, MessageSender, TransportEvent};
use crate::{Error, Result};

/// Synthesis endpoint path
const TTS_PATH: &str = "/tts";

/// Lifecycle of a synthesis session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisState {
    /// Created, not yet started
    Idle,
    /// Opening playback device and transport
    Opening,
    /// Sending the utterance
    Sending,
    /// Receiving and playing audio frames
    StreamingPlayback,
    /// Completion message received; elapsed result populated
    Complete,
    /// Terminal; transport and playback released
    Closed,
}

/// Completion event from the synthesis endpoint
#[derive(Debug, Deserialize)]
struct CompletionMessage {
    elapsed: f64,
}

/// Shared session core; mutated only by transition handlers
struct Core {
    state: SynthesisState,
    elapsed: Option<f64>,
}

impl Core {
    /// Completion: record the result exactly once
    fn on_completion(&mut self, elapsed: f64) -> bool {
        if self.state == SynthesisState::StreamingPlayback {
            self.elapsed = Some(elapsed);
            self.state = SynthesisState::Complete;
            true
        } else {
            false
        }
    }

    /// Transport or device loss mid-stream; returns true if this call
    /// performed the transition to Closed
    fn close_from_stream(&mut self) -> bool {
        if self.state == SynthesisState::StreamingPlayback {
            self.state = SynthesisState::Closed;
            true
        } else {
            false
        }
    }
}

/// A synthesis session over one transport and one playback pipeline
///
/// Sessions are single-use; re-entrant `start()` is rejected while busy, and
/// a completed or failed session must be replaced to synthesize again.
pub struct SynthesisSession<P: PlaybackSink> {
    sink: Arc<Mutex<P>>,
    connector: Arc<dyn Connector>,
    core: Arc<Mutex<Core>>,
    sender: Option<MessageSender>,
    pump: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl<P: PlaybackSink + 'static> SynthesisSession<P> {
    /// Create a session; nothing is acquired until `start()`
    pub fn new(connector: Arc<dyn Connector>, sink: P) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            connector,
            core: Arc::new(Mutex::new(Core {
                state: SynthesisState::Idle,
                elapsed: None,
            })),
            sender: None,
            pump: None,
            stop_tx: None,
        }
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> SynthesisState {
        self.core.lock().unwrap().state
    }

    /// Elapsed synthesis time; `None` until the completion message arrives
    #[must_use]
    pub fn elapsed(&self) -> Option<f64> {
        self.core.lock().unwrap().elapsed
    }

    /// Samples queued for playback but not yet played
    #[must_use]
    pub fn queued_samples(&self) -> usize {
        self.sink.lock().unwrap().queued()
    }

    /// Whether a synthesis request is in flight (Opening through playback)
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state(),
            SynthesisState::Opening | SynthesisState::Sending | SynthesisState::StreamingPlayback
        )
    }

    /// Start synthesis: open playback and transport, send the utterance,
    /// stream the response to the speakers
    ///
    /// Suspends until the connection is open and the text is sent.
    ///
    /// # Errors
    ///
    /// [`Error::Session`] on a re-entrant or reused start,
    /// [`Error::Device`] if the playback device cannot be opened,
    /// [`Error::Transport`] if the connection fails. Any error leaves the
    /// session Closed.
    pub async fn start(&mut self, text: &str) -> Result<()> {
        {
            let mut core = self.core.lock().unwrap();
            if core.state != SynthesisState::Idle {
                return Err(Error::Session("synthesis session busy".to_string()));
            }
            core.state = SynthesisState::Opening;
        }

        if let Err(e) = self.sink.lock().unwrap().start() {
            self.core.lock().unwrap().state = SynthesisState::Closed;
            return Err(e);
        }

        let channel = match self.connector.connect(TTS_PATH).await {
            Ok(channel) => channel,
            Err(e) => {
                self.sink.lock().unwrap().stop();
                self.core.lock().unwrap().state = SynthesisState::Closed;
                return Err(e);
            }
        };

        let (sender, events) = channel.split();

        self.core.lock().unwrap().state = SynthesisState::Sending;
        if let Err(e) = sender.send_text(text).await {
            self.sink.lock().unwrap().stop();
            self.core.lock().unwrap().state = SynthesisState::Closed;
            return Err(e);
        }

        self.core.lock().unwrap().state = SynthesisState::StreamingPlayback;
        self.sender = Some(sender);

        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        self.pump = Some(tokio::spawn(pump(
            events,
            Arc::clone(&self.core),
            Arc::clone(&self.sink),
            stop_rx,
        )));

        tracing::info!(chars = text.len(), "synthesis request sent");
        Ok(())
    }

    /// Wait until synthesis completes or the session fails
    ///
    /// Returns the elapsed result (`None` if the transport was lost before
    /// completion). Playback may still be draining when this returns.
    pub async fn finished(&mut self) -> Option<f64> {
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
        self.elapsed()
    }

    /// Close the session: tear down the transport and the playback pipeline
    ///
    /// Queued-but-unplayed audio is discarded; callers that want the tail to
    /// drain should wait before closing. Idempotent.
    pub async fn close(&mut self) {
        {
            let mut core = self.core.lock().unwrap();
            if core.state == SynthesisState::Closed {
                return;
            }
            core.state = SynthesisState::Closed;
        }

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }

        self.sink.lock().unwrap().stop();
        self.sender = None;

        tracing::info!("synthesis session closed");
    }
}

/// Session pump: feeds binary frames to playback and resolves completion
async fn pump<P: PlaybackSink>(
    mut events: EventStream,
    core: Arc<Mutex<Core>>,
    sink: Arc<Mutex<P>>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop_rx => return,

            event = events.next() => match event {
                Some(TransportEvent::Binary(bytes)) => {
                    if core.lock().unwrap().state != SynthesisState::StreamingPlayback {
                        continue;
                    }
                    let frame = convert::pcm16_from_bytes(&bytes);
                    let fed = sink.lock().unwrap().feed(&frame);
                    if let Err(e) = fed {
                        tracing::warn!(error = %e, "playback failed, closing session");
                        if core.lock().unwrap().close_from_stream() {
                            sink.lock().unwrap().stop();
                        }
                        return;
                    }
                }
                Some(TransportEvent::Text(raw)) => {
                    match serde_json::from_str::<CompletionMessage>(&raw) {
                        Ok(message) => {
                            if core.lock().unwrap().on_completion(message.elapsed) {
                                tracing::info!(elapsed = message.elapsed, "synthesis complete");
                                // Playback keeps draining until close().
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping malformed synthesis event");
                        }
                    }
                }
                Some(TransportEvent::Closed | TransportEvent::Failed(_)) | None => {
                    if core.lock().unwrap().close_from_stream() {
                        tracing::warn!("synthesis transport lost before completion");
                        sink.lock().unwrap().stop();
                    }
                    return;
                }
            },
        }
    }
}
