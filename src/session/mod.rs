//! Streaming sessions
//!
//! A session owns one transport plus one audio pipeline for its entire
//! lifetime; no handle is shared across sessions or survives the session's
//! Closed transition. [`Sessions`] is the factory callers hold — each call
//! produces an independently owned session instance.

pub mod transcript;

mod recognition;
mod synthesis;

pub use recognition::{RecognitionSession, RecognitionState, RecognitionUpdate};
pub use synthesis::{SynthesisSession, SynthesisState};
pub use transcript::{SegmentMessage, StopPolicy, TranscriptLog, TranscriptSegment};

use std::sync::Arc;

use crate::Config;
use crate::audio::{MicCapture, SpeakerOutput};
use crate::results::ResultsStore;
use crate::transport::{Connector, WsConnector};

/// Factory for independently owned sessions wired to the real hardware
/// pipelines and the WebSocket connector
pub struct Sessions {
    connector: Arc<dyn Connector>,
    store: Arc<ResultsStore>,
    policy: StopPolicy,
    frame_samples: usize,
}

impl Sessions {
    /// Build a factory from the runtime configuration
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let mirror_url = config
            .mirror_results
            .then(|| format!("{}/api/results", config.api_url));

        Self {
            connector: Arc::new(WsConnector::new(config.server_url.clone())),
            store: Arc::new(ResultsStore::new(config.results_path.clone(), mirror_url)),
            policy: config.stop_policy,
            frame_samples: config.frame_samples,
        }
    }

    /// Create a recognition session (microphone -> `/asr`)
    #[must_use]
    pub fn recognition(&self) -> RecognitionSession<MicCapture> {
        RecognitionSession::new(
            Arc::clone(&self.connector),
            MicCapture::new(self.frame_samples),
            Some(Arc::clone(&self.store)),
            self.policy,
        )
    }

    /// Create a synthesis session (`/tts` -> speakers)
    #[must_use]
    pub fn synthesis(&self) -> SynthesisSession<SpeakerOutput> {
        SynthesisSession::new(Arc::clone(&self.connector), SpeakerOutput::new())
    }
}
