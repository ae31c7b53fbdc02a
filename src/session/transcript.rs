//! Incremental transcript state
//!
//! The recognition service emits a stream of segment events. A non-final
//! event wholly replaces the in-progress text (overwrite, not accumulation);
//! a final event appends an immutable segment to the log and clears the
//! in-progress text. Segment indices are trusted from the service and stored
//! as received.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A segment event as received from the recognition endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentMessage {
    /// Current text of the segment (supersedes any previous partial)
    pub text: String,
    /// Segment start offset in seconds
    #[serde(default)]
    pub start_time: f64,
    /// Whether this segment is final
    pub finished: bool,
    /// Segment index assigned by the service
    #[serde(default)]
    pub idx: u64,
}

impl SegmentMessage {
    /// Parse a raw textual transport message
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for malformed payloads; callers drop the
    /// message and continue.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::Protocol(format!("malformed recognition event: {e}")))
    }
}

/// A finalized transcript entry; immutable once appended
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSegment {
    /// Index assigned by the recognition service
    pub idx: u64,
    /// Finalized text
    pub text: String,
    /// Segment start offset in seconds
    pub start_time: f64,
}

/// What to do with an in-progress segment when the session is stopped
/// mid-utterance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    /// Finalize the pending partial into the log (keep what was heard)
    #[default]
    FinalizePartial,
    /// Discard the pending partial
    DiscardPartial,
}

/// The in-progress segment plus the append-only finalized log
#[derive(Debug, Default)]
pub struct TranscriptLog {
    pending: Option<SegmentMessage>,
    segments: Vec<TranscriptSegment>,
}

impl TranscriptLog {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one segment event
    ///
    /// Returns the newly finalized segment, if the event finalized one.
    pub fn apply(&mut self, message: SegmentMessage) -> Option<TranscriptSegment> {
        if message.finished {
            let segment = TranscriptSegment {
                idx: message.idx,
                text: message.text,
                start_time: message.start_time,
            };
            self.segments.push(segment.clone());
            self.pending = None;
            Some(segment)
        } else {
            self.pending = Some(message);
            None
        }
    }

    /// Resolve the pending partial at stop time per the configured policy
    ///
    /// Returns the segment that was finalized, if any.
    pub fn resolve_pending(&mut self, policy: StopPolicy) -> Option<TranscriptSegment> {
        let pending = self.pending.take()?;
        match policy {
            StopPolicy::FinalizePartial => {
                let segment = TranscriptSegment {
                    idx: pending.idx,
                    text: pending.text,
                    start_time: pending.start_time,
                };
                self.segments.push(segment.clone());
                Some(segment)
            }
            StopPolicy::DiscardPartial => None,
        }
    }

    /// Current in-progress text, if any
    #[must_use]
    pub fn partial(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.text.as_str())
    }

    /// The finalized log, in receipt order
    #[must_use]
    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    /// Discard all state (a new streaming phase starts from an empty log)
    pub fn reset(&mut self) {
        self.pending = None;
        self.segments.clear();
    }
}
