//! Audio pipelines
//!
//! Capture and playback move fixed-size 16 kHz mono frames between the audio
//! hardware and the session layer. Hardware callbacks never reach session
//! code directly: capture delivers frames through a gated channel and
//! playback consumes a fed queue, so sessions are testable with the
//! [`CaptureSource`] and [`PlaybackSink`] seams and no real device.

pub mod convert;

mod capture;
mod playback;

pub use capture::MicCapture;
pub use playback::SpeakerOutput;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use crate::Result;

/// Sample rate for capture and playback (16 kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Samples per frame (100ms at 16kHz)
pub const FRAME_SAMPLES: usize = 1600;

/// Frames buffered between the device thread and the session pump
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// A fixed-size buffer of 16-bit PCM samples, the wire unit of exchange
pub type Pcm16Frame = Vec<i16>;

/// Source of capture frames, started and stopped by a recognition session
///
/// `start` acquires the input device and returns the frame channel; access
/// denial surfaces as [`crate::Error::Permission`] and is never retried.
/// `stop` is idempotent and acts as a barrier: once it returns, the receiver
/// yields no further frames, queued or not.
pub trait CaptureSource: Send {
    /// Acquire the device and begin producing frames
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Permission`] if device access is denied and
    /// [`crate::Error::Device`] if no usable input device exists.
    fn start(&mut self) -> Result<FrameReceiver>;

    /// Release the device; no-op if not started
    fn stop(&mut self);
}

/// Sink for playback frames, fed by a synthesis session
///
/// Frames play strictly in feed order, back-to-back. `stop` discards any
/// queued-but-unplayed audio and releases the device.
pub trait PlaybackSink: Send {
    /// Open the output device, ready to accept frames
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Device`] if no usable output device exists.
    fn start(&mut self) -> Result<()>;

    /// Enqueue one frame for gapless playback
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Device`] if the device failed after
    /// acquisition or the sink was never started.
    fn feed(&mut self, frame: &[i16]) -> Result<()>;

    /// Samples queued but not yet played
    fn queued(&self) -> usize;

    /// Release the device, discarding queued audio; no-op if not started
    fn stop(&mut self);
}

/// Create a gated frame channel
///
/// The gate implements the capture stop barrier: [`FrameSender::close`]
/// makes the receiver yield `None` immediately, even for frames that were
/// already queued at close time.
#[must_use]
pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let open = Arc::new(AtomicBool::new(true));
    (
        FrameSender {
            tx,
            open: Arc::clone(&open),
        },
        FrameReceiver { rx, open },
    )
}

/// Producing half of the frame channel, held by the device thread
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<Pcm16Frame>,
    open: Arc<AtomicBool>,
}

impl FrameSender {
    /// Send a frame without blocking
    ///
    /// Returns false if the channel is closed, full, or the receiver is
    /// gone. The device callback must not block, so a full channel drops the
    /// frame rather than waiting.
    pub fn send(&self, frame: Pcm16Frame) -> bool {
        if !self.open.load(Ordering::Acquire) {
            return false;
        }
        self.tx.try_send(frame).is_ok()
    }

    /// Close the gate: the receiver yields no further frames
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        // Wake a receiver parked on an empty channel; if the channel is
        // full, it already has data to wake on.
        let _ = self.tx.try_send(Vec::new());
    }

    /// Whether the gate is still open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Consuming half of the frame channel, held by the session pump
pub struct FrameReceiver {
    rx: mpsc::Receiver<Pcm16Frame>,
    open: Arc<AtomicBool>,
}

impl FrameReceiver {
    /// Receive the next frame
    ///
    /// Returns `None` once the gate is closed (stop barrier) or every sender
    /// is dropped (device thread exited).
    pub async fn recv(&mut self) -> Option<Pcm16Frame> {
        if !self.open.load(Ordering::Acquire) {
            return None;
        }
        let frame = self.rx.recv().await?;
        if self.open.load(Ordering::Acquire) {
            Some(frame)
        } else {
            None
        }
    }
}
