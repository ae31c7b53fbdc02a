//! Audio playback to speakers
//!
//! A dedicated thread owns the output stream; fed frames land in a shared
//! sample queue the device callback drains back-to-back, so consecutive
//! frames play gaplessly and underrun plays silence. Stopping discards
//! whatever is still queued.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use cpal::SampleRate;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::{PlaybackSink, SAMPLE_RATE, convert};
use crate::{Error, Result};

/// Plays 16 kHz mono PCM to the default output device
pub struct SpeakerOutput {
    queue: Arc<Mutex<VecDeque<f32>>>,
    failed: Arc<AtomicBool>,
    shutdown: Option<std_mpsc::Sender<()>>,
}

impl SpeakerOutput {
    /// Create a playback pipeline (device opens on `start`)
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            failed: Arc::new(AtomicBool::new(false)),
            shutdown: None,
        }
    }

    /// Samples queued but not yet played
    #[must_use]
    pub fn queued_samples(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}

impl Default for SpeakerOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSink for SpeakerOutput {
    fn start(&mut self) -> Result<()> {
        if self.shutdown.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let queue = Arc::clone(&self.queue);
        let failed = Arc::clone(&self.failed);
        failed.store(false, Ordering::Release);

        thread::Builder::new()
            .name("voicewire-playback".to_string())
            .spawn(move || run_device(&queue, &failed, &ready_tx, &stop_rx))
            .map_err(|e| Error::Device(format!("failed to spawn playback thread: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| Error::Device("playback thread exited during setup".to_string()))??;

        self.shutdown = Some(stop_tx);
        tracing::debug!("audio playback started");
        Ok(())
    }

    fn feed(&mut self, frame: &[i16]) -> Result<()> {
        if self.shutdown.is_none() {
            return Err(Error::Device("playback not started".to_string()));
        }
        if self.failed.load(Ordering::Acquire) {
            return Err(Error::Device("output device failed".to_string()));
        }

        let samples = convert::pcm16_to_float(frame);
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(samples);
        }
        Ok(())
    }

    fn queued(&self) -> usize {
        self.queued_samples()
    }

    fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // Queued-but-unplayed audio is discarded, not drained.
            if let Ok(mut queue) = self.queue.lock() {
                queue.clear();
            }
            let _ = shutdown.send(());
            tracing::debug!("audio playback stopped");
        }
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Device-thread body: acquire the output stream, report readiness, then
/// park until stopped
fn run_device(
    queue: &Arc<Mutex<VecDeque<f32>>>,
    failed: &Arc<AtomicBool>,
    ready_tx: &std_mpsc::Sender<Result<()>>,
    stop_rx: &std_mpsc::Receiver<()>,
) {
    let stream = match open_output_stream(queue, failed) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(Error::Device(e.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));
    let _ = stop_rx.recv();
}

/// Open the default output device at 16 kHz (mono preferred, stereo
/// fallback) pulling from the shared sample queue
fn open_output_stream(
    queue: &Arc<Mutex<VecDeque<f32>>>,
    failed: &Arc<AtomicBool>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Device("no output device available".to_string()))?;

    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Device(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
        })
        .ok_or_else(|| Error::Device("no suitable output config found".to_string()))?;

    let config = supported_config
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config();

    let channels = config.channels as usize;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        channels = config.channels,
        "audio playback initialized"
    );

    let callback_queue = Arc::clone(queue);
    let error_failed = Arc::clone(failed);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut queue = callback_queue.lock().unwrap();
                for frame in data.chunks_mut(channels) {
                    let sample = queue.pop_front().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            move |err| {
                tracing::error!(error = %err, "audio playback error");
                error_failed.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| Error::Device(e.to_string()))?;

    Ok(stream)
}
