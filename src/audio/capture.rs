//! Audio capture from microphone
//!
//! The cpal stream is owned by a dedicated thread (`cpal::Stream` is not
//! `Send`); frames cross to the session pump through the gated frame
//! channel. The hardware callback only accumulates, converts, and does a
//! non-blocking send.

use std::sync::mpsc as std_mpsc;
use std::thread;

use cpal::SampleRate;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::{CaptureSource, FrameReceiver, FrameSender, SAMPLE_RATE, convert, frame_channel};
use crate::{Error, Result};

/// Captures audio from the default input device at 16 kHz mono
pub struct MicCapture {
    frame_samples: usize,
    sender: Option<FrameSender>,
    shutdown: Option<std_mpsc::Sender<()>>,
}

impl MicCapture {
    /// Create a capture pipeline producing frames of `frame_samples` samples
    #[must_use]
    pub fn new(frame_samples: usize) -> Self {
        Self {
            frame_samples,
            sender: None,
            shutdown: None,
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.sender.is_some()
    }
}

impl Default for MicCapture {
    fn default() -> Self {
        Self::new(super::FRAME_SAMPLES)
    }
}

impl CaptureSource for MicCapture {
    fn start(&mut self) -> Result<FrameReceiver> {
        if self.sender.is_some() {
            return Err(Error::Session("capture already started".to_string()));
        }

        let (sender, receiver) = frame_channel();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let frame_samples = self.frame_samples;
        let thread_sender = sender.clone();

        thread::Builder::new()
            .name("voicewire-capture".to_string())
            .spawn(move || run_device(frame_samples, &thread_sender, &ready_tx, &stop_rx))
            .map_err(|e| Error::Device(format!("failed to spawn capture thread: {e}")))?;

        // One resolvable step: start() suspends until the device is acquired
        // or access is denied.
        ready_rx
            .recv()
            .map_err(|_| Error::Device("capture thread exited during setup".to_string()))??;

        self.sender = Some(sender);
        self.shutdown = Some(stop_tx);

        tracing::debug!(frame_samples, "audio capture started");
        Ok(receiver)
    }

    fn stop(&mut self) {
        // Close the gate before releasing the device so no frame, queued or
        // in flight, is observed after stop() returns.
        if let Some(sender) = self.sender.take() {
            sender.close();
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            tracing::debug!("audio capture stopped");
        }
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Device-thread body: acquire the input stream, report readiness, then park
/// until stopped
fn run_device(
    frame_samples: usize,
    sender: &FrameSender,
    ready_tx: &std_mpsc::Sender<Result<()>>,
    stop_rx: &std_mpsc::Receiver<()>,
) {
    let stream = match open_input_stream(frame_samples, sender.clone()) {
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

    // Parked here until stop() signals or the owner is dropped; the stream
    // lives exactly as long as this frame.
    let _ = stop_rx.recv();
}

/// Open the default input device at 16 kHz mono and wire its callback to the
/// frame channel
fn open_input_stream(frame_samples: usize, sender: FrameSender) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Device("no input device available".to_string()))?;

    // Config enumeration is where OS-level microphone denial surfaces.
    let supported_config = device
        .supported_input_configs()
        .map_err(|e| Error::Permission(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| Error::Device("no suitable input config found".to_string()))?;

    let config = supported_config
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        channels = config.channels,
        "audio capture initialized"
    );

    let error_sender = sender.clone();
    let mut pending: Vec<f32> = Vec::with_capacity(frame_samples * 2);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                pending.extend_from_slice(data);
                while pending.len() >= frame_samples {
                    let frame: Vec<f32> = pending.drain(..frame_samples).collect();
                    let pcm = convert::float_to_pcm16(&frame);
                    if !sender.send(pcm) && sender.is_open() {
                        tracing::warn!("frame channel full, dropping capture frame");
                    }
                }
            },
            move |err| {
                tracing::error!(error = %err, "audio capture error");
                // Device failure after acquisition tears the session down the
                // same way a transport failure does.
                error_sender.close();
            },
            None,
        )
        .map_err(|e| Error::Permission(e.to_string()))?;

    Ok(stream)
}
