//! Shared test utilities
//!
//! Mock capture sources, playback sinks, and connectors so session state
//! machines run without audio hardware or sockets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use voicewire::audio::{
    CaptureSource, FrameReceiver, FrameSender, Pcm16Frame, PlaybackSink, frame_channel,
};
use voicewire::transport::{Connector, TransportChannel, TransportPeer};
use voicewire::{Error, Result};

/// Connector handing out in-process transport pairs; each `connect` delivers
/// its peer half (with the requested path) to the test
pub struct MockConnector {
    peers: mpsc::UnboundedSender<(String, TransportPeer)>,
}

impl MockConnector {
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(String, TransportPeer)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { peers: tx }), rx)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, path: &str) -> Result<TransportChannel> {
        let (channel, peer) = voicewire::transport::channel();
        self.peers
            .send((path.to_string(), peer))
            .map_err(|_| Error::Transport("test dropped peer receiver".to_string()))?;
        Ok(channel)
    }
}

/// Connector that refuses every connection
pub struct FailingConnector;

#[async_trait]
impl Connector for FailingConnector {
    async fn connect(&self, path: &str) -> Result<TransportChannel> {
        Err(Error::Transport(format!("connection refused: {path}")))
    }
}

/// Observable handle onto a [`MockCapture`], usable after the source moved
/// into a session
#[derive(Clone)]
pub struct CaptureHandle {
    sender: Arc<Mutex<Option<FrameSender>>>,
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl CaptureHandle {
    /// Push a frame as if the device produced it; false once the gate closed
    pub fn push(&self, frame: Pcm16Frame) -> bool {
        self.sender
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|s| s.send(frame))
    }

    /// Simulate a device failure: the frame channel ends
    pub fn fail(&self) {
        if let Some(sender) = self.sender.lock().unwrap().as_ref() {
            sender.close();
        }
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Hardware-free capture source
pub struct MockCapture {
    deny: bool,
    preset: Vec<Pcm16Frame>,
    handle: CaptureHandle,
}

impl MockCapture {
    #[must_use]
    pub fn new() -> Self {
        Self {
            deny: false,
            preset: Vec::new(),
            handle: CaptureHandle {
                sender: Arc::new(Mutex::new(None)),
                started: Arc::new(AtomicBool::new(false)),
                stopped: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Frames delivered immediately on start
    #[must_use]
    pub fn with_frames(mut self, frames: Vec<Pcm16Frame>) -> Self {
        self.preset = frames;
        self
    }

    /// Deny access, as an OS permission prompt would
    #[must_use]
    pub fn denied(mut self) -> Self {
        self.deny = true;
        self
    }

    #[must_use]
    pub fn handle(&self) -> CaptureHandle {
        self.handle.clone()
    }
}

impl CaptureSource for MockCapture {
    fn start(&mut self) -> Result<FrameReceiver> {
        if self.deny {
            return Err(Error::Permission("microphone access denied".to_string()));
        }

        let (sender, receiver) = frame_channel();
        for frame in self.preset.drain(..) {
            sender.send(frame);
        }
        *self.handle.sender.lock().unwrap() = Some(sender);
        self.handle.started.store(true, Ordering::Release);
        Ok(receiver)
    }

    fn stop(&mut self) {
        if let Some(sender) = self.handle.sender.lock().unwrap().take() {
            sender.close();
        }
        self.handle.stopped.store(true, Ordering::Release);
    }
}

/// Observable handle onto a [`MockSink`]
#[derive(Clone)]
pub struct SinkHandle {
    fed: Arc<Mutex<Vec<Pcm16Frame>>>,
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl SinkHandle {
    /// Every frame fed so far, in feed order
    pub fn fed(&self) -> Vec<Pcm16Frame> {
        self.fed.lock().unwrap().clone()
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Hardware-free playback sink recording everything fed to it
pub struct MockSink {
    fail_feed: bool,
    handle: SinkHandle,
}

impl MockSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fail_feed: false,
            handle: SinkHandle {
                fed: Arc::new(Mutex::new(Vec::new())),
                started: Arc::new(AtomicBool::new(false)),
                stopped: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Fail every feed, as a dead output device would
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_feed = true;
        self
    }

    #[must_use]
    pub fn handle(&self) -> SinkHandle {
        self.handle.clone()
    }
}

impl PlaybackSink for MockSink {
    fn start(&mut self) -> Result<()> {
        self.handle.started.store(true, Ordering::Release);
        Ok(())
    }

    fn feed(&mut self, frame: &[i16]) -> Result<()> {
        if self.fail_feed {
            return Err(Error::Device("output device failed".to_string()));
        }
        self.handle.fed.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    fn queued(&self) -> usize {
        0
    }

    fn stop(&mut self) {
        self.handle.stopped.store(true, Ordering::Release);
    }
}

/// Poll `condition` until it holds or the timeout elapses
pub async fn wait_for(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within timeout"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
