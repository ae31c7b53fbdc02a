//! Bidirectional message transport
//!
//! A transport carries binary (audio) and textual (control/event) messages
//! over one full-duplex connection. Sessions never touch a socket directly:
//! they hold the channel halves produced by a [`Connector`], so the same
//! session logic runs against the WebSocket implementation or an in-process
//! peer in tests.
//!
//! Each session opens its own transport and owns its lifecycle exclusively;
//! dropping the [`MessageSender`] closes the connection.

mod ws;

pub use ws::WsConnector;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Error, Result};

/// Messages buffered in each direction
const CHANNEL_CAPACITY: usize = 64;

/// An event delivered by the transport to its owning session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Textual control/event message
    Text(String),
    /// Binary audio message
    Binary(Vec<u8>),
    /// Connection closed cleanly by the remote end
    Closed,
    /// Connection failed mid-stream
    Failed(String),
}

/// A message queued by the session for the remote end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Textual message
    Text(String),
    /// Binary message
    Binary(Vec<u8>),
}

/// Opens transports to the remote service, one per session
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a transport to the endpoint at `path` (e.g. `/asr`)
    ///
    /// Suspends until the connection is established or fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the connection cannot be opened.
    async fn connect(&self, path: &str) -> Result<TransportChannel>;
}

/// The session-side halves of an open transport
#[derive(Debug)]
pub struct TransportChannel {
    /// Outgoing message handle
    pub sender: MessageSender,
    /// Incoming event stream
    pub events: EventStream,
}

impl TransportChannel {
    /// Split into independently owned halves
    #[must_use]
    pub fn split(self) -> (MessageSender, EventStream) {
        (self.sender, self.events)
    }
}

/// Sends messages to the remote end; dropping it closes the connection
#[derive(Clone, Debug)]
pub struct MessageSender {
    tx: mpsc::Sender<Outbound>,
}

impl MessageSender {
    /// Send a textual message
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the connection is closed.
    pub async fn send_text(&self, text: impl Into<String> + Send) -> Result<()> {
        self.send(Outbound::Text(text.into())).await
    }

    /// Send a binary message
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the connection is closed.
    pub async fn send_binary(&self, bytes: Vec<u8>) -> Result<()> {
        self.send(Outbound::Binary(bytes)).await
    }

    async fn send(&self, out: Outbound) -> Result<()> {
        self.tx
            .send(out)
            .await
            .map_err(|_| Error::Transport("connection closed".to_string()))
    }
}

/// Receives transport events, in delivery order
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<TransportEvent>,
}

impl EventStream {
    /// Next event; `None` once the transport side is gone
    pub async fn next(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// The transport-side halves, driven by a connector implementation or a test
pub struct TransportPeer {
    /// Pushes events to the session side
    pub events: EventEmitter,
    /// Observes messages the session sends
    pub outbound: OutboundStream,
}

/// Pushes events toward the owning session
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<TransportEvent>,
}

impl EventEmitter {
    /// Deliver an event; returns false if the session side is gone
    pub async fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

/// Drains messages queued by the session
pub struct OutboundStream {
    rx: mpsc::Receiver<Outbound>,
}

impl OutboundStream {
    /// Next outgoing message; `None` once the session dropped its sender
    pub async fn next(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }
}

/// Create a connected channel/peer pair
#[must_use]
pub fn channel() -> (TransportChannel, TransportPeer) {
    let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        TransportChannel {
            sender: MessageSender { tx: out_tx },
            events: EventStream { rx: event_rx },
        },
        TransportPeer {
            events: EventEmitter { tx: event_tx },
            outbound: OutboundStream { rx: out_rx },
        },
    )
}
