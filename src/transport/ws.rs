//! WebSocket transport implementation
//!
//! Bridges a `tokio-tungstenite` socket onto the transport channel pair:
//! a writer task drains the session's outbound queue into the socket and a
//! reader task forwards socket messages as [`TransportEvent`]s.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::{Connector, Outbound, TransportChannel, TransportEvent, TransportPeer};
use crate::{Error, Result};

/// Connects to the speech service's WebSocket endpoints
pub struct WsConnector {
    base_url: String,
}

impl WsConnector {
    /// Create a connector for the given base URL (e.g. `ws://127.0.0.1:8000`)
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// The configured base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, path: &str) -> Result<TransportChannel> {
        let url = format!("{}{path}", self.base_url);

        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::Transport(format!("failed to open {url}: {e}")))?;

        tracing::debug!(url = %url, "websocket connected");

        let (mut sink, mut stream) = socket.split();
        let (channel, peer) = super::channel();
        let TransportPeer {
            events,
            mut outbound,
        } = peer;

        // Writer: session outbound queue -> socket. Exits when the session
        // drops its sender, then closes the socket.
        tokio::spawn(async move {
            while let Some(out) = outbound.next().await {
                let message = match out {
                    Outbound::Text(text) => Message::Text(text),
                    Outbound::Binary(bytes) => Message::Binary(bytes),
                };
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(error = %e, "websocket send failed");
                    return;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        });

        // Reader: socket -> session events.
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if !events.emit(TransportEvent::Text(text)).await {
                            return;
                        }
                    }
                    Ok(Message::Binary(bytes)) => {
                        if !events.emit(TransportEvent::Binary(bytes)).await {
                            return;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        let _ = events.emit(TransportEvent::Closed).await;
                        return;
                    }
                    // Pings are answered by tungstenite on the next flush.
                    Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                    Err(e) => {
                        let _ = events.emit(TransportEvent::Failed(e.to_string())).await;
                        return;
                    }
                }
            }
            let _ = events.emit(TransportEvent::Closed).await;
        });

        Ok(channel)
    }
}
