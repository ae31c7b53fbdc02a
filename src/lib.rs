//! Voicewire - Real-time bidirectional voice streaming client
//!
//! This library provides the core functionality for the voicewire client:
//! - Microphone capture streamed to a speech-recognition endpoint with
//!   incremental transcript handling
//! - Text sent to a speech-synthesis endpoint with streamed audio playback
//! - Thin clients for the service's status, results, and batch endpoints
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Caller                          │
//! │        start/stop  │  updates  │  accessors          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Sessions                          │
//! │  Recognition (mic → /asr)  │  Synthesis (/tts → spk) │
//! └──────┬──────────────────────────────────┬───────────┘
//!        │                                  │
//! ┌──────▼───────┐                  ┌───────▼───────┐
//! │    Audio     │                  │   Transport   │
//! │ capture/play │  ←─ convert ─→   │  (WebSocket)  │
//! └──────────────┘                  └───────────────┘
//! ```
//!
//! Session logic reacts to three event sources — transport events, frame
//! deliveries, and caller start/stop calls — through channels, never raw
//! callbacks, so every state machine is testable without hardware or
//! sockets.

pub mod audio;
pub mod batch;
pub mod config;
pub mod error;
pub mod results;
pub mod session;
pub mod status;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use results::ResultsStore;
pub use session::{
    RecognitionSession, RecognitionState, RecognitionUpdate, Sessions, StopPolicy,
    SynthesisSession, SynthesisState, TranscriptSegment,
};
pub use status::{StatusClient, SystemStatus};
pub use transport::{Connector, TransportChannel, TransportEvent, WsConnector};
