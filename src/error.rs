//! Error types for voicewire

use thiserror::Error;

/// Result type alias for voicewire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in voicewire
///
/// Every failure is local to one session instance: there is no automatic
/// reconnect or retry anywhere in the client, and a failed session must be
/// explicitly restarted by the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device access denied (fatal to the attempted session, no retry)
    #[error("permission denied: {0}")]
    Permission(String),

    /// Audio device failure after acquisition
    #[error("device error: {0}")]
    Device(String),

    /// Connection failed to open or failed mid-stream
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed or unexpected message from the remote service
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid session lifecycle call (e.g. re-entrant start)
    #[error("session error: {0}")]
    Session(String),

    /// Batch processing collaborator error
    #[error("batch error: {0}")]
    Batch(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
