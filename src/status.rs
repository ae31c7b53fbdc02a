//! System status collaborator
//!
//! Purely informational: `GET /api/system/status` on a fixed interval, with
//! a degraded snapshot reported when the service is unreachable. Nothing in
//! the streaming core depends on this.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::Result;

/// Default polling cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// One status snapshot from the service
#[derive(Debug, Clone, Deserialize)]
pub struct SystemStatus {
    /// Human-readable connection description
    pub api_connection: String,
    /// Whether the service's upstream API connection is healthy
    pub api_connection_status: bool,
}

impl SystemStatus {
    /// The snapshot reported when the status endpoint is unreachable
    #[must_use]
    pub fn degraded() -> Self {
        Self {
            api_connection: "Error".to_string(),
            api_connection_status: false,
        }
    }
}

/// Polls the service's status endpoint
pub struct StatusClient {
    client: reqwest::Client,
    url: String,
}

impl StatusClient {
    /// Create a client for the service at `api_url`
    #[must_use]
    pub fn new(api_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/api/system/status", api_url.trim_end_matches('/')),
        }
    }

    /// Fetch one status snapshot
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is malformed.
    pub async fn fetch(&self) -> Result<SystemStatus> {
        let status = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(status)
    }

    /// Fetch one snapshot, degrading instead of failing
    pub async fn snapshot(&self) -> SystemStatus {
        match self.fetch().await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "status check failed");
                SystemStatus::degraded()
            }
        }
    }

    /// Spawn a fixed-interval poller; the task exits when the receiver is
    /// dropped
    #[must_use]
    pub fn spawn_poller(self, interval: Duration) -> mpsc::Receiver<SystemStatus> {
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let snapshot = self.snapshot().await;
                if tx.send(snapshot).await.is_err() {
                    break;
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_snapshot() {
        let status = SystemStatus::degraded();
        assert_eq!(status.api_connection, "Error");
        assert!(!status.api_connection_status);
    }

    #[test]
    fn test_status_shape() {
        let status: SystemStatus = serde_json::from_str(
            r#"{"api_connection":"Connected","api_connection_status":true}"#,
        )
        .unwrap();
        assert_eq!(status.api_connection, "Connected");
        assert!(status.api_connection_status);
    }

    #[test]
    fn test_url_joins_cleanly() {
        let client = StatusClient::new("http://localhost:8000/");
        assert!(client.url.ends_with("/api/system/status"));
        assert!(!client.url.contains("//api"));
    }
}
