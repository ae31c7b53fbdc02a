//! Finalized-transcript persistence
//!
//! Triggered by the recognition session each time a segment is finalized:
//! the full updated log is written as a JSON array to a fixed local file,
//! and optionally mirrored to the service's `/api/results` endpoint. Both
//! writes are best-effort side effects — failures are logged and never
//! propagate into the session.

use std::path::{Path, PathBuf};

use crate::session::transcript::TranscriptSegment;

/// Persists the finalized-segment log
pub struct ResultsStore {
    path: PathBuf,
    mirror_url: Option<String>,
    client: reqwest::Client,
}

impl ResultsStore {
    /// Create a store writing to `path`, optionally mirroring to `mirror_url`
    #[must_use]
    pub fn new(path: PathBuf, mirror_url: Option<String>) -> Self {
        Self {
            path,
            mirror_url,
            client: reqwest::Client::new(),
        }
    }

    /// The local file the log is written to
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the full log, replacing any previous contents
    pub async fn save(&self, segments: &[TranscriptSegment]) {
        match serde_json::to_vec_pretty(segments) {
            Ok(json) => {
                if let Some(parent) = self.path.parent() {
                    let _ = tokio::fs::create_dir_all(parent).await;
                }
                if let Err(e) = tokio::fs::write(&self.path, json).await {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to persist results");
                } else {
                    tracing::debug!(
                        path = %self.path.display(),
                        segments = segments.len(),
                        "results persisted"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize results");
                return;
            }
        }

        if let Some(url) = &self.mirror_url {
            self.mirror(url, segments).await;
        }
    }

    /// Best-effort mirror to the service
    async fn mirror(&self, url: &str, segments: &[TranscriptSegment]) {
        let body = serde_json::json!({ "results": segments });
        match self.client.post(url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(url, "results mirrored to server");
            }
            Ok(response) => {
                tracing::warn!(url, status = %response.status(), "server rejected results mirror");
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to mirror results");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(idx: u64, text: &str, start_time: f64) -> TranscriptSegment {
        TranscriptSegment {
            idx,
            text: text.to_string(),
            start_time,
        }
    }

    #[tokio::test]
    async fn test_save_writes_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let store = ResultsStore::new(path.clone(), None);

        store
            .save(&[segment(0, "hello", 0.5), segment(1, "world", 2.0)])
            .await;

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["text"], "hello");
        assert_eq!(parsed[1]["idx"], 1);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let store = ResultsStore::new(path.clone(), None);

        store.save(&[segment(0, "first", 0.0)]).await;
        store.save(&[segment(0, "first", 0.0), segment(1, "second", 1.0)]).await;

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("results.json");
        let store = ResultsStore::new(path.clone(), None);

        store.save(&[segment(0, "x", 0.0)]).await;
        assert!(path.exists());
    }
}
