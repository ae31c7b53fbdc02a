//! Batch processing collaborator
//!
//! Fire-and-forget trigger for the service's spreadsheet post-processing of
//! a recorded task directory. The result is opaque to this client; error
//! responses surface the server's `detail` message.

use serde::Serialize;

use crate::{Error, Result};

/// Request body for the batch endpoint
#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    task_dir: &'a str,
}

/// Error body shape returned by the batch endpoint
#[derive(Debug, serde::Deserialize)]
struct BatchErrorBody {
    detail: Option<String>,
}

/// Triggers batch processing on the service
pub struct BatchClient {
    client: reqwest::Client,
    url: String,
}

impl BatchClient {
    /// Create a client for the service at `api_url`
    #[must_use]
    pub fn new(api_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/ai-process-excel", api_url.trim_end_matches('/')),
        }
    }

    /// Trigger processing, optionally scoped to one task directory
    ///
    /// Returns the server's opaque result object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Batch`] with the server's `detail` message on a
    /// non-success response, or the underlying HTTP error.
    pub async fn process(&self, task_dir: Option<&str>) -> Result<serde_json::Value> {
        let request = self.client.post(&self.url);
        let request = match task_dir {
            Some(task_dir) => request.json(&BatchRequest { task_dir }),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let detail = response
                .json::<BatchErrorBody>()
                .await
                .ok()
                .and_then(|body| body.detail)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(Error::Batch(detail));
        }

        let result = response.json().await?;
        tracing::info!(task_dir = ?task_dir, "batch processing triggered");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_cleanly() {
        let client = BatchClient::new("http://localhost:8000/");
        assert!(client.url.ends_with("/ai-process-excel"));
        assert!(!client.url.contains("//ai"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(BatchRequest { task_dir: "2024_01_02_03_04_05" }).unwrap();
        assert_eq!(body, serde_json::json!({ "task_dir": "2024_01_02_03_04_05" }));
    }
}
