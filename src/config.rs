//! Configuration
//!
//! Defaults plus an optional TOML overlay at
//! `~/.config/voicewire/config.toml`. All file fields are optional — the
//! file is a partial overlay on top of defaults, and a malformed file warns
//! and falls back rather than failing startup.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::session::transcript::StopPolicy;
use crate::{Error, Result, audio, status};

/// Default WebSocket base URL of the speech service
const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8000";

/// Default HTTP base URL of the speech service
const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket base URL (`/asr` and `/tts` are joined onto this)
    pub server_url: String,
    /// HTTP base URL for the status/results/batch collaborators
    pub api_url: String,
    /// Samples per capture frame
    pub frame_samples: usize,
    /// What to do with an in-progress segment at stop time
    pub stop_policy: StopPolicy,
    /// Status polling cadence
    pub status_interval: Duration,
    /// Mirror the finalized log to the service's `/api/results`
    pub mirror_results: bool,
    /// Local file the finalized log is persisted to
    pub results_path: PathBuf,
    /// Data directory for this client
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration: defaults, then the TOML overlay, then CLI/env
    /// URL overrides
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no home directory can be determined.
    pub fn load(server_url: Option<&str>, api_url: Option<&str>) -> Result<Self> {
        let mut config = Self::resolve(&load_config_file())?;
        if let Some(url) = server_url {
            config.server_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = api_url {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }

    /// Resolve a file overlay against defaults
    fn resolve(file: &ConfigFile) -> Result<Self> {
        let data_dir = directories::BaseDirs::new()
            .map(|dirs| dirs.data_dir().join("voicewire"))
            .ok_or_else(|| Error::Config("could not determine data directory".to_string()))?;

        let results_path = file
            .results
            .path
            .clone()
            .map_or_else(|| data_dir.join("results.json"), PathBuf::from);

        Ok(Self {
            server_url: file
                .server
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_url: file
                .server
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            frame_samples: file.audio.frame_samples.unwrap_or(audio::FRAME_SAMPLES),
            stop_policy: file.session.stop_policy.unwrap_or_default(),
            status_interval: file
                .status
                .interval_secs
                .map_or(status::DEFAULT_POLL_INTERVAL, Duration::from_secs),
            mirror_results: file.results.mirror.unwrap_or(false),
            results_path,
            data_dir,
        })
    }
}

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    /// Speech service endpoints
    #[serde(default)]
    server: ServerFileConfig,

    /// Audio pipeline tuning
    #[serde(default)]
    audio: AudioFileConfig,

    /// Session behavior
    #[serde(default)]
    session: SessionFileConfig,

    /// Status polling
    #[serde(default)]
    status: StatusFileConfig,

    /// Results persistence
    #[serde(default)]
    results: ResultsFileConfig,
}

/// Endpoint configuration
#[derive(Debug, Default, Deserialize)]
struct ServerFileConfig {
    /// WebSocket base URL
    url: Option<String>,
    /// HTTP base URL
    api_url: Option<String>,
}

/// Audio configuration
#[derive(Debug, Default, Deserialize)]
struct AudioFileConfig {
    /// Samples per capture frame
    frame_samples: Option<usize>,
}

/// Session configuration
#[derive(Debug, Default, Deserialize)]
struct SessionFileConfig {
    /// `finalize_partial` or `discard_partial`
    stop_policy: Option<StopPolicy>,
}

/// Status polling configuration
#[derive(Debug, Default, Deserialize)]
struct StatusFileConfig {
    /// Polling interval in seconds
    interval_secs: Option<u64>,
}

/// Results persistence configuration
#[derive(Debug, Default, Deserialize)]
struct ResultsFileConfig {
    /// Override for the results file path
    path: Option<String>,
    /// Mirror the log to the service
    mirror: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns defaults if the file doesn't exist or can't be parsed.
fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voicewire/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voicewire").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::resolve(&ConfigFile::default()).unwrap();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.frame_samples, audio::FRAME_SAMPLES);
        assert_eq!(config.stop_policy, StopPolicy::FinalizePartial);
        assert_eq!(config.status_interval, status::DEFAULT_POLL_INTERVAL);
        assert!(!config.mirror_results);
        assert!(config.results_path.ends_with("results.json"));
    }

    #[test]
    fn test_overlay_applies() {
        let file: ConfigFile = toml::from_str(
            r#"
            [server]
            url = "ws://speech.local:9000/"

            [session]
            stop_policy = "discard_partial"

            [audio]
            frame_samples = 800

            [status]
            interval_secs = 5

            [results]
            mirror = true
            "#,
        )
        .unwrap();

        let config = Config::resolve(&file).unwrap();
        assert_eq!(config.server_url, "ws://speech.local:9000");
        assert_eq!(config.stop_policy, StopPolicy::DiscardPartial);
        assert_eq!(config.frame_samples, 800);
        assert_eq!(config.status_interval, Duration::from_secs(5));
        assert!(config.mirror_results);
    }

    #[test]
    fn test_partial_overlay_keeps_defaults() {
        let file: ConfigFile = toml::from_str("[server]\napi_url = \"http://host:1\"\n").unwrap();
        let config = Config::resolve(&file).unwrap();
        assert_eq!(config.api_url, "http://host:1");
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.frame_samples, audio::FRAME_SAMPLES);
    }
}
