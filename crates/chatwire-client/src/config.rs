//! Client configuration.
//!
//! Values come from defaults, a JSON file, or `CHATWIRE_*` environment
//! variables. The CLI layers its own flags on top.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClientError, Result};

/// Configuration for the chat backend client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base address of the backend (e.g., "http://127.0.0.1:8000").
    #[serde(default = "ClientConfig::default_base_url")]
    pub base_url: String,

    /// Total timeout for ordinary JSON calls, in seconds.
    #[serde(default = "ClientConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connect timeout, in seconds.
    #[serde(default = "ClientConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Per-read inactivity ceiling for streaming responses, in seconds.
    #[serde(default = "ClientConfig::default_stream_idle_timeout")]
    pub stream_idle_timeout_seconds: u64,

    /// Page size used when listing conversations.
    #[serde(default = "ClientConfig::default_conversation_page_size")]
    pub conversation_page_size: u32,

    /// Page size used when listing messages.
    #[serde(default = "ClientConfig::default_message_page_size")]
    pub message_page_size: u32,
}

impl ClientConfig {
    fn default_base_url() -> String {
        "http://127.0.0.1:8000".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    const fn default_stream_idle_timeout() -> u64 {
        300 // 5 minutes
    }

    const fn default_conversation_page_size() -> u32 {
        10
    }

    const fn default_message_page_size() -> u32 {
        30
    }

    /// Build a configuration pointing at `base_url`, everything else default.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `CHATWIRE_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if a timeout variable is not an integer.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("CHATWIRE_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(secs) = env_seconds("CHATWIRE_REQUEST_TIMEOUT")? {
            config.request_timeout_seconds = secs;
        }
        if let Some(secs) = env_seconds("CHATWIRE_STREAM_IDLE_TIMEOUT")? {
            config.stream_idle_timeout_seconds = secs;
        }

        tracing::debug!(
            base_url = %config.base_url,
            request_timeout = config.request_timeout_seconds,
            stream_idle_timeout = config.stream_idle_timeout_seconds,
            "Client configuration loaded from environment"
        );

        Ok(config)
    }

    /// Load configuration from a JSON file. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ClientError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get the stream inactivity ceiling as a `Duration`.
    #[must_use]
    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_seconds)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            stream_idle_timeout_seconds: Self::default_stream_idle_timeout(),
            conversation_page_size: Self::default_conversation_page_size(),
            message_page_size: Self::default_message_page_size(),
        }
    }
}

fn env_seconds(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ClientError::Config(format!("{name} must be a number of seconds"))),
        Err(_) => Ok(None),
    }
}
