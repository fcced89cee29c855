//! The `[engine]` configuration section.

use std::time::Duration;

use serde::Deserialize;

/// Connection and polling settings for the analytics engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_url: String,
    /// Environment variable holding a bearer token, if the engine needs one.
    /// Read by the binary.
    pub api_token_env: Option<String>,
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for one job, submission included.
    pub max_wait_seconds: u64,
    /// Timeout for each individual HTTP request.
    pub request_timeout_seconds: u64,
    /// Rows kept from a completed job.
    pub max_results: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8529".into(),
            api_token_env: None,
            poll_interval_ms: 2_000,
            max_wait_seconds: 3_600,
            request_timeout_seconds: 30,
            max_results: 10_000,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }
}
