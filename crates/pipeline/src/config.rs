//! Configuration surface consumed by the core.
//!
//! [`ReportingConfig`] is an immutable value built once at process start (the
//! CLI deserialises it from the `[reporting]` table of its TOML file) and then
//! threaded through every capability unit behind an `Arc`. Nothing in the core
//! reads the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Confidence;

/// Invalid configuration value. Produced at load time; a run never starts with
/// an invalid configuration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid configuration: {message}")]
pub struct ConfigError {
    /// Description of the problem.
    pub message: String,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Options recognised by the core. Effects are exactly as named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportingConfig {
    /// Delegate interpretation to the reasoning capability. When `false`,
    /// every unit runs its heuristic directly.
    pub use_llm_interpretation: bool,

    /// Insights below this confidence receive the low-confidence penalty.
    pub min_confidence: f64,

    /// Issue a preliminary reasoning pass whose output feeds the insight
    /// completion.
    pub use_reasoning_chain: bool,

    /// Upper bound on insights retained per report.
    pub max_insights_per_report: usize,

    /// Timeout for each reasoning call, in seconds.
    pub llm_timeout_seconds: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            use_llm_interpretation: true,
            min_confidence: 0.5,
            use_reasoning_chain: false,
            max_insights_per_report: 5,
            llm_timeout_seconds: 30,
        }
    }
}

impl ReportingConfig {
    /// Checks every field against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first offending field.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if Confidence::new(self.min_confidence).is_none() {
            return Err(ConfigError::new(format!(
                "min_confidence must be between 0.0 and 1.0, got {}",
                self.min_confidence
            )));
        }
        if self.max_insights_per_report < 1 {
            return Err(ConfigError::new(format!(
                "max_insights_per_report must be >= 1, got {}",
                self.max_insights_per_report
            )));
        }
        if self.llm_timeout_seconds < 1 {
            return Err(ConfigError::new(format!(
                "llm_timeout_seconds must be >= 1, got {}",
                self.llm_timeout_seconds
            )));
        }
        Ok(self)
    }

    /// The per-call reasoning timeout.
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_seconds)
    }

    /// `min_confidence` as a [`Confidence`]. Only meaningful after
    /// [`validated`](Self::validated); out-of-range values are clamped.
    pub fn min_confidence(&self) -> Confidence {
        Confidence::clamped(self.min_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ReportingConfig::default().validated().unwrap();
        assert_eq!(config.min_confidence, 0.5);
        assert_eq!(config.llm_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad_confidence = ReportingConfig {
            min_confidence: 1.5,
            ..ReportingConfig::default()
        };
        assert!(bad_confidence.validated().is_err());

        let no_insights = ReportingConfig {
            max_insights_per_report: 0,
            ..ReportingConfig::default()
        };
        assert!(no_insights.validated().is_err());

        let no_timeout = ReportingConfig {
            llm_timeout_seconds: 0,
            ..ReportingConfig::default()
        };
        assert!(no_timeout.validated().is_err());
    }

    #[test]
    fn partial_tables_fill_in_defaults() {
        let config: ReportingConfig =
            serde_json::from_str(r#"{ "max_insights_per_report": 3 }"#).unwrap();
        assert_eq!(config.max_insights_per_report, 3);
        assert!(config.use_llm_interpretation);
    }
}
