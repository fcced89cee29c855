//! Insightflow reasoning provider adapters.
//!
//! Implements [`pipeline::ReasoningProvider`] over HTTP for Anthropic's
//! messages API and for any OpenAI-compatible chat-completions endpoint.
//! Further providers are added as new modules here without changes to the
//! `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response parsing
//! and status-to-error mapping live here. The [`pipeline`] crate sees only
//! [`pipeline::ReasoningProvider`]; timeouts around whole calls, retries and
//! heuristic fallback belong to the reasoning gateway in `nodes`.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `LlmConfig`, `ProviderKind` |
//! | [`anthropic`] | `AnthropicProvider` |
//! | [`openai`] | `OpenAiProvider` |

pub mod anthropic;
pub mod config;
mod http;
pub mod openai;

use std::sync::Arc;

use pipeline::ReasoningProvider;
use thiserror::Error;

pub use anthropic::AnthropicProvider;
pub use config::{LlmConfig, ProviderKind};
pub use openai::OpenAiProvider;

/// Failure to construct a provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The configuration is unusable.
    #[error("invalid llm configuration: {message}")]
    InvalidConfig { message: String },
}

/// Builds the provider selected by `config`.
///
/// `api_key` is passed in by the caller; this crate never reads the
/// environment.
///
/// # Errors
///
/// [`LlmError::InvalidConfig`] for a blank model or key,
/// [`LlmError::Client`] if the HTTP client cannot be built.
pub fn provider_from_config(
    config: &LlmConfig,
    api_key: String,
) -> Result<Arc<dyn ReasoningProvider>, LlmError> {
    config.validate()?;
    if api_key.trim().is_empty() {
        return Err(LlmError::InvalidConfig {
            message: format!("{} is empty", config.api_key_env),
        });
    }
    Ok(match config.provider {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config, api_key)?),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config, api_key)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: ProviderKind) -> LlmConfig {
        LlmConfig {
            provider,
            model: "test-model".into(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn builds_the_configured_provider() {
        let anthropic = provider_from_config(&config(ProviderKind::Anthropic), "k".into()).unwrap();
        assert_eq!(anthropic.name(), "anthropic");
        let openai = provider_from_config(&config(ProviderKind::OpenAi), "k".into()).unwrap();
        assert_eq!(openai.name(), "openai");
    }

    #[test]
    fn blank_key_is_rejected() {
        let err = provider_from_config(&config(ProviderKind::Anthropic), " ".into()).err().unwrap();
        assert!(matches!(err, LlmError::InvalidConfig { .. }));
    }
}
