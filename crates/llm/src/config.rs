//! The `[llm]` configuration section.

use serde::Deserialize;

use crate::LlmError;

/// Which wire protocol to speak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "anthropic")]
    Anthropic,
    /// Any endpoint that accepts OpenAI chat-completions requests.
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
        }
    }
}

/// Provider selection and request shaping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// Overrides [`ProviderKind::default_base_url`].
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key. Read by the
    /// binary, not by this crate.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Optional system prompt sent with every request.
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            model: String::new(),
            base_url: None,
            api_key_env: "ANTHROPIC_API_KEY".into(),
            max_tokens: 2048,
            temperature: 0.2,
            system_prompt: None,
        }
    }
}

impl LlmConfig {
    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// # Errors
    ///
    /// [`LlmError::InvalidConfig`] for a blank model or zero `max_tokens`.
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.model.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                message: "model must be set".into(),
            });
        }
        if self.max_tokens == 0 {
            return Err(LlmError::InvalidConfig {
                message: "max_tokens must be at least 1".into(),
            });
        }
        Ok(())
    }
}
