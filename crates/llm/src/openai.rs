//! OpenAI-compatible chat completions.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{ProviderError, ReasoningProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::http::{malformed, retry_after, status_error, transport_error};
use crate::LlmError;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn completion_text(body: &str) -> Result<String, ProviderError> {
    let response: ChatResponse = serde_json::from_str(body).map_err(malformed)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| malformed("response has no message content"))
}

/// [`ReasoningProvider`] for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    url: String,
    api_key: String,
    config: LlmConfig,
}

impl OpenAiProvider {
    /// # Errors
    ///
    /// [`LlmError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().build()?,
            url: format!("{}/chat/completions", config.base_url()),
            api_key,
            config: config.clone(),
        })
    }

    fn messages<'a>(&'a self, prompt: &'a str) -> Vec<ChatMessage<'a>> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.config.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        messages
    }
}

#[async_trait]
impl ReasoningProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: self.messages(prompt),
        };
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&e, timeout))?;

        let status = response.status();
        let delay = retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&e, timeout))?;
        if !status.is_success() {
            return Err(status_error(status, delay, &body));
        }
        debug!(model = %self.config.model, bytes = body.len(), "chat completion received");
        completion_text(&body)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_choice() {
        let body = r#"{"choices": [
            {"index": 0, "message": {"role": "assistant", "content": "Domain: retail"}},
            {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
        ]}"#;
        assert_eq!(completion_text(body).unwrap(), "Domain: retail");
    }

    #[test]
    fn null_content_is_malformed() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        assert!(matches!(
            completion_text(body),
            Err(ProviderError::MalformedResponse { .. })
        ));
        assert!(completion_text(r#"{"choices": []}"#).is_err());
    }

    #[test]
    fn system_prompt_leads_the_messages() {
        let config = LlmConfig {
            model: "m".into(),
            system_prompt: Some("Be terse.".into()),
            ..LlmConfig::default()
        };
        let provider = OpenAiProvider::new(&config, "k".into()).unwrap();
        let roles: Vec<_> = provider.messages("hi").iter().map(|m| m.role).collect();
        assert_eq!(roles, ["system", "user"]);
    }
}
