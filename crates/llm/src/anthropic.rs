//! Anthropic messages API.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{ProviderError, ReasoningProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::http::{malformed, retry_after, status_error, transport_error};
use crate::LlmError;

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Concatenates the text blocks of a messages response.
fn completion_text(body: &str) -> Result<String, ProviderError> {
    let response: MessagesResponse = serde_json::from_str(body).map_err(malformed)?;
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        return Err(malformed("response has no text content"));
    }
    Ok(text)
}

/// [`ReasoningProvider`] for `POST {base_url}/messages`.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: Client,
    url: String,
    api_key: String,
    config: LlmConfig,
}

impl AnthropicProvider {
    /// # Errors
    ///
    /// [`LlmError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().build()?,
            url: format!("{}/messages", config.base_url()),
            api_key,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ReasoningProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: self.config.system_prompt.as_deref(),
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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
        debug!(model = %self.config.model, bytes = body.len(), "anthropic completion received");
        completion_text(&body)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks_and_skips_others() {
        let body = r#"{
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "Title: Hubs"},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "Confidence: 80"}
            ],
            "stop_reason": "end_turn"
        }"#;
        assert_eq!(completion_text(body).unwrap(), "Title: Hubs\nConfidence: 80");
    }

    #[test]
    fn empty_or_invalid_bodies_are_malformed() {
        for body in [r#"{"content": []}"#, "not json", r#"{"content": [{"type": "text", "text": "  "}]}"#] {
            assert!(matches!(
                completion_text(body),
                Err(ProviderError::MalformedResponse { .. })
            ));
        }
    }

    #[test]
    fn request_omits_absent_system_prompt() {
        let request = MessagesRequest {
            model: "m",
            max_tokens: 10,
            temperature: 0.0,
            system: None,
            messages: [Message {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["content"], "hi");
    }
}
