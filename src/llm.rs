//! Chat-completions client for OpenAI-compatible providers
//!
//! The external text-generation service is an opaque collaborator: plain
//! request/response calls, no streaming, timeouts left to the HTTP client
//! defaults. All higher layers talk to the [`LanguageModel`] trait so tests
//! can substitute a mock.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Errors produced by the chat-completions client
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("API returned no choices")]
    EmptyResponse,
}

/// Configuration for a chat-completions API provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL for the API (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Extra headers to include in requests
    pub extra_headers: Vec<(String, String)>,
}

impl ProviderConfig {
    /// Create an OpenAI provider configuration
    pub fn openai(api_key: String) -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            api_key,
            extra_headers: Vec::new(),
        }
    }

    /// Create a provider configuration with a custom base URL
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            base_url,
            api_key,
            extra_headers: Vec::new(),
        }
    }
}

/// A single chat message in API wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

impl From<&crate::types::Message> for ChatMessage {
    fn from(msg: &crate::types::Message) -> Self {
        Self {
            role: msg.role.to_openai_string().to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
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

/// Seam used by hints, analysis, exercise generation and the dialog flow.
///
/// `generate` is a single-prompt call; `chat` carries the full message
/// history for the role-play dialog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;
    async fn chat(&self, messages: Vec<ChatMessage>, temperature: f32) -> Result<String>;
}

/// Chat-completions API client
#[derive(Clone)]
pub struct ChatClient {
    client: Arc<Client>,
    provider: ProviderConfig,
    /// Model used when callers go through the [`LanguageModel`] seam
    default_model: String,
}

impl ChatClient {
    /// Create a new client for the default OpenAI endpoint
    pub fn new(api_key: String) -> Self {
        Self::with_provider(ProviderConfig::openai(api_key), None)
    }

    /// Create a client with a specific provider configuration
    pub fn with_provider(provider: ProviderConfig, default_model: Option<String>) -> Self {
        Self {
            client: Arc::new(Client::new()),
            provider,
            default_model: default_model.unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
        }
    }

    /// Create a client from config, resolving the API key from the keyring
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let api_key = crate::secrets::get_api_key()?;
        let provider = ProviderConfig::with_base_url(api_key, config.llm.base_url.clone());
        Ok(Self::with_provider(provider, Some(config.llm.helper_model.clone())))
    }

    /// Get the provider configuration
    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Run a chat completion and return the first choice's content
    pub async fn complete(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        temperature: Option<f32>,
    ) -> Result<String> {
        let request = ChatRequest {
            model: model.to_string(),
            messages,
            temperature,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.provider.base_url))
            .bearer_auth(&self.provider.api_key)
            .json(&request);

        for (name, value) in &self.provider.extra_headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .context("Failed to reach the chat-completions API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat-completions response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        Ok(content)
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let messages = vec![ChatMessage::user(prompt)];
        self.complete(&self.default_model, messages, Some(temperature))
            .await
    }

    async fn chat(&self, messages: Vec<ChatMessage>, temperature: f32) -> Result<String> {
        self.complete(&self.default_model, messages, Some(temperature))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_constructors() {
        assert_eq!(ChatMessage::system("a").role, "system");
        assert_eq!(ChatMessage::user("b").role, "user");
        assert_eq!(ChatMessage::assistant("c").role, "assistant");
    }

    #[test]
    fn test_request_serialization_skips_empty_temperature() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![ChatMessage::user("hi")],
            temperature: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn test_message_conversion() {
        let msg = crate::types::Message::new(crate::types::Role::Assistant, "hello");
        let wire: ChatMessage = (&msg).into();
        assert_eq!(wire.role, "assistant");
        assert_eq!(wire.content, "hello");
    }
}
