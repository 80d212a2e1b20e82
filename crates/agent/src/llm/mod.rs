//! Generative-text backends.
//!
//! The backend only turns an assembled context into prose. It never decides
//! which resources exist or what they cost; that comes from the scanners and
//! the cost fetcher.

mod anthropic;
mod openai;
mod scripted;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloudscope_core::config::{LlmConfig, LlmProvider};
use cloudscope_core::retry::RetryPolicy;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
pub use scripted::ScriptedLlm;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} request failed: {message}")]
    Transport { provider: &'static str, message: String },
    #[error("{provider} returned HTTP {code}: {body}")]
    Status { provider: &'static str, code: u16, body: String },
    #[error("could not decode {provider} response: {message}")]
    Decode { provider: &'static str, message: String },
    #[error("{provider} returned an empty completion")]
    EmptyCompletion { provider: &'static str },
    #[error("llm configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Transport failures, rate limiting and server errors are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    fn from_reqwest(provider: &'static str, error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode { provider, message: error.to_string() }
        } else {
            Self::Transport { provider, message: error.to_string() }
        }
    }
}

/// Stateless chat completion.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Build the backend named in config, with retries and per-attempt timeouts.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    config.require_credentials().map_err(|error| LlmError::Configuration(error.to_string()))?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|error| LlmError::Configuration(error.to_string()))?;
    let retry = RetryPolicy::with_max_retries(config.max_retries);
    let api_key =
        config.api_key.as_ref().map(|key| key.expose_secret().to_owned()).unwrap_or_default();

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::OpenAi => Arc::new(
            OpenAiClient::new(http, api_key, &config.model)
                .with_base_url(config.base_url.as_deref())
                .with_retry(retry),
        ),
        LlmProvider::Ollama => Arc::new(
            OpenAiClient::compatible("ollama", http, &config.model)
                .with_base_url(config.base_url.as_deref())
                .with_retry(retry),
        ),
        LlmProvider::Anthropic => Arc::new(
            AnthropicClient::new(http, api_key, &config.model)
                .with_base_url(config.base_url.as_deref())
                .with_retry(retry),
        ),
    };
    Ok(client)
}

/// Read a non-success body for error reporting, bounded so a large HTML error
/// page does not end up in logs.
async fn error_body(response: reqwest::Response) -> String {
    const MAX_BODY: usize = 512;
    let body = response.text().await.unwrap_or_default();
    match body.char_indices().nth(MAX_BODY) {
        Some((index, _)) => format!("{}...", &body[..index]),
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use cloudscope_core::config::{AppConfig, LlmConfig, LlmProvider};

    use super::{client_from_config, LlmError};

    #[test]
    fn retryable_errors_are_transport_rate_limit_and_server_failures() {
        let transport = LlmError::Transport { provider: "openai", message: "reset".into() };
        let throttled = LlmError::Status { provider: "openai", code: 429, body: String::new() };
        let unavailable = LlmError::Status { provider: "openai", code: 503, body: String::new() };
        let bad_request = LlmError::Status { provider: "openai", code: 400, body: String::new() };
        let empty = LlmError::EmptyCompletion { provider: "openai" };

        assert!(transport.is_retryable());
        assert!(throttled.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!empty.is_retryable());
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let config = LlmConfig { api_key: None, ..AppConfig::default().llm };

        let error = client_from_config(&config).err().expect("missing key should fail");

        assert!(matches!(error, LlmError::Configuration(message) if message.contains("api_key")));
    }

    #[test]
    fn ollama_needs_only_a_base_url() {
        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            api_key: None,
            base_url: Some("http://localhost:11434/v1".to_owned()),
            model: "llama3".to_owned(),
            ..AppConfig::default().llm
        };

        let client = client_from_config(&config).expect("ollama client");

        assert_eq!(client.name(), "ollama");
    }
}
