use async_trait::async_trait;
use cloudscope_core::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_body, ChatMessage, CompletionRequest, LlmClient, LlmError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions client for OpenAI and API-compatible servers such as Ollama.
pub struct OpenAiClient {
    name: &'static str,
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, model: &str) -> Self {
        Self {
            name: "openai",
            http,
            api_key: Some(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: model.to_owned(),
            retry: RetryPolicy::none(),
        }
    }

    /// A keyless client for a local server speaking the same protocol.
    pub fn compatible(name: &'static str, http: reqwest::Client, model: &str) -> Self {
        Self { name, api_key: None, ..Self::new(http, String::new(), model) }
    }

    pub fn with_base_url(mut self, base_url: Option<&str>) -> Self {
        if let Some(base_url) = base_url.filter(|value| !value.trim().is_empty()) {
            self.base_url = base_url.trim_end_matches('/').to_owned();
        }
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send_once(&self, body: &ChatRequest<'_>) -> Result<String, LlmError> {
        let mut builder = self.http.post(self.endpoint()).json(body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response =
            builder.send().await.map_err(|error| LlmError::from_reqwest(self.name, error))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status {
                provider: self.name,
                code: status.as_u16(),
                body: error_body(response).await,
            });
        }

        let parsed: ChatResponse =
            response.json().await.map_err(|error| LlmError::from_reqwest(self.name, error))?;
        if let Some(usage) = &parsed.usage {
            debug!(
                event_name = "llm.completion.usage",
                provider = self.name,
                total_tokens = usage.total_tokens,
                "completion token usage"
            );
        }
        first_choice(self.name, parsed)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        self.retry.run(self.name, || self.send_once(&body), LlmError::is_retryable).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

fn first_choice(provider: &'static str, response: ChatResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(LlmError::EmptyCompletion { provider })
}
