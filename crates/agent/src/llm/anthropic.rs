use async_trait::async_trait;
use cloudscope_core::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_body, ChatRole, CompletionRequest, LlmClient, LlmError};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "anthropic";

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, model: &str) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: model.to_owned(),
            retry: RetryPolicy::none(),
        }
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

    async fn send_once(&self, body: &MessagesRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|error| LlmError::from_reqwest(PROVIDER, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status {
                provider: PROVIDER,
                code: status.as_u16(),
                body: error_body(response).await,
            });
        }

        let parsed: MessagesResponse =
            response.json().await.map_err(|error| LlmError::from_reqwest(PROVIDER, error))?;
        if let Some(usage) = &parsed.usage {
            debug!(
                event_name = "llm.completion.usage",
                provider = PROVIDER,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "completion token usage"
            );
        }
        joined_text(parsed)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = messages_request(&self.model, request);
        self.retry.run(PROVIDER, || self.send_once(&body), LlmError::is_retryable).await
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<TurnMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct TurnMessage<'a> {
    role: ChatRole,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// System prompts travel in their own field; the remaining turns keep their order.
fn messages_request<'a>(model: &'a str, request: &'a CompletionRequest) -> MessagesRequest<'a> {
    let system = request
        .messages
        .iter()
        .filter(|message| message.role == ChatRole::System)
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>();

    MessagesRequest {
        model,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        messages: request
            .messages
            .iter()
            .filter(|message| message.role != ChatRole::System)
            .map(|message| TurnMessage { role: message.role, content: &message.content })
            .collect(),
    }
}

fn joined_text(response: MessagesResponse) -> Result<String, LlmError> {
    let text = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        return Err(LlmError::EmptyCompletion { provider: PROVIDER });
    }
    Ok(text)
}
