use crate::backend::{ChatMessage, CompletionRequest, GenerationBackend, ResponseFormat};
use crate::error::{GenerationError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error bodies are clipped to this many characters before being surfaced.
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base of an OpenAI-compatible API, e.g. `https://router.huggingface.co/v1`.
    pub base_url: String,
    pub model: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

/// Chat-completion client for OpenAI-compatible services.
pub struct HttpGenerationBackend {
    client: Client,
    endpoint: String,
    model: String,
    api_token: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpGenerationBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Request(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model: config.model,
            api_token: config.api_token,
            timeout: config.timeout,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify_send_error(&self, err: &reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.response_format,
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        log::debug!(
            "POST {} (model {}, max_tokens {})",
            self.endpoint,
            self.model,
            request.max_tokens
        );
        let response = builder
            .send()
            .await
            .map_err(|e| self.classify_send_error(&e))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(GenerationError::Auth(status.as_u16()))
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(GenerationError::RateLimited),
            _ if !status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                return Err(GenerationError::Status {
                    status: status.as_u16(),
                    body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
                });
            }
            _ => {}
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.timeout)
            } else {
                GenerationError::Malformed(e.to_string())
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Malformed("response has no message content".to_string()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}
