use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Errors raised while talking to the model endpoint
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("The model servers are currently busy. Please try again in a few moments.")]
    ServerBusy,

    #[error("Network connection failed: {message}")]
    NetworkError { message: String },

    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Request was cancelled")]
    Cancelled,

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {message}")]
    ParseError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl LlmError {
    pub fn is_server_busy(&self) -> bool {
        matches!(self, LlmError::ServerBusy)
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, LlmError::NetworkError { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::ApiError { status: 429, .. })
    }

    fn is_retryable(&self) -> bool {
        self.is_server_busy() || self.is_network_error() || self.is_rate_limited()
    }

    /// Short message for the terminal, without upstream detail
    pub fn user_message(&self) -> String {
        match self {
            LlmError::ServerBusy => {
                "🚫 The model servers are currently busy. Please try again in a few moments."
                    .to_string()
            }
            LlmError::NetworkError { .. } => {
                "🌐 Network connection failed. Please check your internet connection and try again."
                    .to_string()
            }
            LlmError::Timeout { seconds } => {
                format!(
                    "⏰ Request timed out after {} seconds. The server might be overloaded.",
                    seconds
                )
            }
            LlmError::Cancelled => "✋ Request cancelled.".to_string(),
            LlmError::ApiError { status: 429, .. } => {
                "🚫 Rate limit exceeded. Please wait a moment before trying again.".to_string()
            }
            LlmError::ApiError { status, .. } => {
                format!("❌ API error ({}). Please try again later.", status)
            }
            LlmError::ParseError { .. } => {
                "⚠️ The model did not return valid JSON. Please try again.".to_string()
            }
            LlmError::ConfigError { message } => {
                format!("⚙️ Configuration error: {}", message)
            }
        }
    }
}

/// One structured completion: a system prompt, the rendered user prompt and
/// the schema descriptor the answer must follow.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub schema: JsonValue,
    pub temperature: f32,
}

impl CompletionRequest {
    fn user_content(&self) -> String {
        format!(
            "{}\n\nRespond ONLY with a JSON value matching this schema. \
             Descriptions indicate the expected data; replace them with actual values.\n{}",
            self.prompt,
            serde_json::to_string_pretty(&self.schema).unwrap_or_else(|_| self.schema.to_string())
        )
    }
}

/// The model call seam. Every command goes through this trait so tests can
/// swap in a scripted provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<JsonValue, LlmError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Client for OpenAI-compatible chat completion endpoints (DeepSeek by default)
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    config: Config,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl ChatClient {
    pub fn new(config: Config) -> Result<Self, LlmError> {
        config.validate().map_err(|e| LlmError::ConfigError {
            message: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(concat!("consilio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmError::ConfigError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send chat messages with retry on busy servers, rate limits and network failures.
    pub async fn send_messages(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempts = 0;
        let mut backoff = Duration::from_millis(500);

        loop {
            match self.send_messages_once(messages.clone(), temperature).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_retryable() && attempts < max_attempts - 1 =>
                {
                    attempts += 1;
                    tracing::warn!(
                        "Request attempt {} failed: {}, retrying in {:?}",
                        attempts,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_messages_once(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
            max_tokens: self.config.max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.handle_error_response(status, response).await);
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse API response: {}", e),
            })?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ParseError {
                message: "No choices in API response".to_string(),
            })
    }

    fn map_reqwest_error(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            return LlmError::Timeout {
                seconds: self.config.timeout,
            };
        }

        if error.is_connect() {
            return LlmError::NetworkError {
                message: "Failed to connect to server".to_string(),
            };
        }

        if error.is_request() {
            return LlmError::NetworkError {
                message: "Request failed".to_string(),
            };
        }

        let error_msg = error.to_string().to_lowercase();
        if error_msg.contains("dns") {
            return LlmError::NetworkError {
                message: "DNS resolution failed".to_string(),
            };
        }

        LlmError::NetworkError {
            message: format!("Request error: {}", error),
        }
    }

    async fn handle_error_response(
        &self,
        status: StatusCode,
        response: reqwest::Response,
    ) -> LlmError {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match status {
            StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::BAD_GATEWAY
            | StatusCode::GATEWAY_TIMEOUT => LlmError::ServerBusy,
            _ => LlmError::ApiError {
                status: status.as_u16(),
                message: error_text,
            },
        }
    }
}

#[async_trait]
impl LlmProvider for ChatClient {
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<JsonValue, LlmError> {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: request.system.clone(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: request.user_content(),
            },
        ];

        tracing::debug!(model = %self.config.model, "sending completion request");
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            result = self.send_messages(messages, request.temperature) => result?,
        };
        tracing::debug!("raw model response: {}", raw);

        serde_json::from_str(strip_code_fence(&raw)).map_err(|e| LlmError::ParseError {
            message: format!("Model response is not valid JSON: {}", e),
        })
    }
}

/// Some models wrap JSON in a ```json fence even in JSON mode.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
