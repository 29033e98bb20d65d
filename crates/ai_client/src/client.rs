//! OpenAI-compatible HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use tabsight_config::ai::{AIConfigStatus, ResolvedAIConfig};
use tabsight_engine::remote::{CompletionRequest, RemoteError, RemoteInsightProvider};

/// Chat-completions client for one provider, model and key.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http: reqwest::blocking::Client,
    provider: String,
    base_url: String,
    api_key: String,
    model: String,
}

/// Error type for chat-completion calls.
#[derive(Debug, Clone, PartialEq)]
pub enum AiClientError {
    /// Provider disabled in settings
    NotConfigured(String),
    /// Provider selected but no key found
    MissingKey(String),
    /// HTTP client could not be built
    Setup(String),
    /// Connection, DNS, TLS or timeout failure
    Network(String),
    /// Non-2xx response
    Api { status: u16, message: String },
    /// Response body was not a chat completion
    Parse(String),
    /// No choices, or empty content
    EmptyResponse,
}

impl std::fmt::Display for AiClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiClientError::NotConfigured(msg) => write!(f, "AI not configured: {}", msg),
            AiClientError::MissingKey(msg) => write!(f, "API key missing: {}", msg),
            AiClientError::Setup(msg) => write!(f, "Failed to create HTTP client: {}", msg),
            AiClientError::Network(msg) => write!(f, "Network error: {}", msg),
            AiClientError::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            AiClientError::Parse(msg) => write!(f, "Failed to parse response: {}", msg),
            AiClientError::EmptyResponse => write!(f, "Response contained no message content"),
        }
    }
}

impl std::error::Error for AiClientError {}

impl From<AiClientError> for RemoteError {
    fn from(e: AiClientError) -> Self {
        match e {
            AiClientError::Network(msg) | AiClientError::Setup(msg) => RemoteError::Network(msg),
            AiClientError::Api { status, message } => RemoteError::Http { status, message },
            AiClientError::Parse(msg) => RemoteError::Parse(msg),
            AiClientError::EmptyResponse => RemoteError::EmptyResponse,
            e @ (AiClientError::NotConfigured(_) | AiClientError::MissingKey(_)) => {
                RemoteError::InvalidResponse(e.to_string())
            }
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

impl OpenAiCompatibleClient {
    /// Client for an explicit base URL (e.g. `https://api.openai.com/v1`).
    pub fn with_base_url(
        provider: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AiClientError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("tabsight/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| AiClientError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Client for a resolved configuration; fails unless its status is ready.
    pub fn from_config(config: &ResolvedAIConfig) -> Result<Self, AiClientError> {
        match config.status {
            AIConfigStatus::Disabled => {
                return Err(AiClientError::NotConfigured("provider=none".to_string()));
            }
            AIConfigStatus::MissingKey => {
                return Err(AiClientError::MissingKey(
                    config.blocking_reason.clone().unwrap_or_default(),
                ));
            }
            AIConfigStatus::Ready => {}
        }

        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AiClientError::MissingKey(config.provider_name().to_string()))?;
        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| config.provider.default_endpoint().to_string());

        Self::with_base_url(
            config.provider_name(),
            api_key,
            config.model.clone(),
            base_url,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one chat completion and return the first choice's content.
    pub fn chat(&self, request: &CompletionRequest) -> Result<String, AiClientError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!("POST {} model={} max_tokens={}", url, self.model, request.max_tokens);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| AiClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(AiClientError::Api { status: status.as_u16(), message });
        }

        let parsed: ChatResponse = response.json().map_err(|e| AiClientError::Parse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AiClientError::EmptyResponse)
    }
}

impl RemoteInsightProvider for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.provider
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String, RemoteError> {
        self.chat(request).map_err(RemoteError::from)
    }
}
