//! Completion backends
//!
//! `CompletionBackend` is the seam the resilient invoker calls through. The
//! production implementation talks to any OpenAI-compatible
//! `/chat/completions` endpoint (Groq, OpenAI, local servers); tests inject
//! scripted backends.

use crate::backends::message::ChatMessage;
use crate::config::BackendConfig;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest provider error body kept in a `BackendError::Status`
const MAX_ERROR_BODY_CHARS: usize = 500;

/// A single failed call to one backend
///
/// Never surfaced to callers of the invoker; it is logged and triggers
/// fallback to the next backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be constructed (e.g. credential not usable in a header)
    #[error("Backend misconfigured: {0}")]
    Misconfigured(String),

    /// Network-level failure: connect, TLS, reset
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// Provider answered with a non-success status (auth, rate limit, 5xx)
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// No answer within the configured bound
    #[error("No response within {}s", timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    /// Response body was not the expected completion shape
    #[error("Malformed provider response: {0}")]
    Decode(String),

    /// Completion contained no text
    #[error("Provider returned an empty completion")]
    EmptyResponse,
}

/// One backend able to turn a message sequence into completion text
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Label used in logs and metrics
    fn name(&self) -> &str;

    /// Request a completion for the given messages
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Backend for OpenAI-compatible chat completion APIs
pub struct OpenAiBackend {
    name: String,
    model: String,
    url: String,
    max_tokens: u32,
    temperature: f64,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl OpenAiBackend {
    /// Build a backend from its configuration and resolved API key
    ///
    /// # Errors
    /// Returns `BackendError::Misconfigured` if the key cannot be sent as an
    /// HTTP header value.
    pub fn new(
        config: &BackendConfig,
        api_key: &str,
        client: reqwest::Client,
    ) -> Result<Self, BackendError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim())).map_err(|_| {
            BackendError::Misconfigured(format!(
                "API key in {} contains characters not allowed in an HTTP header",
                config.api_key_env()
            ))
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        Ok(Self {
            name: config.name().to_string(),
            model: config.model().to_string(),
            url: format!(
                "{}/chat/completions",
                config.base_url().trim_end_matches('/')
            ),
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
            headers,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        tracing::debug!(
            backend = %self.name,
            model = %self.model,
            message_count = messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(BackendError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode("response has no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }

        Ok(content)
    }
}
