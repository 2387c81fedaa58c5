//! OpenAI-compatible chat completion backend.
//!
//! Groq and OpenAI speak the same `/chat/completions` dialect, so one
//! client covers both; only the base URL, model, and identifier differ.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{BackendError, RagError, Result};
use crate::generation::GenerationBackend;

/// Base URL for the Groq OpenAI-compatible API.
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Base URL for the OpenAI API.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// A [`GenerationBackend`] over an OpenAI-compatible chat completions API.
pub struct OpenAiChatBackend {
    client: reqwest::Client,
    id: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiChatBackend {
    /// Create a backend for an arbitrary OpenAI-compatible endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the API key is empty or the HTTP
    /// client cannot be constructed.
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let id = id.into();
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config(format!("API key for backend '{id}' must not be empty")));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            id,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            temperature: 0.0,
            timeout,
        })
    }

    /// A backend for the Groq API, identified as `groq`.
    pub fn groq(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Self::new("groq", GROQ_API_BASE, api_key, model, timeout)
    }

    /// A backend for the OpenAI API, identified as `openai`.
    pub fn openai(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Self::new("openai", OPENAI_API_BASE, api_key, model, timeout)
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Extract a readable failure message from an API error body.
fn error_detail(body: String) -> String {
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body)
}

#[async_trait]
impl GenerationBackend for OpenAiChatBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> std::result::Result<String, BackendError> {
        debug!(backend = %self.id, model = %self.model, prompt_chars = prompt.len(), "chat completion request");

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(backend = %self.id, error = %e, "request failed");
                if e.is_timeout() {
                    BackendError::Timeout(self.timeout)
                } else {
                    BackendError::Unavailable(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response.text().await.unwrap_or_default());
            error!(backend = %self.id, %status, "API error");
            return Err(match status.as_u16() {
                401 | 403 => BackendError::Auth(detail),
                429 => BackendError::RateLimited(detail),
                _ => BackendError::Unavailable(format!("API returned {status}: {detail}")),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(backend = %self.id, error = %e, "failed to parse response");
            BackendError::Unavailable(format!("failed to parse response: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| BackendError::Unavailable("API returned no choices".into()))
    }
}
