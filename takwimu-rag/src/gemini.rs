//! Gemini chat backend over the `generateContent` REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{BackendError, RagError, Result};
use crate::generation::GenerationBackend;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A [`GenerationBackend`] over the Gemini REST API, identified as `gemini`.
pub struct GeminiChatBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl GeminiChatBackend {
    /// Create a Gemini backend for the given model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the API key is empty or the HTTP
    /// client cannot be constructed.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("Gemini API key must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, api_key, model: model.into(), temperature: 0.0, timeout })
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[async_trait]
impl GenerationBackend for GeminiChatBackend {
    fn id(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> std::result::Result<String, BackendError> {
        debug!(backend = "gemini", model = %self.model, prompt_chars = prompt.len(), "generateContent request");

        let body = GenerateRequest {
            contents: vec![Content { parts: vec![Part { text: prompt }] }],
            generation_config: GenConfig {
                max_output_tokens: max_tokens,
                temperature: self.temperature,
            },
        };

        // The key travels as a header so request logs never carry it.
        let url = format!("{GEMINI_API_BASE}/models/{}:generateContent", self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(backend = "gemini", error = %e, "request failed");
                if e.is_timeout() {
                    BackendError::Timeout(self.timeout)
                } else {
                    BackendError::Unavailable(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(backend = "gemini", %status, "API error");
            return Err(match status.as_u16() {
                401 | 403 => BackendError::Auth(detail),
                429 => BackendError::RateLimited(detail),
                _ => BackendError::Unavailable(format!("API returned {status}: {detail}")),
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            error!(backend = "gemini", error = %e, "failed to parse response");
            BackendError::Unavailable(format!("failed to parse response: {e}"))
        })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content.parts.into_iter().filter_map(|p| p.text).collect::<Vec<_>>().join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(BackendError::Unavailable("API returned no candidates".into()));
        }
        Ok(text)
    }
}
