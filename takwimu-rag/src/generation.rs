//! Generation backends and the priority-ordered selector.
//!
//! The selector holds backends in a fixed priority order (cheaper and
//! faster providers first, rate-limited or expensive ones as fallback)
//! and tries each exactly once per call. The first backend that produces
//! text wins; a full miss surfaces every backend's specific failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::chat::OpenAiChatBackend;
use crate::config::GenerationConfig;
use crate::error::{BackendError, BackendFailure, RagError, Result};
use crate::fallback;
use crate::gemini::GeminiChatBackend;

/// A text-generation backend.
///
/// Failures are limited to the four recoverable modes in [`BackendError`];
/// each makes the selector move on. Retry-with-backoff, if wanted, belongs
/// inside the backend implementation, never in the selector.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Stable identifier used in answers, logs, and failure reports.
    fn id(&self) -> &str;

    /// Generate text for the prompt within the given token budget.
    async fn generate(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> std::result::Result<String, BackendError>;
}

/// A configured backend whose credential was absent at startup.
///
/// Stands in its priority slot and reports `Unavailable` for the process
/// lifetime, so the failure report still names it rather than silently
/// skipping it.
pub struct UnconfiguredBackend {
    id: String,
    reason: String,
}

impl UnconfiguredBackend {
    /// Create a placeholder for `id`, unavailable for the given reason.
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { id: id.into(), reason: reason.into() }
    }
}

#[async_trait]
impl GenerationBackend for UnconfiguredBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(
        &self,
        _prompt: &str,
        _max_tokens: u32,
    ) -> std::result::Result<String, BackendError> {
        Err(BackendError::Unavailable(self.reason.clone()))
    }
}

/// Tries generation backends strictly in priority order.
pub struct BackendSelector {
    backends: Vec<Arc<dyn GenerationBackend>>,
}

impl BackendSelector {
    /// Create a selector over backends in priority order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the list is empty.
    pub fn new(backends: Vec<Arc<dyn GenerationBackend>>) -> Result<Self> {
        if backends.is_empty() {
            return Err(RagError::Config("backend list must not be empty".into()));
        }
        Ok(Self { backends })
    }

    /// Build a selector from configuration, reading credentials from the
    /// environment (`GROQ_API_KEY`, `OPENAI_API_KEY`, `GEMINI_API_KEY`).
    ///
    /// A backend whose key is absent keeps its priority slot as an
    /// [`UnconfiguredBackend`], permanently unavailable for this process.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let mut backends: Vec<Arc<dyn GenerationBackend>> = Vec::new();
        for name in &config.backend_priority {
            let backend: Arc<dyn GenerationBackend> = match name.as_str() {
                "groq" => match std::env::var("GROQ_API_KEY") {
                    Ok(key) => Arc::new(
                        OpenAiChatBackend::groq(key, &config.groq_model, timeout)?
                            .with_temperature(config.temperature),
                    ),
                    Err(_) => Arc::new(UnconfiguredBackend::new("groq", "GROQ_API_KEY not set")),
                },
                "openai" => match std::env::var("OPENAI_API_KEY") {
                    Ok(key) => Arc::new(
                        OpenAiChatBackend::openai(key, &config.openai_model, timeout)?
                            .with_temperature(config.temperature),
                    ),
                    Err(_) => {
                        Arc::new(UnconfiguredBackend::new("openai", "OPENAI_API_KEY not set"))
                    }
                },
                "gemini" => match std::env::var("GEMINI_API_KEY") {
                    Ok(key) => Arc::new(
                        GeminiChatBackend::new(key, &config.gemini_model, timeout)?
                            .with_temperature(config.temperature),
                    ),
                    Err(_) => {
                        Arc::new(UnconfiguredBackend::new("gemini", "GEMINI_API_KEY not set"))
                    }
                },
                other => {
                    return Err(RagError::Config(format!("unknown backend '{other}'")));
                }
            };
            backends.push(backend);
        }
        Self::new(backends)
    }

    /// The backend identifiers, in priority order.
    pub fn backend_ids(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.id().to_string()).collect()
    }

    /// Generate text, falling through the priority list.
    ///
    /// Returns the generated text and the identifier of the backend that
    /// produced it. Each backend is tried at most once.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::AllBackendsExhausted`] with every backend's
    /// failure reason when no backend succeeds.
    pub async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<(String, String)> {
        let outcome = fallback::first_success(
            self.backends.iter().cloned(),
            |backend| backend.id().to_string(),
            |backend| {
                let prompt = prompt.to_string();
                async move {
                    let result = backend.generate(&prompt, max_tokens).await;
                    if let Err(error) = &result {
                        warn!(backend = backend.id(), %error, "generation backend failed, trying next");
                    }
                    result
                }
            },
        )
        .await;

        match outcome {
            Ok((text, backend)) => {
                info!(backend = %backend, chars = text.len(), "generation succeeded");
                Ok((text, backend))
            }
            Err(rejections) => Err(RagError::AllBackendsExhausted(
                rejections
                    .into_iter()
                    .map(|r| BackendFailure { backend: r.provider, error: r.error })
                    .collect(),
            )),
        }
    }
}
