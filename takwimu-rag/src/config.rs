//! Operational configuration for the assistant.
//!
//! Configuration is loaded from a YAML file ([`AssistantConfig::from_yaml_file`])
//! with every field defaulted, so a partial file (or no file at all) yields
//! a working setup. Validation happens once at load time; invalid parameters
//! are a [`RagError::Config`] and are never retried.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// What to do when a generated citation cannot be traced to retrieved
/// evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundingPolicy {
    /// Remove the unverifiable citation from the answer and log a warning.
    #[default]
    Strip,
    /// Fail the whole answer with a grounding error.
    Fail,
}

/// Chunking parameters, in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 800, chunk_overlap: 150 }
    }
}

/// Retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest chunks to fetch from the store.
    pub top_k: usize,
    /// Maximum distance for a chunk to count as relevant evidence.
    /// Chunks exactly at the threshold are kept.
    pub distance_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 8, distance_threshold: 1.1 }
    }
}

/// Generation backend parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Backend identifiers in the order they are tried. Recognized:
    /// `groq`, `openai`, `gemini`.
    pub backend_priority: Vec<String>,
    /// Model served through the Groq API.
    pub groq_model: String,
    /// Model served through the OpenAI API.
    pub openai_model: String,
    /// Model served through the Gemini API.
    pub gemini_model: String,
    /// Sampling temperature. Zero keeps statistical answers deterministic.
    pub temperature: f32,
    /// Token budget handed to the backend.
    pub max_tokens: u32,
    /// Maximum answer length in characters, applied after validation.
    pub max_response_chars: usize,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Policy for citations that cannot be traced to retrieved evidence.
    pub grounding_policy: GroundingPolicy,
    /// Override for the built-in prompt instruction.
    pub instruction: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend_priority: vec!["groq".into(), "openai".into(), "gemini".into()],
            groq_model: "llama-3.1-8b-instant".into(),
            openai_model: "gpt-4o-mini".into(),
            gemini_model: "gemini-2.0-flash".into(),
            temperature: 0.0,
            max_tokens: 1024,
            max_response_chars: 4000,
            request_timeout_secs: 30,
            grounding_policy: GroundingPolicy::Strip,
            instruction: None,
        }
    }
}

/// Embedding provider parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model identifier.
    pub model: String,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model: "text-embedding-3-small".into(), request_timeout_secs: 30 }
    }
}

/// Vector store parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Named collection the corpus lives in.
    pub collection_name: String,
    /// How many chunk texts to embed per upstream call.
    pub embed_batch_size: usize,
    /// URL of a Qdrant instance, when the `qdrant` feature is enabled.
    pub qdrant_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { collection_name: "knbs_reports".into(), embed_batch_size: 64, qdrant_url: None }
    }
}

/// Full assistant configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantConfig {
    /// Chunking parameters.
    pub chunking: ChunkingConfig,
    /// Retrieval parameters.
    pub retrieval: RetrievalConfig,
    /// Generation parameters.
    pub generation: GenerationConfig,
    /// Embedding parameters.
    pub embedding: EmbeddingConfig,
    /// Vector store parameters.
    pub store: StoreConfig,
}

/// Backend names the selector knows how to build.
pub const KNOWN_BACKENDS: [&str; 3] = ["groq", "openai", "gemini"];

impl AssistantConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RagError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config: Self = serde_yaml::from_str(&raw).map_err(|e| {
            RagError::Config(format!("invalid config file {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".into()));
        }
        if !self.retrieval.distance_threshold.is_finite() || self.retrieval.distance_threshold < 0.0
        {
            return Err(RagError::Config(format!(
                "distance_threshold must be a non-negative number, got {}",
                self.retrieval.distance_threshold
            )));
        }
        if self.generation.max_response_chars == 0 {
            return Err(RagError::Config("max_response_chars must be greater than zero".into()));
        }
        if self.generation.backend_priority.is_empty() {
            return Err(RagError::Config("backend_priority must list at least one backend".into()));
        }
        for name in &self.generation.backend_priority {
            if !KNOWN_BACKENDS.contains(&name.as_str()) {
                return Err(RagError::Config(format!(
                    "unknown backend '{name}' in backend_priority (known: {})",
                    KNOWN_BACKENDS.join(", ")
                )));
            }
        }
        if self.store.embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AssistantConfig::default().validate().expect("defaults must validate");
    }

    #[test]
    fn default_chunking_matches_report_tuning() {
        let config = AssistantConfig::default();
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 150);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: AssistantConfig = serde_yaml::from_str(
            "retrieval:\n  top_k: 3\ngeneration:\n  grounding_policy: fail\n",
        )
        .expect("partial yaml parses");
        assert_eq!(config.retrieval.top_k, 3);
        assert!((config.retrieval.distance_threshold - 1.1).abs() < f32::EPSILON);
        assert_eq!(config.generation.grounding_policy, GroundingPolicy::Fail);
        assert_eq!(config.chunking.chunk_size, 800);
    }

    #[test]
    fn rejects_overlap_not_less_than_size() {
        let mut config = AssistantConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn rejects_zero_top_k() {
        let mut config = AssistantConfig::default();
        config.retrieval.top_k = 0;
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn rejects_unknown_backend_name() {
        let mut config = AssistantConfig::default();
        config.generation.backend_priority = vec!["mistral".into()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mistral"));
    }

    #[test]
    fn rejects_negative_threshold() {
        let mut config = AssistantConfig::default();
        config.retrieval.distance_threshold = -0.5;
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }
}
