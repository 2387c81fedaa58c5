//! Error types for the `takwimu-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// A failure reported by a single generation backend.
///
/// These are the only failure modes a backend may surface. Anything the
/// selector sees here makes it move on to the next backend in priority
/// order; retry-with-backoff, if wanted, belongs inside the backend itself.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend cannot serve requests (no credentials, network failure,
    /// malformed response, or an unclassified API error).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the request with a rate-limit response.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The backend rejected the supplied credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The request exceeded the configured per-call timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A backend paired with the reason it failed, as recorded by the selector.
#[derive(Debug)]
pub struct BackendFailure {
    /// Identifier of the backend that failed (e.g. `groq`).
    pub backend: String,
    /// The specific failure the backend reported.
    pub error: BackendError,
}

impl std::fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.backend, self.error)
    }
}

fn join_failures(failures: &[BackendFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Errors that can occur across the answering pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid configuration (chunk parameters, embedding-dimension
    /// mismatch, empty backend list). Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// An error occurred during embedding generation.
    #[error("embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Text could not be recovered from a single document. Recovered
    /// locally: the document is skipped and the ingestion batch continues.
    #[error("extraction failed for '{source_name}': {message}")]
    Extraction {
        /// The document whose text could not be extracted.
        source_name: String,
        /// Why every extractor in the chain failed.
        message: String,
    },

    /// A document arrived at the ingestion boundary with missing or
    /// malformed required metadata.
    #[error("invalid document metadata for '{source_name}': {message}")]
    InvalidDocument {
        /// The offending document, as far as it identified itself.
        source_name: String,
        /// Which required field was missing or malformed.
        message: String,
    },

    /// The generated answer cited a source that was not part of the
    /// retrieved evidence, under the fail-the-answer grounding policy.
    #[error("answer cites unretrieved source '{source_name}'")]
    Grounding {
        /// The fabricated source name.
        source_name: String,
    },

    /// Every configured generation backend failed. Carries the specific
    /// per-backend reasons, in the order the backends were tried.
    #[error("all generation backends failed: {}", join_failures(.0))]
    AllBackendsExhausted(Vec<BackendFailure>),
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
