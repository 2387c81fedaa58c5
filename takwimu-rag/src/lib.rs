//! # takwimu-rag
//!
//! Retrieval-augmented answering over Kenya's official statistical reports.
//!
//! ## Overview
//!
//! The crate turns KNBS publications into a searchable corpus and answers
//! natural-language statistical questions against it with mandatory
//! citations:
//!
//! - [`IngestionPipeline`] — extract, chunk, embed, and store documents
//! - [`Retriever`] — match a query against chunks under a distance threshold
//! - [`AnswerComposer`] — build a grounded prompt, generate, and validate
//!   the citation contract
//! - [`BackendSelector`] — try generation backends in a fixed priority
//!   order until one succeeds
//!
//! External collaborators sit behind traits: [`EmbeddingProvider`],
//! [`VectorStore`], [`GenerationBackend`], and
//! [`TextExtractor`](extract::TextExtractor).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use takwimu_rag::{
//!     AnswerComposer, AssistantConfig, BackendSelector, ExtractorChain,
//!     FixedWindowChunker, IngestionPipeline, InMemoryVectorStore,
//!     RawDocument, Retriever, SourceMeta,
//! };
//!
//! let config = AssistantConfig::default();
//! let store = Arc::new(InMemoryVectorStore::new());
//! let chunker = Arc::new(FixedWindowChunker::new(
//!     config.chunking.chunk_size,
//!     config.chunking.chunk_overlap,
//! )?);
//!
//! let pipeline = IngestionPipeline::new(
//!     chunker,
//!     embeddings.clone(),
//!     store.clone(),
//!     ExtractorChain::default(),
//!     &config.store.collection_name,
//!     config.store.embed_batch_size,
//! )?;
//! let report = pipeline
//!     .ingest(vec![RawDocument::text(
//!         SourceMeta::new("Kenya Economic Survey 2024", "2024", "2024"),
//!         "GDP grew 4.7% in 2024...",
//!     )])
//!     .await?;
//!
//! let retriever = Retriever::new(
//!     embeddings,
//!     store,
//!     &config.store.collection_name,
//!     config.retrieval.top_k,
//!     config.retrieval.distance_threshold,
//! )?;
//! let composer = AnswerComposer::new(
//!     retriever,
//!     BackendSelector::from_config(&config.generation)?,
//!     config.generation.max_tokens,
//!     config.generation.max_response_chars,
//!     config.generation.grounding_policy,
//!     config.generation.instruction.clone(),
//! );
//! let answer = composer.answer("What was Kenya's GDP growth in 2024?").await?;
//! ```

pub mod chat;
pub mod chunking;
pub mod compose;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
mod fallback;
pub mod gemini;
pub mod generation;
pub mod ingest;
pub mod inmemory;
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod retrieve;
pub mod vectorstore;

pub use chat::OpenAiChatBackend;
pub use chunking::{Chunker, FixedWindowChunker};
pub use compose::{AnswerComposer, NO_EVIDENCE_TEXT};
pub use config::{
    AssistantConfig, ChunkingConfig, EmbeddingConfig, GenerationConfig, GroundingPolicy,
    RetrievalConfig, StoreConfig,
};
pub use document::{
    Answer, Chunk, Citation, Document, DocumentPayload, IngestFailure, IngestionReport,
    RawDocument, Retrieved, SourceMeta,
};
pub use embedding::EmbeddingProvider;
pub use error::{BackendError, BackendFailure, RagError, Result};
pub use extract::{ExtractorChain, LopdfExtractor, PdfExtractor, TextExtractor};
pub use gemini::GeminiChatBackend;
pub use generation::{BackendSelector, GenerationBackend, UnconfiguredBackend};
pub use ingest::IngestionPipeline;
pub use inmemory::InMemoryVectorStore;
pub use openai::OpenAiEmbeddingProvider;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
pub use retrieve::Retriever;
pub use vectorstore::VectorStore;
