//! Document ingestion: extract → chunk → embed → store.
//!
//! The pipeline processes each document independently. A document that
//! cannot be read or labelled degrades to a recorded failure while the
//! rest of the batch continues; only configuration errors (an embedding
//! dimension that disagrees with the collection) abort the batch, since
//! every following document would fail the same way.
//!
//! Re-ingesting a source name fully replaces its previous chunks: the old
//! set is deleted and the new set is written in one upsert per document,
//! so a reader never observes a half-written document.

use std::sync::Arc;

use tracing::{info, warn};

use crate::chunking::Chunker;
use crate::document::{
    Document, DocumentPayload, IngestFailure, IngestionReport, RawDocument, SourceMeta,
};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::ExtractorChain;
use crate::vectorstore::VectorStore;

/// Orchestrates the ingest workflow for batches of raw documents.
pub struct IngestionPipeline {
    chunker: Arc<dyn Chunker>,
    embeddings: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    extractors: ExtractorChain,
    collection: String,
    embed_batch_size: usize,
}

impl IngestionPipeline {
    /// Create a pipeline writing into the named collection.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `embed_batch_size` is zero.
    pub fn new(
        chunker: Arc<dyn Chunker>,
        embeddings: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        extractors: ExtractorChain,
        collection: impl Into<String>,
        embed_batch_size: usize,
    ) -> Result<Self> {
        if embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".into()));
        }
        Ok(Self {
            chunker,
            embeddings,
            store,
            extractors,
            collection: collection.into(),
            embed_batch_size,
        })
    }

    /// Ingest a batch of documents, returning counts and per-document
    /// failures.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] on an embedding-dimension mismatch;
    /// every other per-document failure is recorded in the report instead.
    pub async fn ingest(&self, documents: Vec<RawDocument>) -> Result<IngestionReport> {
        self.store.create_collection(&self.collection, self.embeddings.dimensions()).await?;

        let mut report = IngestionReport::default();
        for raw in documents {
            report.documents_attempted += 1;
            let source_name = raw.meta.source_name.clone();
            match self.ingest_one(raw).await {
                Ok(chunk_count) => {
                    report.documents_succeeded += 1;
                    report.chunks_created += chunk_count;
                }
                Err(err @ RagError::Config(_)) => return Err(err),
                Err(err) => {
                    warn!(source_name = %source_name, error = %err, "document failed, continuing batch");
                    report.documents_failed += 1;
                    report
                        .failures
                        .push(IngestFailure { source_name, reason: err.to_string() });
                }
            }
        }

        info!(
            attempted = report.documents_attempted,
            succeeded = report.documents_succeeded,
            failed = report.documents_failed,
            chunks = report.chunks_created,
            "ingestion batch complete"
        );
        Ok(report)
    }

    /// Ingest a single document end to end. Returns the chunk count.
    async fn ingest_one(&self, raw: RawDocument) -> Result<usize> {
        let mut meta = raw.meta;
        let text = match raw.payload {
            DocumentPayload::Text(text) => text,
            DocumentPayload::Pdf(bytes) => {
                self.extractors.extract(&meta.source_name, &bytes).await?
            }
        };

        // Fill in whatever the source did not supply, then enforce the
        // required fields.
        if meta.published.is_empty() || meta.data_period.is_empty() {
            let inferred = SourceMeta::infer(&meta.source_name, &text);
            if meta.published.is_empty() {
                meta.published = inferred.published;
            }
            if meta.data_period.is_empty() {
                meta.data_period = inferred.data_period;
            }
        }
        meta.validate()?;

        let document = Document { meta, text };
        let mut chunks = self.chunker.chunk(&document);
        if chunks.is_empty() {
            // An empty re-ingestion still supersedes the previous content.
            self.store.delete_by_source(&self.collection, &document.meta.source_name).await?;
            info!(source_name = %document.meta.source_name, chunk_count = 0, "ingested empty document");
            return Ok(0);
        }

        let expected_dimensions = self.embeddings.dimensions();
        for batch in chunks.chunks_mut(self.embed_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embeddings.embed_batch(&texts).await?;
            if embeddings.len() != texts.len() {
                return Err(RagError::Embedding {
                    provider: "batch".into(),
                    message: format!(
                        "asked for {} embeddings, got {}",
                        texts.len(),
                        embeddings.len()
                    ),
                });
            }
            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                if embedding.len() != expected_dimensions {
                    return Err(RagError::Config(format!(
                        "embedding dimension mismatch: got {}, collection expects {expected_dimensions}",
                        embedding.len()
                    )));
                }
                chunk.embedding = embedding;
            }
        }

        // Full replacement, then one atomic write for the whole document.
        self.store.delete_by_source(&self.collection, &document.meta.source_name).await?;
        self.store.upsert(&self.collection, &chunks).await?;

        info!(source_name = %document.meta.source_name, chunk_count = chunks.len(), "ingested document");
        Ok(chunks.len())
    }
}
