//! Query-time retrieval: embed, search, filter by distance threshold.

use std::sync::Arc;

use tracing::debug;

use crate::document::Retrieved;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Retrieves the chunks most relevant to a query.
pub struct Retriever {
    embeddings: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    collection: String,
    top_k: usize,
    distance_threshold: f32,
}

impl Retriever {
    /// Create a retriever over the named collection.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `top_k` is zero or the threshold is
    /// negative or not finite.
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        top_k: usize,
        distance_threshold: f32,
    ) -> Result<Self> {
        if top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".into()));
        }
        if !distance_threshold.is_finite() || distance_threshold < 0.0 {
            return Err(RagError::Config(format!(
                "distance_threshold must be a non-negative number, got {distance_threshold}"
            )));
        }
        Ok(Self {
            embeddings,
            store,
            collection: collection.into(),
            top_k,
            distance_threshold,
        })
    }

    /// Retrieve the chunks relevant to `query`.
    ///
    /// Embeds the query in the same coordinate space as ingestion, fetches
    /// the `top_k` nearest chunks, and keeps those with
    /// `distance <= threshold` (the boundary itself is included). The
    /// result is sorted ascending by distance with stable ties.
    ///
    /// An empty result is `Ok`: it is the "no relevant evidence" signal,
    /// not an error.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Retrieved>> {
        let embedding = self.embeddings.embed(query).await?;
        if embedding.len() != self.embeddings.dimensions() {
            return Err(RagError::Config(format!(
                "query embedding has {} dimensions, provider publishes {}",
                embedding.len(),
                self.embeddings.dimensions()
            )));
        }

        let mut results = self.store.search(&self.collection, &embedding, self.top_k).await?;
        results.retain(|r| r.distance <= self.distance_threshold);
        results.sort_by(|a, b| {
            a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            collection = %self.collection,
            result_count = results.len(),
            threshold = self.distance_threshold,
            "retrieval complete"
        );
        Ok(results)
    }
}
