//! Vector store trait for storing and searching embedded chunks.

use async_trait::async_trait;

use crate::document::{Chunk, Retrieved};
use crate::error::Result;

/// A storage backend for embedded chunks with nearest-neighbor search.
///
/// Implementations manage named collections of [`Chunk`]s and support
/// upserting, source-scoped deletion, and distance-ranked search. Stores
/// must tolerate concurrent reads during writes; readers may miss
/// just-written chunks but never observe a chunk whose embedding and text
/// disagree.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection with the given dimensionality.
    /// No-op if it already exists with the same dimensionality.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Upsert chunks into a collection. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete every chunk belonging to one source document.
    async fn delete_by_source(&self, collection: &str, source_name: &str) -> Result<()>;

    /// Number of chunks currently stored in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// The `top_k` chunks nearest to the given embedding.
    ///
    /// Results are ordered ascending by distance; ties keep store order.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Retrieved>>;
}
