//! In-memory vector store using cosine distance.
//!
//! [`InMemoryVectorStore`] keeps collections in a `Vec` behind a
//! `tokio::sync::RwLock`, so insertion order is preserved and equal
//! distances tie-break stably. Suitable for development and tests; durable
//! corpora belong in the Qdrant backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, Retrieved};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    /// Chunks in insertion order; upserts of an existing id replace in place.
    chunks: Vec<Chunk>,
}

/// An in-memory [`VectorStore`] ranking by cosine distance.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine distance between two vectors: `1 − cosine similarity`, in `[0, 2]`.
///
/// A zero-magnitude vector is treated as orthogonal to everything
/// (distance 1.0).
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    // Rounding can push the similarity a hair past 1.0; distances stay
    // non-negative.
    (1.0 - dot / (norm_a * norm_b)).max(0.0)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(name) {
            if existing.dimensions != dimensions {
                return Err(RagError::Config(format!(
                    "collection '{name}' holds {}-dimensional vectors, requested {dimensions}",
                    existing.dimensions
                )));
            }
            return Ok(());
        }
        collections.insert(name.to_string(), Collection { dimensions, chunks: Vec::new() });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| RagError::VectorStore {
            backend: "in-memory".to_string(),
            message: format!("collection '{collection}' does not exist"),
        })?;
        for chunk in chunks {
            if chunk.embedding.len() != store.dimensions {
                return Err(RagError::Config(format!(
                    "chunk '{}' has a {}-dimensional embedding, collection '{collection}' expects {}",
                    chunk.id,
                    chunk.embedding.len(),
                    store.dimensions
                )));
            }
            match store.chunks.iter_mut().find(|c| c.id == chunk.id) {
                Some(existing) => *existing = chunk.clone(),
                None => store.chunks.push(chunk.clone()),
            }
        }
        Ok(())
    }

    async fn delete_by_source(&self, collection: &str, source_name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| RagError::VectorStore {
            backend: "in-memory".to_string(),
            message: format!("collection '{collection}' does not exist"),
        })?;
        store.chunks.retain(|c| c.meta.source_name != source_name);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| RagError::VectorStore {
            backend: "in-memory".to_string(),
            message: format!("collection '{collection}' does not exist"),
        })?;
        Ok(store.chunks.len())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Retrieved>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| RagError::VectorStore {
            backend: "in-memory".to_string(),
            message: format!("collection '{collection}' does not exist"),
        })?;

        let mut scored: Vec<Retrieved> = store
            .chunks
            .iter()
            .map(|chunk| Retrieved {
                chunk: chunk.clone(),
                distance: cosine_distance(&chunk.embedding, embedding),
            })
            .collect();

        // sort_by is stable, so equal distances keep insertion order.
        scored.sort_by(|a, b| {
            a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}
