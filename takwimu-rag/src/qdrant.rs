//! Qdrant vector store backend.
//!
//! Durable storage for the corpus, available when the `qdrant` feature is
//! enabled. Collections use cosine distance; Qdrant reports similarity
//! scores, which are converted to the ascending cosine distance the rest
//! of the pipeline ranks by. Chunk metadata is stored as flat payload
//! fields so deletes can be scoped to one source document.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;

use crate::document::{Chunk, Retrieved, SourceMeta};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Connect to a Qdrant instance at the given URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Create a store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStore { backend: "qdrant".to_string(), message: e.to_string() }
    }

    /// Qdrant point IDs must be integers or UUIDs; chunk IDs are hashed
    /// deterministically so re-ingestion overwrites the same points.
    fn point_id(chunk_id: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        chunk_id.hash(&mut hasher);
        hasher.finish()
    }

    fn payload_string(value: Option<&QdrantValue>) -> String {
        match value.and_then(|v| v.kind.as_ref()) {
            Some(Kind::StringValue(s)) => s.clone(),
            _ => String::new(),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let collections = self.client.list_collections().await.map_err(Self::map_err)?;
        if collections.collections.iter().any(|c| c.name == name) {
            debug!(collection = name, "qdrant collection already exists, skipping creation");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client.delete_collection(name).await.map_err(Self::map_err)?;
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .iter()
            .map(|chunk| {
                let mut payload_map = serde_json::Map::new();
                payload_map
                    .insert("id".to_string(), serde_json::Value::String(chunk.id.clone()));
                payload_map
                    .insert("text".to_string(), serde_json::Value::String(chunk.text.clone()));
                payload_map.insert(
                    "offset".to_string(),
                    serde_json::Value::String(chunk.offset.to_string()),
                );
                payload_map.insert(
                    "source_name".to_string(),
                    serde_json::Value::String(chunk.meta.source_name.clone()),
                );
                payload_map.insert(
                    "published".to_string(),
                    serde_json::Value::String(chunk.meta.published.clone()),
                );
                payload_map.insert(
                    "data_period".to_string(),
                    serde_json::Value::String(chunk.meta.data_period.clone()),
                );

                let payload =
                    Payload::try_from(serde_json::Value::Object(payload_map)).unwrap_or_default();

                PointStruct::new(Self::point_id(&chunk.id), chunk.embedding.clone(), payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = chunks.len(), "upserted chunks to qdrant");
        Ok(())
    }

    async fn delete_by_source(&self, collection: &str, source_name: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(Filter::must([Condition::matches(
                        "source_name",
                        source_name.to_string(),
                    )]))
                    .wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection, source_name, "deleted source from qdrant");
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(Self::map_err)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Retrieved>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, embedding.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(Self::map_err)?;

        let results = response
            .result
            .into_iter()
            .map(|scored| {
                let offset = Self::payload_string(scored.payload.get("offset"))
                    .parse::<usize>()
                    .unwrap_or(0);
                let chunk = Chunk {
                    id: Self::payload_string(scored.payload.get("id")),
                    text: Self::payload_string(scored.payload.get("text")),
                    offset,
                    embedding: Vec::new(),
                    meta: SourceMeta::new(
                        Self::payload_string(scored.payload.get("source_name")),
                        Self::payload_string(scored.payload.get("published")),
                        Self::payload_string(scored.payload.get("data_period")),
                    ),
                };
                // Cosine collections report similarity; the pipeline ranks
                // by ascending cosine distance.
                Retrieved { chunk, distance: (1.0 - scored.score).max(0.0) }
            })
            .collect();

        Ok(results)
    }
}
