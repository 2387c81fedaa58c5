//! Property tests for vector store ordering and retrieval filtering.

use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use takwimu_rag::document::Chunk;
use takwimu_rag::embedding::EmbeddingProvider;
use takwimu_rag::inmemory::InMemoryVectorStore;
use takwimu_rag::retrieve::Retriever;
use takwimu_rag::vectorstore::VectorStore;
use takwimu_rag::SourceMeta;

const DIM: usize = 16;

/// Embedder that parses the query itself as a comma-separated vector, so
/// property tests control the query embedding exactly.
struct LiteralVectorEmbedder;

#[async_trait]
impl EmbeddingProvider for LiteralVectorEmbedder {
    async fn embed(&self, text: &str) -> takwimu_rag::Result<Vec<f32>> {
        Ok(text.split(',').map(|part| part.trim().parse::<f32>().unwrap_or(0.0)).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// Generate a chunk with a normalized embedding.
fn arb_chunk(dim: usize) -> impl Strategy<Value = Chunk> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim)).prop_map(
        |(id, text, embedding)| Chunk {
            id,
            text,
            offset: 0,
            embedding,
            meta: SourceMeta::new("prop_doc", "2024", "2024"),
        },
    )
}

fn render_query(embedding: &[f32]) -> String {
    embedding.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Store search returns at most top_k results, ordered ascending by
    /// distance.
    #[test]
    fn store_results_ascend_and_respect_top_k(
        chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
        query in arb_normalized_embedding(DIM),
        top_k in 1usize..25,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (results, unique_count) = rt.block_on(async {
            let store = InMemoryVectorStore::new();
            store.create_collection("test", DIM).await.unwrap();

            // Deduplicate by id so upsert replacement does not shrink the set.
            let mut deduped: std::collections::HashMap<String, Chunk> =
                std::collections::HashMap::new();
            for chunk in &chunks {
                deduped.entry(chunk.id.clone()).or_insert_with(|| chunk.clone());
            }
            let unique: Vec<Chunk> = deduped.into_values().collect();
            let count = unique.len();

            store.upsert("test", &unique).await.unwrap();
            let results = store.search("test", &query, top_k).await.unwrap();
            (results, count)
        });

        prop_assert!(results.len() <= top_k);
        prop_assert!(results.len() <= unique_count);

        for window in results.windows(2) {
            prop_assert!(
                window[0].distance <= window[1].distance,
                "results not in ascending order: {} > {}",
                window[0].distance,
                window[1].distance,
            );
        }
    }

    /// Every retrieved chunk survives the threshold filter: distance is
    /// within [0, threshold], and chunks at the boundary are included.
    #[test]
    fn retrieval_respects_the_distance_threshold(
        chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
        query in arb_normalized_embedding(DIM),
        threshold in 0.0f32..2.0,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let results = rt.block_on(async {
            let store = Arc::new(InMemoryVectorStore::new());
            store.create_collection("test", DIM).await.unwrap();

            let mut deduped: std::collections::HashMap<String, Chunk> =
                std::collections::HashMap::new();
            for chunk in &chunks {
                deduped.entry(chunk.id.clone()).or_insert_with(|| chunk.clone());
            }
            let unique: Vec<Chunk> = deduped.into_values().collect();
            store.upsert("test", &unique).await.unwrap();

            let retriever = Retriever::new(
                Arc::new(LiteralVectorEmbedder),
                store,
                "test",
                10,
                threshold,
            )
            .unwrap();
            retriever.retrieve(&render_query(&query)).await.unwrap()
        });

        for result in &results {
            prop_assert!(result.distance >= 0.0);
            prop_assert!(
                result.distance <= threshold,
                "distance {} exceeds threshold {}",
                result.distance,
                threshold,
            );
        }
    }
}
