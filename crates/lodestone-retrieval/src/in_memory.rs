//! In-process vector store: the default backend when no Qdrant URL is
//! configured, and the reference implementation for tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use lodestone_core::DistanceMetric;

use crate::types::{DocumentChunk, SearchResult};
use crate::vector_store::{
    CollectionInfo, MetadataFilter, VectorStore, VectorStoreError, chunk_payload, validate_chunks,
    validate_query,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

struct StoredPoint {
    vector: Vec<f32>,
    payload: serde_json::Value,
}

pub struct InMemoryStore {
    name: String,
    vector_size: usize,
    metric: DistanceMetric,
    points: RwLock<HashMap<String, StoredPoint>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new(name: impl Into<String>, vector_size: usize, metric: DistanceMetric) -> Self {
        Self {
            name: name.into(),
            vector_size,
            metric,
            points: RwLock::new(HashMap::new()),
        }
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("name", &self.name)
            .field("vector_size", &self.vector_size)
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn matches_filter(payload: &serde_json::Value, filter: &MetadataFilter) -> bool {
    let metadata = &payload["metadata"];
    filter
        .0
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

fn payload_to_result(payload: &serde_json::Value, score: f32) -> SearchResult {
    let content = payload["content"].as_str().unwrap_or_default().to_owned();
    let metadata = payload["metadata"]
        .as_object()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    SearchResult {
        content,
        metadata,
        score,
    }
}

impl VectorStore for InMemoryStore {
    fn ensure_collection(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        // The map itself is the collection; nothing to create.
        Box::pin(async { Ok(()) })
    }

    fn add_documents(
        &self,
        chunks: Vec<DocumentChunk>,
    ) -> BoxFuture<'_, Result<usize, VectorStoreError>> {
        Box::pin(async move {
            validate_chunks(&chunks, self.vector_size)?;

            let mut points = self
                .points
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let count = chunks.len();
            for chunk in chunks {
                let payload = chunk_payload(&chunk);
                let vector = chunk.embedding.unwrap_or_default();
                points.insert(
                    uuid::Uuid::new_v4().to_string(),
                    StoredPoint { vector, payload },
                );
            }
            Ok(count)
        })
    }

    fn search(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: Option<MetadataFilter>,
    ) -> BoxFuture<'_, Result<Vec<SearchResult>, VectorStoreError>> {
        Box::pin(async move {
            validate_query(&vector, self.vector_size, top_k)?;

            let points = self
                .points
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            let mut scored: Vec<SearchResult> = points
                .values()
                .filter(|p| {
                    filter
                        .as_ref()
                        .is_none_or(|f| matches_filter(&p.payload, f))
                })
                .map(|p| payload_to_result(&p.payload, cosine_similarity(&vector, &p.vector)))
                .collect();

            scored.sort_by(|a, b| b.score.total_cmp(&a.score));
            scored.truncate(top_k);
            Ok(scored)
        })
    }

    fn collection_info(&self) -> BoxFuture<'_, Result<CollectionInfo, VectorStoreError>> {
        Box::pin(async move {
            let points = self
                .points
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let count = points.len() as u64;
            Ok(CollectionInfo {
                name: self.name.clone(),
                points_count: count,
                indexed_count: count,
                vector_size: self.vector_size,
                distance_metric: self.metric,
                status: "green".into(),
            })
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let mut points = self
                .points
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            points.clear();
            Ok(())
        })
    }

    fn vector_size(&self) -> usize {
        self.vector_size
    }
}
