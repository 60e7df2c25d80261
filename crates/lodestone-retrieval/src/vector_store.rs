//! Collection-bound vector store port.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use lodestone_core::DistanceMetric;
use serde::Serialize;
use serde_json::json;

use crate::types::{DocumentChunk, SearchResult};

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("collection error: {0}")]
    Collection(String),

    #[error("upsert error: {0}")]
    Upsert(String),

    #[error("search error: {0}")]
    Search(String),

    #[error("chunk {index} is missing an embedding")]
    MissingEmbedding { index: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Exact-match metadata filter: a point qualifies only when every key/value
/// pair matches its payload metadata (logical AND).
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter(pub HashMap<String, serde_json::Value>);

impl MetadataFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(String, serde_json::Value); N]> for MetadataFilter {
    fn from(pairs: [(String, serde_json::Value); N]) -> Self {
        Self(HashMap::from(pairs))
    }
}

/// Snapshot of a collection's shape and fill level.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub points_count: u64,
    pub indexed_count: u64,
    pub vector_size: usize,
    pub distance_metric: DistanceMetric,
    pub status: String,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A named, fixed-dimension vector collection.
///
/// Implementations are bound at construction to one collection with a fixed
/// vector size and distance metric; the pipeline owns exactly one instance.
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist. Idempotent; an existing
    /// collection with different parameters is logged as a warning, not an
    /// error.
    fn ensure_collection(&self) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Insert chunks as freshly-identified points. The whole batch is
    /// validated before anything is written: any chunk without an embedding,
    /// or with one of the wrong length, rejects the call with zero writes.
    fn add_documents(
        &self,
        chunks: Vec<DocumentChunk>,
    ) -> BoxFuture<'_, Result<usize, VectorStoreError>>;

    /// Top-k cosine search, descending by score. Rejects an empty or
    /// wrong-dimension query vector and `top_k == 0`.
    fn search(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: Option<MetadataFilter>,
    ) -> BoxFuture<'_, Result<Vec<SearchResult>, VectorStoreError>>;

    fn collection_info(&self) -> BoxFuture<'_, Result<CollectionInfo, VectorStoreError>>;

    /// Destructive: drop all points and recreate the empty collection with
    /// the same parameters.
    fn clear(&self) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn vector_size(&self) -> usize;
}

/// Validate a chunk batch against the collection dimension before any write.
///
/// # Errors
///
/// Returns the first missing or wrongly-sized embedding found.
pub(crate) fn validate_chunks(
    chunks: &[DocumentChunk],
    vector_size: usize,
) -> Result<(), VectorStoreError> {
    for (index, chunk) in chunks.iter().enumerate() {
        match &chunk.embedding {
            None => return Err(VectorStoreError::MissingEmbedding { index }),
            Some(v) if v.is_empty() => {
                return Err(VectorStoreError::MissingEmbedding { index });
            }
            Some(v) if v.len() != vector_size => {
                return Err(VectorStoreError::Dimension {
                    expected: vector_size,
                    got: v.len(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Validate search parameters against the collection dimension.
pub(crate) fn validate_query(
    vector: &[f32],
    vector_size: usize,
    top_k: usize,
) -> Result<(), VectorStoreError> {
    if vector.is_empty() {
        return Err(VectorStoreError::InvalidQuery(
            "query vector must not be empty".into(),
        ));
    }
    if vector.len() != vector_size {
        return Err(VectorStoreError::Dimension {
            expected: vector_size,
            got: vector.len(),
        });
    }
    if top_k == 0 {
        return Err(VectorStoreError::InvalidQuery(
            "top_k must be positive".into(),
        ));
    }
    Ok(())
}

/// Wire-level point payload shared by every backend: `content`, nested
/// `metadata`, `content_length`, `has_metadata`.
pub(crate) fn chunk_payload(chunk: &DocumentChunk) -> serde_json::Value {
    json!({
        "content": chunk.content,
        "metadata": chunk.metadata,
        "content_length": chunk.content.chars().count(),
        "has_metadata": !chunk.metadata.is_empty(),
    })
}
