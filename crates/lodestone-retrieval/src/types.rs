use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Normalized text plus source metadata, as produced by a [`DocumentLoader`].
///
/// [`DocumentLoader`]: crate::loader::DocumentLoader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub text: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A bounded, overlapping slice of a document: the atomic unit of embedding
/// and retrieval. Created without an embedding; the pipeline attaches one
/// before storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub embedding: Option<Vec<f32>>,
}

/// One ranked hit from a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    /// Cosine similarity to the query vector, descending over a result set.
    pub score: f32,
}
