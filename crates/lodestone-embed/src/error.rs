#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedding batch is empty")]
    EmptyBatch,

    #[error("text at index {index} is empty or blank")]
    EmptyText { index: usize },

    #[error("expected {expected} embeddings, server returned {got}")]
    BatchLength { expected: usize, got: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    #[error("embedding request failed (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}
