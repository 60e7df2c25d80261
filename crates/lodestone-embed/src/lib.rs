//! Batch text embedding port: fixed-dimension unit vectors for cosine search.

use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::EmbedError;
pub use http::HttpEmbedder;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbedder;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Model identity and shape, as reported by [`Embedder::info`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EmbedderInfo {
    pub model_name: String,
    pub dimension: usize,
    pub backend: &'static str,
}

/// Batch text-to-vector port.
///
/// Implementations return one vector per input text, each of the dimension
/// declared at construction and L2-normalized for cosine comparison. A batch
/// fails as a unit: an empty batch or any blank input rejects the whole call
/// with no partial results.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f32>>, EmbedError>>;

    /// Vector dimension produced by this model.
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;

    fn info(&self) -> EmbedderInfo;
}

/// Shared input validation for [`Embedder`] implementations.
///
/// # Errors
///
/// Returns an error on an empty batch or any blank text.
pub fn validate_batch(texts: &[String]) -> Result<(), EmbedError> {
    if texts.is_empty() {
        return Err(EmbedError::EmptyBatch);
    }
    if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(EmbedError::EmptyText { index: pos });
    }
    Ok(())
}
