//! Test-only deterministic embedder.

use crate::{BoxFuture, EmbedError, Embedder, EmbedderInfo, validate_batch};

/// Deterministic embedder: identical text always maps to the identical
/// L2-normalized vector, so similarity-dependent tests are reproducible
/// without a model server. Vector components are drawn from a blake3 XOF
/// keyed by the text.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimension: usize,
    pub fail: bool,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
        }
    }

    #[must_use]
    pub fn failing(dimension: usize) -> Self {
        Self {
            dimension,
            fail: true,
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut reader = blake3::Hasher::new().update(text.as_bytes()).finalize_xof();
        let mut bytes = vec![0u8; self.dimension * 4];
        reader.fill(&mut bytes);

        let mut vector: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| {
                let raw = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                // map to [-1, 1)
                (f64::from(raw) / f64::from(u32::MAX)).mul_add(2.0, -1.0) as f32
            })
            .collect();

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f32>>, EmbedError>> {
        Box::pin(async move {
            validate_batch(&texts)?;
            if self.fail {
                return Err(EmbedError::Other("mock embed error".into()));
            }
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock"
    }

    fn info(&self) -> EmbedderInfo {
        EmbedderInfo {
            model_name: "mock".into(),
            dimension: self.dimension,
            backend: "mock",
        }
    }
}
