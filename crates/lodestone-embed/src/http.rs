//! OpenAI-compatible `/v1/embeddings` backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BoxFuture, EmbedError, Embedder, EmbedderInfo, validate_batch};

/// Embedder backed by an OpenAI-compatible embeddings endpoint
/// (Ollama, vLLM, text-embeddings-inference, OpenAI itself).
///
/// One batch maps to one HTTP round trip. The connection is established
/// lazily on the first call; the configured timeout bounds every request, so
/// embedding calls stay cancellable from the caller's side.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl HttpEmbedder {
    /// # Panics
    ///
    /// Panics if the underlying HTTP client cannot be constructed, which only
    /// happens with a broken TLS backend.
    #[must_use]
    pub fn new(mut base_url: String, model: String, dimension: usize, timeout_secs: u64) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("lodestone/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("default HTTP client construction must not fail");
        Self {
            client,
            base_url,
            api_key: None,
            model,
            dimension,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedError> {
        validate_batch(&texts)?;
        let expected = texts.len();

        let body = EmbeddingRequest {
            input: &texts,
            model: &self.model,
        };

        let mut request = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await.map_err(EmbedError::Http)?;

        if !status.is_success() {
            tracing::error!(%status, "embedding API error: {text}");
            return Err(EmbedError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let resp: EmbeddingResponse = serde_json::from_str(&text)?;
        collect_vectors(resp, expected, self.dimension)
    }
}

/// Check a parsed response against the request: one row per input text,
/// every row at the configured dimension, rows reordered by `index`.
fn collect_vectors(
    resp: EmbeddingResponse,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    if resp.data.len() != expected {
        return Err(EmbedError::BatchLength {
            expected,
            got: resp.data.len(),
        });
    }

    // Servers may return rows out of order; `index` is authoritative.
    let mut rows = resp.data;
    rows.sort_by_key(|d| d.index);

    let mut vectors = Vec::with_capacity(rows.len());
    for row in rows {
        if row.embedding.len() != dimension {
            return Err(EmbedError::Dimension {
                expected: dimension,
                got: row.embedding.len(),
            });
        }
        vectors.push(row.embedding);
    }
    Ok(vectors)
}

impl Embedder for HttpEmbedder {
    fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f32>>, EmbedError>> {
        Box::pin(self.embed_batch(texts))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn info(&self) -> EmbedderInfo {
        EmbedderInfo {
            model_name: self.model.clone(),
            dimension: self.dimension,
            backend: "http",
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_embedder() -> HttpEmbedder {
        HttpEmbedder::new("http://127.0.0.1:1/".into(), "bge-test".into(), 8, 1)
    }

    #[test]
    fn trailing_slashes_trimmed() {
        let e = test_embedder();
        assert_eq!(e.base_url, "http://127.0.0.1:1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let e = test_embedder().with_api_key("secret".into());
        let dbg = format!("{e:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("bge-test"));
    }

    #[test]
    fn reports_declared_dimension() {
        let e = test_embedder();
        assert_eq!(e.dimension(), 8);
        assert_eq!(e.info().backend, "http");
    }

    #[tokio::test]
    async fn unreachable_endpoint_errors() {
        let e = test_embedder();
        let result = e.embed(vec!["hello".into()]).await;
        assert!(matches!(result, Err(EmbedError::Http(_))));
    }

    #[tokio::test]
    async fn empty_batch_rejected_before_any_io() {
        let e = test_embedder();
        let result = e.embed(vec![]).await;
        assert!(matches!(result, Err(EmbedError::EmptyBatch)));
    }

    #[test]
    fn response_rows_parse_with_index() {
        let raw = r#"{"data":[{"index":1,"embedding":[0.1]},{"index":0,"embedding":[0.2]}]}"#;
        let resp: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.data.len(), 2);
        assert_eq!(resp.data[0].index, 1);
    }

    fn response(rows: Vec<(usize, Vec<f32>)>) -> EmbeddingResponse {
        EmbeddingResponse {
            data: rows
                .into_iter()
                .map(|(index, embedding)| EmbeddingData { index, embedding })
                .collect(),
        }
    }

    #[test]
    fn short_response_batch_rejected() {
        let resp = response(vec![(0, vec![0.0; 4])]);
        assert!(matches!(
            collect_vectors(resp, 2, 4),
            Err(EmbedError::BatchLength {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn overlong_response_batch_rejected() {
        let resp = response(vec![(0, vec![0.0; 4]), (1, vec![0.0; 4])]);
        assert!(matches!(
            collect_vectors(resp, 1, 4),
            Err(EmbedError::BatchLength {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn wrong_row_dimension_rejected() {
        let resp = response(vec![(0, vec![0.0; 4]), (1, vec![0.0; 3])]);
        assert!(matches!(
            collect_vectors(resp, 2, 4),
            Err(EmbedError::Dimension {
                expected: 4,
                got: 3
            })
        ));
    }

    #[test]
    fn out_of_order_rows_reassembled_by_index() {
        let resp = response(vec![(1, vec![1.0, 1.0]), (0, vec![0.0, 0.0])]);
        let vectors = collect_vectors(resp, 2, 2).unwrap();
        assert_eq!(vectors[0], vec![0.0, 0.0]);
        assert_eq!(vectors[1], vec![1.0, 1.0]);
    }
}
