//! Qdrant-backed vector store.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use lodestone_core::DistanceMetric;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, ScoredPoint,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, value::Kind,
    vectors_config::Config as VectorsConfigKind,
};

use crate::types::{DocumentChunk, SearchResult};
use crate::vector_store::{
    CollectionInfo, MetadataFilter, VectorStore, VectorStoreError, chunk_payload, validate_chunks,
    validate_query,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    vector_size: usize,
    metric: DistanceMetric,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("collection", &self.collection)
            .field("vector_size", &self.vector_size)
            .finish_non_exhaustive()
    }
}

fn distance_of(metric: DistanceMetric) -> Distance {
    match metric {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::Dot => Distance::Dot,
        DistanceMetric::Euclid => Distance::Euclid,
    }
}

impl QdrantStore {
    /// Connect to a Qdrant instance, bound to one collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created from the URL.
    pub fn new(
        url: &str,
        collection: impl Into<String>,
        vector_size: usize,
        metric: DistanceMetric,
    ) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            collection: collection.into(),
            vector_size,
            metric,
        })
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.vector_size as u64, distance_of(self.metric)),
                ),
            )
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
        Ok(())
    }

    async fn configured_params(&self) -> Result<Option<(u64, Distance)>, VectorStoreError> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
        Ok(info
            .result
            .as_ref()
            .and_then(|r| r.config.as_ref())
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|v| v.config.as_ref())
            .and_then(|c| match c {
                VectorsConfigKind::Params(params) => Some((params.size, params.distance())),
                VectorsConfigKind::ParamsMap(_) => None,
            }))
    }
}

/// Differences between an existing collection's parameters and the
/// configured ones, described for logging. Empty means they agree.
fn param_mismatches(
    actual_size: u64,
    actual_distance: Distance,
    expected_size: u64,
    expected_distance: Distance,
) -> Vec<String> {
    let mut mismatches = Vec::new();
    if actual_size != expected_size {
        mismatches.push(format!(
            "vector size is {actual_size}, configured {expected_size}"
        ));
    }
    if actual_distance != expected_distance {
        mismatches.push(format!(
            "distance metric is {actual_distance:?}, configured {expected_distance:?}"
        ));
    }
    mismatches
}

impl VectorStore for QdrantStore {
    fn ensure_collection(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&self.collection)
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

            if !exists {
                tracing::info!(collection = %self.collection, "creating collection");
                return self.create_collection().await;
            }

            // Existing collection with other parameters is not fatal, but
            // inserts would be rejected dimension-by-dimension later.
            if let Some((size, distance)) = self.configured_params().await? {
                for mismatch in param_mismatches(
                    size,
                    distance,
                    self.vector_size as u64,
                    distance_of(self.metric),
                ) {
                    tracing::warn!(
                        collection = %self.collection,
                        "existing collection differs: {mismatch}"
                    );
                }
            }
            Ok(())
        })
    }

    fn add_documents(
        &self,
        chunks: Vec<DocumentChunk>,
    ) -> BoxFuture<'_, Result<usize, VectorStoreError>> {
        Box::pin(async move {
            validate_chunks(&chunks, self.vector_size)?;

            let mut points = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                let payload: HashMap<String, qdrant_client::qdrant::Value> =
                    serde_json::from_value(chunk_payload(chunk))
                        .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                let vector = chunk.embedding.clone().unwrap_or_default();
                points.push(PointStruct::new(
                    uuid::Uuid::new_v4().to_string(),
                    vector,
                    payload,
                ));
            }

            let count = points.len();
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
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

            let mut builder =
                SearchPointsBuilder::new(&self.collection, vector, top_k as u64).with_payload(true);
            if let Some(f) = filter
                && !f.is_empty()
            {
                builder = builder.filter(metadata_filter_to_qdrant(&f)?);
            }

            let response = self
                .client
                .search_points(builder)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            Ok(response
                .result
                .into_iter()
                .map(scored_point_to_result)
                .collect())
        })
    }

    fn collection_info(&self) -> BoxFuture<'_, Result<CollectionInfo, VectorStoreError>> {
        Box::pin(async move {
            let response = self
                .client
                .collection_info(&self.collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let info = response.result.ok_or_else(|| {
                VectorStoreError::Collection("empty collection info response".into())
            })?;

            let status = format!("{:?}", info.status()).to_lowercase();
            Ok(CollectionInfo {
                name: self.collection.clone(),
                points_count: info.points_count.unwrap_or(0),
                indexed_count: info.indexed_vectors_count.unwrap_or(0),
                vector_size: self.vector_size,
                distance_metric: self.metric,
                status,
            })
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            self.client
                .delete_collection(&self.collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            self.create_collection().await
        })
    }

    fn vector_size(&self) -> usize {
        self.vector_size
    }
}

/// Exact-match filter against nested `metadata.<key>` payload fields.
fn metadata_filter_to_qdrant(filter: &MetadataFilter) -> Result<Filter, VectorStoreError> {
    let mut conditions = Vec::with_capacity(filter.0.len());
    for (key, value) in &filter.0 {
        let field = format!("metadata.{key}");
        let condition = match value {
            serde_json::Value::String(s) => Condition::matches(field, s.clone()),
            serde_json::Value::Bool(b) => Condition::matches(field, *b),
            serde_json::Value::Number(n) => {
                let int = n.as_i64().ok_or_else(|| {
                    VectorStoreError::InvalidQuery(format!(
                        "filter value for {key} must be an integer, string, or bool"
                    ))
                })?;
                Condition::matches(field, int)
            }
            other => {
                return Err(VectorStoreError::InvalidQuery(format!(
                    "unsupported filter value for {key}: {other}"
                )));
            }
        };
        conditions.push(condition);
    }
    Ok(Filter::must(conditions))
}

fn scored_point_to_result(point: ScoredPoint) -> SearchResult {
    let content = point
        .payload
        .get("content")
        .and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default();

    let metadata = point
        .payload
        .get("metadata")
        .and_then(|v| match &v.kind {
            Some(Kind::StructValue(s)) => Some(
                s.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
                    .collect(),
            ),
            _ => None,
        })
        .unwrap_or_default();

    SearchResult {
        content,
        metadata,
        score: point.score,
    }
}

fn qdrant_value_to_json(value: &qdrant_client::qdrant::Value) -> serde_json::Value {
    match &value.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::IntegerValue(i)) => serde_json::Value::Number((*i).into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(*d)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .iter()
                .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
                .collect(),
        ),
        Some(Kind::ListValue(l)) => {
            serde_json::Value::Array(l.values.iter().map(qdrant_value_to_json).collect())
        }
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn new_valid_url() {
        let store = QdrantStore::new("http://localhost:6334", "docs", 8, DistanceMetric::Cosine);
        assert!(store.is_ok());
    }

    #[test]
    fn new_invalid_url() {
        let store = QdrantStore::new("not a valid url", "docs", 8, DistanceMetric::Cosine);
        assert!(matches!(store, Err(VectorStoreError::Connection(_))));
    }

    #[test]
    fn debug_format_names_collection() {
        let store =
            QdrantStore::new("http://localhost:6334", "docs", 8, DistanceMetric::Cosine).unwrap();
        assert!(format!("{store:?}").contains("docs"));
    }

    #[test]
    fn payload_converts_to_qdrant_values() {
        let chunk = DocumentChunk {
            content: "body".into(),
            metadata: HashMap::from([("chunk_index".to_owned(), json!(3))]),
            embedding: Some(vec![0.0; 4]),
        };
        let payload: Result<HashMap<String, qdrant_client::qdrant::Value>, _> =
            serde_json::from_value(chunk_payload(&chunk));
        assert!(payload.is_ok());
    }

    #[test]
    fn filter_accepts_scalar_values() {
        let filter = MetadataFilter::from([
            ("lang".to_owned(), json!("en")),
            ("page".to_owned(), json!(7)),
            ("draft".to_owned(), json!(false)),
        ]);
        let converted = metadata_filter_to_qdrant(&filter).unwrap();
        assert_eq!(converted.must.len(), 3);
    }

    #[test]
    fn filter_rejects_float_and_nested_values() {
        let float = MetadataFilter::from([("score".to_owned(), json!(0.5))]);
        assert!(matches!(
            metadata_filter_to_qdrant(&float),
            Err(VectorStoreError::InvalidQuery(_))
        ));

        let nested = MetadataFilter::from([("obj".to_owned(), json!({"a": 1}))]);
        assert!(metadata_filter_to_qdrant(&nested).is_err());
    }

    #[test]
    fn matching_params_report_no_mismatch() {
        assert!(param_mismatches(8, Distance::Cosine, 8, Distance::Cosine).is_empty());
    }

    #[test]
    fn size_and_metric_mismatches_both_reported() {
        let one = param_mismatches(16, Distance::Cosine, 8, Distance::Cosine);
        assert_eq!(one.len(), 1);
        assert!(one[0].contains("vector size is 16"));

        let other = param_mismatches(8, Distance::Dot, 8, Distance::Cosine);
        assert_eq!(other.len(), 1);
        assert!(other[0].contains("distance metric"));

        let both = param_mismatches(16, Distance::Euclid, 8, Distance::Cosine);
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn qdrant_value_round_trip_shapes() {
        let value = qdrant_client::qdrant::Value {
            kind: Some(Kind::StructValue(qdrant_client::qdrant::Struct {
                fields: HashMap::from([(
                    "n".to_owned(),
                    qdrant_client::qdrant::Value {
                        kind: Some(Kind::IntegerValue(5)),
                    },
                )]),
            })),
        };
        assert_eq!(qdrant_value_to_json(&value), json!({"n": 5}));
    }
}
