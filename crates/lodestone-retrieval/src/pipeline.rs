//! Lifecycle-aware orchestration of the chunk, embed, and store stages.
//!
//! A [`Pipeline`] owns one embedder and one vector store behind a single
//! `RwLock`. Queries share a read guard and run in parallel; document
//! ingestion, database clearing, and config updates take the write guard
//! for their whole duration, so writers are serialized and admin
//! operations never observe a half-applied state.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lodestone_core::{Config, ConfigError, ReinitPlan, merge_patch};
use lodestone_embed::{EmbedError, Embedder, EmbedderInfo, HttpEmbedder};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::chunker::{ChunkerError, ChunkerInfo, OverlapChunker};
use crate::in_memory::InMemoryStore;
use crate::loader::{DocumentError, loader_for};
use crate::qdrant::QdrantStore;
use crate::types::SearchResult;
use crate::vector_store::{CollectionInfo, MetadataFilter, VectorStore, VectorStoreError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to process {path}")]
    DocumentProcessing {
        path: String,
        #[source]
        source: StageError,
    },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Where ingestion of a single document failed.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("load failed: {0}")]
    Load(#[from] DocumentError),

    #[error("document produced no chunks")]
    NoChunks,

    #[error("embedding failed: {0}")]
    Embed(#[from] EmbedError),

    #[error("store failed: {0}")]
    Store(#[from] VectorStoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("no documents processed yet")]
    NotProcessed,

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("top_k must be greater than zero")]
    InvalidTopK,

    #[error("embedding failed: {0}")]
    Embed(#[from] EmbedError),

    #[error("search failed: {0}")]
    Search(#[from] VectorStoreError),
}

impl From<ChunkerError> for PipelineError {
    fn from(err: ChunkerError) -> Self {
        Self::Config(ConfigError::Invalid(err.to_string()))
    }
}

/// What the pipeline has ingested so far. Reset by [`Pipeline::clear_database`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemState {
    pub documents_processed: u64,
    pub chunks_stored: u64,
    pub last_document: Option<String>,
}

impl SystemState {
    /// Whether at least one document has been ingested; queries are
    /// rejected until this holds.
    #[must_use]
    pub fn is_processed(&self) -> bool {
        self.documents_processed > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessStats {
    pub document_path: String,
    pub pages_processed: u64,
    pub chunks_created: usize,
    pub total_characters: usize,
    pub processing_time: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub state: SystemState,
    pub collection: CollectionInfo,
    pub embedder: EmbedderInfo,
    pub chunker: ChunkerInfo,
    pub config: Config,
}

struct Inner {
    config: Config,
    chunker: OverlapChunker,
    embedder: Arc<dyn Embedder>,
    store: Box<dyn VectorStore>,
    state: SystemState,
}

pub struct Pipeline {
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

fn embedder_from(config: &Config) -> Arc<dyn Embedder> {
    Arc::new(HttpEmbedder::new(
        config.embedder.base_url.clone(),
        config.embedder.model_name.clone(),
        config.retriever.vector_size,
        config.embedder.timeout_secs,
    ))
}

fn store_from(config: &Config) -> Result<Box<dyn VectorStore>, VectorStoreError> {
    let r = &config.retriever;
    match &r.url {
        Some(url) => Ok(Box::new(QdrantStore::new(
            url,
            r.collection_name.clone(),
            r.vector_size,
            r.distance_metric,
        )?)),
        None => Ok(Box::new(InMemoryStore::new(
            r.collection_name.clone(),
            r.vector_size,
            r.distance_metric,
        ))),
    }
}

impl Pipeline {
    /// Build a pipeline from configuration, choosing the vector store
    /// backend by `retriever.url` (unset means in-memory).
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be created or its collection
    /// cannot be ensured.
    pub async fn new(config: Config) -> Result<Self, PipelineError> {
        let embedder = embedder_from(&config);
        let store = store_from(&config)?;
        Self::with_components(config, embedder, store).await
    }

    /// Build a pipeline around caller-supplied components.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunker settings are invalid or the
    /// collection cannot be ensured.
    pub async fn with_components(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Box<dyn VectorStore>,
    ) -> Result<Self, PipelineError> {
        let chunker = OverlapChunker::new(config.chunker.chunk_size, config.chunker.overlap_size)?;
        store.ensure_collection().await?;
        Ok(Self {
            inner: RwLock::new(Inner {
                config,
                chunker,
                embedder,
                store,
                state: SystemState::default(),
            }),
        })
    }

    /// Ingest one document: load, chunk, embed, and store it.
    ///
    /// State is committed only after the store accepts the batch, so a
    /// failure at any stage leaves the processed-document count untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FileNotFound`] for a missing path and
    /// [`PipelineError::DocumentProcessing`] for any stage failure.
    pub async fn process_document(
        &self,
        path: impl AsRef<Path> + Send,
    ) -> Result<ProcessStats, PipelineError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let started = Instant::now();

        let mut inner = self.inner.write().await;

        let stage = |source: StageError| PipelineError::DocumentProcessing {
            path: display.clone(),
            source,
        };

        match tokio::fs::try_exists(path).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(PipelineError::FileNotFound {
                    path: display.clone(),
                });
            }
            Err(e) => return Err(stage(StageError::Load(e.into()))),
        }

        let loader = loader_for(path).map_err(|e| stage(e.into()))?;
        let document = loader.load(path).await.map_err(|e| stage(e.into()))?;

        let mut chunks = inner.chunker.chunk(&document);
        if chunks.is_empty() {
            return Err(stage(StageError::NoChunks));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = inner
            .embedder
            .embed(texts)
            .await
            .map_err(|e| stage(e.into()))?;
        if embeddings.len() != chunks.len() {
            return Err(stage(StageError::Embed(EmbedError::BatchLength {
                expected: chunks.len(),
                got: embeddings.len(),
            })));
        }
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = Some(embedding);
        }

        let pages_processed = document
            .metadata
            .get("page_count")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(1);
        let total_characters = document.text.chars().count();

        let chunks_created = inner
            .store
            .add_documents(chunks)
            .await
            .map_err(|e| stage(e.into()))?;

        inner.state.documents_processed += 1;
        inner.state.chunks_stored += chunks_created as u64;
        inner.state.last_document = Some(display.clone());

        let stats = ProcessStats {
            document_path: display,
            pages_processed,
            chunks_created,
            total_characters,
            processing_time: started.elapsed(),
        };
        tracing::info!(
            path = %stats.document_path,
            chunks = stats.chunks_created,
            elapsed_ms = stats.processing_time.as_millis() as u64,
            "document processed"
        );
        Ok(stats)
    }

    /// Answer a question with the most similar stored chunks.
    ///
    /// Results keep the store's ranking; chunks below the configured score
    /// threshold are dropped and long contents are truncated.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotProcessed`] before any document has been
    /// ingested, and validation or stage errors otherwise.
    pub async fn query(
        &self,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>, QueryError> {
        self.query_inner(question, top_k, None).await
    }

    /// Like [`Pipeline::query`], restricted to chunks whose metadata
    /// matches every pair in `filter` exactly.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Pipeline::query`].
    pub async fn query_filtered(
        &self,
        question: &str,
        top_k: Option<usize>,
        filter: MetadataFilter,
    ) -> Result<Vec<SearchResult>, QueryError> {
        self.query_inner(question, top_k, Some(filter)).await
    }

    async fn query_inner(
        &self,
        question: &str,
        top_k: Option<usize>,
        filter: Option<MetadataFilter>,
    ) -> Result<Vec<SearchResult>, QueryError> {
        let inner = self.inner.read().await;

        if !inner.state.is_processed() {
            return Err(QueryError::NotProcessed);
        }
        if question.trim().is_empty() {
            return Err(QueryError::EmptyQuestion);
        }
        let top_k = top_k.unwrap_or(inner.config.query.default_top_k);
        if top_k == 0 {
            return Err(QueryError::InvalidTopK);
        }

        let mut embeddings = inner.embedder.embed(vec![question.to_owned()]).await?;
        let vector = if embeddings.is_empty() {
            return Err(QueryError::Embed(EmbedError::BatchLength {
                expected: 1,
                got: 0,
            }));
        } else {
            embeddings.swap_remove(0)
        };

        let results = inner.store.search(vector, top_k, filter).await?;
        Ok(post_process(
            results,
            inner.config.query.min_score_threshold,
            inner.config.query.max_content_length,
        ))
    }

    /// Drop all stored vectors and reset the processed-document state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared.
    pub async fn clear_database(&self) -> Result<(), PipelineError> {
        let mut inner = self.inner.write().await;
        inner.store.clear().await?;
        inner.state = SystemState::default();
        tracing::info!("database cleared");
        Ok(())
    }

    /// Apply a configuration patch, rebuilding only the components whose
    /// sections changed. A retriever change resets the processed state
    /// because the new store starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged configuration is invalid or a
    /// rebuilt store cannot be initialized. The previous configuration
    /// stays in effect on failure.
    pub async fn update_config(
        &self,
        patch: serde_json::Value,
    ) -> Result<ReinitPlan, PipelineError> {
        let mut inner = self.inner.write().await;
        let merged = merge_patch(&inner.config, patch)?;
        let plan = ReinitPlan::between(&inner.config, &merged);

        let chunker = OverlapChunker::new(merged.chunker.chunk_size, merged.chunker.overlap_size)?;

        if plan.retriever {
            let store = store_from(&merged)?;
            store.ensure_collection().await?;
            inner.store = store;
            inner.state = SystemState::default();
        }
        if plan.embedder {
            inner.embedder = embedder_from(&merged);
        }
        inner.chunker = chunker;
        inner.config = merged;

        tracing::info!(
            embedder = plan.embedder,
            retriever = plan.retriever,
            "configuration updated"
        );
        Ok(plan)
    }

    /// Snapshot of the pipeline: lifecycle state, collection, and
    /// component descriptions.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot report collection info.
    pub async fn system_info(&self) -> Result<SystemInfo, PipelineError> {
        let inner = self.inner.read().await;
        let collection = inner.store.collection_info().await?;
        Ok(SystemInfo {
            state: inner.state.clone(),
            collection,
            embedder: inner.embedder.info(),
            chunker: inner.chunker.info(),
            config: inner.config.clone(),
        })
    }

    /// Current configuration.
    pub async fn config(&self) -> Config {
        self.inner.read().await.config.clone()
    }
}

fn post_process(
    results: Vec<SearchResult>,
    min_score: f32,
    max_content_length: usize,
) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|r| r.score >= min_score)
        .map(|mut r| {
            if r.content.chars().count() > max_content_length {
                let truncated: String = r.content.chars().take(max_content_length).collect();
                r.content = format!("{truncated}...");
            }
            r
        })
        .collect()
}
