//! Semantic passage retrieval: chunk documents, embed them, and search a
//! vector store through one lifecycle-aware pipeline.

pub mod chunker;
pub mod in_memory;
pub mod loader;
pub mod pipeline;
pub mod qdrant;
pub mod types;
pub mod vector_store;

pub use chunker::{ChunkerError, ChunkerInfo, OverlapChunker};
pub use in_memory::InMemoryStore;
pub use loader::{DocumentError, DocumentLoader, TextLoader, loader_for};
pub use pipeline::{Pipeline, PipelineError, ProcessStats, QueryError, SystemInfo, SystemState};
pub use qdrant::QdrantStore;
pub use types::{DocumentChunk, ParsedDocument, SearchResult};
pub use vector_store::{CollectionInfo, MetadataFilter, VectorStore, VectorStoreError};

#[cfg(feature = "pdf")]
pub use loader::PdfLoader;
