//! Vector index abstraction layer.
//!
//! Trait-based abstraction over the supported backends (Qdrant,
//! PostgreSQL/pgvector, in-memory) so the pipeline and retrieval engine
//! never care which engine holds the vectors.

mod memory;
mod pgvector;
mod qdrant;

pub use memory::MemoryIndex;
pub use pgvector::PgVectorIndex;
pub use qdrant::QdrantIndex;

use async_trait::async_trait;

use crate::error::IndexError;
use crate::models::{Chunk, RetrievedChunk, VectorDriver, VectorIndexConfig};

/// Collection/table information.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: u64,
}

/// What a similarity search saw and returned.
///
/// `candidates_examined` equals the returned match count for backends that
/// rank server-side; the in-memory index reports every candidate it scored.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub matches: Vec<RetrievedChunk>,
    pub candidates_examined: usize,
    pub dimension_mismatches: usize,
}

/// Abstract contract for chunk-vector persistence and similarity search.
///
/// Chunk IDs are the uniqueness key: upserting an existing ID replaces the
/// row, and deleting a document removes every row carrying its ID.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Check if the index is healthy and accessible.
    async fn health_check(&self) -> Result<bool, IndexError>;

    /// Get information about the current collection/table.
    /// Returns None if the collection doesn't exist.
    async fn collection_info(&self) -> Result<Option<CollectionInfo>, IndexError>;

    /// Create the collection/table if it doesn't exist.
    async fn ensure_ready(&self) -> Result<(), IndexError>;

    /// Insert or update chunks with their embeddings.
    ///
    /// Every chunk must carry an embedding of the index's dimensionality;
    /// anything else is a `DimensionMismatch` and nothing is written.
    async fn upsert_chunks(&self, chunks: Vec<Chunk>) -> Result<(), IndexError>;

    /// Delete all chunks belonging to one source document.
    async fn delete_document(&self, source_document_id: &str) -> Result<(), IndexError>;

    /// Similarity search, optionally restricted to one document.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: u64,
        min_similarity: f32,
        source_document_id: Option<&str>,
    ) -> Result<SearchOutcome, IndexError>;

    /// Remove every chunk from the index.
    async fn clear(&self) -> Result<(), IndexError>;

    /// Get the collection/table name.
    fn collection(&self) -> &str;
}

/// Create a vector index backend based on configuration.
pub async fn create_index(
    config: &VectorIndexConfig,
    dimension: usize,
) -> Result<Box<dyn VectorIndex>, IndexError> {
    match config.driver {
        VectorDriver::Qdrant => {
            let backend = QdrantIndex::new(config, dimension)?;
            Ok(Box::new(backend))
        }
        VectorDriver::Postgres => {
            let backend = PgVectorIndex::new(config, dimension).await?;
            Ok(Box::new(backend))
        }
        VectorDriver::Memory => Ok(Box::new(MemoryIndex::new(dimension))),
    }
}
