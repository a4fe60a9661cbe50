//! In-memory vector index for tests and local smoke runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CollectionInfo, SearchOutcome, VectorIndex};
use crate::error::IndexError;
use crate::models::Chunk;
use crate::services::retrieval::rank_candidates;

/// Map-backed index keyed by chunk ID, ranked in process with the same
/// cosine contract the remote backends apply server side.
pub struct MemoryIndex {
    chunks: RwLock<HashMap<String, Chunk>>,
    dimension: usize,
}

impl MemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            dimension,
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn health_check(&self) -> Result<bool, IndexError> {
        Ok(true)
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, IndexError> {
        let chunks = self.chunks.read().await;
        Ok(Some(CollectionInfo {
            points_count: chunks.len() as u64,
        }))
    }

    async fn ensure_ready(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn upsert_chunks(&self, chunks: Vec<Chunk>) -> Result<(), IndexError> {
        for chunk in &chunks {
            if chunk.embedding.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: chunk.embedding.len(),
                });
            }
        }

        let mut map = self.chunks.write().await;
        for chunk in chunks {
            map.insert(chunk.id.clone(), chunk);
        }

        Ok(())
    }

    async fn delete_document(&self, source_document_id: &str) -> Result<(), IndexError> {
        let mut map = self.chunks.write().await;
        map.retain(|_, chunk| chunk.source_document_id != source_document_id);
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: u64,
        min_similarity: f32,
        source_document_id: Option<&str>,
    ) -> Result<SearchOutcome, IndexError> {
        let map = self.chunks.read().await;

        // Candidates ordered by (document, index) so tie-breaking is
        // deterministic across runs.
        let mut candidates: Vec<Chunk> = map
            .values()
            .filter(|chunk| {
                source_document_id
                    .map(|doc_id| chunk.source_document_id == doc_id)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            a.source_document_id
                .cmp(&b.source_document_id)
                .then(a.index.cmp(&b.index))
        });

        Ok(rank_candidates(
            query_vector,
            &candidates,
            top_k as usize,
            min_similarity,
        ))
    }

    async fn clear(&self) -> Result<(), IndexError> {
        let mut map = self.chunks.write().await;
        map.clear();
        Ok(())
    }

    fn collection(&self) -> &str {
        "memory"
    }
}
