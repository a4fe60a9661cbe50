//! Ranked similarity retrieval over the vector index.

use std::sync::Arc;
use std::time::Instant;

use crate::error::RetrievalError;
use crate::models::{Chunk, RetrievalQuery, RetrievalResult, RetrievedChunk};
use crate::services::embedding::Embedder;
use crate::services::vector_index::{SearchOutcome, VectorIndex};

/// Cosine similarity between two equal-length vectors.
///
/// Returns 0.0 when either vector has near-zero magnitude, so degenerate
/// embeddings rank last instead of producing NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

/// Rank candidate chunks against a query vector in process.
///
/// Candidates whose embedding length differs from the query are excluded
/// and counted, never fatal. Survivors are sorted by similarity descending
/// (stable, so equal scores keep insertion order), cut at `min_similarity`,
/// then truncated to `top_k`. An empty outcome is a valid outcome.
pub fn rank_candidates(
    query_vector: &[f32],
    candidates: &[Chunk],
    top_k: usize,
    min_similarity: f32,
) -> SearchOutcome {
    let mut dimension_mismatches = 0usize;
    let mut scored: Vec<(f32, &Chunk)> = Vec::with_capacity(candidates.len());

    for chunk in candidates {
        if chunk.embedding.len() != query_vector.len() {
            dimension_mismatches += 1;
            continue;
        }
        scored.push((cosine_similarity(query_vector, &chunk.embedding), chunk));
    }

    let candidates_examined = scored.len();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let matches = scored
        .into_iter()
        .filter(|(score, _)| *score >= min_similarity)
        .take(top_k)
        .map(|(score, chunk)| RetrievedChunk {
            chunk_id: chunk.id.clone(),
            source_document_id: chunk.source_document_id.clone(),
            similarity: score,
            text: chunk.text.clone(),
        })
        .collect();

    SearchOutcome {
        matches,
        candidates_examined,
        dimension_mismatches,
    }
}

/// Embeds the query and searches the vector index.
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    index: Box<dyn VectorIndex>,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn Embedder>, index: Box<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Run one retrieval query end to end.
    ///
    /// No matches above the similarity floor yields an empty result, not an
    /// error and never a synthetic placeholder match.
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<RetrievalResult, RetrievalError> {
        if query.text.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let started = Instant::now();
        let query_vector = self.embedder.embed_query(&query.text).await?;

        let outcome = self
            .index
            .search(
                &query_vector,
                query.top_k as u64,
                query.min_similarity,
                query.source_document_id.as_deref(),
            )
            .await?;

        // Backends rank server side, but ordering, threshold and length are
        // re-enforced here so every driver honors the same contract.
        let mut matches = outcome.matches;
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.retain(|m| m.similarity >= query.min_similarity);
        matches.truncate(query.top_k as usize);

        Ok(RetrievalResult {
            query: query.text.clone(),
            matches,
            candidates_examined: outcome.candidates_examined,
            dimension_mismatches: outcome.dimension_mismatches,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::services::vector_index::MemoryIndex;
    use async_trait::async_trait;

    fn chunk_with_embedding(doc: &str, index: u32, text: &str, embedding: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(doc, index, text.to_string(), 0, text.len() as u64, 1);
        chunk.embedding = embedding;
        chunk
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![0.3, 0.5, 0.2];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![0.4, 0.6];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_rank_orders_descending() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            chunk_with_embedding("doc", 0, "far", vec![0.0, 1.0]),
            chunk_with_embedding("doc", 1, "near", vec![1.0, 0.1]),
            chunk_with_embedding("doc", 2, "mid", vec![1.0, 1.0]),
        ];

        let outcome = rank_candidates(&query, &candidates, 10, 0.0);
        let texts: Vec<&str> = outcome.matches.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_rank_ties_keep_insertion_order() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            chunk_with_embedding("doc", 0, "first", vec![2.0, 0.0]),
            chunk_with_embedding("doc", 1, "second", vec![5.0, 0.0]),
        ];

        let outcome = rank_candidates(&query, &candidates, 10, 0.0);
        assert_eq!(outcome.matches[0].text, "first");
        assert_eq!(outcome.matches[1].text, "second");
    }

    #[test]
    fn test_rank_applies_similarity_floor() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            chunk_with_embedding("doc", 0, "keep", vec![1.0, 0.0]),
            chunk_with_embedding("doc", 1, "drop", vec![0.0, 1.0]),
        ];

        let outcome = rank_candidates(&query, &candidates, 10, 0.5);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].text, "keep");
        assert_eq!(outcome.candidates_examined, 2);
    }

    #[test]
    fn test_rank_truncates_to_top_k() {
        let query = vec![1.0, 0.0];
        let candidates: Vec<Chunk> = (0..8)
            .map(|i| chunk_with_embedding("doc", i, "c", vec![1.0, i as f32 * 0.01]))
            .collect();

        let outcome = rank_candidates(&query, &candidates, 3, 0.0);
        assert_eq!(outcome.matches.len(), 3);
    }

    #[test]
    fn test_rank_excludes_dimension_mismatches() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            chunk_with_embedding("doc", 0, "good", vec![1.0, 0.0]),
            chunk_with_embedding("doc", 1, "short", vec![1.0]),
            chunk_with_embedding("doc", 2, "long", vec![1.0, 0.0, 0.0]),
        ];

        let outcome = rank_candidates(&query, &candidates, 10, 0.0);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.dimension_mismatches, 2);
        assert_eq!(outcome.candidates_examined, 1);
    }

    #[test]
    fn test_rank_below_floor_is_empty_not_placeholder() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            chunk_with_embedding("doc", 0, "a", vec![0.0, 1.0]),
            chunk_with_embedding("doc", 1, "b", vec![-1.0, 0.0]),
        ];

        let outcome = rank_candidates(&query, &candidates, 5, 0.9);
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.candidates_examined, 2);
    }

    struct FixedEmbedder {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_document(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(self.vector.clone())
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(self.vector.clone())
        }

        fn dimension(&self) -> usize {
            self.vector.len()
        }
    }

    #[tokio::test]
    async fn test_retrieve_rejects_empty_query() {
        let embedder = Arc::new(FixedEmbedder { vector: vec![1.0, 0.0] });
        let engine = RetrievalEngine::new(embedder, Box::new(MemoryIndex::new(2)));

        let query = RetrievalQuery::new("   ");
        let err = engine.retrieve(&query).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_retrieve_end_to_end_over_memory_index() {
        let index = MemoryIndex::new(2);
        index
            .upsert_chunks(vec![
                chunk_with_embedding("doc-a", 0, "close match", vec![1.0, 0.0]),
                chunk_with_embedding("doc-a", 1, "far match", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let embedder = Arc::new(FixedEmbedder { vector: vec![1.0, 0.0] });
        let engine = RetrievalEngine::new(embedder, Box::new(index));

        let query = RetrievalQuery::new("anything").with_top_k(5).with_min_similarity(0.5);
        let result = engine.retrieve(&query).await.unwrap();

        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].text, "close match");
        assert_eq!(result.matches[0].source_document_id, "doc-a");
    }

    #[tokio::test]
    async fn test_retrieve_empty_result_is_valid() {
        let index = MemoryIndex::new(2);
        index
            .upsert_chunks(vec![chunk_with_embedding(
                "doc-a",
                0,
                "unrelated",
                vec![0.0, 1.0],
            )])
            .await
            .unwrap();

        let embedder = Arc::new(FixedEmbedder { vector: vec![1.0, 0.0] });
        let engine = RetrievalEngine::new(embedder, Box::new(index));

        let query = RetrievalQuery::new("anything").with_min_similarity(0.9);
        let result = engine.retrieve(&query).await.unwrap();

        assert!(result.is_empty());
        assert_eq!(result.candidates_examined, 1);
    }
}
