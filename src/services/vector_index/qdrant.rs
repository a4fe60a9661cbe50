//! Qdrant vector index backend.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};

use super::{CollectionInfo, SearchOutcome, VectorIndex};
use crate::error::IndexError;
use crate::models::{Chunk, RetrievedChunk, VectorIndexConfig};

/// Qdrant-backed index. Similarity ranking happens server side with
/// `Distance::Cosine`, so `search` returns already-thresholded matches.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl QdrantIndex {
    pub fn new(config: &VectorIndexConfig, dimension: usize) -> Result<Self, IndexError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| IndexError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension: dimension as u64,
        })
    }

    fn payload_str(
        payload: &HashMap<String, qdrant_client::qdrant::Value>,
        key: &str,
    ) -> Option<String> {
        payload.get(key).and_then(|v| match &v.kind {
            Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
    }

    fn point_uuid(point_id: &Option<qdrant_client::qdrant::PointId>) -> String {
        match point_id {
            Some(id) => match &id.point_id_options {
                Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid)) => uuid.clone(),
                Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(num)) => num.to_string(),
                None => String::new(),
            },
            None => String::new(),
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn health_check(&self) -> Result<bool, IndexError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| IndexError::ConnectionError(e.to_string()))
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, IndexError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => Ok(Some(CollectionInfo {
                points_count: info.result.map_or(0, |r| r.points_count.unwrap_or(0)),
            })),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(None)
                } else {
                    Err(IndexError::CollectionError(msg))
                }
            }
        }
    }

    async fn ensure_ready(&self) -> Result<(), IndexError> {
        if self.collection_info().await?.is_some() {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection)
            .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine));

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| IndexError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn upsert_chunks(&self, chunks: Vec<Chunk>) -> Result<(), IndexError> {
        if chunks.is_empty() {
            return Ok(());
        }

        // One wrong vector poisons ranking for the whole collection, so the
        // batch is rejected before anything is written.
        for chunk in &chunks {
            if chunk.embedding.len() as u64 != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension as usize,
                    actual: chunk.embedding.len(),
                });
            }
        }

        let points: Vec<PointStruct> = chunks
            .into_iter()
            .map(|chunk| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("chunk_id".to_string(), chunk.id.clone().into());
                payload.insert(
                    "document_id".to_string(),
                    chunk.source_document_id.clone().into(),
                );
                payload.insert("chunk_index".to_string(), (chunk.index as i64).into());
                payload.insert("content".to_string(), chunk.text.clone().into());
                payload.insert(
                    "token_estimate".to_string(),
                    (chunk.token_estimate as i64).into(),
                );
                payload.insert("start_offset".to_string(), (chunk.start_offset as i64).into());
                payload.insert("end_offset".to_string(), (chunk.end_offset as i64).into());

                PointStruct::new(chunk.point_id().to_string(), chunk.embedding, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| IndexError::UpsertError(e.to_string()))?;

        Ok(())
    }

    async fn delete_document(&self, source_document_id: &str) -> Result<(), IndexError> {
        let filter = Filter::must([Condition::matches(
            "document_id",
            source_document_id.to_string(),
        )]);
        let delete = DeletePointsBuilder::new(&self.collection).points(filter);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| IndexError::DeleteError(e.to_string()))?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: u64,
        min_similarity: f32,
        source_document_id: Option<&str>,
    ) -> Result<SearchOutcome, IndexError> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, query_vector.to_vec(), top_k)
                .with_payload(true)
                .score_threshold(min_similarity);

        if let Some(doc_id) = source_document_id {
            search_builder = search_builder
                .filter(Filter::must([Condition::matches(
                    "document_id",
                    doc_id.to_string(),
                )]));
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| IndexError::SearchError(e.to_string()))?;

        let matches: Vec<RetrievedChunk> = results
            .result
            .into_iter()
            .map(|point| {
                let chunk_id = Self::payload_str(&point.payload, "chunk_id")
                    .unwrap_or_else(|| Self::point_uuid(&point.id));
                let source_document_id =
                    Self::payload_str(&point.payload, "document_id").unwrap_or_default();
                let text = Self::payload_str(&point.payload, "content").unwrap_or_default();

                RetrievedChunk {
                    chunk_id,
                    source_document_id,
                    similarity: point.score,
                    text,
                }
            })
            .collect();

        let candidates_examined = matches.len();

        Ok(SearchOutcome {
            matches,
            candidates_examined,
            dimension_mismatches: 0,
        })
    }

    async fn clear(&self) -> Result<(), IndexError> {
        if self.collection_info().await?.is_none() {
            return Ok(());
        }

        self.client
            .delete_collection(&self.collection)
            .await
            .map_err(|e| IndexError::DeleteError(e.to_string()))?;

        self.ensure_ready().await?;

        Ok(())
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
