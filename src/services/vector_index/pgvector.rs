//! PostgreSQL/pgvector index backend.

use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

use super::{CollectionInfo, SearchOutcome, VectorIndex};
use crate::error::IndexError;
use crate::models::{Chunk, RetrievedChunk, VectorIndexConfig};

const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// pgvector-backed index. Cosine similarity is computed in SQL as
/// `1 - (embedding <=> query)`, matching the score range of the other
/// backends.
pub struct PgVectorIndex {
    pool: PgPool,
    table_name: String,
    dimension: usize,
}

impl PgVectorIndex {
    pub async fn new(config: &VectorIndexConfig, dimension: usize) -> Result<Self, IndexError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect(&config.url)
            .await
            .map_err(|e| IndexError::ConnectionError(e.to_string()))?;

        let backend = Self {
            pool,
            table_name: config.collection.clone(),
            dimension,
        };

        backend.check_pgvector_extension().await?;

        Ok(backend)
    }

    async fn check_pgvector_extension(&self) -> Result<(), IndexError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IndexError::BackendError(e.to_string()))?;

        if result.is_none() {
            return Err(IndexError::BackendError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn health_check(&self) -> Result<bool, IndexError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| IndexError::ConnectionError(e.to_string()))
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, IndexError> {
        let table_exists: Option<(String,)> = sqlx::query_as(
            "SELECT table_name FROM information_schema.tables WHERE table_name = $1",
        )
        .bind(&self.table_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexError::BackendError(e.to_string()))?;

        if table_exists.is_none() {
            return Ok(None);
        }

        let query = format!("SELECT COUNT(*) as count FROM {}", self.table_name);
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexError::BackendError(e.to_string()))?;

        Ok(Some(CollectionInfo {
            points_count: row.0 as u64,
        }))
    }

    async fn ensure_ready(&self) -> Result<(), IndexError> {
        if self.collection_info().await?.is_some() {
            return Ok(());
        }

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                chunk_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding vector({}) NOT NULL,
                token_estimate INTEGER NOT NULL,
                start_offset BIGINT NOT NULL,
                end_offset BIGINT NOT NULL
            )
            "#,
            self.table_name, self.dimension
        );

        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::CollectionError(e.to_string()))?;

        let indices = [
            format!(
                "CREATE INDEX IF NOT EXISTS {}_embedding_idx ON {} USING hnsw (embedding vector_cosine_ops)",
                self.table_name, self.table_name
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {}_document_id_idx ON {} (document_id)",
                self.table_name, self.table_name
            ),
        ];

        for index_sql in &indices {
            sqlx::query(index_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| IndexError::CollectionError(e.to_string()))?;
        }

        Ok(())
    }

    async fn upsert_chunks(&self, chunks: Vec<Chunk>) -> Result<(), IndexError> {
        if chunks.is_empty() {
            return Ok(());
        }

        for chunk in &chunks {
            if chunk.embedding.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: chunk.embedding.len(),
                });
            }
        }

        let query = format!(
            r#"
            INSERT INTO {} (id, chunk_id, document_id, chunk_index, content, embedding,
                          token_estimate, start_offset, end_offset)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                chunk_id = EXCLUDED.chunk_id,
                document_id = EXCLUDED.document_id,
                chunk_index = EXCLUDED.chunk_index,
                content = EXCLUDED.content,
                embedding = EXCLUDED.embedding,
                token_estimate = EXCLUDED.token_estimate,
                start_offset = EXCLUDED.start_offset,
                end_offset = EXCLUDED.end_offset
            "#,
            self.table_name
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::UpsertError(e.to_string()))?;

        for chunk in chunks {
            let id = chunk.point_id();
            let embedding = Vector::from(chunk.embedding.clone());

            sqlx::query(&query)
                .bind(id)
                .bind(&chunk.id)
                .bind(&chunk.source_document_id)
                .bind(chunk.index as i32)
                .bind(&chunk.text)
                .bind(&embedding)
                .bind(chunk.token_estimate as i32)
                .bind(chunk.start_offset as i64)
                .bind(chunk.end_offset as i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| IndexError::UpsertError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| IndexError::UpsertError(e.to_string()))?;

        Ok(())
    }

    async fn delete_document(&self, source_document_id: &str) -> Result<(), IndexError> {
        let query = format!("DELETE FROM {} WHERE document_id = $1", self.table_name);

        sqlx::query(&query)
            .bind(source_document_id)
            .execute(&self.pool)
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
        let embedding = Vector::from(query_vector.to_vec());

        let mut where_parts = vec![format!("(1 - (embedding <=> $1)) >= {}", min_similarity)];
        if source_document_id.is_some() {
            where_parts.push("document_id = $2".to_string());
        }

        let query = format!(
            r#"
            SELECT
                chunk_id,
                document_id,
                1 - (embedding <=> $1) as score,
                content
            FROM {}
            WHERE {}
            ORDER BY embedding <=> $1
            LIMIT {}
            "#,
            self.table_name,
            where_parts.join(" AND "),
            top_k
        );

        let mut query_builder = sqlx::query(&query).bind(&embedding);
        if let Some(doc_id) = source_document_id {
            query_builder = query_builder.bind(doc_id);
        }

        let rows = query_builder
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IndexError::SearchError(e.to_string()))?;

        let matches: Vec<RetrievedChunk> = rows
            .into_iter()
            .map(|row: PgRow| {
                let chunk_id: String = row.get("chunk_id");
                let source_document_id: String = row.get("document_id");
                let score: f64 = row.get("score");
                let text: String = row.get("content");

                RetrievedChunk {
                    chunk_id,
                    source_document_id,
                    similarity: score as f32,
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

        let query = format!("TRUNCATE TABLE {}", self.table_name);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::DeleteError(e.to_string()))?;

        Ok(())
    }

    fn collection(&self) -> &str {
        &self.table_name
    }
}
