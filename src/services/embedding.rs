//! Embedding generation for chunks and queries.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;

/// Converts text into fixed-dimensionality vectors.
///
/// Implementations must produce vectors of exactly `dimension()` elements;
/// the pipeline fails fast on anything else.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed chunk text for indexing.
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed query text for retrieval.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Fixed output dimensionality.
    fn dimension(&self) -> usize;
}

/// Instruction type for embedding generation.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionType {
    /// For indexing documents
    Document,
    /// For search queries
    Query,
}

/// Request body for the /embed endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest {
    inputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    truncate: Option<bool>,
    instruction_type: InstructionType,
}

/// Response from the /embed endpoint.
#[derive(Debug, Deserialize)]
struct EmbedResponse(Vec<Vec<f32>>);

/// Health response from the /health endpoint.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// Client for an HTTP embedding server.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    dimension: usize,
}

impl HttpEmbedder {
    /// Create a new embedding client with the given configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            dimension: config.dimension,
        })
    }

    /// Create a client with default configuration.
    pub fn with_defaults() -> Result<Self, EmbeddingError> {
        Self::new(&EmbeddingConfig::default())
    }

    /// Check if the embedding server is healthy and ready.
    pub async fn health_check(&self) -> Result<HealthResponse, EmbeddingError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::ServerError(format!(
                "health check failed with status: {}",
                response.status()
            )));
        }

        // Server may return an empty body on health check
        let text = response.text().await.unwrap_or_default();
        if text.is_empty() {
            return Ok(HealthResponse {
                status: Some("healthy".to_string()),
                model_id: None,
            });
        }

        serde_json::from_str(&text).map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))
    }

    async fn embed_one(
        &self,
        text: &str,
        instruction_type: InstructionType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embed", self.base_url);
        let request = EmbedRequest {
            inputs: vec![text.to_string()],
            truncate: Some(true),
            instruction_type,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else {
                    EmbeddingError::RequestError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let vector = embed_response.0.into_iter().next().ok_or_else(|| {
            EmbeddingError::InvalidResponse("empty embedding response".to_string())
        })?;

        if vector.len() != self.dimension {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected dimension {}, server returned {}",
                self.dimension,
                vector.len()
            )));
        }

        Ok(vector)
    }

    /// Get the base URL of the embedding server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_one(text, InstructionType::Document).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_one(text, InstructionType::Query).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn embedder_for(server: &MockServer, dimension: usize) -> HttpEmbedder {
        HttpEmbedder::new(&EmbeddingConfig {
            url: server.base_url(),
            dimension,
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_client_creation() {
        let config = EmbeddingConfig::default();
        let client = HttpEmbedder::new(&config);
        assert!(client.is_ok());
    }

    #[test]
    fn test_base_url_trimming() {
        let config = EmbeddingConfig {
            url: "http://localhost:11411/".to_string(),
            ..Default::default()
        };
        let client = HttpEmbedder::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11411");
    }

    #[tokio::test]
    async fn test_embed_document_returns_vector() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embed")
                    .json_body_includes(r#"{"instruction_type":"document"}"#);
                then.status(200).json_body(serde_json::json!([[0.1, 0.2, 0.3]]));
            })
            .await;

        let embedder = embedder_for(&server, 3);
        let vector = embedder.embed_document("some chunk text").await.unwrap();

        mock.assert_async().await;
        assert_eq!(vector.len(), 3);
    }

    #[tokio::test]
    async fn test_query_uses_query_instruction() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embed")
                    .json_body_includes(r#"{"instruction_type":"query"}"#);
                then.status(200).json_body(serde_json::json!([[1.0, 0.0]]));
            })
            .await;

        let embedder = embedder_for(&server, 2);
        let vector = embedder.embed_query("what is the refund policy").await.unwrap();

        mock.assert_async().await;
        assert_eq!(vector, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200).json_body(serde_json::json!([[0.1, 0.2]]));
            })
            .await;

        let embedder = embedder_for(&server, 768);
        let err = embedder.embed_document("text").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_server_error_carries_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(503).body("overloaded");
            })
            .await;

        let embedder = embedder_for(&server, 2);
        let err = embedder.embed_document("text").await.unwrap_err();
        match err {
            EmbeddingError::ServerError(msg) => assert!(msg.contains("503")),
            other => panic!("expected server error, got {:?}", other),
        }
    }
}
