//! Typed client for the remote document-understanding API.
//!
//! All response shapes are modeled as concrete structs and enums; nothing
//! downstream touches raw JSON.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ExtractionError, UploadError};
use crate::models::ExtractionConfig;

/// Environment variable carrying the API bearer token.
pub const API_KEY_ENV: &str = "DOCPIPE_DOCUMENT_API_KEY";

/// Remote lifecycle states as the API reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteFileState {
    Pending,
    Processing,
    Active,
    Failed,
}

/// Response from `POST /v1/files`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub remote_file_id: String,
    pub state: RemoteFileState,
}

/// Response from `GET /v1/files/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileStatus {
    pub state: RemoteFileState,
    #[serde(default)]
    pub error: Option<String>,
}

/// Extraction instruction variant.
///
/// `OcrBiased` is the second-pass fallback for scans that come back nearly
/// empty under the standard instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionInstruction {
    Standard,
    OcrBiased,
}

/// Request body for `POST /v1/files/{id}:extract`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractRequest<'a> {
    model: &'a str,
    max_output_tokens: u32,
    instruction: ExtractionInstruction,
}

/// Response from `POST /v1/files/{id}:extract`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub model: Option<String>,
}

/// Client for the document API.
#[derive(Debug, Clone)]
pub struct DocumentApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl DocumentApiClient {
    /// Create a new client with the given configuration.
    ///
    /// The bearer token comes from `DOCPIPE_DOCUMENT_API_KEY` when set,
    /// falling back to the config file.
    pub fn new(config: &ExtractionConfig) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| UploadError::Connection(e.to_string()))?;

        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| config.api_key.clone());

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Upload raw section bytes. Returns the remote handle and its initial
    /// state, which can already be `ACTIVE` for small uploads.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        display_name: &str,
        mime_type: &str,
    ) -> Result<UploadedFile, UploadError> {
        let url = format!("{}/v1/files", self.base_url);
        let response = self
            .auth(self.client.post(&url))
            .query(&[("display_name", display_name)])
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UploadError::Timeout
                } else {
                    UploadError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UploadError::RateLimited);
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::ServerError {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| UploadError::InvalidResponse(e.to_string()))
    }

    /// Read the remote file's current state.
    pub async fn status(&self, remote_file_id: &str) -> Result<RemoteFileStatus, ExtractionError> {
        let url = format!("{}/v1/files/{}", self.base_url, remote_file_id);
        let response = self
            .auth(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ExtractionError::RemoteFailed(
                "remote file disappeared (404)".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Request(format!(
                "status poll returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))
    }

    /// Request text extraction from an active remote file.
    pub async fn extract(
        &self,
        remote_file_id: &str,
        max_output_tokens: u32,
        instruction: ExtractionInstruction,
    ) -> Result<ExtractionResponse, ExtractionError> {
        let url = format!("{}/v1/files/{}:extract", self.base_url, remote_file_id);
        let request = ExtractRequest {
            model: &self.model,
            max_output_tokens,
            instruction,
        };

        let response = self
            .auth(self.client.post(&url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractionError::Request("extract request timeout".to_string())
                } else {
                    ExtractionError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::RemoteFailed(format!(
                "extract returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))
    }

    /// Delete the remote artifact. Callers treat failures as non-fatal;
    /// artifacts expire server-side anyway.
    pub async fn delete(&self, remote_file_id: &str) -> Result<(), ExtractionError> {
        let url = format!("{}/v1/files/{}", self.base_url, remote_file_id);
        let response = self
            .auth(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Request(format!(
                "delete returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    /// Probe API reachability. Any HTTP response counts; an auth error still
    /// proves the endpoint is alive.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/v1/files", self.base_url);
        self.auth(self.client.get(&url))
            .query(&[("page_size", "1")])
            .send()
            .await
            .is_ok()
    }

    /// Get the base URL of the document API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Extraction model label sent with extract requests.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = ExtractionConfig::default();
        let client = DocumentApiClient::new(&config);
        assert!(client.is_ok());
    }

    #[test]
    fn test_base_url_trimming() {
        let config = ExtractionConfig {
            api_url: "http://localhost:18200/".to_string(),
            ..Default::default()
        };
        let client = DocumentApiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:18200");
    }

    #[test]
    fn test_uploaded_file_deserializes_camel_case() {
        let json = r#"{"remoteFileId":"files/abc-123","state":"PROCESSING"}"#;
        let parsed: UploadedFile = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.remote_file_id, "files/abc-123");
        assert_eq!(parsed.state, RemoteFileState::Processing);
    }

    #[test]
    fn test_status_carries_optional_error() {
        let json = r#"{"state":"FAILED","error":"corrupt page tree"}"#;
        let parsed: RemoteFileStatus = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.state, RemoteFileState::Failed);
        assert_eq!(parsed.error.as_deref(), Some("corrupt page tree"));

        let json = r#"{"state":"ACTIVE"}"#;
        let parsed: RemoteFileStatus = serde_json::from_str(json).unwrap();
        assert!(parsed.error.is_none());
    }

    #[test]
    fn test_extract_request_wire_shape() {
        let request = ExtractRequest {
            model: "document-extractor-v2",
            max_output_tokens: 65_536,
            instruction: ExtractionInstruction::OcrBiased,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""maxOutputTokens":65536"#));
        assert!(json.contains(r#""instruction":"OCR_BIASED""#));
    }

    #[test]
    fn test_extraction_response_defaults() {
        let json = r#"{"text":"hello"}"#;
        let parsed: ExtractionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text, "hello");
        assert_eq!(parsed.input_tokens, 0);
        assert_eq!(parsed.output_tokens, 0);
        assert!(parsed.model.is_none());
    }
}
