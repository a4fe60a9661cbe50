//! Error types for the ingestion and retrieval pipeline.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors raised while splitting a document into sections.
///
/// Splitting failures are fatal for the affected document and are never
/// retried.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("document is empty")]
    EmptyDocument,

    #[error("section size must be at least 1 byte, got {0}")]
    InvalidSectionSize(u64),

    #[error("document cannot be addressed as byte ranges: {0}")]
    Unaddressable(String),
}

/// Errors raised while uploading section bytes to the document API.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to connect to document API: {0}")]
    Connection(String),

    #[error("upload timed out")]
    Timeout,

    #[error("document API server error (status {status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("document API rate limited the upload")]
    RateLimited,

    #[error("document API rejected the upload (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid upload payload: {0}")]
    InvalidPayload(String),

    #[error("invalid upload response: {0}")]
    InvalidResponse(String),
}

impl Retryable for UploadError {
    fn is_retryable(&self) -> bool {
        match self {
            // Transport problems and 5xx/429 responses are worth retrying
            UploadError::Connection(_)
            | UploadError::Timeout
            | UploadError::ServerError { .. }
            | UploadError::RateLimited => true,
            // 4xx responses and malformed payloads/bodies will not improve on retry
            UploadError::Rejected { .. }
            | UploadError::InvalidPayload(_)
            | UploadError::InvalidResponse(_) => false,
        }
    }
}

/// Errors raised while driving a section through remote extraction.
///
/// `Timeout` (we gave up waiting) and `RemoteFailed` (the API reported
/// failure) are deliberately distinct variants: callers report them
/// differently.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("remote file still processing after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    #[error("remote processing failed: {0}")]
    RemoteFailed(String),

    #[error("extracted text too short: {chars} chars (minimum {min})")]
    TooShort { chars: usize, min: usize },

    #[error("invalid extraction response: {0}")]
    InvalidResponse(String),

    #[error("extraction request failed: {0}")]
    Request(String),
}

impl Retryable for ExtractionError {
    fn is_retryable(&self) -> bool {
        match self {
            ExtractionError::Upload(e) => e.is_retryable(),
            // The poll deadline and the remote's own verdict are final for
            // this attempt; the quality floor has its own one-shot OCR retry
            ExtractionError::Timeout { .. }
            | ExtractionError::RemoteFailed(_)
            | ExtractionError::TooShort { .. }
            | ExtractionError::InvalidResponse(_) => false,
            ExtractionError::Request(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("timeout") || msg.contains("connect")
            }
        }
    }
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection and timeout errors are retryable
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            // Server errors might be transient (e.g., 503 Service Unavailable)
            EmbeddingError::ServerError(msg) => {
                msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("unavailable")
                    || msg.to_lowercase().contains("too many requests")
            }
            // Request errors depend on the underlying cause
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            // Invalid responses are not retryable
            EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to vector index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to connect to vector index: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("delete error: {0}")]
    DeleteError(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector index backend error: {0}")]
    BackendError(String),
}

impl Retryable for IndexError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection errors are always retryable
            IndexError::ConnectionError(_) => true,
            // A mismatched dimension is a schema violation, not a blip
            IndexError::DimensionMismatch { .. } => false,
            // Other errors might be transient
            IndexError::CollectionError(msg)
            | IndexError::UpsertError(msg)
            | IndexError::SearchError(msg)
            | IndexError::DeleteError(msg)
            | IndexError::BackendError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
        }
    }
}

/// Errors related to query-side retrieval.
///
/// An empty result set is a valid outcome, not an error; only the plumbing
/// around it can fail.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query text cannot be empty")]
    EmptyQuery,

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector index error: {0}")]
    Index(#[from] IndexError),
}

/// Errors that abort ingestion of a whole document.
///
/// Chunk-scoped embedding failures are not represented here: the coordinator
/// isolates and counts them in the [`crate::models::IngestReport`] instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file read error: {0}")]
    FileReadError(String),

    #[error("document is empty")]
    EmptyDocument,

    #[error("file exceeds maximum size: {size} > {max}")]
    FileTooLarge { size: u64, max: u64 },

    #[error("split error: {0}")]
    Split(#[from] SplitError),

    #[error("extraction failed for section {section}: {source}")]
    Extraction {
        section: usize,
        #[source]
        source: ExtractionError,
    },

    #[error("vector index error: {0}")]
    Index(#[from] IndexError),

    #[error("document ingestion exceeded {budget_ms}ms budget")]
    Timeout { budget_ms: u64 },
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("vector index error: {0}")]
    Index(#[from] IndexError),

    #[error("infrastructure not running: {0}")]
    InfrastructureError(String),

    #[error("{0}")]
    Other(String),
}
