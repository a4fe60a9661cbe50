//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{calculate_checksum, is_supported_document, mime_type, read_file_bytes};
pub use retry::{RetryConfig, RetryResult, Retryable, retry, with_retry};
