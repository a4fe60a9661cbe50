//! Extraction orchestration: upload, poll, extract, cleanup.
//!
//! Owns one section's trip through the remote document API. The upload
//! session state machine lives here; nothing downstream sees remote state.

use std::time::Duration;
use tokio::time::{Instant, interval, timeout};

use crate::error::ExtractionError;
use crate::models::{ExtractedText, ExtractionConfig, Section, SessionState, UploadSession};
use crate::remote::{
    DocumentApiClient, ExtractionInstruction, ExtractionResponse, RemoteFileState, UploadedFile,
};
use crate::utils::retry::{Retryable, RetryConfig, RetryResult, with_retry};
use crate::utils::text::{has_meaningful_content, meaningful_char_count};

/// One section's extraction outcome plus orchestration counters.
#[derive(Debug)]
pub struct SectionExtraction {
    pub extracted: ExtractedText,
    pub upload_attempts: u32,
    pub ocr_retried: bool,
}

/// Drives sections through upload → poll → extract → cleanup.
pub struct ExtractionOrchestrator {
    client: DocumentApiClient,
    config: ExtractionConfig,
    verbose: bool,
}

impl ExtractionOrchestrator {
    pub fn new(client: DocumentApiClient, config: ExtractionConfig) -> Self {
        Self {
            client,
            config,
            verbose: false,
        }
    }

    /// Enable poll/cleanup diagnostics on stderr.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Extract text from one section of a document.
    ///
    /// The remote artifact is deleted best-effort afterwards regardless of
    /// outcome; artifacts also expire server-side.
    pub async fn extract_section(
        &self,
        section: &Section,
        bytes: Vec<u8>,
        display_name: &str,
        mime_type: &str,
    ) -> Result<SectionExtraction, ExtractionError> {
        let started = Instant::now();
        let mut session = UploadSession::new();

        advance(&mut session, SessionState::Uploading)?;

        let retry_config = RetryConfig::new(self.config.max_upload_retries.max(1));
        let upload = with_retry(&retry_config, || {
            self.client.upload(bytes.clone(), display_name, mime_type)
        })
        .await;

        let (uploaded, upload_attempts): (UploadedFile, u32) = match upload {
            RetryResult::Success { value, attempts } => (value, attempts),
            RetryResult::Failed { last_error, .. } => {
                let _ = session.advance(SessionState::Failed);
                return Err(ExtractionError::Upload(last_error));
            }
        };

        session.remote_file_id = Some(uploaded.remote_file_id.clone());

        match uploaded.state {
            RemoteFileState::Pending | RemoteFileState::Processing => {
                advance(&mut session, SessionState::Processing)?;
            }
            RemoteFileState::Active => {
                advance(&mut session, SessionState::Active)?;
            }
            RemoteFileState::Failed => {
                advance(&mut session, SessionState::Failed)?;
                return Err(ExtractionError::RemoteFailed(
                    "remote rejected the file during upload".to_string(),
                ));
            }
        }

        let outcome = self.drive_to_text(&mut session, &uploaded.remote_file_id).await;

        if let Err(e) = self.client.delete(&uploaded.remote_file_id).await {
            if self.verbose {
                eprintln!(
                    "cleanup: failed to delete remote file {}: {}",
                    uploaded.remote_file_id, e
                );
            }
        }

        let (response, ocr_retried) = outcome?;
        let character_count = response.text.chars().count();

        Ok(SectionExtraction {
            extracted: ExtractedText {
                source_document_id: section.source_document_id.clone(),
                section_index: section.index,
                character_count,
                model: response
                    .model
                    .unwrap_or_else(|| self.client.model().to_string()),
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
                cost_estimate: self.cost_estimate(response.input_tokens, response.output_tokens),
                duration_ms: started.elapsed().as_millis() as u64,
                text: response.text,
            },
            upload_attempts,
            ocr_retried,
        })
    }

    /// Poll until terminal, then extract with the content-quality floor.
    async fn drive_to_text(
        &self,
        session: &mut UploadSession,
        remote_file_id: &str,
    ) -> Result<(ExtractionResponse, bool), ExtractionError> {
        if session.state == SessionState::Processing {
            let deadline = Duration::from_millis(self.config.poll_timeout_ms);
            match timeout(deadline, self.poll_until_terminal(session, remote_file_id)).await {
                Ok(result) => result?,
                Err(_) => {
                    let _ = session.advance(SessionState::Failed);
                    return Err(ExtractionError::Timeout {
                        waited_ms: self.config.poll_timeout_ms,
                    });
                }
            }
        }

        self.extract_with_quality_floor(remote_file_id).await
    }

    /// Fixed-interval poll loop; the caller bounds it with an overall
    /// deadline. Transient poll failures ride until that deadline.
    async fn poll_until_terminal(
        &self,
        session: &mut UploadSession,
        remote_file_id: &str,
    ) -> Result<(), ExtractionError> {
        let mut ticker = interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));

        loop {
            ticker.tick().await;
            session.mark_polled();

            match self.client.status(remote_file_id).await {
                Ok(status) => match status.state {
                    RemoteFileState::Active => {
                        advance(session, SessionState::Active)?;
                        return Ok(());
                    }
                    RemoteFileState::Failed => {
                        advance(session, SessionState::Failed)?;
                        return Err(ExtractionError::RemoteFailed(
                            status
                                .error
                                .unwrap_or_else(|| "remote processing failed".to_string()),
                        ));
                    }
                    RemoteFileState::Pending | RemoteFileState::Processing => {
                        if self.verbose {
                            eprintln!("poll: {} still processing", remote_file_id);
                        }
                    }
                },
                Err(e) if e.is_retryable() => {
                    if self.verbose {
                        eprintln!("poll: transient error for {}: {}", remote_file_id, e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Request extraction; if the text misses the character floor, retry
    /// exactly once with the OCR-biased instruction before giving up.
    async fn extract_with_quality_floor(
        &self,
        remote_file_id: &str,
    ) -> Result<(ExtractionResponse, bool), ExtractionError> {
        let min = self.config.min_extracted_chars;
        let max_tokens = self.config.max_output_tokens_per_section;

        let first = self
            .client
            .extract(remote_file_id, max_tokens, ExtractionInstruction::Standard)
            .await?;
        if has_meaningful_content(&first.text, min) {
            return Ok((first, false));
        }

        if self.verbose {
            eprintln!(
                "extract: {} chars below floor of {}, retrying with OCR bias",
                meaningful_char_count(&first.text),
                min
            );
        }

        let second = self
            .client
            .extract(remote_file_id, max_tokens, ExtractionInstruction::OcrBiased)
            .await?;
        let chars = meaningful_char_count(&second.text);
        if chars >= min {
            return Ok((second, true));
        }

        Err(ExtractionError::TooShort { chars, min })
    }

    fn cost_estimate(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.config.input_cost_per_1k_tokens
            + (output_tokens as f64 / 1000.0) * self.config.output_cost_per_1k_tokens
    }
}

fn advance(session: &mut UploadSession, next: SessionState) -> Result<(), ExtractionError> {
    session
        .advance(next)
        .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))
}
