//! End-to-end ingestion coordinator.
//!
//! Sequences classify → split → extract → chunk → embed → index-write for
//! one document and folds everything that happened into an `IngestReport`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{ConfigError, EmbeddingError, IngestError};
use crate::models::{Chunk, Config, IngestReport, SectionReport, Section, SourceDocument};
use crate::services::chunker::{TextChunker, estimate_tokens};
use crate::services::classifier::SizeClassifier;
use crate::services::embedding::Embedder;
use crate::services::extraction::{ExtractionOrchestrator, SectionExtraction};
use crate::services::splitter::SectionSplitter;
use crate::services::vector_index::VectorIndex;
use crate::utils::file::sanitize_display_name;
use crate::utils::retry::{RetryConfig, with_retry};

/// Joins section texts back into one document, in section order.
const SECTION_SEPARATOR: &str = "\n\n";

/// Headroom added to derived document budgets for chunking, embedding and
/// index writes.
const DOWNSTREAM_SLACK_MS: u64 = 300_000;

pub struct IngestionPipeline {
    config: Config,
    extractor: ExtractionOrchestrator,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chunker: TextChunker,
    verbose: bool,
}

struct EmbedBatch {
    /// Chunks that embedded successfully, embeddings attached, source order.
    chunks: Vec<Chunk>,
    failed: usize,
}

impl IngestionPipeline {
    pub fn new(
        config: Config,
        extractor: ExtractionOrchestrator,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self, ConfigError> {
        let chunker = TextChunker::new(&config.chunking)?;
        Ok(Self {
            config,
            extractor,
            embedder,
            index,
            chunker,
            verbose: false,
        })
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Ingest one document end to end.
    ///
    /// Never returns an error: every outcome, including failures and the
    /// document-level timeout, lands in the report with whatever costs and
    /// durations had accumulated.
    pub async fn ingest(&self, document: &SourceDocument, bytes: Vec<u8>) -> IngestReport {
        let started = Instant::now();
        let mut report =
            IngestReport::started(&document.id, &document.display_name, document.byte_size);

        let budget_ms = self.document_budget_ms(document.byte_size);
        let outcome = match tokio::time::timeout(
            Duration::from_millis(budget_ms),
            self.run(document, bytes, &mut report),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(IngestError::Timeout { budget_ms }),
        };

        report.duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => report.success = true,
            Err(e) => {
                report.success = false;
                report.error = Some(e.to_string());
            }
        }

        report
    }

    async fn run(
        &self,
        document: &SourceDocument,
        bytes: Vec<u8>,
        report: &mut IngestReport,
    ) -> Result<(), IngestError> {
        if bytes.is_empty() {
            return Err(IngestError::EmptyDocument);
        }
        if document.byte_size > self.config.ingest.max_file_size {
            return Err(IngestError::FileTooLarge {
                size: document.byte_size,
                max: self.config.ingest.max_file_size,
            });
        }

        // Index readiness is checked before any remote spend.
        self.index.ensure_ready().await?;

        let class =
            SizeClassifier::new(self.config.extraction.section_size_bytes).classify(document.byte_size);
        report.needs_split = class.needs_split;

        let splitter = SectionSplitter::new(class.section_size_bytes)?;
        let sections = splitter.split(document)?;

        if self.verbose {
            eprintln!(
                "[pipeline] {}: {} bytes, {} section(s)",
                document.display_name,
                document.byte_size,
                sections.len()
            );
        }

        // Sections go through the remote API one at a time; the parallelism
        // budget is spent on chunk embedding below.
        let mut extracted_parts: Vec<String> = Vec::with_capacity(sections.len());
        for section in &sections {
            let slice = splitter.slice(&bytes, section)?;
            let display_name = section_display_name(&document.display_name, section, sections.len());
            let section_started = Instant::now();

            match self
                .extractor
                .extract_section(section, slice.to_vec(), &display_name, &document.mime_type)
                .await
            {
                Ok(extraction) => {
                    extracted_parts.push(extraction.extracted.text.clone());
                    report.record_section(success_report(section, &extraction));
                }
                Err(e) => {
                    report.record_section(failure_report(
                        section,
                        section_started.elapsed().as_millis() as u64,
                        &e,
                    ));
                    return Err(IngestError::Extraction {
                        section: section.index,
                        source: e,
                    });
                }
            }
        }

        let full_text = extracted_parts.join(SECTION_SEPARATOR);
        report.token_estimate = estimate_tokens(&full_text) as u64;

        let chunks = self.chunker.chunk(&document.id, &full_text);
        report.chunk_count = chunks.len();

        if self.verbose {
            eprintln!(
                "[pipeline] {}: ~{} tokens, {} chunk(s)",
                document.display_name, report.token_estimate, report.chunk_count
            );
        }

        let batch = self.embed_chunks(chunks).await;
        report.embedded_count = batch.chunks.len();
        report.failed_chunk_count = batch.failed;

        // Delete-then-write: stale chunks from earlier runs of the same
        // document never survive next to the new ones.
        self.index.delete_document(&document.id).await?;
        self.index.upsert_chunks(batch.chunks).await?;

        Ok(())
    }

    /// Embed chunks through a bounded worker pool.
    ///
    /// Chunk indices were assigned by the chunker before any task spawns, so
    /// completion order cannot reorder anything. A chunk that exhausts its
    /// retries is dropped and counted; its siblings proceed.
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> EmbedBatch {
        let total = chunks.len();
        if total == 0 {
            return EmbedBatch {
                chunks: Vec::new(),
                failed: 0,
            };
        }

        let semaphore = Arc::new(Semaphore::new(self.config.embedding.concurrency.max(1)));
        let retry_config = RetryConfig {
            max_retries: self.config.embedding.max_retries,
            ..Default::default()
        };

        let mut join_set: JoinSet<(usize, Result<Vec<f32>, EmbeddingError>)> = JoinSet::new();
        for (slot, chunk) in chunks.iter().enumerate() {
            let semaphore = semaphore.clone();
            let embedder = self.embedder.clone();
            let retry_config = retry_config.clone();
            let text = chunk.text.clone();

            join_set.spawn(async move {
                // The semaphore is never closed, so the permit always arrives.
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = with_retry(&retry_config, || embedder.embed_document(&text)).await;
                (slot, outcome.into_result())
            });
        }

        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, Ok(vector))) => vectors[slot] = Some(vector),
                Ok((slot, Err(e))) => {
                    if self.verbose {
                        eprintln!("[pipeline] chunk {} embedding failed: {}", slot, e);
                    }
                }
                Err(e) => {
                    if self.verbose {
                        eprintln!("[pipeline] embedding task failed: {}", e);
                    }
                }
            }
        }

        let mut embedded = Vec::with_capacity(total);
        for (chunk, vector) in chunks.into_iter().zip(vectors.into_iter()) {
            if let Some(v) = vector {
                let mut chunk = chunk;
                chunk.embedding = v;
                embedded.push(chunk);
            }
        }

        let failed = total - embedded.len();
        EmbedBatch {
            chunks: embedded,
            failed,
        }
    }

    /// Per-document deadline. A configured value wins; zero derives a
    /// ceiling from the section count and per-stage budgets.
    fn document_budget_ms(&self, byte_size: u64) -> u64 {
        if self.config.ingest.document_timeout_ms > 0 {
            return self.config.ingest.document_timeout_ms;
        }

        let section_size = self.config.extraction.section_size_bytes.max(1);
        let sections = byte_size.div_ceil(section_size).max(1);
        let per_section_ms = self.config.extraction.poll_timeout_ms
            + 2 * self.config.extraction.request_timeout_secs * 1000;

        sections * per_section_ms + DOWNSTREAM_SLACK_MS
    }
}

fn section_display_name(document_name: &str, section: &Section, total: usize) -> String {
    let base = sanitize_display_name(document_name);
    if total <= 1 {
        base
    } else {
        format!("{} (section {} of {})", base, section.index + 1, total)
    }
}

fn success_report(section: &Section, extraction: &SectionExtraction) -> SectionReport {
    SectionReport {
        index: section.index,
        byte_size: section.byte_size(),
        extracted_chars: extraction.extracted.character_count,
        input_tokens: extraction.extracted.input_tokens,
        output_tokens: extraction.extracted.output_tokens,
        cost_estimate: extraction.extracted.cost_estimate,
        duration_ms: extraction.extracted.duration_ms,
        upload_attempts: extraction.upload_attempts,
        ocr_retried: extraction.ocr_retried,
        success: true,
        error: None,
    }
}

fn failure_report(
    section: &Section,
    duration_ms: u64,
    error: &crate::error::ExtractionError,
) -> SectionReport {
    SectionReport {
        index: section.index,
        byte_size: section.byte_size(),
        extracted_chars: 0,
        input_tokens: 0,
        output_tokens: 0,
        cost_estimate: 0.0,
        duration_ms,
        upload_attempts: 0,
        ocr_retried: false,
        success: false,
        error: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use httpmock::prelude::*;

    use crate::remote::DocumentApiClient;
    use crate::services::vector_index::MemoryIndex;

    const DIMENSION: usize = 3;

    struct StubEmbedder {
        fail_one: AtomicBool,
    }

    impl StubEmbedder {
        fn reliable() -> Self {
            Self {
                fail_one: AtomicBool::new(false),
            }
        }

        fn failing_one_call() -> Self {
            Self {
                fail_one: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_document(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if self.fail_one.swap(false, Ordering::SeqCst) {
                return Err(EmbeddingError::InvalidResponse("stubbed failure".to_string()));
            }
            Ok(vec![1.0, 0.0, 0.0])
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0, 0.0])
        }

        fn dimension(&self) -> usize {
            DIMENSION
        }
    }

    fn test_config(server: &MockServer) -> Config {
        let mut config = Config::default();
        config.extraction.api_url = server.base_url();
        config.extraction.poll_interval_ms = 10;
        config.extraction.poll_timeout_ms = 500;
        config.extraction.request_timeout_secs = 5;
        config.embedding.max_retries = 1;
        config
    }

    fn build(config: Config, embedder: StubEmbedder) -> (IngestionPipeline, Arc<MemoryIndex>) {
        let index = Arc::new(MemoryIndex::new(DIMENSION));
        let client = DocumentApiClient::new(&config.extraction).unwrap();
        let extractor = ExtractionOrchestrator::new(client, config.extraction.clone());
        let pipeline = IngestionPipeline::new(
            config,
            extractor,
            Arc::new(embedder),
            index.clone() as Arc<dyn VectorIndex>,
        )
        .unwrap();
        (pipeline, index)
    }

    fn document(bytes: &[u8]) -> SourceDocument {
        SourceDocument::new(
            "/tmp/doc.pdf",
            "doc.pdf",
            bytes.len() as u64,
            "application/pdf",
            "checksum".to_string(),
        )
    }

    async fn mock_single_section(server: &MockServer, text: String) {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/files")
                    .query_param("display_name", "doc.pdf");
                then.status(200).json_body(serde_json::json!({
                    "remoteFileId": "files/a",
                    "state": "ACTIVE"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/files/files/a:extract");
                then.status(200).json_body(serde_json::json!({
                    "text": text,
                    "inputTokens": 1000,
                    "outputTokens": 750
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/v1/files/files/a");
                then.status(200);
            })
            .await;
    }

    #[tokio::test]
    async fn test_ingest_single_section_end_to_end() {
        let server = MockServer::start_async().await;
        // 3000 chars: two chunks at the default 2000-char window / 1800 stride
        mock_single_section(&server, "k".repeat(3000)).await;

        let (pipeline, index) = build(test_config(&server), StubEmbedder::reliable());
        let doc = document(b"pdf!");
        let report = pipeline.ingest(&doc, b"pdf!".to_vec()).await;

        assert!(report.success, "report error: {:?}", report.error);
        assert!(!report.needs_split);
        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.extracted_chars, 3000);
        assert_eq!(report.token_estimate, 750);
        assert_eq!(report.chunk_count, 2);
        assert_eq!(report.embedded_count, 2);
        assert_eq!(report.failed_chunk_count, 0);
        assert!(report.total_cost_estimate > 0.0);

        let info = index.collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 2);
    }

    #[tokio::test]
    async fn test_ingest_isolates_single_chunk_failure() {
        let server = MockServer::start_async().await;
        mock_single_section(&server, "k".repeat(3000)).await;

        let (pipeline, index) = build(test_config(&server), StubEmbedder::failing_one_call());
        let doc = document(b"pdf!");
        let report = pipeline.ingest(&doc, b"pdf!".to_vec()).await;

        assert!(report.success);
        assert_eq!(report.chunk_count, 2);
        assert_eq!(report.embedded_count, 1);
        assert_eq!(report.failed_chunk_count, 1);

        let info = index.collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 1);
    }

    #[tokio::test]
    async fn test_ingest_twice_is_idempotent() {
        let server = MockServer::start_async().await;
        mock_single_section(&server, "k".repeat(3000)).await;

        let (pipeline, index) = build(test_config(&server), StubEmbedder::reliable());
        let doc = document(b"pdf!");

        let first = pipeline.ingest(&doc, b"pdf!".to_vec()).await;
        let second = pipeline.ingest(&doc, b"pdf!".to_vec()).await;

        assert!(first.success && second.success);
        assert_eq!(first.chunk_count, second.chunk_count);

        let info = index.collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, first.chunk_count as u64);
    }

    #[tokio::test]
    async fn test_ingest_concatenates_sections_in_order() {
        let server = MockServer::start_async().await;
        let first_text = "alpha ".repeat(100);
        let second_text = "omega ".repeat(100);

        for (label, file_id, text) in [
            ("doc.pdf (section 1 of 2)", "files/s1", first_text.clone()),
            ("doc.pdf (section 2 of 2)", "files/s2", second_text.clone()),
        ] {
            server
                .mock_async(|when, then| {
                    when.method(POST)
                        .path("/v1/files")
                        .query_param("display_name", label);
                    then.status(200).json_body(serde_json::json!({
                        "remoteFileId": file_id,
                        "state": "ACTIVE"
                    }));
                })
                .await;
            server
                .mock_async(|when, then| {
                    when.method(POST).path(format!("/v1/files/{}:extract", file_id));
                    then.status(200).json_body(serde_json::json!({ "text": text }));
                })
                .await;
            server
                .mock_async(|when, then| {
                    when.method(DELETE).path(format!("/v1/files/{}", file_id));
                    then.status(200);
                })
                .await;
        }

        let mut config = test_config(&server);
        config.extraction.section_size_bytes = 4;
        let (pipeline, index) = build(config, StubEmbedder::reliable());

        let bytes = vec![0u8; 8];
        let doc = document(&bytes);
        let report = pipeline.ingest(&doc, bytes).await;

        assert!(report.success, "report error: {:?}", report.error);
        assert!(report.needs_split);
        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.chunk_count, 1);

        let outcome = index.search(&[1.0, 0.0, 0.0], 10, 0.0, None).await.unwrap();
        assert_eq!(
            outcome.matches[0].text,
            format!("{}\n\n{}", first_text, second_text)
        );
    }

    #[tokio::test]
    async fn test_ingest_section_failure_keeps_prior_costs() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/files")
                    .query_param("display_name", "doc.pdf (section 1 of 2)");
                then.status(200).json_body(serde_json::json!({
                    "remoteFileId": "files/s1",
                    "state": "ACTIVE"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/files/files/s1:extract");
                then.status(200).json_body(serde_json::json!({
                    "text": "alpha ".repeat(100),
                    "inputTokens": 900,
                    "outputTokens": 200
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/v1/files/files/s1");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/files")
                    .query_param("display_name", "doc.pdf (section 2 of 2)");
                then.status(400).body("unsupported content");
            })
            .await;

        let mut config = test_config(&server);
        config.extraction.section_size_bytes = 4;
        let (pipeline, index) = build(config, StubEmbedder::reliable());

        let bytes = vec![0u8; 8];
        let doc = document(&bytes);
        let report = pipeline.ingest(&doc, bytes).await;

        assert!(!report.success);
        assert!(report.error.as_deref().unwrap_or("").contains("section 1"));
        assert_eq!(report.sections.len(), 2);
        assert!(report.sections[0].success);
        assert!(!report.sections[1].success);
        assert!(report.total_cost_estimate > 0.0);
        assert_eq!(report.chunk_count, 0);

        let info = index.collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 0);
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_document() {
        let server = MockServer::start_async().await;
        let (pipeline, _) = build(test_config(&server), StubEmbedder::reliable());

        let doc = document(b"");
        let report = pipeline.ingest(&doc, Vec::new()).await;

        assert!(!report.success);
        assert!(report.error.as_deref().unwrap_or("").contains("empty"));
        assert!(report.sections.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_document_budget_aborts_stalled_work() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/files");
                then.status(200).json_body(serde_json::json!({
                    "remoteFileId": "files/slow",
                    "state": "PROCESSING"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/files/files/slow");
                then.status(200)
                    .json_body(serde_json::json!({ "state": "PROCESSING" }));
            })
            .await;

        let mut config = test_config(&server);
        config.extraction.poll_timeout_ms = 10_000;
        config.ingest.document_timeout_ms = 60;
        let (pipeline, _) = build(config, StubEmbedder::reliable());

        let doc = document(b"pdf!");
        let report = pipeline.ingest(&doc, b"pdf!".to_vec()).await;

        assert!(!report.success);
        assert!(report.error.as_deref().unwrap_or("").contains("budget"));
    }
}
