//! Ingest command implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use crate::cli::output::{Formatter, IngestStats, get_formatter};
use crate::models::{Config, OutputFormat, SourceDocument};
use crate::remote::DocumentApiClient;
use crate::services::{
    CHARS_PER_TOKEN, ExtractionOrchestrator, HttpEmbedder, IngestionPipeline, RunLog,
    SizeClassifier, VectorIndex, create_index,
};
use crate::utils::{calculate_checksum, is_supported_document, mime_type, read_file_bytes};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Path to a document or a directory of documents
    #[arg(required = true)]
    pub path: PathBuf,

    /// Display name override (single file only)
    #[arg(long)]
    pub display_name: Option<String>,

    /// File patterns to exclude (can be specified multiple times)
    #[arg(long, short = 'e')]
    pub exclude: Vec<String>,

    /// Show size class, section and chunk estimates without calling any API
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let path = args.path.canonicalize().context("invalid path")?;
    let files = collect_files(&path, &args.exclude, &config.ingest.exclude_patterns)?;

    if files.is_empty() {
        println!(
            "{}",
            formatter.format_message("No supported documents found.")
        );
        return Ok(());
    }

    if args.display_name.is_some() && files.len() > 1 {
        anyhow::bail!("--display-name applies to a single file only");
    }

    if verbose {
        println!("Found {} files to process", files.len());
    }

    if args.dry_run {
        return dry_run(&files, &config, formatter.as_ref());
    }

    let api_client = DocumentApiClient::new(&config.extraction)?;
    let orchestrator =
        ExtractionOrchestrator::new(api_client, config.extraction.clone()).verbose(verbose);
    let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);
    let index: Arc<dyn VectorIndex> =
        Arc::from(create_index(&config.vector_index, config.embedding.dimension).await?);
    let pipeline =
        IngestionPipeline::new(config.clone(), orchestrator, embedder, index)?.verbose(verbose);

    let run_log = RunLog::from_config(&config.run_log);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut stats = IngestStats {
        files_scanned: files.len() as u64,
        ..Default::default()
    };
    let mut last_report = None;

    for file_path in &files {
        pb.inc(1);

        if !is_supported_document(file_path) {
            stats.files_skipped += 1;
            continue;
        }

        let bytes = match read_file_bytes(file_path, config.ingest.max_file_size) {
            Ok(b) => b,
            Err(e) => {
                if verbose {
                    pb.println(format!("Skipping {}: {}", file_path.display(), e));
                }
                stats.files_skipped += 1;
                continue;
            }
        };

        let checksum = calculate_checksum(&bytes);
        let display_name = args
            .display_name
            .clone()
            .or_else(|| {
                file_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| file_path.to_string_lossy().to_string());

        let document = SourceDocument::new(
            file_path.to_string_lossy().to_string(),
            display_name,
            bytes.len() as u64,
            mime_type(file_path),
            checksum,
        );

        let report = pipeline.ingest(&document, bytes).await;

        if let Some(ref log) = run_log {
            log.record(&report);
        }

        stats.total_cost_estimate += report.total_cost_estimate;
        if report.success {
            stats.files_ingested += 1;
            stats.chunks_written += report.embedded_count as u64;
        } else {
            stats.files_failed += 1;
            if verbose {
                let error = report.error.as_deref().unwrap_or("unknown error");
                pb.println(format!("Failed {}: {}", file_path.display(), error));
            }
        }

        last_report = Some(report);
    }

    pb.finish_and_clear();

    if let Some(ref log) = run_log {
        log.cleanup(config.run_log.retention_days);
    }

    stats.duration_ms = start_time.elapsed().as_millis() as u64;

    // A single document gets its full report; directory walks get totals.
    match last_report {
        Some(report) if files.len() == 1 => {
            print!("{}", formatter.format_report(&report));
            if !report.success {
                anyhow::bail!("ingestion failed");
            }
        }
        _ => print!("{}", formatter.format_ingest_stats(&stats)),
    }

    Ok(())
}

fn dry_run(files: &[PathBuf], config: &Config, formatter: &dyn Formatter) -> Result<()> {
    let supported: Vec<&PathBuf> = files
        .iter()
        .filter(|p| is_supported_document(p))
        .collect();

    println!(
        "{}",
        formatter.format_message(&format!(
            "Dry run: Would ingest {} document(s)",
            supported.len()
        ))
    );

    let classifier = SizeClassifier::new(config.extraction.section_size_bytes);
    for file in supported {
        let byte_size = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);
        println!("  {}", describe(file, byte_size, &classifier, config));
    }

    Ok(())
}

/// One dry-run line: size class, section count and a rough chunk estimate.
fn describe(
    path: &Path,
    byte_size: u64,
    classifier: &SizeClassifier,
    config: &Config,
) -> String {
    let class = classifier.classify(byte_size);
    let sections = if class.needs_split {
        byte_size.div_ceil(class.section_size_bytes)
    } else {
        1
    };

    let step = config
        .chunking
        .chunk_size_tokens
        .saturating_sub(config.chunking.chunk_overlap_tokens)
        .max(1) as u64;
    let est_tokens = byte_size / CHARS_PER_TOKEN as u64;
    let est_chunks = est_tokens.div_ceil(step).max(1);

    format!(
        "{} ({} bytes, {} section{}, ~{} chunks)",
        path.display(),
        byte_size,
        sections,
        if sections == 1 { "" } else { "s" },
        est_chunks
    )
}

fn collect_files(
    path: &PathBuf,
    exclude: &[String],
    default_exclude: &[String],
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if path.is_file() {
        files.push(path.clone());
        return Ok(files);
    }

    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.context("failed to read directory entry")?;
        let entry_path = entry.path();

        if !entry_path.is_file() {
            continue;
        }

        let path_str = entry_path.to_string_lossy();
        let mut excluded = false;

        for pattern in exclude.iter().chain(default_exclude.iter()) {
            if glob::Pattern::new(pattern)
                .map(|p| p.matches(&path_str))
                .unwrap_or(false)
            {
                excluded = true;
                break;
            }
        }

        if !excluded {
            files.push(entry_path.to_path_buf());
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collect_files_respects_excludes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.pdf"), b"pdf").unwrap();
        fs::create_dir(dir.path().join("drafts")).unwrap();
        fs::write(dir.path().join("drafts").join("skip.pdf"), b"pdf").unwrap();

        let files = collect_files(
            &dir.path().to_path_buf(),
            &["**/drafts/**".to_string()],
            &[],
        )
        .unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.pdf"));
    }

    #[test]
    fn test_collect_files_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        fs::write(&path, b"pdf").unwrap();

        let files = collect_files(&path, &[], &[]).unwrap();
        assert_eq!(files, vec![path]);
    }

    #[test]
    fn test_describe_estimates_sections() {
        let config = Config::default();
        let classifier = SizeClassifier::new(4);
        let line = describe(Path::new("big.pdf"), 10, &classifier, &config);
        assert!(line.contains("3 sections"));
    }
}
