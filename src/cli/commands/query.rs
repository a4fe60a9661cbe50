use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, RetrievalQuery};
use crate::services::{HttpEmbedder, RetrievalEngine, RunLog, create_index};

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(required = true, help = "Query text")]
    pub text: String,

    #[arg(long, short = 'k', help = "Maximum number of matches to return")]
    pub top_k: Option<u32>,

    #[arg(long, help = "Minimum cosine similarity threshold (0.0-1.0)")]
    pub min_similarity: Option<f32>,

    #[arg(long, short = 'd', help = "Restrict matches to one document ID")]
    pub document: Option<String>,
}

pub async fn handle_query(args: QueryArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let text = args.text.trim();
    if text.is_empty() {
        anyhow::bail!("query text cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let top_k = args.top_k.unwrap_or(config.retrieval.top_k);
    if top_k == 0 {
        anyhow::bail!("top-k must be at least 1");
    }

    let min_similarity = args.min_similarity.unwrap_or(config.retrieval.min_similarity);
    if !(0.0..=1.0).contains(&min_similarity) {
        anyhow::bail!("min-similarity must be between 0.0 and 1.0");
    }

    if verbose {
        eprintln!("Query: \"{text}\"");
        eprintln!("  Top-k: {top_k}");
        eprintln!("  Min similarity: {min_similarity:.3}");
        if let Some(ref doc) = args.document {
            eprintln!("  Document: {doc}");
        }
    }

    let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);
    let index = create_index(&config.vector_index, config.embedding.dimension)
        .await
        .context("failed to connect to vector index")?;
    let engine = RetrievalEngine::new(embedder, index);

    let mut query = RetrievalQuery::new(text)
        .with_top_k(top_k)
        .with_min_similarity(min_similarity);
    if let Some(doc) = args.document {
        query = query.with_document(doc);
    }

    let result = engine.retrieve(&query).await.context("retrieval failed")?;

    if let Some(log) = RunLog::from_config(&config.run_log) {
        log.record_query(&result);
    }

    if verbose {
        let total_ms = start_time.elapsed().as_millis();
        eprintln!("Candidates examined: {}", result.candidates_examined);
        if result.dimension_mismatches > 0 {
            eprintln!("Dimension mismatches: {}", result.dimension_mismatches);
        }
        eprintln!("Total: {total_ms}ms");
        eprintln!();
    }

    print!("{}", formatter.format_retrieval(&result));

    Ok(())
}
