//! CLI module for the document pipeline.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Large-document ingestion and retrieval pipeline.
#[derive(Debug, Parser)]
#[command(name = "docpipe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check infrastructure status (document API, embedding server, index)
    Status,

    /// Ingest documents into the index
    Ingest(commands::IngestArgs),

    /// Query indexed content
    Query(commands::QueryArgs),

    /// Delete a document's chunks from the index
    Delete(commands::DeleteArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

// FromStr for OutputFormat is implemented in models::retrieval
