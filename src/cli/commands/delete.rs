use std::path::Path;

use anyhow::Result;
use clap::Args;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, SourceDocument};
use crate::services::create_index;

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Document ID, or the original file path it was ingested from
    #[arg(required_unless_present = "all")]
    pub document: Option<String>,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Clear the whole collection instead of one document
    #[arg(long, conflicts_with = "document")]
    pub all: bool,
}

pub async fn handle_delete(args: DeleteArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    if args.all {
        if !args.yes {
            println!(
                "This will delete ALL chunks in '{}'. Continue? [y/N]",
                config.vector_index.collection
            );
            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;
            if !input.trim().eq_ignore_ascii_case("y") {
                println!("{}", formatter.format_message("Cancelled."));
                return Ok(());
            }
        }

        let index = create_index(&config.vector_index, config.embedding.dimension).await?;
        index.clear().await?;
        println!(
            "{}",
            formatter.format_message("All indexed chunks have been cleared.")
        );
        return Ok(());
    }

    let target = args.document.unwrap_or_default();
    let document_id = resolve_document_id(&target);

    if verbose {
        println!("Deleting chunks for document: {}", document_id);
    }

    if !args.yes {
        println!(
            "This will delete all chunks for document '{}'. Continue? [y/N]",
            document_id
        );
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", formatter.format_message("Cancelled."));
            return Ok(());
        }
    }

    let index = create_index(&config.vector_index, config.embedding.dimension).await?;
    index.delete_document(&document_id).await?;

    println!(
        "{}",
        formatter.format_message(&format!("Deleted chunks for document {}", document_id))
    );

    Ok(())
}

/// An existing path resolves to its derived document ID; anything else is
/// taken as the ID itself.
fn resolve_document_id(target: &str) -> String {
    let path = Path::new(target);
    if path.exists() {
        let location = path
            .canonicalize()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| target.to_string());
        SourceDocument::generate_id(&location)
    } else {
        target.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_existing_path_derives_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"pdf").unwrap();

        let location = path.canonicalize().unwrap().to_string_lossy().to_string();
        let expected = SourceDocument::generate_id(&location);

        assert_eq!(resolve_document_id(&path.to_string_lossy()), expected);
    }

    #[test]
    fn test_resolve_raw_id_passes_through() {
        assert_eq!(resolve_document_id("abc123def"), "abc123def");
    }
}
