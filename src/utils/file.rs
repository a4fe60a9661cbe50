//! File utilities for ingestion operations.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Calculate SHA-256 checksum of raw bytes.
pub fn calculate_checksum(content: &[u8]) -> String {
    let hash = Sha256::digest(content);
    hex::encode(hash)
}

/// Read raw file bytes with a size limit.
///
/// Documents go to the extraction API as-is, so this never assumes UTF-8.
pub fn read_file_bytes(path: &Path, max_size: u64) -> std::io::Result<Vec<u8>> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    fs::read(path)
}

/// Check if extension indicates a document the extraction API accepts.
pub fn is_supported_document(path: &Path) -> bool {
    path.extension()
        .map(|ext| is_document_extension(&ext.to_string_lossy().to_lowercase()))
        .unwrap_or(false)
}

fn is_document_extension(ext: &str) -> bool {
    matches!(
        ext,
        "pdf" | "doc"
            | "docx"
            | "ppt"
            | "pptx"
            | "xls"
            | "xlsx"
            | "csv"
            | "tsv"
            | "rtf"
            | "odt"
            | "epub"
            | "txt"
            | "md"
            | "markdown"
            | "html"
            | "htm"
    )
}

/// MIME type the upload endpoint expects for a supported document.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "rtf" => "application/rtf",
        "odt" => "application/vnd.oasis.opendocument.text",
        "epub" => "application/epub+zip",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        _ => "text/plain",
    }
}

/// Sanitize a display name by replacing invalid characters.
///
/// The upload endpoint carries the original filename as a query parameter,
/// so strip anything that is not safe in a filename on common operating
/// systems (Windows, macOS, Linux).
pub fn sanitize_display_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_calculate_checksum() {
        let checksum = calculate_checksum(b"hello world");
        assert_eq!(checksum.len(), 64); // SHA-256 produces 64 hex chars
    }

    #[test]
    fn test_is_document_extension() {
        assert!(is_document_extension("pdf"));
        assert!(is_document_extension("docx"));
        assert!(is_document_extension("md"));
        assert!(!is_document_extension("exe"));
        assert!(!is_document_extension("png"));
    }

    #[test]
    fn test_is_supported_document() {
        assert!(is_supported_document(&PathBuf::from("report.pdf")));
        assert!(is_supported_document(&PathBuf::from("notes.txt")));
        assert!(!is_supported_document(&PathBuf::from("photo.png")));
        assert!(!is_supported_document(&PathBuf::from("no_extension")));
    }

    #[test]
    fn test_sanitize_display_name() {
        assert_eq!(sanitize_display_name("annual/report:2025.pdf"), "annual-report-2025.pdf");
        assert_eq!(sanitize_display_name("<draft>"), "draft");
        assert_eq!(sanitize_display_name("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type(&PathBuf::from("report.pdf")), "application/pdf");
        assert_eq!(mime_type(&PathBuf::from("notes.MD")), "text/markdown");
        assert_eq!(mime_type(&PathBuf::from("mystery")), "text/plain");
    }
}
