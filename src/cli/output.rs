use std::fmt::Write as FmtWrite;

use crate::models::{IngestReport, OutputFormat, RetrievalResult};
use crate::services::RunSummary;

pub trait Formatter {
    fn format_retrieval(&self, result: &RetrievalResult) -> String;
    fn format_report(&self, report: &IngestReport) -> String;
    fn format_ingest_stats(&self, stats: &IngestStats) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub document_api_url: String,
    pub document_api_reachable: bool,
    pub extraction_model: String,
    pub embedding_url: String,
    pub embedding_reachable: bool,
    pub embedding_model: Option<String>,
    pub index_driver: String,
    pub index_url: String,
    pub index_connected: bool,
    pub index_points: u64,
    pub collection: String,
    pub runs: Option<RunSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub files_scanned: u64,
    pub files_ingested: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub chunks_written: u64,
    pub total_cost_estimate: f64,
    pub duration_ms: u64,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_retrieval(&self, result: &RetrievalResult) -> String {
        if result.is_empty() {
            return format!("No relevant content found for: {}\n", result.query);
        }

        let mut output = String::new();
        writeln!(output, "Results for: \"{}\"", result.query).unwrap();
        writeln!(
            output,
            "Found {} matches in {}ms\n",
            result.len(),
            result.duration_ms
        )
        .unwrap();

        for (i, chunk) in result.matches.iter().enumerate() {
            writeln!(output, "{}. [Similarity: {:.3}]", i + 1, chunk.similarity).unwrap();
            writeln!(output, "   Document: {}", chunk.source_document_id).unwrap();
            writeln!(output, "   ---").unwrap();

            let preview: String = chunk.text.chars().take(200).collect();
            let preview = if chunk.text.chars().count() > 200 {
                format!("{}...", preview)
            } else {
                preview
            };
            for line in preview.lines() {
                writeln!(output, "   {}", line).unwrap();
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_report(&self, report: &IngestReport) -> String {
        let mut output = String::new();
        if report.success {
            writeln!(output, "Ingested: {}", report.display_name).unwrap();
        } else {
            writeln!(output, "Ingest failed: {}", report.display_name).unwrap();
        }
        writeln!(output, "--------").unwrap();
        writeln!(output, "Document ID: {}", report.source_document_id).unwrap();
        writeln!(
            output,
            "Size: {} bytes ({} section{})",
            report.byte_size,
            report.sections.len(),
            if report.sections.len() == 1 { "" } else { "s" }
        )
        .unwrap();
        writeln!(output, "Extracted: {} chars", report.extracted_chars).unwrap();
        writeln!(
            output,
            "Chunks: {} ({} embedded, {} failed)",
            report.chunk_count, report.embedded_count, report.failed_chunk_count
        )
        .unwrap();
        if report.total_upload_retries() > 0 {
            writeln!(output, "Upload retries: {}", report.total_upload_retries()).unwrap();
        }
        writeln!(
            output,
            "Estimated cost: ${:.4}",
            report.total_cost_estimate
        )
        .unwrap();
        writeln!(output, "Duration: {}ms", report.duration_ms).unwrap();
        if let Some(ref error) = report.error {
            writeln!(output, "Error: {}", error).unwrap();
        }
        output
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let mut output = String::new();
        writeln!(output, "Ingestion Complete").unwrap();
        writeln!(output, "------------------").unwrap();
        writeln!(output, "Files scanned: {}", stats.files_scanned).unwrap();
        writeln!(output, "Files ingested: {}", stats.files_ingested).unwrap();
        writeln!(output, "Files skipped: {}", stats.files_skipped).unwrap();
        writeln!(output, "Files failed: {}", stats.files_failed).unwrap();
        writeln!(output, "Chunks written: {}", stats.chunks_written).unwrap();
        writeln!(
            output,
            "Estimated cost: ${:.4}",
            stats.total_cost_estimate
        )
        .unwrap();
        writeln!(output, "Duration: {}ms", stats.duration_ms).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let api_status = if status.document_api_reachable {
            "[REACHABLE]"
        } else {
            "[UNREACHABLE]"
        };
        writeln!(output, "Document API:  {}", api_status).unwrap();
        writeln!(output, "  URL:         {}", status.document_api_url).unwrap();
        writeln!(output, "  Model:       {}", status.extraction_model).unwrap();
        writeln!(output).unwrap();

        let embed_status = if status.embedding_reachable {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(output, "Embedding:     {}", embed_status).unwrap();
        writeln!(output, "  URL:         {}", status.embedding_url).unwrap();
        if let Some(ref model) = status.embedding_model {
            writeln!(output, "  Model:       {}", model).unwrap();
        }
        writeln!(output).unwrap();

        let index_status = if status.index_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Vector Index:  {} ({})",
            status.index_driver, index_status
        )
        .unwrap();
        if status.index_connected {
            writeln!(output, "  URL:         {}", status.index_url).unwrap();
            writeln!(output, "  Collection:  {}", status.collection).unwrap();
            writeln!(output, "  Chunks:      {}", status.index_points).unwrap();
        }

        if let Some(ref runs) = status.runs {
            writeln!(output).unwrap();
            writeln!(output, "Recent runs:").unwrap();
            writeln!(
                output,
                "  Ingestions:  {} ({} failed)",
                runs.total_runs, runs.failed_runs
            )
            .unwrap();
            writeln!(output, "  Documents:   {}", runs.documents).unwrap();
            writeln!(output, "  Queries:     {}", runs.queries).unwrap();
            writeln!(
                output,
                "  Est. cost:   ${:.4}",
                runs.total_cost_estimate
            )
            .unwrap();
            writeln!(output, "  Avg time:    {}ms", runs.avg_duration_ms).unwrap();
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, json: &serde_json::Value) -> String {
        if self.pretty {
            serde_json::to_string_pretty(json).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        } else {
            serde_json::to_string(json).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_retrieval(&self, result: &RetrievalResult) -> String {
        if self.pretty {
            serde_json::to_string_pretty(result)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        } else {
            serde_json::to_string(result).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        }
    }

    fn format_report(&self, report: &IngestReport) -> String {
        if self.pretty {
            serde_json::to_string_pretty(report)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        } else {
            serde_json::to_string(report).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        }
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        self.render(&serde_json::json!({
            "files_scanned": stats.files_scanned,
            "files_ingested": stats.files_ingested,
            "files_skipped": stats.files_skipped,
            "files_failed": stats.files_failed,
            "chunks_written": stats.chunks_written,
            "total_cost_estimate": stats.total_cost_estimate,
            "duration_ms": stats.duration_ms,
        }))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let runs = status.runs.as_ref().map(|r| {
            serde_json::json!({
                "total_runs": r.total_runs,
                "failed_runs": r.failed_runs,
                "documents": r.documents,
                "queries": r.queries,
                "total_cost_estimate": r.total_cost_estimate,
                "avg_duration_ms": r.avg_duration_ms,
            })
        });

        self.render(&serde_json::json!({
            "document_api": {
                "url": status.document_api_url,
                "reachable": status.document_api_reachable,
                "model": status.extraction_model,
            },
            "embedding": {
                "url": status.embedding_url,
                "reachable": status.embedding_reachable,
                "model": status.embedding_model,
            },
            "vector_index": {
                "driver": status.index_driver,
                "url": status.index_url,
                "connected": status.index_connected,
                "collection": status.collection,
                "points": status.index_points,
            },
            "runs": runs,
        }))
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_retrieval(&self, result: &RetrievalResult) -> String {
        if result.is_empty() {
            return format!("## No relevant content\n\nQuery: `{}`\n", result.query);
        }

        let mut output = String::new();
        writeln!(output, "## Retrieval Results\n").unwrap();
        writeln!(output, "**Query:** `{}`\n", result.query).unwrap();
        writeln!(
            output,
            "Found {} matches in {}ms\n",
            result.len(),
            result.duration_ms
        )
        .unwrap();

        for (i, chunk) in result.matches.iter().enumerate() {
            writeln!(
                output,
                "### {}. Similarity: {:.3}\n",
                i + 1,
                chunk.similarity
            )
            .unwrap();
            writeln!(output, "**Document:** `{}`\n", chunk.source_document_id).unwrap();
            writeln!(output, "```").unwrap();
            writeln!(output, "{}", chunk.text).unwrap();
            writeln!(output, "```\n").unwrap();
        }

        output
    }

    fn format_report(&self, report: &IngestReport) -> String {
        let mut output = String::new();
        let heading = if report.success {
            "Ingested"
        } else {
            "Ingest Failed"
        };
        writeln!(output, "## {}: {}\n", heading, report.display_name).unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Document ID | `{}` |", report.source_document_id).unwrap();
        writeln!(output, "| Size | {} bytes |", report.byte_size).unwrap();
        writeln!(output, "| Sections | {} |", report.sections.len()).unwrap();
        writeln!(output, "| Extracted chars | {} |", report.extracted_chars).unwrap();
        writeln!(output, "| Chunks | {} |", report.chunk_count).unwrap();
        writeln!(output, "| Embedded | {} |", report.embedded_count).unwrap();
        writeln!(output, "| Failed chunks | {} |", report.failed_chunk_count).unwrap();
        writeln!(
            output,
            "| Estimated cost | ${:.4} |",
            report.total_cost_estimate
        )
        .unwrap();
        writeln!(output, "| Duration | {}ms |", report.duration_ms).unwrap();
        if let Some(ref error) = report.error {
            writeln!(output, "\n> ⚠️ {}", error).unwrap();
        }
        output
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let mut output = String::new();
        writeln!(output, "## Ingestion Complete\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Files scanned | {} |", stats.files_scanned).unwrap();
        writeln!(output, "| Files ingested | {} |", stats.files_ingested).unwrap();
        writeln!(output, "| Files skipped | {} |", stats.files_skipped).unwrap();
        writeln!(output, "| Files failed | {} |", stats.files_failed).unwrap();
        writeln!(output, "| Chunks written | {} |", stats.chunks_written).unwrap();
        writeln!(
            output,
            "| Estimated cost | ${:.4} |",
            stats.total_cost_estimate
        )
        .unwrap();
        writeln!(output, "| Duration | {}ms |", stats.duration_ms).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        let api_status = if status.document_api_reachable {
            "✅"
        } else {
            "❌"
        };
        writeln!(output, "### Document API {}\n", api_status).unwrap();
        writeln!(output, "- **URL:** `{}`", status.document_api_url).unwrap();
        writeln!(output, "- **Model:** {}", status.extraction_model).unwrap();
        writeln!(output).unwrap();

        let embed_status = if status.embedding_reachable {
            "✅"
        } else {
            "❌"
        };
        writeln!(output, "### Embedding Server {}\n", embed_status).unwrap();
        writeln!(output, "- **URL:** `{}`", status.embedding_url).unwrap();
        if let Some(ref model) = status.embedding_model {
            writeln!(output, "- **Model:** {}", model).unwrap();
        }
        writeln!(output).unwrap();

        let index_status = if status.index_connected { "✅" } else { "❌" };
        writeln!(
            output,
            "### Vector Index ({}) {}\n",
            status.index_driver, index_status
        )
        .unwrap();
        writeln!(output, "- **URL:** `{}`", status.index_url).unwrap();
        writeln!(output, "- **Collection:** {}", status.collection).unwrap();
        writeln!(output, "- **Chunks:** {}", status.index_points).unwrap();

        if let Some(ref runs) = status.runs {
            writeln!(output).unwrap();
            writeln!(output, "### Recent Runs\n").unwrap();
            writeln!(
                output,
                "- **Ingestions:** {} ({} failed)",
                runs.total_runs, runs.failed_runs
            )
            .unwrap();
            writeln!(output, "- **Documents:** {}", runs.documents).unwrap();
            writeln!(output, "- **Queries:** {}", runs.queries).unwrap();
            writeln!(
                output,
                "- **Est. cost:** ${:.4}",
                runs.total_cost_estimate
            )
            .unwrap();
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RetrievedChunk;

    fn sample_result() -> RetrievalResult {
        RetrievalResult::new(
            "refund policy".to_string(),
            vec![RetrievedChunk {
                chunk_id: "chunk-1".to_string(),
                source_document_id: "doc-1".to_string(),
                similarity: 0.91,
                text: "Refunds are issued within 30 days.".to_string(),
            }],
            12,
            0,
            48,
        )
    }

    #[test]
    fn test_text_formatter_lists_matches() {
        let output = TextFormatter.format_retrieval(&sample_result());
        assert!(output.contains("refund policy"));
        assert!(output.contains("[Similarity: 0.910]"));
        assert!(output.contains("doc-1"));
    }

    #[test]
    fn test_text_formatter_empty_message() {
        let empty = RetrievalResult::new("nothing".to_string(), vec![], 5, 0, 3);
        let output = TextFormatter.format_retrieval(&empty);
        assert!(output.contains("No relevant content found for: nothing"));
    }

    #[test]
    fn test_json_formatter_is_parseable() {
        let output = JsonFormatter::new(false).format_retrieval(&sample_result());
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["matches"][0]["chunk_id"], "chunk-1");
        assert_eq!(parsed["candidates_examined"], 12);
    }

    #[test]
    fn test_markdown_formatter_fences_chunk_text() {
        let output = MarkdownFormatter.format_retrieval(&sample_result());
        assert!(output.contains("## Retrieval Results"));
        assert!(output.contains("```\nRefunds are issued within 30 days.\n```"));
    }

    #[test]
    fn test_report_formatter_shows_failure() {
        let mut report = crate::models::IngestReport::started("doc-9", "big.pdf", 2048);
        report.error = Some("document ingestion exceeded 1000ms budget".to_string());
        let output = TextFormatter.format_report(&report);
        assert!(output.contains("Ingest failed: big.pdf"));
        assert!(output.contains("exceeded 1000ms budget"));
    }
}
