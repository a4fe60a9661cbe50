//! Aggregate statistics for one ingestion run.

use serde::{Deserialize, Serialize};

/// Outcome of one section's trip through the extraction API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionReport {
    pub index: usize,
    pub byte_size: u64,
    pub extracted_chars: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_estimate: f64,
    pub duration_ms: u64,
    /// Upload attempts made, counting the first.
    pub upload_attempts: u32,
    /// Whether the OCR-biased second extraction pass was needed.
    pub ocr_retried: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a caller learns from ingesting one document.
///
/// Costs and durations accumulated before a failure stay in the report even
/// when `success` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub source_document_id: String,
    pub display_name: String,
    pub byte_size: u64,
    pub needs_split: bool,
    pub sections: Vec<SectionReport>,
    pub extracted_chars: usize,
    pub token_estimate: u64,
    pub chunk_count: usize,
    pub embedded_count: usize,
    pub failed_chunk_count: usize,
    pub total_cost_estimate: f64,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestReport {
    pub fn started(source_document_id: &str, display_name: &str, byte_size: u64) -> Self {
        Self {
            source_document_id: source_document_id.to_string(),
            display_name: display_name.to_string(),
            byte_size,
            needs_split: false,
            sections: Vec::new(),
            extracted_chars: 0,
            token_estimate: 0,
            chunk_count: 0,
            embedded_count: 0,
            failed_chunk_count: 0,
            total_cost_estimate: 0.0,
            duration_ms: 0,
            success: false,
            error: None,
        }
    }

    /// Fold one section's outcome into the totals.
    pub fn record_section(&mut self, section: SectionReport) {
        self.extracted_chars += section.extracted_chars;
        self.total_cost_estimate += section.cost_estimate;
        self.sections.push(section);
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.sections.iter().map(|s| s.input_tokens).sum()
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.sections.iter().map(|s| s.output_tokens).sum()
    }

    pub fn total_upload_retries(&self) -> u32 {
        self.sections
            .iter()
            .map(|s| s.upload_attempts.saturating_sub(1))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(index: usize, cost: f64, chars: usize) -> SectionReport {
        SectionReport {
            index,
            byte_size: 1024,
            extracted_chars: chars,
            input_tokens: 100,
            output_tokens: 50,
            cost_estimate: cost,
            duration_ms: 10,
            upload_attempts: 1,
            ocr_retried: false,
            success: true,
            error: None,
        }
    }

    #[test]
    fn test_record_section_accumulates() {
        let mut report = IngestReport::started("doc1", "report.pdf", 2048);
        report.record_section(section(0, 0.01, 600));
        report.record_section(section(1, 0.02, 400));

        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.extracted_chars, 1000);
        assert!((report.total_cost_estimate - 0.03).abs() < 1e-9);
        assert_eq!(report.total_input_tokens(), 200);
        assert_eq!(report.total_output_tokens(), 100);
    }

    #[test]
    fn test_upload_retries_counts_beyond_first_attempt() {
        let mut report = IngestReport::started("doc1", "report.pdf", 2048);
        let mut s = section(0, 0.0, 0);
        s.upload_attempts = 3;
        report.record_section(s);
        report.record_section(section(1, 0.0, 0));

        assert_eq!(report.total_upload_retries(), 2);
    }
}
