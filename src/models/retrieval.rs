//! Retrieval-side models for queries and ranked results.

use serde::{Deserialize, Serialize};

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// A similarity query against the indexed chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalQuery {
    /// Natural language query text
    pub text: String,

    /// Maximum results to return
    pub top_k: u32,

    /// Minimum cosine similarity for a chunk to count as relevant (0.0-1.0)
    pub min_similarity: f32,

    /// Restrict matches to one source document
    pub source_document_id: Option<String>,
}

impl Default for RetrievalQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            top_k: 5,
            min_similarity: 0.7,
            source_document_id: None,
        }
    }
}

impl RetrievalQuery {
    /// Create a new query with the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the result limit.
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the minimum similarity threshold.
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    /// Restrict the query to a single document.
    pub fn with_document(mut self, source_document_id: impl Into<String>) -> Self {
        self.source_document_id = Some(source_document_id.into());
        self
    }
}

/// A chunk that cleared the similarity threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub source_document_id: String,
    /// Cosine similarity against the query embedding (0.0-1.0)
    pub similarity: f32,
    pub text: String,
}

/// Ranked retrieval outcome.
///
/// An empty `matches` list is the expected way to say "no relevant content";
/// it is never padded with placeholder scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Query that was executed
    pub query: String,

    /// Matches in strictly descending similarity order, length <= top_k
    pub matches: Vec<RetrievedChunk>,

    /// Candidates examined before thresholding
    pub candidates_examined: usize,

    /// Candidates dropped for carrying a wrong-dimension embedding
    pub dimension_mismatches: usize,

    /// Query execution time in milliseconds
    pub duration_ms: u64,
}

impl RetrievalResult {
    pub fn new(
        query: String,
        matches: Vec<RetrievedChunk>,
        candidates_examined: usize,
        dimension_mismatches: usize,
        duration_ms: u64,
    ) -> Self {
        Self {
            query,
            matches,
            candidates_examined,
            dimension_mismatches,
            duration_ms,
        }
    }

    /// True when no chunk cleared the threshold.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }
}
