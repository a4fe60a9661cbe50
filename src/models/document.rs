use serde::{Deserialize, Serialize};

/// A document handed to the ingestion pipeline.
///
/// Immutable once ingestion starts. The `id` is derived from the document's
/// location so re-ingesting the same file replaces its chunks instead of
/// duplicating them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub display_name: String,
    pub location: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub checksum: String,
    pub created_at: String,
}

impl SourceDocument {
    pub fn generate_id(location: &str) -> String {
        use sha2::{Digest, Sha256};
        let hash = Sha256::digest(location.as_bytes());
        hex::encode(&hash[..16])
    }

    pub fn new(
        location: impl Into<String>,
        display_name: impl Into<String>,
        byte_size: u64,
        mime_type: impl Into<String>,
        checksum: String,
    ) -> Self {
        let location = location.into();
        let id = Self::generate_id(&location);
        Self {
            id,
            display_name: display_name.into(),
            location,
            byte_size,
            mime_type: mime_type.into(),
            checksum,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A contiguous byte window of a source document.
///
/// Sections exist only while their extracted text has not yet been merged
/// into the document's full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub source_document_id: String,
    pub index: usize,
    /// Inclusive start byte offset.
    pub start: u64,
    /// Exclusive end byte offset.
    pub end: u64,
}

impl Section {
    pub fn byte_size(&self) -> u64 {
        self.end - self.start
    }
}

/// Text recovered from one section by the remote extraction API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    pub source_document_id: String,
    pub section_index: usize,
    pub text: String,
    pub character_count: usize,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_estimate: f64,
    pub duration_ms: u64,
}

/// A token-bounded slice of extracted text, sized for embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_document_id: String,
    pub index: u32,
    pub text: String,
    /// Start offset into the concatenated text, in characters.
    pub start_offset: u64,
    /// End offset into the concatenated text, in characters.
    pub end_offset: u64,
    pub token_estimate: u32,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Deterministic chunk ID: stable across re-runs of the same document.
    pub fn generate_id(source_document_id: &str, index: u32) -> String {
        format!("{}_chunk_{}", source_document_id, index)
    }

    pub fn new(
        source_document_id: &str,
        index: u32,
        text: String,
        start_offset: u64,
        end_offset: u64,
        token_estimate: u32,
    ) -> Self {
        Self {
            id: Self::generate_id(source_document_id, index),
            source_document_id: source_document_id.to_string(),
            index,
            text,
            start_offset,
            end_offset,
            token_estimate,
            embedding: Vec::new(),
        }
    }

    /// UUID form of the chunk ID for stores that require UUID point keys.
    ///
    /// UUIDv5 over the string ID, so it is just as stable across re-runs.
    pub fn point_id(&self) -> uuid::Uuid {
        uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, self.id.as_bytes())
    }
}
