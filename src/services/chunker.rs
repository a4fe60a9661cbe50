//! Deterministic sliding-window chunking of extracted text.

use crate::error::ConfigError;
use crate::models::{Chunk, ChunkingConfig};

/// Fixed chars-per-token ratio used for all token estimates.
pub const CHARS_PER_TOKEN: usize = 4;

/// Splits text into overlapping token-bounded chunks.
///
/// Chunk boundaries are a pure function of the input: chunk `i` starts at
/// exactly `i * (chunk_size - overlap)` characters. No content-aware break
/// adjustment; identical input must produce identical chunk IDs on every
/// run, or re-ingestion stops being idempotent.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in characters (tokens * 4)
    chunk_size_chars: usize,
    /// Overlap size in characters
    overlap_chars: usize,
}

impl TextChunker {
    /// Create a new chunker, rejecting configurations that cannot terminate.
    pub fn new(config: &ChunkingConfig) -> Result<Self, ConfigError> {
        if config.chunk_overlap_tokens >= config.chunk_size_tokens {
            return Err(ConfigError::ValidationError(format!(
                "chunk_overlap_tokens ({}) must be less than chunk_size_tokens ({})",
                config.chunk_overlap_tokens, config.chunk_size_tokens
            )));
        }
        Ok(Self {
            chunk_size_chars: config.chunk_size_tokens as usize * CHARS_PER_TOKEN,
            overlap_chars: config.chunk_overlap_tokens as usize * CHARS_PER_TOKEN,
        })
    }

    /// Create a chunker with default settings.
    pub fn with_defaults() -> Self {
        let config = ChunkingConfig::default();
        Self {
            chunk_size_chars: config.chunk_size_tokens as usize * CHARS_PER_TOKEN,
            overlap_chars: config.chunk_overlap_tokens as usize * CHARS_PER_TOKEN,
        }
    }

    fn stride(&self) -> usize {
        self.chunk_size_chars - self.overlap_chars
    }

    /// Chunk text into overlapping windows with deterministic IDs.
    pub fn chunk(&self, source_document_id: &str, text: &str) -> Vec<Chunk> {
        // Char indexing keeps windows from splitting multibyte sequences
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        if total_chars == 0 {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0u32;

        loop {
            let end = (start + self.chunk_size_chars).min(total_chars);
            let chunk_text: String = chars[start..end].iter().collect();
            let token_estimate = ((end - start) / CHARS_PER_TOKEN) as u32;

            chunks.push(Chunk::new(
                source_document_id,
                index,
                chunk_text,
                start as u64,
                end as u64,
                token_estimate,
            ));

            if end >= total_chars {
                break;
            }

            start += self.stride();
            if start >= total_chars {
                break;
            }
            index += 1;
        }

        chunks
    }
}

/// Estimate the number of tokens in a text.
/// Uses a simple heuristic: ~4 characters per token on average.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}
