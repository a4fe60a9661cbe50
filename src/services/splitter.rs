//! Byte-window section splitting.

use crate::error::SplitError;
use crate::models::{Section, SourceDocument};

/// Partitions a document into size-bounded byte windows.
///
/// Splitting is purely mechanical: contiguous, non-overlapping windows that
/// cover `[0, byte_size)` exactly. A document that fits in one window yields
/// a single section spanning the whole file.
#[derive(Debug, Clone, Copy)]
pub struct SectionSplitter {
    section_size_bytes: u64,
}

impl SectionSplitter {
    pub fn new(section_size_bytes: u64) -> Result<Self, SplitError> {
        if section_size_bytes == 0 {
            return Err(SplitError::InvalidSectionSize(section_size_bytes));
        }
        Ok(Self { section_size_bytes })
    }

    /// Split a document into ordered sections covering it exactly once.
    pub fn split(&self, document: &SourceDocument) -> Result<Vec<Section>, SplitError> {
        if document.byte_size == 0 {
            return Err(SplitError::EmptyDocument);
        }

        let mut sections = Vec::new();
        let mut start = 0u64;
        let mut index = 0usize;

        while start < document.byte_size {
            let end = (start + self.section_size_bytes).min(document.byte_size);
            sections.push(Section {
                source_document_id: document.id.clone(),
                index,
                start,
                end,
            });
            start = end;
            index += 1;
        }

        Ok(sections)
    }

    /// Borrow the bytes a section addresses.
    ///
    /// Fails when the file on disk no longer matches the byte size the
    /// sections were computed from.
    pub fn slice<'a>(&self, bytes: &'a [u8], section: &Section) -> Result<&'a [u8], SplitError> {
        let start = section.start as usize;
        let end = section.end as usize;
        if end > bytes.len() || start > end {
            return Err(SplitError::Unaddressable(format!(
                "section {} addresses bytes {}..{} but document has {} bytes",
                section.index,
                section.start,
                section.end,
                bytes.len()
            )));
        }
        Ok(&bytes[start..end])
    }
}
