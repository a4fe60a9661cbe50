//! Size classification for incoming documents.

/// Split decision for a document of a given byte size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClass {
    pub needs_split: bool,
    pub section_size_bytes: u64,
}

/// Decides whether a document must be split before upload.
///
/// Pure threshold check. The configured section size sits below the remote
/// API's hard upload ceiling, leaving a working margin. Zero-byte input is a
/// caller contract violation screened out before classification.
#[derive(Debug, Clone, Copy)]
pub struct SizeClassifier {
    section_size_bytes: u64,
}

impl SizeClassifier {
    pub fn new(section_size_bytes: u64) -> Self {
        Self { section_size_bytes }
    }

    pub fn classify(&self, byte_size: u64) -> SizeClass {
        SizeClass {
            needs_split: byte_size > self.section_size_bytes,
            section_size_bytes: self.section_size_bytes,
        }
    }
}
