//! Text processing utilities.

/// Count characters that carry content (non-whitespace).
pub fn meaningful_char_count(content: &str) -> usize {
    content.chars().filter(|c| !c.is_whitespace()).count()
}

/// Check if extracted content clears a minimum character floor.
pub fn has_meaningful_content(content: &str, min_chars: usize) -> bool {
    meaningful_char_count(content) >= min_chars
}
