//! Sliding-window text chunking

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("chunk_size must be at least 1")]
    ZeroChunkSize,

    #[error("chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})")]
    InvalidOverlap {
        chunk_size: usize,
        chunk_overlap: usize,
    },
}

/// Check a window configuration without splitting anything
pub fn check_window(chunk_size: usize, chunk_overlap: usize) -> Result<(), SplitError> {
    if chunk_size == 0 {
        return Err(SplitError::ZeroChunkSize);
    }
    if chunk_overlap >= chunk_size {
        return Err(SplitError::InvalidOverlap {
            chunk_size,
            chunk_overlap,
        });
    }
    Ok(())
}

/// Split `text` into windows of `chunk_size` characters
///
/// Consecutive windows share `chunk_overlap` characters; the window advances
/// by `chunk_size - chunk_overlap`. Lengths count Unicode scalar values, so
/// CJK text is never cut inside a character.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<String>, SplitError> {
    check_window(chunk_size, chunk_overlap)?;

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size - chunk_overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start += step;
    }

    Ok(chunks)
}
