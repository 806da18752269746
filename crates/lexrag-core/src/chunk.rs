//! Fixed-size overlapping window chunker.
//!
//! Splits document text into [`TextWindow`]s of `chunk_size` characters,
//! each starting `chunk_size - overlap` characters after the previous one.
//! There is no sentence or paragraph awareness: windowing is purely by
//! character offset so the cost is linear in the text length.
//!
//! # Algorithm
//!
//! 1. Record the byte position of every character boundary once.
//! 2. Emit `[start, min(start + chunk_size, len))` starting at `start = 0`.
//! 3. Advance `start` by the stride `chunk_size - overlap`.
//! 4. Stop when `start >= len`, or as soon as a window has reached the end
//!    of the text (a further window would lie entirely inside it).
//!
//! Offsets are in characters (Unicode scalar values), never bytes, so
//! multi-byte text is never split inside a character.
//!
//! # Example
//!
//! ```rust
//! use lexrag_core::chunk::{chunk_text, ChunkParams};
//!
//! let params = ChunkParams::new(500, 100).unwrap();
//! let text = "x".repeat(1000);
//! let windows = chunk_text(&text, &params);
//! let offsets: Vec<_> = windows.iter().map(|w| (w.start_offset, w.end_offset)).collect();
//! assert_eq!(offsets, vec![(0, 500), (400, 900), (800, 1000)]);
//! ```

use crate::error::ConfigError;

/// Validated window geometry.
///
/// Construction rejects `chunk_size == 0` and `overlap >= chunk_size`,
/// either of which would produce a window that never advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive window starts. Always `>= 1`.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Number of windows [`chunk_text`] emits for a text of `char_len`
    /// characters.
    pub fn expected_windows(&self, char_len: usize) -> usize {
        if char_len == 0 {
            0
        } else if char_len <= self.overlap {
            1
        } else {
            (char_len - self.overlap).div_ceil(self.stride())
        }
    }
}

/// One window of source text with its character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl TextWindow {
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// Split `text` into overlapping windows.
///
/// Empty text yields no windows.
pub fn chunk_text(text: &str, params: &ChunkParams) -> Vec<TextWindow> {
    // boundaries[i] is the byte index of character i; the final entry is
    // text.len() so that boundaries[char_len] closes the last window.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    let mut windows = Vec::with_capacity(params.expected_windows(char_len));
    let mut start = 0usize;

    while start < char_len {
        let end = (start + params.chunk_size).min(char_len);
        windows.push(TextWindow {
            text: text[boundaries[start]..boundaries[end]].to_string(),
            start_offset: start,
            end_offset: end,
        });
        if end == char_len {
            break;
        }
        start += params.stride();
    }

    windows
}
