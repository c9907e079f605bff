//! Splits document text into overlapping fragments.

use crate::config::ChunkingConfig;
use crate::error::{QaError, Result};
use crate::fragment::{Fragment, FragmentKey};

/// How far back from a window's raw end to look for a natural break.
const BOUNDARY_LOOKBACK: usize = 100;

/// Characters after which a window may be cut.
const BOUNDARY_CHARS: &[char] = &[' ', '\t', '\n', '.', '!', '?', '。', '！', '？'];

/// Splits text into overlapping windows, preferring to cut at whitespace or
/// sentence punctuation.
///
/// Positions are counted in Unicode scalar values, never bytes, so CJK text
/// is measured the same way as ASCII.
#[derive(Debug, Clone)]
pub struct TextChunker {
    size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker, rejecting `size == 0` and `overlap >= size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(QaError::Config("chunk_size must be positive".to_string()));
        }
        if overlap >= size {
            return Err(QaError::Config(format!(
                "chunk_overlap ({overlap}) must be smaller than chunk_size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split `text` into trimmed, non-empty pieces.
    ///
    /// Every non-final window ends just after the last boundary character
    /// within [`BOUNDARY_LOOKBACK`] characters of its raw end, or at the raw
    /// end when there is none. The next window starts `overlap` characters
    /// before that cut, but always strictly after the previous start.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let mut pieces = Vec::new();
        let mut start = 0;

        while start < len {
            let raw_end = start + self.size;
            if raw_end >= len {
                push_trimmed(&mut pieces, &chars[start..]);
                break;
            }

            let floor = (start + 1).max(raw_end.saturating_sub(BOUNDARY_LOOKBACK));
            let cut = (floor..raw_end)
                .rev()
                .find(|&pos| BOUNDARY_CHARS.contains(&chars[pos]))
                .map_or(raw_end, |pos| pos + 1);

            push_trimmed(&mut pieces, &chars[start..cut]);
            start = cut.saturating_sub(self.overlap).max(start + 1);
        }

        pieces
    }

    /// Split a document into fragments with contiguous indices.
    pub fn chunk_document(&self, source_id: &str, text: &str) -> Vec<Fragment> {
        let pieces = self.split(text);
        let total = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| Fragment {
                key: FragmentKey::new(source_id, index),
                total,
                text,
            })
            .collect()
    }
}

fn push_trimmed(pieces: &mut Vec<String>, window: &[char]) {
    let piece: String = window.iter().collect();
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        pieces.push(trimmed.to_string());
    }
}
