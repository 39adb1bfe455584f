//! Recursive character text chunker.
//!
//! Splits document text into chunks of at most `chunk_size` characters,
//! preferring the coarsest separator that occurs in the text and falling
//! back to finer ones for oversized pieces.
//!
//! # Algorithm
//!
//! 1. Pick the first separator in the list that occurs in the text (the
//!    empty separator always matches and splits into single characters).
//! 2. Split on it, keeping the separator at the start of each following
//!    piece so no text is lost.
//! 3. Pieces shorter than `chunk_size` are accumulated; oversized pieces
//!    are split again recursively with the remaining, finer separators.
//! 4. Accumulated pieces are merged greedily up to `chunk_size`. When a
//!    chunk is flushed, leading pieces are dropped until at most
//!    `chunk_overlap` characters remain, which seed the next chunk.
//! 5. Every emitted chunk is whitespace-trimmed; empty chunks are dropped.
//!
//! Lengths are measured in `char`s, so multi-byte text never splits inside
//! a code point.
//!
//! # Example
//!
//! ```rust
//! use knowledge_chat_core::chunk::RecursiveCharacterChunker;
//! use knowledge_chat_core::traits::Chunker;
//!
//! let chunker = RecursiveCharacterChunker::new(12, 0).unwrap();
//! let chunks = chunker.chunk("Alpha\n\nBeta\n\nGamma").unwrap();
//! assert_eq!(chunks, vec!["Alpha\n\nBeta", "Gamma"]);
//! ```

use anyhow::{bail, Result};

use crate::traits::Chunker;

/// Separators tried in order: paragraphs, lines, sentences, words, characters.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ".", " ", ""];

/// Default maximum chunk length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap carried between consecutive chunks, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Chunker that splits recursively on a prioritized separator list.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterChunker {
    /// Create a chunker with the [`DEFAULT_SEPARATORS`].
    ///
    /// # Errors
    ///
    /// Fails if `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::with_separators(
            chunk_size,
            chunk_overlap,
            DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn with_separators(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        let separators = if separators.is_empty() {
            DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect()
        } else {
            separators
        };
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                if let Some(trimmed) = trimmed_non_empty(piece) {
                    chunks.push(trimmed);
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    /// Greedily merge small pieces into chunks, carrying `chunk_overlap`.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = trimmed_non_empty(&window.concat()) {
                    chunks.push(chunk);
                }
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    let dropped = window.remove(0);
                    total -= char_len(dropped);
                }
            }
            window.push(piece);
            total += len;
        }

        if let Some(chunk) = trimmed_non_empty(&window.concat()) {
            chunks.push(chunk);
        }

        chunks
    }
}

impl Default for RecursiveCharacterChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Chunker for RecursiveCharacterChunker {
    fn chunk(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.split_recursive(text, &self.separators))
    }
}

/// Split `text` on `separator`, keeping each separator at the start of the
/// piece that follows it. Empty pieces are dropped. An empty separator
/// yields one piece per character.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn trimmed_non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
