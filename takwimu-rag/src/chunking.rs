//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`FixedWindowChunker`],
//! which splits text into fixed-size character windows with a configurable
//! overlap. The overlap keeps a statistical table and the sentence framing
//! it inside at least one common window, so a figure split across a chunk
//! boundary is never lost to both neighbors.

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text, offset, and metadata but
/// no embeddings; embeddings are attached later by the ingestion pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into fixed-size windows by character count with overlap.
///
/// Windows start at `0, size-overlap, 2*(size-overlap), …`; the final
/// window may be shorter than `size`, and text shorter than `size` yields
/// exactly one chunk. Sizes are character counts, so multi-byte text is
/// never split inside a code point.
///
/// Chunk IDs are generated as `{source_name}_{chunk_index}`.
#[derive(Debug, Clone)]
pub struct FixedWindowChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedWindowChunker {
    /// Create a new `FixedWindowChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size` is zero or not greater
    /// than `chunk_overlap`; either would make the window stride zero and
    /// chunking would never progress.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    fn spans<'a>(&self, text: &'a str) -> WindowSpans<'a> {
        WindowSpans {
            text,
            byte_pos: 0,
            char_pos: 0,
            size: self.chunk_size,
            step: self.chunk_size - self.chunk_overlap,
            done: text.is_empty(),
        }
    }
}

/// Byte index just past the first `n` characters of `s` (or `s.len()` if
/// `s` has no more than `n` characters).
fn byte_index_after(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Lazy iterator over `(char_offset, window)` spans of a text.
struct WindowSpans<'a> {
    text: &'a str,
    byte_pos: usize,
    char_pos: usize,
    size: usize,
    step: usize,
    done: bool,
}

impl<'a> Iterator for WindowSpans<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let tail = &self.text[self.byte_pos..];
        let end = byte_index_after(tail, self.size);
        let item = (self.char_pos, &tail[..end]);

        if end == tail.len() {
            // The window reached the end of the text: final chunk.
            self.done = true;
        } else {
            self.byte_pos += byte_index_after(tail, self.step);
            self.char_pos += self.step;
        }

        Some(item)
    }
}

impl Chunker for FixedWindowChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.spans(&document.text)
            .enumerate()
            .map(|(index, (offset, span))| Chunk {
                id: format!("{}_{index}", document.meta.source_name),
                text: span.to_string(),
                offset,
                embedding: Vec::new(),
                meta: document.meta.clone(),
            })
            .collect()
    }
}
