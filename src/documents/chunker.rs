//! Document chunking strategies.
//!
//! Provides the `Chunker` trait and the recursive boundary-seeking chunker used
//! for embedding. Sizes and overlaps are measured in characters, not bytes.

use super::config::ChunkingConfig;
use super::types::Chunk;

/// A raw chunk before it is attributed to a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// Byte range in the source text (start, end).
    pub byte_range: (usize, usize),

    /// The text content of this chunk.
    pub content: String,
}

impl RawChunk {
    /// Create a new raw chunk.
    pub fn new(byte_range: (usize, usize), content: String) -> Self {
        Self {
            byte_range,
            content,
        }
    }

    /// Get character count.
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

/// Trait for document chunking strategies.
pub trait Chunker: Send + Sync {
    /// Split document content into chunks.
    fn chunk(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk>;
}

/// Split `content` and attribute every chunk to `source_filename`.
pub fn chunk_document(
    chunker: &dyn Chunker,
    content: &str,
    source_filename: &str,
    config: &ChunkingConfig,
) -> Vec<Chunk> {
    let raw = chunker.chunk(content, config);
    let total_chunks = raw.len();

    raw.into_iter()
        .enumerate()
        .map(|(chunk_index, raw)| Chunk {
            text: raw.content,
            source_filename: source_filename.to_string(),
            chunk_index,
            total_chunks,
        })
        .collect()
}

/// Separator groups in decreasing preference. Within a group the latest match wins.
const SEPARATOR_GROUPS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "]];

/// Recursive chunker: fixed-size windows cut at the most natural boundary.
///
/// Algorithm:
/// 1. Text that fits in `chunk_size` is returned whole
/// 2. Otherwise take a window of `chunk_size` characters
/// 3. Cut it at the last paragraph break, line break, sentence end or
///    whitespace in the window's second half, else at the hard limit
/// 4. Start the next window `chunk_overlap` characters before the cut
///
/// Adjacent chunks therefore share exactly `chunk_overlap` characters, and
/// dropping that prefix from every chunk after the first rebuilds the text.
#[derive(Debug, Default)]
pub struct RecursiveChunker;

impl RecursiveChunker {
    /// Create a new recursive chunker.
    pub fn new() -> Self {
        Self
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let text = CharIndexed::new(content);
        let size = config.chunk_size.max(1);
        let overlap = config.chunk_overlap.min(size - 1);

        if text.char_len() <= size {
            return vec![RawChunk::new((0, content.len()), content.to_string())];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let hard_end = (start + size).min(text.char_len());
            let end = if hard_end == text.char_len() {
                hard_end
            } else {
                // Never cut before start + overlap, or the next window would not advance
                let lower = start + (overlap + 1).max(size / 2);
                find_boundary(&text, start, lower, hard_end).unwrap_or(hard_end)
            };

            let byte_range = (text.byte_at(start), text.byte_at(end));
            let piece = &content[byte_range.0..byte_range.1];
            if !piece.trim().is_empty() {
                chunks.push(RawChunk::new(byte_range, piece.to_string()));
            }

            if end == text.char_len() {
                break;
            }
            start = end - overlap;
        }

        chunks
    }
}

/// Character offsets of a string, for char-indexed slicing.
struct CharIndexed<'a> {
    content: &'a str,
    offsets: Vec<usize>,
}

impl<'a> CharIndexed<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            content,
            offsets: content.char_indices().map(|(i, _)| i).collect(),
        }
    }

    fn char_len(&self) -> usize {
        self.offsets.len()
    }

    /// Byte offset of the char at `char_idx` (or the end of the string).
    fn byte_at(&self, char_idx: usize) -> usize {
        self.offsets
            .get(char_idx)
            .copied()
            .unwrap_or(self.content.len())
    }

    /// Char index of a byte offset that lies on a char boundary.
    fn char_at(&self, byte: usize) -> usize {
        self.offsets
            .binary_search(&byte)
            .unwrap_or_else(|insert_at| insert_at)
    }
}

/// Find the best cut (an exclusive char index) in `[lower, hard_end]`.
fn find_boundary(
    text: &CharIndexed<'_>,
    start: usize,
    lower: usize,
    hard_end: usize,
) -> Option<usize> {
    let window_start = text.byte_at(start);
    let window = &text.content[window_start..text.byte_at(hard_end)];

    for group in SEPARATOR_GROUPS {
        let best = group
            .iter()
            .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
            .max()
            .map(|end_byte| text.char_at(window_start + end_byte));

        if let Some(end) = best.filter(|&end| end >= lower) {
            return Some(end);
        }
    }

    window
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(pos, c)| text.char_at(window_start + pos + c.len_utf8()))
        .filter(|&end| end >= lower)
}
