//! Core types for document chunking and embedding.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Fixed-length vector representation of a chunk of text.
pub type Embedding = Vec<f32>;

/// Unique identifier for a stored chunk, assigned at insert time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId(NonZeroU32);

impl ChunkId {
    /// Create a ChunkId from a u32, returning None if zero.
    pub fn from_u32(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// Get the inner value as u32.
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

/// An uploaded file, alive only until its text is extracted.
#[derive(Debug, Clone)]
pub struct Document {
    /// Original filename; its extension selects the extractor.
    pub filename: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// A chunk of a document with its position among the document's chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The text content of this chunk.
    pub text: String,

    /// Filename of the document this chunk came from.
    pub source_filename: String,

    /// Zero-based position within the source document.
    pub chunk_index: usize,

    /// Number of chunks the source document produced.
    pub total_chunks: usize,
}

impl Chunk {
    /// Get a preview of the text (first N characters).
    ///
    /// Returns the preview and whether it was truncated.
    pub fn preview(&self, max_chars: usize) -> (&str, bool) {
        match self.text.char_indices().nth(max_chars) {
            Some((end, _)) => (&self.text[..end], true),
            None => (&self.text, false),
        }
    }
}

/// A chunk together with its embedding, as handed to the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStoreEntry {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

/// A stored entry returned from a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    /// Identifier assigned by the store.
    pub id: ChunkId,
    /// The stored chunk and its embedding.
    pub entry: VectorStoreEntry,
    /// Cosine distance to the query embedding (0 = identical direction).
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_filename: "test.txt".to_string(),
            chunk_index: 0,
            total_chunks: 1,
        }
    }

    #[test]
    fn test_chunk_id_zero_returns_none() {
        assert!(ChunkId::from_u32(0).is_none());
        assert_eq!(ChunkId::from_u32(7).unwrap().get(), 7);
    }

    #[test]
    fn test_chunk_preview() {
        let chunk = chunk("Hello, world! This is a test.");

        assert_eq!(chunk.preview(5), ("Hello", true));
        assert_eq!(chunk.preview(100), ("Hello, world! This is a test.", false));
    }

    #[test]
    fn test_chunk_preview_multibyte() {
        let chunk = chunk("héllo wörld");
        assert_eq!(chunk.preview(4), ("héll", true));
        assert_eq!(chunk.preview(11), ("héllo wörld", false));
    }
}
