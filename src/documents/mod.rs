//! Document chunking and vector storage.
//!
//! This module provides:
//! - Character-based chunking with overlap
//! - The persistent vector store for embedded chunks
//! - Core chunk and entry types

pub mod chunker;
pub mod config;
pub mod schema;
pub mod store;
pub mod types;

pub use chunker::{Chunker, RawChunk, RecursiveChunker, chunk_document};
pub use config::ChunkingConfig;
pub use schema::DocumentSchema;
pub use store::{StoreError, StoreResult, VectorStore};
pub use types::{Chunk, ChunkId, Document, Embedding, ScoredEntry, VectorStoreEntry};
