//! Retrieval-augmented question answering over uploaded documents.
//!
//! Documents are extracted to text, split into overlapping chunks, embedded
//! and persisted in a vector store. Questions are answered by a language model
//! prompted with the nearest chunks.

pub mod logging;

pub mod cli;
pub mod config;
pub mod documents;
pub mod error;
pub mod extract;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod retrieve;
pub mod semantic;

pub use config::Settings;
pub use documents::{Chunk, ChunkId, Document, Embedding, ScoredEntry, VectorStore};
pub use error::{RagError, RagResult};
pub use llm::AnswerGenerator;
pub use pipeline::{IngestReport, PipelineState, PipelineStats, QueryResult, RagPipeline};
pub use semantic::EmbeddingGenerator;
