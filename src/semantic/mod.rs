//! Embedding generation.
//!
//! An [`EmbeddingGenerator`] maps text to fixed-length vectors. Two providers
//! exist: a local fastembed model and an Ollama server. Both are async so that
//! slow or remote models can be bounded by a timeout.

mod local;
mod ollama;

pub use local::{FastEmbedGenerator, parse_embedding_model};
pub use ollama::OllamaEmbeddingGenerator;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{EmbeddingConfig, EmbeddingProviderKind};
use crate::documents::Embedding;

/// Error type for embedding operations
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("Embedding provider unreachable: {0}")]
    Unreachable(String),

    #[error("Embedding timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Failed to generate embedding: {0}")]
    Failed(String),

    #[error("Malformed embedding response: {0}")]
    Malformed(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Produces embeddings for text.
///
/// Implementations must return one vector per input, in input order, each of
/// length [`dimension`](Self::dimension). The same text must map to the same
/// vector for the lifetime of the generator.
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// Embed a batch of texts.
    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError>;

    /// Length of every vector this generator produces.
    fn dimension(&self) -> usize;

    /// Stable identity of the model, recorded by the vector store.
    fn model_id(&self) -> &str;

    /// Embed a single text.
    async fn embed_query(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut embeddings = self.generate_embeddings(&[text.to_string()]).await?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::Malformed("no embedding returned".to_string()))?;
        check_dimension(&embedding, self.dimension())?;
        Ok(embedding)
    }
}

/// Build the configured embedding provider.
pub async fn build_from_settings(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingGenerator>, EmbeddingError> {
    let generator: Arc<dyn EmbeddingGenerator> = match config.provider {
        EmbeddingProviderKind::Fastembed => {
            Arc::new(FastEmbedGenerator::from_settings(config).await?)
        }
        EmbeddingProviderKind::Ollama => {
            Arc::new(OllamaEmbeddingGenerator::from_settings(config).await?)
        }
    };

    tracing::info!(
        target: "embed",
        "[embed] embedding provider ready: {} ({} dimensions)",
        generator.model_id(),
        generator.dimension()
    );

    Ok(generator)
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

pub(crate) fn check_dimension(embedding: &[f32], expected: usize) -> Result<(), EmbeddingError> {
    if embedding.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}
