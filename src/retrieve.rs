//! Similarity retrieval of stored chunks for a question.

use tokio::sync::RwLock;

use crate::documents::{ScoredEntry, VectorStore};
use crate::error::{RagError, RagResult};
use crate::semantic::EmbeddingGenerator;

/// Embed `question` and return the `top_k` nearest stored chunks, nearest first.
///
/// Fails with [`RagError::NotReady`] when the store holds no entries, before
/// any embedding work is done. The store lock is not held while embedding.
pub async fn retrieve(
    embedder: &dyn EmbeddingGenerator,
    store: &RwLock<Option<VectorStore>>,
    question: &str,
    top_k: usize,
) -> RagResult<Vec<ScoredEntry>> {
    if store.read().await.as_ref().is_none_or(|s| s.count() == 0) {
        return Err(RagError::NotReady);
    }

    let embedding = embedder.embed_query(question).await?;

    // Cleared or emptied while embedding
    let guard = store.read().await;
    let Some(store) = guard.as_ref().filter(|s| s.count() > 0) else {
        return Err(RagError::NotReady);
    };

    let results = store.query(&embedding, top_k)?;

    crate::debug_event!(
        "pipeline",
        "retrieved",
        "{} of {} chunks (top_k={top_k})",
        results.len(),
        store.count()
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{Chunk, Embedding, VectorStoreEntry};
    use crate::semantic::EmbeddingError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Embeds by counting vowels, consonants and digits.
    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingGenerator for CountingEmbedder {
        async fn generate_embeddings(
            &self,
            texts: &[String],
        ) -> Result<Vec<Embedding>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let vowels = t.chars().filter(|c| "aeiou".contains(*c)).count() as f32;
                    let digits = t.chars().filter(char::is_ascii_digit).count() as f32;
                    let others = t.chars().filter(|c| c.is_alphabetic()).count() as f32 - vowels;
                    vec![vowels, others, digits]
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_id(&self) -> &str {
            "counting"
        }
    }

    fn entry(text: &str, embedding: Vec<f32>) -> VectorStoreEntry {
        VectorStoreEntry {
            chunk: Chunk {
                text: text.to_string(),
                source_filename: "a.txt".to_string(),
                chunk_index: 0,
                total_chunks: 1,
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn test_retrieve_empty_store_is_not_ready() {
        let temp_dir = TempDir::new().unwrap();
        let store =
            VectorStore::open_or_create(temp_dir.path(), "documents", "counting", 3).unwrap();
        let embedder = CountingEmbedder::default();

        let store = RwLock::new(Some(store));
        let err = retrieve(&embedder, &store, "anything", 3).await.unwrap_err();
        assert!(matches!(err, RagError::NotReady));

        let unopened = RwLock::new(None);
        let err = retrieve(&embedder, &unopened, "anything", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NotReady));

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrieve_nearest_first() {
        let temp_dir = TempDir::new().unwrap();
        let mut store =
            VectorStore::open_or_create(temp_dir.path(), "documents", "counting", 3).unwrap();
        store
            .insert(vec![
                entry("numbers", vec![0.0, 0.0, 1.0]),
                entry("vowels", vec![1.0, 0.0, 0.0]),
                entry("consonants", vec![0.0, 1.0, 0.0]),
            ])
            .unwrap();

        let embedder = CountingEmbedder::default();
        let store = RwLock::new(Some(store));
        let results = retrieve(&embedder, &store, "12345", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.chunk.text, "numbers");
        assert!(results[0].distance <= results[1].distance);
    }
}
