//! Local embedding generation with fastembed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;

use super::{EmbeddingError, EmbeddingGenerator, check_dimension};
use crate::config::EmbeddingConfig;
use crate::documents::Embedding;

/// Texts passed to the model per inference call.
const BATCH_SIZE: usize = 32;

/// Parse a configured model name into a fastembed model.
///
/// Accepts the enum spelling (`AllMiniLML6V2`) and the common hub names
/// (`all-MiniLM-L6-v2`), case-insensitively.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, EmbeddingError> {
    let normalized: String = name
        .rsplit('/')
        .next()
        .unwrap_or(name)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    match normalized.as_str() {
        "allminilml6v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "allminilml12v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bgesmallenv15" => Ok(EmbeddingModel::BGESmallENV15),
        "bgebaseenv15" => Ok(EmbeddingModel::BGEBaseENV15),
        "bgelargeenv15" => Ok(EmbeddingModel::BGELargeENV15),
        "multilinguale5small" => Ok(EmbeddingModel::MultilingualE5Small),
        "multilinguale5base" => Ok(EmbeddingModel::MultilingualE5Base),
        "multilinguale5large" => Ok(EmbeddingModel::MultilingualE5Large),
        _ => Err(EmbeddingError::ModelInit(format!(
            "unknown embedding model '{name}'"
        ))),
    }
}

/// Embedding generator running a fastembed model in-process.
///
/// Inference is CPU-bound, so every call runs on the blocking pool and is
/// bounded by the configured timeout.
pub struct FastEmbedGenerator {
    model: Arc<Mutex<TextEmbedding>>,
    model_id: String,
    dimension: usize,
    timeout: Duration,
}

impl FastEmbedGenerator {
    /// Load the configured model, downloading it into the cache on first use.
    pub async fn from_settings(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model = parse_embedding_model(&config.model)?;
        let model_id = format!("fastembed:{model:?}");
        let cache_dir = config.effective_cache_dir();
        let show_progress = config.show_download_progress;

        tracing::info!(
            target: "embed",
            "[embed] loading {model_id} (cache: {})",
            cache_dir.display()
        );

        let (text_model, dimension) = tokio::task::spawn_blocking(move || {
            let mut text_model = TextEmbedding::try_new(
                InitOptions::new(model)
                    .with_cache_dir(cache_dir)
                    .with_show_download_progress(show_progress),
            )
            .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

            // Get dimensions by generating a test embedding
            let probe = text_model
                .embed(vec!["test"], None)
                .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;
            let dimension = probe
                .first()
                .map(Vec::len)
                .ok_or_else(|| EmbeddingError::ModelInit("model produced no output".to_string()))?;

            Ok::<_, EmbeddingError>((text_model, dimension))
        })
        .await
        .map_err(|e| EmbeddingError::ModelInit(format!("model loader panicked: {e}")))??;

        Ok(Self {
            model: Arc::new(Mutex::new(text_model)),
            model_id,
            dimension,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl EmbeddingGenerator for FastEmbedGenerator {
    async fn generate_embeddings(
        &self,
        texts: &[String],
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let batch = texts.to_vec();
        let task = tokio::task::spawn_blocking(move || {
            model
                .lock()
                .embed(batch, Some(BATCH_SIZE))
                .map_err(|e| EmbeddingError::Failed(e.to_string()))
        });

        let embeddings = tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| EmbeddingError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| EmbeddingError::Failed(format!("embedding task panicked: {e}")))??;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        for embedding in &embeddings {
            check_dimension(embedding, self.dimension)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
