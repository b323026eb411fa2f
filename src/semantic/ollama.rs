//! Embeddings from an Ollama server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{EmbeddingError, EmbeddingGenerator, check_dimension};
use crate::config::EmbeddingConfig;
use crate::documents::Embedding;

/// Embedding generator calling Ollama's `/api/embed` endpoint.
pub struct OllamaEmbeddingGenerator {
    client: Client,
    endpoint: String,
    model: String,
    model_id: String,
    dimension: usize,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddingGenerator {
    /// Connect to the configured server and probe the model's dimension.
    pub async fn from_settings(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ModelInit(format!("failed to build HTTP client: {e}")))?;

        let mut generator = Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            model_id: format!("ollama:{}", config.model),
            dimension: 0,
            timeout_secs: config.timeout_secs,
        };

        let probe = generator.request(&["test".to_string()]).await?;
        generator.dimension = probe
            .first()
            .map(Vec::len)
            .filter(|&d| d > 0)
            .ok_or_else(|| EmbeddingError::ModelInit("probe returned no embedding".to_string()))?;

        Ok(generator)
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let body = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::Failed(format!("Ollama returned {status}: {text}")));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbeddingError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        Ok(parsed.embeddings)
    }

    fn classify(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() {
            EmbeddingError::Timeout {
                seconds: self.timeout_secs,
            }
        } else if err.is_connect() {
            EmbeddingError::Unreachable(format!("{}: {err}", self.endpoint))
        } else {
            EmbeddingError::Failed(err.to_string())
        }
    }
}

#[async_trait]
impl EmbeddingGenerator for OllamaEmbeddingGenerator {
    async fn generate_embeddings(
        &self,
        texts: &[String],
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.request(texts).await?;
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
