//! Answer generation with a language model.

mod ollama;
mod openai;

pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{LlmConfig, LlmProviderKind};
use crate::error::{RagError, RagResult};

/// Trait implemented by completion backends.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Complete `prompt` and return the answer text.
    ///
    /// A blank completion is an error, never an empty answer.
    async fn generate(&self, prompt: &str) -> RagResult<String>;

    /// Backend name used in logs and error messages.
    fn name(&self) -> &'static str;
}

/// Build the configured answer generator.
pub fn build_from_settings(config: &LlmConfig) -> RagResult<Arc<dyn AnswerGenerator>> {
    let generator: Arc<dyn AnswerGenerator> = match config.provider {
        LlmProviderKind::Ollama => Arc::new(OllamaGenerator::from_settings(config)?),
        LlmProviderKind::Openai => Arc::new(OpenAiGenerator::from_settings(config)?),
    };
    Ok(generator)
}

/// Map a transport failure to the caller-facing error.
pub(crate) fn transport_error(
    backend: &'static str,
    timeout_secs: u64,
    err: reqwest::Error,
) -> RagError {
    if err.is_timeout() {
        RagError::BackendTimeout {
            backend,
            seconds: timeout_secs,
        }
    } else {
        RagError::BackendError {
            backend,
            message: err.to_string(),
        }
    }
}

/// Trim a completion, rejecting blank output.
pub(crate) fn non_empty_answer(text: Option<String>) -> RagResult<String> {
    match text.map(|t| t.trim().to_string()) {
        Some(answer) if !answer.is_empty() => Ok(answer),
        _ => Err(RagError::EmptyCompletion),
    }
}

async fn read_error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    format!("returned {status}: {}", text.trim())
}
