use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AnswerGenerator, non_empty_answer, read_error_body, transport_error};
use crate::config::LlmConfig;
use crate::error::{RagError, RagResult};

const BACKEND: &str = "ollama";

/// Completion via Ollama's non-streaming `/api/generate`.
pub struct OllamaGenerator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
}

impl OllamaGenerator {
    pub fn from_settings(config: &LlmConfig) -> RagResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Config(format!("failed to build Ollama HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> RagResult<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(BACKEND, self.timeout_secs, e))?;

        if !resp.status().is_success() {
            return Err(RagError::BackendError {
                backend: BACKEND,
                message: read_error_body(resp).await,
            });
        }

        // A body that is not the expected JSON carries no usable completion
        let parsed: GenerateResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) if e.is_timeout() => {
                return Err(transport_error(BACKEND, self.timeout_secs, e));
            }
            Err(e) => {
                tracing::warn!(target: "llm", "[llm] unparseable Ollama response: {e}");
                return Err(RagError::EmptyCompletion);
            }
        };

        non_empty_answer(parsed.response)
    }

    fn name(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let body = GenerateRequest {
            model: "llama2",
            prompt: "Question: why?",
            stream: false,
            options: GenerateOptions { temperature: 0.7 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama2");
        assert_eq!(json["stream"], false);
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_response_without_field() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(parsed.response.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let config = LlmConfig {
            endpoint: "http://127.0.0.1:9/api/generate".to_string(),
            timeout_secs: 2,
            ..LlmConfig::default()
        };
        let generator = OllamaGenerator::from_settings(&config).unwrap();
        let err = generator.generate("hello").await.unwrap_err();
        assert!(matches!(
            err,
            RagError::BackendError { .. } | RagError::BackendTimeout { .. }
        ));
    }
}
