use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::{AnswerGenerator, non_empty_answer, read_error_body, transport_error};
use crate::config::LlmConfig;
use crate::error::{RagError, RagResult};

const BACKEND: &str = "openai";

/// Completion via an OpenAI-compatible chat completions endpoint.
///
/// The API key is read from the configured environment variable. Without one
/// the request is sent unauthenticated, which local servers accept.
pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
}

impl OpenAiGenerator {
    pub fn from_settings(config: &LlmConfig) -> RagResult<Self> {
        let mut headers = HeaderMap::new();
        if let Ok(key) = std::env::var(&config.api_key_env) {
            let auth = format!("Bearer {}", key.trim());
            let value = HeaderValue::from_str(&auth).map_err(|_| {
                RagError::Config(format!("invalid API key in ${}", config.api_key_env))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build OpenAI HTTP client: {e}")))?;

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
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_answer(self) -> Option<String> {
        self.choices
            .into_iter()
            .find_map(|choice| choice.message.content)
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> RagResult<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
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

        let parsed: ChatResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) if e.is_timeout() => {
                return Err(transport_error(BACKEND, self.timeout_secs, e));
            }
            Err(e) => {
                tracing::warn!(target: "llm", "[llm] unparseable chat response: {e}");
                return Err(RagError::EmptyCompletion);
            }
        };

        non_empty_answer(parsed.into_answer())
    }

    fn name(&self) -> &'static str {
        BACKEND
    }
}
