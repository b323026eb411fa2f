//! Error taxonomy for pipeline operations.
//!
//! Every failure reaching a caller carries a stable machine code and maps to an
//! HTTP status. Lower layers keep their own error enums and convert here.

use thiserror::Error;

use crate::documents::StoreError;
use crate::extract::ExtractError;
use crate::semantic::EmbeddingError;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("No valid documents found (skipped: {})", .skipped.join(", "))]
    NoValidDocuments { skipped: Vec<String> },

    #[error("No documents uploaded yet")]
    NotReady,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to extract text from '{filename}': {source}")]
    Extraction {
        filename: String,
        #[source]
        source: ExtractError,
    },

    #[error("Embedding provider unavailable: {0}")]
    EmbeddingProviderUnavailable(String),

    #[error("{backend} did not respond within {seconds}s")]
    BackendTimeout { backend: &'static str, seconds: u64 },

    #[error("{backend} error: {message}")]
    BackendError {
        backend: &'static str,
        message: String,
    },

    #[error("Language model returned an empty completion")]
    EmptyCompletion,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for pipeline operations.
pub type RagResult<T> = Result<T, RagError>;

impl RagError {
    /// Stable snake_case code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoValidDocuments { .. } => "no_valid_documents",
            Self::NotReady => "not_ready",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Extraction { .. } => "extraction_failed",
            Self::EmbeddingProviderUnavailable(_) => "embedding_provider_unavailable",
            Self::BackendTimeout { .. } => "backend_timeout",
            Self::BackendError { .. } => "backend_error",
            Self::EmptyCompletion => "empty_completion",
            Self::Store(_) => "store_error",
            Self::Config(_) => "config_error",
        }
    }

    /// HTTP status code for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NoValidDocuments { .. } | Self::NotReady | Self::InvalidRequest(_) => 400,
            Self::Extraction { .. } => 422,
            Self::EmbeddingProviderUnavailable(_) => 503,
            Self::BackendTimeout { .. } => 504,
            Self::BackendError { .. } | Self::EmptyCompletion => 502,
            Self::Store(_) | Self::Config(_) => 500,
        }
    }
}

impl From<EmbeddingError> for RagError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::Timeout { seconds } => Self::BackendTimeout {
                backend: "embedding provider",
                seconds,
            },
            EmbeddingError::ModelInit(msg) | EmbeddingError::Unreachable(msg) => {
                Self::EmbeddingProviderUnavailable(msg)
            }
            other => Self::BackendError {
                backend: "embedding provider",
                message: other.to_string(),
            },
        }
    }
}
