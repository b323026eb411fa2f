use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::documents::Document;
use crate::error::RagError;
use crate::pipeline::{PipelineStats, QueryResult, RagPipeline};

/// Multipart field name carrying uploaded files.
const FILES_FIELD: &str = "files";

type AppState = State<Arc<RagPipeline>>;

/// Error body: `{"error": <code>, "message": <text>}`.
#[derive(Debug)]
pub enum ApiError {
    Pipeline(RagError),
    Multipart(MultipartError),
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self::Pipeline(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::Multipart(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Pipeline(err) => (
                StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                err.code(),
                err.to_string(),
            ),
            Self::Multipart(err) => {
                let status = err.status();
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "payload_too_large"
                } else {
                    "invalid_request"
                };
                (status, code, err.body_text())
            }
        };

        if status.is_server_error() {
            tracing::error!(target: "http", "[http] {code}: {message}");
        } else {
            tracing::debug!(target: "http", "[http] {code}: {message}");
        }

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

pub(super) async fn root() -> Json<Value> {
    Json(json!({
        "message": "RAG Q&A API is running",
        "status": "active",
    }))
}

pub(super) async fn health_check() -> &'static str {
    "OK"
}

pub(super) async fn upload(
    State(pipeline): AppState,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut documents = Vec::new();
    let mut unnamed = 0usize;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        // No extension, so the pipeline reports it as skipped
        let filename = match field.file_name().filter(|name| !name.trim().is_empty()) {
            Some(name) => name.to_string(),
            None => {
                unnamed += 1;
                format!("unnamed part {unnamed}")
            }
        };
        let bytes = field.bytes().await?;
        documents.push(Document::new(filename, bytes.to_vec()));
    }

    crate::debug_event!("http", "upload", "{} files", documents.len());

    let report = pipeline.ingest(documents).await?;

    Ok(Json(json!({
        "message": "Documents uploaded successfully",
        "files_processed": report.files_processed,
        "chunks_created": report.chunks_created,
        "skipped_files": report.skipped_files,
    })))
}

pub(super) async fn query(
    State(pipeline): AppState,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| RagError::InvalidRequest(rejection.body_text()))?;
    let result = pipeline.query(&request.question, request.top_k).await?;
    Ok(Json(result))
}

pub(super) async fn clear(State(pipeline): AppState) -> Result<Json<Value>, ApiError> {
    pipeline.clear().await?;
    Ok(Json(json!({ "message": "Database cleared successfully" })))
}

pub(super) async fn stats(State(pipeline): AppState) -> Json<PipelineStats> {
    Json(pipeline.stats().await)
}
