//! HTTP API for the pipeline.
//!
//! Routes:
//! - `GET /` service banner
//! - `GET /health` liveness
//! - `POST /upload` multipart ingest (`files` fields)
//! - `POST /query` question answering
//! - `DELETE /clear` drop all stored entries
//! - `GET /stats` entry count and status

mod handlers;

pub use handlers::{ApiError, QueryRequest};

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ServerConfig, Settings};
use crate::pipeline::RagPipeline;

/// Build the API router around a shared pipeline.
pub fn router(pipeline: Arc<RagPipeline>, config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/upload", post(handlers::upload))
        .route("/query", post(handlers::query))
        .route("/clear", delete(handlers::clear))
        .route("/stats", get(handlers::stats))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline);

    if config.cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Run the HTTP server until Ctrl+C.
pub async fn serve(settings: Settings, bind: Option<String>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or_else(|| settings.server.bind.clone());

    crate::log_event!("http", "starting", "RAG Q&A API on {bind}");

    let pipeline = Arc::new(RagPipeline::from_settings(&settings).await?);
    let stats = pipeline.stats().await;
    crate::log_event!(
        "http",
        "loaded",
        "{} entries ({})",
        stats.document_count,
        stats.status.as_str()
    );

    let app = router(pipeline, &settings.server);

    // Create cancellation token for coordinated shutdown
    let ct = CancellationToken::new();
    let shutdown_ct = ct.clone();

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    eprintln!("RAG Q&A API listening on http://{bind}");
    eprintln!("Health check: http://{bind}/health");
    eprintln!("Press Ctrl+C to stop the server");

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_ct.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await?;

    crate::log_event!("http", "stopped");
    eprintln!("HTTP server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "http", "[http] failed to listen for ctrl+c: {e}");
        // Without a signal handler, never trigger shutdown
        std::future::pending::<()>().await;
    }
    eprintln!("Received shutdown signal");
}
