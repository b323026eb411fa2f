//! Ingest and query orchestration.
//!
//! [`RagPipeline`] owns the embedding provider, the answer generator and the
//! handle to the vector store. The handle sits behind an async `RwLock`:
//! ingest and clear are writers, query and stats are readers. Embedding and
//! completion calls always run with the lock released.

use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::{QueryConfig, Settings, StoreConfig};
use crate::documents::{
    Chunk, Chunker, ChunkingConfig, Document, RecursiveChunker, ScoredEntry, VectorStore,
    VectorStoreEntry, chunk_document,
};
use crate::error::{RagError, RagResult};
use crate::extract::{ExtractError, Extraction, extract_text};
use crate::llm::{self, AnswerGenerator};
use crate::semantic::{self, EmbeddingGenerator};
use crate::{prompt, retrieve};

/// Chunk texts sent to the embedding provider per call.
const EMBED_BATCH_SIZE: usize = 64;

/// Whether the pipeline can answer questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    /// No entries stored.
    #[serde(rename = "empty")]
    Empty,
    /// At least one entry stored.
    #[serde(rename = "active")]
    Ready,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Ready => "active",
        }
    }
}

/// Outcome of an ingest call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Files that produced at least one chunk.
    pub files_processed: usize,
    /// Chunks stored across all files.
    pub chunks_created: usize,
    /// Files that were unsupported or contained no text.
    pub skipped_files: Vec<String>,
}

/// Provenance of a source chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceMetadata {
    pub source_filename: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A retrieved chunk as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    /// Chunk text, truncated to the configured preview length.
    pub chunk_text: String,
    pub metadata: SourceMetadata,
    /// Cosine distance to the question (smaller is closer).
    pub distance: f32,
}

impl Source {
    fn from_scored(scored: &ScoredEntry, preview_chars: usize) -> Self {
        let chunk = &scored.entry.chunk;
        let (preview, truncated) = chunk.preview(preview_chars);
        let chunk_text = if truncated {
            format!("{preview}...")
        } else {
            preview.to_string()
        };

        Self {
            chunk_text,
            metadata: SourceMetadata {
                source_filename: chunk.source_filename.clone(),
                chunk_index: chunk.chunk_index,
                total_chunks: chunk.total_chunks,
            },
            distance: scored.distance,
        }
    }
}

/// Answer to a question with the chunks it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub answer: String,
    /// Retrieved chunks, nearest first.
    pub sources: Vec<Source>,
    /// RFC 3339 local time the answer was produced.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub document_count: usize,
    pub status: PipelineState,
}

/// Explicit context object shared by every request.
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingGenerator>,
    generator: Arc<dyn AnswerGenerator>,
    chunker: Arc<dyn Chunker>,
    chunking: ChunkingConfig,
    store_config: StoreConfig,
    query_config: QueryConfig,
    store: RwLock<Option<VectorStore>>,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("embedder", &self.embedder.model_id())
            .field("generator", &self.generator.name())
            .field("chunking", &self.chunking)
            .field("store_config", &self.store_config)
            .finish()
    }
}

impl RagPipeline {
    /// Create a pipeline from explicit providers.
    ///
    /// A store already persisted for the configured collection is reopened, so
    /// entries survive restarts.
    pub fn new(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingGenerator>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> RagResult<Self> {
        settings.validate().map_err(RagError::Config)?;

        let store = VectorStore::open_existing(
            &settings.store.data_dir,
            &settings.store.collection,
            embedder.model_id(),
            embedder.dimension(),
        )?;

        if let Some(store) = &store {
            crate::log_event!(
                "pipeline",
                "restored",
                "{} entries from {}",
                store.count(),
                store.path().display()
            );
        }

        Ok(Self {
            embedder,
            generator,
            chunker: Arc::new(RecursiveChunker::new()),
            chunking: settings.chunking.clone(),
            store_config: settings.store.clone(),
            query_config: settings.query.clone(),
            store: RwLock::new(store),
        })
    }

    /// Create a pipeline with the providers named in `settings`.
    pub async fn from_settings(settings: &Settings) -> RagResult<Self> {
        let embedder = semantic::build_from_settings(&settings.embedding).await?;
        let generator = llm::build_from_settings(&settings.llm)?;
        Self::new(settings, embedder, generator)
    }

    /// Extract, chunk, embed and store `documents`.
    ///
    /// Unsupported or empty files are skipped and listed. A supported file that
    /// cannot be read fails the whole call, and nothing is stored.
    pub async fn ingest(&self, documents: Vec<Document>) -> RagResult<IngestReport> {
        if documents.is_empty() {
            return Err(RagError::InvalidRequest("no files provided".to_string()));
        }

        let mut files_processed = 0;
        let mut skipped_files = Vec::new();
        let mut chunks: Vec<Chunk> = Vec::new();

        for document in documents {
            let filename = document.filename.clone();
            match self.prepare(document).await? {
                Some(file_chunks) if !file_chunks.is_empty() => {
                    files_processed += 1;
                    chunks.extend(file_chunks);
                }
                _ => {
                    crate::debug_event!("pipeline", "skipped", "{filename}");
                    skipped_files.push(filename);
                }
            }
        }

        if chunks.is_empty() {
            return Err(RagError::NoValidDocuments {
                skipped: skipped_files,
            });
        }

        let entries = self.embed_chunks(chunks).await?;
        let chunks_created = entries.len();

        {
            let mut guard = self.store.write().await;
            let mut store = match guard.take() {
                Some(store) => store,
                None => self.open_store()?,
            };
            let result = store.insert(entries);
            *guard = Some(store);
            result?;
        }

        let report = IngestReport {
            files_processed,
            chunks_created,
            skipped_files,
        };

        crate::log_event!(
            "pipeline",
            "ingested",
            "{} files, {} chunks, {} skipped",
            report.files_processed,
            report.chunks_created,
            report.skipped_files.len()
        );

        Ok(report)
    }

    /// Answer `question` from the `top_k` nearest chunks.
    pub async fn query(&self, question: &str, top_k: Option<usize>) -> RagResult<QueryResult> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidRequest(
                "question must not be empty".to_string(),
            ));
        }

        let max_top_k = self.query_config.max_top_k;
        let top_k = top_k.unwrap_or(self.query_config.default_top_k);
        if top_k == 0 || top_k > max_top_k {
            return Err(RagError::InvalidRequest(format!(
                "top_k must be between 1 and {max_top_k}, got {top_k}"
            )));
        }

        let results =
            retrieve::retrieve(self.embedder.as_ref(), &self.store, question, top_k).await?;

        let context: Vec<&str> = results
            .iter()
            .map(|r| r.entry.chunk.text.as_str())
            .collect();
        let prompt = prompt::assemble(&context, question);

        crate::debug_event!(
            "llm",
            "request",
            "{} ({} prompt chars)",
            self.generator.name(),
            prompt.len()
        );
        let answer = self.generator.generate(&prompt).await?;

        let preview_chars = self.query_config.source_preview_chars;
        let sources = results
            .iter()
            .map(|r| Source::from_scored(r, preview_chars))
            .collect();

        crate::log_event!(
            "pipeline",
            "answered",
            "{} sources, {} answer chars",
            results.len(),
            answer.len()
        );

        Ok(QueryResult {
            answer,
            sources,
            timestamp: Local::now().to_rfc3339(),
        })
    }

    /// Drop every stored entry, in memory and on disk.
    pub async fn clear(&self) -> RagResult<()> {
        let mut guard = self.store.write().await;
        match guard.take() {
            Some(store) => store.clear()?,
            None => {
                VectorStore::purge(&self.store_config.data_dir, &self.store_config.collection)?;
            }
        }

        crate::log_event!("pipeline", "cleared");
        Ok(())
    }

    pub async fn stats(&self) -> PipelineStats {
        let document_count = self.count().await;
        PipelineStats {
            document_count,
            status: state_for(document_count),
        }
    }

    pub async fn state(&self) -> PipelineState {
        state_for(self.count().await)
    }

    async fn count(&self) -> usize {
        self.store.read().await.as_ref().map_or(0, VectorStore::count)
    }

    /// Extract and chunk one document on the blocking pool.
    ///
    /// `None` means the format is unsupported.
    async fn prepare(&self, document: Document) -> RagResult<Option<Vec<Chunk>>> {
        let filename = document.filename.clone();
        let chunker = Arc::clone(&self.chunker);
        let chunking = self.chunking.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let extraction = extract_text(&document)?;
            Ok::<_, ExtractError>(match extraction {
                Extraction::Text(text) => Some(chunk_document(
                    chunker.as_ref(),
                    &text,
                    &document.filename,
                    &chunking,
                )),
                Extraction::Skipped(_) => None,
            })
        })
        .await
        .map_err(|e| RagError::Extraction {
            filename: filename.clone(),
            source: ExtractError::Aborted(e.to_string()),
        })?;

        outcome.map_err(|source| RagError::Extraction { filename, source })
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> RagResult<Vec<VectorStoreEntry>> {
        let mut embeddings = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let batch_embeddings = self.embedder.generate_embeddings(&texts).await?;
            if batch_embeddings.len() != texts.len() {
                return Err(RagError::BackendError {
                    backend: "embedding provider",
                    message: format!(
                        "expected {} embeddings, got {}",
                        texts.len(),
                        batch_embeddings.len()
                    ),
                });
            }
            embeddings.extend(batch_embeddings);
        }

        crate::debug_event!("embed", "embedded", "{} chunks", embeddings.len());

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorStoreEntry { chunk, embedding })
            .collect())
    }

    fn open_store(&self) -> RagResult<VectorStore> {
        Ok(VectorStore::open_or_create(
            &self.store_config.data_dir,
            &self.store_config.collection,
            self.embedder.model_id(),
            self.embedder.dimension(),
        )?)
    }
}

fn state_for(count: usize) -> PipelineState {
    if count == 0 {
        PipelineState::Empty
    } else {
        PipelineState::Ready
    }
}
