//! Persistent vector store backed by tantivy.
//!
//! Chunk text, provenance and embedding bytes live in one tantivy index per
//! collection, so a batch insert is a single commit. Embeddings are mirrored in
//! memory on open and scored by brute force.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::directory::error::OpenDirectoryError;
use tantivy::query::{AllQuery, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{
    Index, IndexReader, IndexSettings, IndexWriter, ReloadPolicy, Searcher,
    TantivyDocument as Document, Term,
};
use thiserror::Error;

use super::schema::{DocumentSchema, decode_embedding, encode_embedding};
use super::types::{Chunk, ChunkId, Embedding, ScoredEntry, VectorStoreEntry};
use crate::semantic::cosine_similarity;

/// Store metadata file inside the collection directory.
const META_FILE: &str = "store.json";

/// Tantivy writer heap size in bytes.
const WRITER_HEAP_SIZE: usize = 50_000_000;

/// Errors from vector store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Directory error: {0}")]
    Directory(#[from] OpenDirectoryError),

    #[error("Embedding dimension mismatch: store holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Store was built with embedding model '{stored}' but '{requested}' is configured; clear the store to switch models"
    )]
    ProviderMismatch { stored: String, requested: String },

    #[error("Corrupt store: {0}")]
    Corrupt(String),

    #[error("Index error: {0}")]
    Index(String),
}

/// Result type for vector store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted description of a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreMeta {
    collection: String,
    model_id: String,
    dimension: usize,
    next_chunk_id: u32,
    created_at: u64,
}

/// Vector store for one collection.
pub struct VectorStore {
    /// Collection directory (`data_dir/collection`).
    path: PathBuf,

    index: Index,

    reader: IndexReader,

    schema: DocumentSchema,

    /// Index writer (lazily created, holds the tantivy lock while alive).
    writer: Option<IndexWriter<Document>>,

    /// Embeddings in insertion order.
    vectors: Vec<(ChunkId, Embedding)>,

    meta: StoreMeta,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("path", &self.path)
            .field("collection", &self.meta.collection)
            .field("model_id", &self.meta.model_id)
            .field("dimension", &self.meta.dimension)
            .field("entries", &self.vectors.len())
            .field("has_writer", &self.writer.is_some())
            .finish()
    }
}

impl VectorStore {
    /// Create or open the store for `collection` under `data_dir`.
    ///
    /// # Arguments
    /// * `model_id` - Identity of the embedding provider; must match an existing store
    /// * `dimension` - Embedding length; must match an existing store
    pub fn open_or_create(
        data_dir: impl AsRef<Path>,
        collection: &str,
        model_id: &str,
        dimension: usize,
    ) -> StoreResult<Self> {
        let path = data_dir.as_ref().join(collection);
        std::fs::create_dir_all(&path)?;

        let meta_path = path.join(META_FILE);
        let meta_exists = meta_path.exists();
        let meta = if meta_exists {
            let meta = Self::load_meta(&meta_path)?;
            if meta.model_id != model_id {
                return Err(StoreError::ProviderMismatch {
                    stored: meta.model_id,
                    requested: model_id.to_string(),
                });
            }
            if meta.dimension != dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: meta.dimension,
                    actual: dimension,
                });
            }
            meta
        } else {
            StoreMeta {
                collection: collection.to_string(),
                model_id: model_id.to_string(),
                dimension,
                next_chunk_id: 1,
                created_at: utc_timestamp(),
            }
        };

        let index_path = path.join("tantivy");
        std::fs::create_dir_all(&index_path)?;

        let (tantivy_schema, schema) = DocumentSchema::build();

        let index = if index_path.join("meta.json").exists() {
            Index::open_in_dir(&index_path)?
        } else {
            let dir = MmapDirectory::open(&index_path)?;
            Index::create(dir, tantivy_schema, IndexSettings::default())?
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        reader.reload()?;

        let mut store = Self {
            path,
            index,
            reader,
            schema,
            writer: None,
            vectors: Vec::new(),
            meta,
        };

        store.load_vectors()?;
        if !meta_exists {
            store.save_meta()?;
        }

        crate::debug_event!(
            "store",
            "opened",
            "{} ({} entries)",
            store.path.display(),
            store.vectors.len()
        );

        Ok(store)
    }

    /// Open the store only if it already exists on disk.
    pub fn open_existing(
        data_dir: impl AsRef<Path>,
        collection: &str,
        model_id: &str,
        dimension: usize,
    ) -> StoreResult<Option<Self>> {
        if !Self::exists(&data_dir, collection) {
            return Ok(None);
        }
        Self::open_or_create(data_dir, collection, model_id, dimension).map(Some)
    }

    /// Open an existing store with the model it was built with.
    ///
    /// For read-only inspection without loading an embedding provider.
    pub fn open_persisted(
        data_dir: impl AsRef<Path>,
        collection: &str,
    ) -> StoreResult<Option<Self>> {
        let meta_path = data_dir.as_ref().join(collection).join(META_FILE);
        if !meta_path.exists() {
            return Ok(None);
        }
        let meta = Self::load_meta(&meta_path)?;
        Self::open_or_create(data_dir, collection, &meta.model_id, meta.dimension).map(Some)
    }

    /// Whether persisted state exists for `collection`.
    pub fn exists(data_dir: impl AsRef<Path>, collection: &str) -> bool {
        data_dir.as_ref().join(collection).join(META_FILE).exists()
    }

    /// Delete the persisted state of `collection`.
    ///
    /// Returns whether anything was removed; a missing collection is not an error.
    pub fn purge(data_dir: impl AsRef<Path>, collection: &str) -> StoreResult<bool> {
        let path = data_dir.as_ref().join(collection);
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                crate::log_event!("store", "purged", "{}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete all entries and the on-disk state.
    pub fn clear(self) -> StoreResult<()> {
        let Some(data_dir) = self.path.parent().map(Path::to_path_buf) else {
            return Err(StoreError::Index(format!(
                "store path has no parent: {}",
                self.path.display()
            )));
        };
        let collection = self.meta.collection.clone();

        // Release the writer lock and mmaps before deleting the files
        drop(self);

        Self::purge(data_dir, &collection)?;
        Ok(())
    }

    /// Append entries in one commit.
    ///
    /// Either every entry is stored or none is. Identical content inserted twice
    /// is stored twice.
    pub fn insert(&mut self, entries: Vec<VectorStoreEntry>) -> StoreResult<Vec<ChunkId>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(bad) = entries
            .iter()
            .find(|e| e.embedding.len() != self.meta.dimension)
        {
            return Err(StoreError::DimensionMismatch {
                expected: self.meta.dimension,
                actual: bad.embedding.len(),
            });
        }

        let first = self.meta.next_chunk_id;
        let next = u32::try_from(entries.len())
            .ok()
            .and_then(|n| first.checked_add(n))
            .ok_or_else(|| StoreError::Index("chunk id space exhausted".to_string()))?;
        let ids: Vec<ChunkId> = (first..next).filter_map(ChunkId::from_u32).collect();

        let indexed_at = utc_timestamp();
        let docs: Vec<Document> = ids
            .iter()
            .zip(&entries)
            .map(|(id, entry)| self.build_document(*id, entry, indexed_at))
            .collect();

        let writer = self.ensure_writer()?;
        if let Err(e) = write_batch(writer, docs) {
            if let Err(rollback_err) = writer.rollback() {
                tracing::warn!(target: "store", "[store] rollback failed: {rollback_err}");
            }
            return Err(e.into());
        }

        // Committed; memory follows the index whatever happens below
        self.meta.next_chunk_id = next;
        self.vectors.extend(
            ids.iter()
                .copied()
                .zip(entries.into_iter().map(|e| e.embedding)),
        );
        if let Err(e) = self.reader.reload() {
            tracing::warn!(target: "store", "[store] reader reload after commit failed: {e}");
        }
        if let Err(e) = self.save_meta() {
            tracing::warn!(target: "store", "[store] failed to persist {META_FILE}: {e}");
        }

        crate::log_event!(
            "store",
            "committed",
            "{} entries ({} total)",
            ids.len(),
            self.vectors.len()
        );

        Ok(ids)
    }

    /// Entries nearest to `embedding`, closest first, at most `top_k`.
    pub fn query(&self, embedding: &[f32], top_k: usize) -> StoreResult<Vec<ScoredEntry>> {
        if top_k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        if embedding.len() != self.meta.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.meta.dimension,
                actual: embedding.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (i, cosine_distance(embedding, v)))
            .collect();

        // Stable on ties: earlier inserts first
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        let searcher = self.reader.searcher();
        scored
            .into_iter()
            .map(|(i, distance)| {
                let (id, vector) = &self.vectors[i];
                let chunk = self.load_chunk(&searcher, *id)?;
                Ok(ScoredEntry {
                    id: *id,
                    entry: VectorStoreEntry {
                        chunk,
                        embedding: vector.clone(),
                    },
                    distance,
                })
            })
            .collect()
    }

    /// Total entries currently stored.
    pub fn count(&self) -> usize {
        self.vectors.len()
    }

    /// Embedding model the store was built with.
    pub fn model_id(&self) -> &str {
        &self.meta.model_id
    }

    /// Embedding length the store accepts.
    pub fn dimension(&self) -> usize {
        self.meta.dimension
    }

    /// Collection directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // Private helper methods

    fn build_document(&self, id: ChunkId, entry: &VectorStoreEntry, indexed_at: u64) -> Document {
        let mut doc = Document::new();
        doc.add_u64(self.schema.chunk_id, u64::from(id.get()));
        doc.add_text(self.schema.source_filename, &entry.chunk.source_filename);
        doc.add_u64(self.schema.chunk_index, entry.chunk.chunk_index as u64);
        doc.add_u64(self.schema.total_chunks, entry.chunk.total_chunks as u64);
        doc.add_text(self.schema.content, &entry.chunk.text);
        doc.add_bytes(
            self.schema.embedding,
            encode_embedding(&entry.embedding).as_slice(),
        );
        doc.add_u64(self.schema.indexed_at, indexed_at);
        doc
    }

    fn ensure_writer(&mut self) -> StoreResult<&mut IndexWriter<Document>> {
        if self.writer.is_none() {
            self.writer = Some(self.index.writer(WRITER_HEAP_SIZE)?);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| StoreError::Index("index writer unavailable".to_string()))
    }

    fn load_chunk(&self, searcher: &Searcher, id: ChunkId) -> StoreResult<Chunk> {
        let term = Term::from_field_u64(self.schema.chunk_id, u64::from(id.get()));
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;

        let Some((_score, address)) = top_docs.first() else {
            return Err(StoreError::Corrupt(format!(
                "chunk {} has a vector but no document",
                id.get()
            )));
        };
        let doc: Document = searcher.doc(*address)?;

        let text_field = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_default()
        };
        let u64_field = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize
        };

        Ok(Chunk {
            text: text_field(self.schema.content),
            source_filename: text_field(self.schema.source_filename),
            chunk_index: u64_field(self.schema.chunk_index),
            total_chunks: u64_field(self.schema.total_chunks),
        })
    }

    fn load_vectors(&mut self) -> StoreResult<()> {
        let searcher = self.reader.searcher();
        let addresses = searcher.search(&AllQuery, &DocSetCollector)?;

        let mut vectors = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: Document = searcher.doc(address)?;

            let id = doc
                .get_first(self.schema.chunk_id)
                .and_then(|v| v.as_u64())
                .and_then(|v| u32::try_from(v).ok())
                .and_then(ChunkId::from_u32)
                .ok_or_else(|| StoreError::Corrupt("document without chunk id".to_string()))?;

            let vector = doc
                .get_first(self.schema.embedding)
                .and_then(|v| v.as_bytes())
                .and_then(decode_embedding)
                .filter(|v| v.len() == self.meta.dimension)
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("chunk {} has an invalid embedding", id.get()))
                })?;

            vectors.push((id, vector));
        }

        vectors.sort_by_key(|(id, _)| *id);

        // A crash between commit and save_meta leaves the counter behind
        if let Some((last, _)) = vectors.last() {
            self.meta.next_chunk_id = self.meta.next_chunk_id.max(last.get() + 1);
        }

        self.vectors = vectors;
        Ok(())
    }

    fn load_meta(path: &Path) -> StoreResult<StoreMeta> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupt(format!("failed to parse {META_FILE}: {e}")))
    }

    fn save_meta(&self) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(&self.meta)
            .map_err(|e| StoreError::Index(format!("failed to serialize {META_FILE}: {e}")))?;
        std::fs::write(self.path.join(META_FILE), content)?;
        Ok(())
    }
}

fn write_batch(writer: &mut IndexWriter<Document>, docs: Vec<Document>) -> tantivy::Result<()> {
    for doc in docs {
        writer.add_document(doc)?;
    }
    writer.commit()?;
    Ok(())
}

/// Cosine distance: 0 for identical direction, 2 for opposite.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

fn utc_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MODEL: &str = "test-model";

    fn entry(text: &str, source: &str, embedding: Vec<f32>) -> VectorStoreEntry {
        VectorStoreEntry {
            chunk: Chunk {
                text: text.to_string(),
                source_filename: source.to_string(),
                chunk_index: 0,
                total_chunks: 1,
            },
            embedding,
        }
    }

    fn open(dir: &TempDir) -> VectorStore {
        VectorStore::open_or_create(dir.path(), "documents", MODEL, 3).unwrap()
    }

    #[test]
    fn test_store_creation() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);
        assert_eq!(store.count(), 0);
        assert_eq!(store.dimension(), 3);
        assert!(VectorStore::exists(temp_dir.path(), "documents"));
    }

    #[test]
    fn test_query_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);
        assert!(store.query(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
        assert!(store.query(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_query_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);

        let ids = store
            .insert(vec![
                entry("north", "a.txt", vec![0.0, 1.0, 0.0]),
                entry("east", "a.txt", vec![1.0, 0.0, 0.0]),
                entry("north-east", "b.txt", vec![1.0, 1.0, 0.0]),
                entry("south", "b.txt", vec![0.0, -1.0, 0.0]),
            ])
            .unwrap();
        assert_eq!(ids.len(), 4);
        assert_eq!(store.count(), 4);

        let results = store.query(&[1.0, 0.1, 0.0], 3).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].entry.chunk.text, "east");
        assert_eq!(results[1].entry.chunk.text, "north-east");
        assert_eq!(results[2].entry.chunk.text, "north");
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        assert_eq!(results[1].entry.chunk.source_filename, "b.txt");
    }

    #[test]
    fn test_query_top_k_larger_than_store() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);
        store
            .insert(vec![
                entry("one", "a.txt", vec![1.0, 0.0, 0.0]),
                entry("two", "a.txt", vec![0.0, 1.0, 0.0]),
            ])
            .unwrap();

        assert_eq!(store.query(&[0.0, 0.0, 1.0], 10).unwrap().len(), 2);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);
        let e = entry("same", "a.txt", vec![1.0, 0.0, 0.0]);

        let first = store.insert(vec![e.clone()]).unwrap();
        let second = store.insert(vec![e]).unwrap();

        assert_ne!(first, second);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_dimension_mismatch_is_all_or_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);

        let err = store
            .insert(vec![
                entry("ok", "a.txt", vec![1.0, 0.0, 0.0]),
                entry("bad", "a.txt", vec![1.0, 0.0]),
            ])
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(store.count(), 0);
        assert!(store.query(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_persistence_across_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut store = open(&temp_dir);
            store
                .insert(vec![
                    entry("kept", "a.txt", vec![1.0, 0.0, 0.0]),
                    entry("also kept", "b.txt", vec![0.0, 1.0, 0.0]),
                ])
                .unwrap();
        }

        let mut store = open(&temp_dir);
        assert_eq!(store.count(), 2);

        let results = store.query(&[0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(results[0].entry.chunk.text, "also kept");
        assert_eq!(results[0].entry.embedding, vec![0.0, 1.0, 0.0]);

        // Ids keep increasing after reopen
        let ids = store
            .insert(vec![entry("new", "c.txt", vec![0.0, 0.0, 1.0])])
            .unwrap();
        assert_eq!(ids[0].get(), 3);
    }

    #[test]
    fn test_meta_write_failure_keeps_ids_unique() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);

        let meta_path = temp_dir.path().join("documents").join(META_FILE);
        std::fs::remove_file(&meta_path).unwrap();
        std::fs::create_dir(&meta_path).unwrap();

        let first = store
            .insert(vec![entry("alpha", "a.txt", vec![1.0, 0.0, 0.0])])
            .unwrap();
        assert_eq!(store.count(), 1);

        let second = store
            .insert(vec![entry("beta", "a.txt", vec![0.0, 1.0, 0.0])])
            .unwrap();
        assert_eq!(store.count(), 2);
        assert!(second[0] > first[0]);

        let results = store.query(&[0.0, 1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.chunk.text, "beta");
        assert_eq!(results[1].entry.chunk.text, "alpha");
    }

    #[test]
    fn test_provider_mismatch_refused() {
        let temp_dir = TempDir::new().unwrap();
        drop(open(&temp_dir));

        let err = VectorStore::open_or_create(temp_dir.path(), "documents", "other-model", 3)
            .unwrap_err();
        assert!(matches!(err, StoreError::ProviderMismatch { .. }));

        let err =
            VectorStore::open_or_create(temp_dir.path(), "documents", MODEL, 384).unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_clear_removes_disk_state() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);
        store
            .insert(vec![entry("gone", "a.txt", vec![1.0, 0.0, 0.0])])
            .unwrap();

        store.clear().unwrap();
        assert!(!temp_dir.path().join("documents").exists());
        assert!(
            VectorStore::open_existing(temp_dir.path(), "documents", MODEL, 3)
                .unwrap()
                .is_none()
        );

        let store = open(&temp_dir);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_open_persisted() {
        let temp_dir = TempDir::new().unwrap();
        assert!(
            VectorStore::open_persisted(temp_dir.path(), "documents")
                .unwrap()
                .is_none()
        );

        let mut store = open(&temp_dir);
        store
            .insert(vec![entry("kept", "a.txt", vec![1.0, 0.0, 0.0])])
            .unwrap();
        drop(store);

        let store = VectorStore::open_persisted(temp_dir.path(), "documents")
            .unwrap()
            .unwrap();
        assert_eq!(store.model_id(), MODEL);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_purge_missing_collection() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!VectorStore::purge(temp_dir.path(), "documents").unwrap());
    }
}
