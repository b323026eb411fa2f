//! Tantivy schema for chunk storage.
//!
//! Each tantivy document is one vector store entry: the chunk text, its
//! provenance and the embedding as little-endian f32 bytes.

use tantivy::schema::{
    FAST, Field, IndexRecordOption, NumericOptions, STORED, STRING, Schema, SchemaBuilder,
    TextFieldIndexing, TextOptions,
};

/// Schema fields for chunk storage.
#[derive(Debug, Clone)]
pub struct DocumentSchema {
    /// Unique identifier assigned at insert time.
    pub chunk_id: Field,

    /// Filename the chunk was extracted from.
    pub source_filename: Field,

    /// Position of the chunk within its source.
    pub chunk_index: Field,

    /// Number of chunks the source produced.
    pub total_chunks: Field,

    /// Full chunk text.
    pub content: Field,

    /// Embedding bytes (f32, little-endian).
    pub embedding: Field,

    /// Timestamp when inserted (UTC seconds).
    pub indexed_at: Field,
}

impl DocumentSchema {
    /// Build the schema for chunk storage.
    pub fn build() -> (Schema, Self) {
        let mut builder = SchemaBuilder::default();

        let indexed_u64 = NumericOptions::default()
            .set_indexed()
            .set_stored()
            .set_fast();

        let chunk_id = builder.add_u64_field("chunk_id", indexed_u64);

        // STRING for exact per-file lookups
        let source_filename = builder.add_text_field("source_filename", STRING | STORED);

        let chunk_index = builder.add_u64_field("chunk_index", STORED);
        let total_chunks = builder.add_u64_field("total_chunks", STORED);

        // Tokenized so the index stays usable for keyword lookups
        let text_options = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer("default")
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();
        let content = builder.add_text_field("content", text_options);

        let embedding = builder.add_bytes_field("embedding", STORED);

        let indexed_at = builder.add_u64_field("indexed_at", STORED | FAST);

        let schema = builder.build();

        let document_schema = Self {
            chunk_id,
            source_filename,
            chunk_index,
            total_chunks,
            content,
            embedding,
            indexed_at,
        };

        (schema, document_schema)
    }
}

/// Encode an embedding for the bytes field.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode an embedding from the bytes field; `None` if the length is not a multiple of 4.
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_build() {
        let (schema, _fields) = DocumentSchema::build();

        assert!(schema.get_field("chunk_id").is_ok());
        assert!(schema.get_field("source_filename").is_ok());
        assert!(schema.get_field("content").is_ok());
        assert!(schema.get_field("embedding").is_ok());
        assert_eq!(schema.fields().count(), 7);
    }

    #[test]
    fn test_embedding_bytes() {
        let v = vec![0.25f32, -1.5, 3.0e-7];
        let bytes = encode_embedding(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_embedding(&bytes), Some(v));
        assert_eq!(decode_embedding(&[0, 1, 2]), None);
    }
}
