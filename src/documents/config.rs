//! Configuration types for document chunking.

use serde::{Deserialize, Serialize};

/// Configuration for document chunking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by adjacent chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".to_string());
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunking_config_defaults() {
        let config = ChunkingConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
    }

    #[test]
    fn test_chunking_config_validation() {
        let mut config = ChunkingConfig::default();

        // Valid config
        assert!(config.validate().is_ok());

        // Invalid: overlap >= size
        config.chunk_overlap = 1000;
        assert!(config.validate().is_err());

        // Invalid: zero size
        config.chunk_size = 0;
        config.chunk_overlap = 0;
        assert!(config.validate().is_err());

        // Zero overlap is fine
        config.chunk_size = 10;
        assert!(config.validate().is_ok());
    }
}
