//! Configuration module for the document Q&A service.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `RAGQA_` and use double underscores
//! to separate nested levels:
//! - `RAGQA_SERVER__BIND=0.0.0.0:8000` sets `server.bind`
//! - `RAGQA_LLM__MODEL=mistral` sets `llm.model`
//! - `RAGQA_CHUNKING__CHUNK_SIZE=800` sets `chunking.chunk_size`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::documents::ChunkingConfig;

/// Directory holding the settings file and, by default, the data directory.
pub const CONFIG_DIR: &str = ".ragqa";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "RAGQA_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .ragqa is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Text chunking settings
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding provider settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Language model backend settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Vector store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Query defaults and limits
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Address the HTTP API binds to
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Allow cross-origin requests from any origin
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Maximum accepted upload body in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Which embedding backend produces vectors.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Local ONNX model loaded through fastembed.
    #[default]
    Fastembed,
    /// Remote Ollama `/api/embed` endpoint.
    Ollama,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Embedding backend
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Endpoint for remote providers
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    /// Timeout for a single embedding call
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Where downloaded model weights are cached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Show a progress bar while model weights download
    #[serde(default = "default_false")]
    pub show_download_progress: bool,
}

/// Which completion API the answer generator talks to.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// Ollama `/api/generate`.
    #[default]
    Ollama,
    /// Any OpenAI-compatible `/v1/chat/completions` endpoint.
    Openai,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    /// Completion backend
    #[serde(default)]
    pub provider: LlmProviderKind,

    /// Completion endpoint URL
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Model name passed to the backend
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Timeout for a single completion call
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Environment variable holding the API key (openai provider only)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    /// Directory holding persisted collections
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Collection name; the store lives at `data_dir/collection`
    #[serde(default = "default_collection")]
    pub collection: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueryConfig {
    /// Number of chunks retrieved when a request omits `top_k`
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Largest `top_k` a request may ask for
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Characters of chunk text echoed back per source
    #[serde(default = "default_source_preview_chars")]
    pub source_preview_chars: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all targets
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides (e.g. `store = "debug"`)
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_embedding_endpoint() -> String {
    "http://localhost:11434/api/embed".to_string()
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_llm_endpoint() -> String {
    "http://localhost:11434/api/generate".to_string()
}
fn default_llm_model() -> String {
    "llama2".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout() -> u64 {
    120
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("data")
}
fn default_collection() -> String {
    "documents".to_string()
}
fn default_top_k() -> usize {
    3
}
fn default_max_top_k() -> usize {
    20
}
fn default_source_preview_chars() -> usize {
    200
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            server: ServerConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            store: StoreConfig::default(),
            query: QueryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors: true,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model: default_embedding_model(),
            endpoint: default_embedding_endpoint(),
            timeout_secs: default_embedding_timeout(),
            cache_dir: None,
            show_download_progress: false,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            collection: default_collection(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            source_preview_chars: default_source_preview_chars(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl EmbeddingConfig {
    /// Cache directory for model weights, falling back to the user cache dir.
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(CONFIG_DIR))
                .join("ragqa")
                .join("models")
        })
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let current = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_in(current)
    }

    /// Load configuration as if started from `dir`.
    ///
    /// The nearest ancestor holding `.ragqa` is the workspace root, and
    /// relative data and cache paths resolve against it.
    pub fn load_in(dir: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        let root = Self::find_workspace_root(dir.as_ref());
        let config_path = root
            .as_ref()
            .map(|root| root.join(CONFIG_DIR).join("settings.toml"))
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        let mut settings: Settings = Self::figment(&config_path).extract().map_err(Box::new)?;
        if root.is_some() {
            settings.workspace_root = root;
        }
        settings.resolve_paths();
        Ok(settings)
    }

    /// Anchor relative data and cache paths at the workspace root.
    fn resolve_paths(&mut self) {
        let Some(root) = self.workspace_root.clone() else {
            return;
        };
        if self.store.data_dir.is_relative() {
            self.store.data_dir = root.join(&self.store.data_dir);
        }
        if let Some(cache_dir) = self.embedding.cache_dir.as_mut() {
            if cache_dir.is_relative() {
                *cache_dir = root.join(&*cache_dir);
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels; single underscores stay in field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Check values that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        self.chunking.validate()?;

        if self.query.default_top_k == 0 {
            return Err("query.default_top_k must be at least 1".to_string());
        }
        if self.query.default_top_k > self.query.max_top_k {
            return Err(format!(
                "query.default_top_k ({}) must not exceed query.max_top_k ({})",
                self.query.default_top_k, self.query.max_top_k
            ));
        }
        if self.store.collection.trim().is_empty()
            || self.store.collection.starts_with('.')
            || self.store.collection.contains(['/', '\\'])
        {
            return Err(format!(
                "store.collection must be a plain directory name, got {:?}",
                self.store.collection
            ));
        }
        if self.llm.timeout_secs == 0 || self.embedding.timeout_secs == 0 {
            return Err("timeouts must be at least one second".to_string());
        }

        Ok(())
    }

    /// Find the workspace root (the nearest ancestor of `start` holding `.ragqa`)
    fn find_workspace_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let mut settings = Settings::default();
        if let Ok(current_dir) = std::env::current_dir() {
            settings.workspace_root = Some(current_dir);
        }

        settings.save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.server.bind, "127.0.0.1:8000");
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.query.default_top_k, 3);
        assert_eq!(settings.llm.timeout_secs, 120);
        assert_eq!(settings.store.collection, "documents");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[server]
bind = "0.0.0.0:9000"
cors = false

[chunking]
chunk_size = 500
chunk_overlap = 50

[llm]
provider = "openai"
model = "gpt-4o-mini"
temperature = 0.0

[store]
collection = "manuals"

[logging.modules]
store = "debug"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.server.bind, "0.0.0.0:9000");
        assert!(!settings.server.cors);
        assert_eq!(settings.chunking.chunk_size, 500);
        assert_eq!(settings.chunking.chunk_overlap, 50);
        assert_eq!(settings.llm.provider, LlmProviderKind::Openai);
        assert_eq!(settings.llm.model, "gpt-4o-mini");
        assert_eq!(settings.store.collection, "manuals");
        assert_eq!(settings.store.data_dir, default_data_dir());
        assert_eq!(settings.logging.modules["store"], "debug");
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        fs::write(&config_path, "[query]\ndefault_top_k = 5\n").unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        // Modified value
        assert_eq!(settings.query.default_top_k, 5);

        // Default values should still be present
        assert_eq!(settings.query.max_top_k, 20);
        assert_eq!(settings.embedding.provider, EmbeddingProviderKind::Fastembed);
        assert_eq!(settings.llm.endpoint, "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.llm.model = "mistral".to_string();
        settings.query.max_top_k = 8;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.llm.model, "mistral");
        assert_eq!(loaded.query.max_top_k, 8);
    }

    #[test]
    fn test_load_in_nested_directory_uses_workspace_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(CONFIG_DIR)).unwrap();
        fs::write(
            root.join(CONFIG_DIR).join("settings.toml"),
            "[embedding]\ncache_dir = \"models\"\n\n[query]\ndefault_top_k = 4\n",
        )
        .unwrap();
        let nested = root.join("sub").join("dir");
        fs::create_dir_all(&nested).unwrap();

        let settings = Settings::load_in(&nested).unwrap();

        assert_eq!(settings.workspace_root.as_deref(), Some(root));
        assert_eq!(settings.query.default_top_k, 4);
        assert_eq!(settings.store.data_dir, root.join(CONFIG_DIR).join("data"));
        assert_eq!(settings.embedding.cache_dir, Some(root.join("models")));
    }

    #[test]
    fn test_load_in_keeps_absolute_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let elsewhere = TempDir::new().unwrap();
        fs::create_dir_all(root.join(CONFIG_DIR)).unwrap();
        fs::write(
            root.join(CONFIG_DIR).join("settings.toml"),
            format!("[store]\ndata_dir = {:?}\n", elsewhere.path().display().to_string()),
        )
        .unwrap();

        let settings = Settings::load_in(root).unwrap();
        assert_eq!(settings.store.data_dir, elsewhere.path());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.chunking.chunk_overlap = settings.chunking.chunk_size;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.query.default_top_k = 50;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.store.collection = "../escape".to_string();
        assert!(settings.validate().is_err());
    }
}
