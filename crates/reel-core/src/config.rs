//! Configuration types for the reel search engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::traits::ChunkConfig;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReelConfig {
    /// Storage locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// BM25 parameters.
    #[serde(default)]
    pub lexical: LexicalConfig,

    /// Search and fusion configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Reranking configuration.
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Language model configuration.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite cache holding the index and embeddings.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Path to the corpus JSON file.
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,

    /// Path to the golden evaluation dataset.
    #[serde(default = "default_golden_path")]
    pub golden_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            corpus_path: default_corpus_path(),
            golden_path: default_golden_path(),
        }
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Path to an ONNX sentence-embedding model directory.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Path to an ONNX cross-encoder model directory.
    #[serde(default = "default_cross_encoder_path")]
    pub cross_encoder_path: PathBuf,

    /// Number of chunks embedded per call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Vector dimension of the hashing embedder fallback.
    #[serde(default = "default_hashing_dimension")]
    pub hashing_dimension: usize,

    /// Number of threads for CPU inference.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            cross_encoder_path: default_cross_encoder_path(),
            batch_size: 32,
            hashing_dimension: 384,
            num_threads: 4,
        }
    }
}

/// Chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Sentences per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Sentences shared between consecutive chunks.
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Characters of description shown in result snippets.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4,
            overlap: 1,
            snippet_chars: 100,
        }
    }
}

impl ChunkingConfig {
    /// Chunker parameters.
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }
}

/// BM25 parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LexicalConfig {
    /// Term frequency saturation.
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// Length normalization strength.
    #[serde(default = "default_b")]
    pub b: f32,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Weighted fusion alpha (1 = keyword only, 0 = semantic only).
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f32,

    /// RRF constant k.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Each side of a fusion fetches `limit * fusion_overfetch` candidates.
    #[serde(default = "default_fusion_overfetch")]
    pub fusion_overfetch: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            hybrid_alpha: 0.5,
            rrf_k: 60.0,
            fusion_overfetch: 500,
        }
    }
}

/// Reranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Fused candidates handed to the reranker: `limit * candidate_multiplier`.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            candidate_multiplier: 5,
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API base URL.
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Retries after a failed request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            endpoint: default_llm_endpoint(),
            max_retries: 3,
            timeout_secs: 60,
        }
    }
}

// Default value functions

fn default_batch_size() -> usize {
    32
}

fn default_hashing_dimension() -> usize {
    384
}

fn default_num_threads() -> usize {
    4
}

fn default_chunk_size() -> usize {
    4
}

fn default_overlap() -> usize {
    1
}

fn default_snippet_chars() -> usize {
    100
}

fn default_k1() -> f32 {
    1.5
}

fn default_b() -> f32 {
    0.75
}

fn default_limit() -> usize {
    5
}

fn default_hybrid_alpha() -> f32 {
    0.5
}

fn default_rrf_k() -> f32 {
    60.0
}

fn default_fusion_overfetch() -> usize {
    500
}

fn default_candidate_multiplier() -> usize {
    5
}

fn default_llm_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_llm_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_database_path() -> PathBuf {
    PathBuf::from("cache").join("reel.db")
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data").join("movies.json")
}

fn default_golden_path() -> PathBuf {
    PathBuf::from("data").join("golden_dataset.json")
}

fn default_model_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reel")
        .join("models")
        .join("all-MiniLM-L6-v2")
}

fn default_cross_encoder_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reel")
        .join("models")
        .join("ms-marco-MiniLM-L-6-v2")
}

impl ReelConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::ReelError::config(format!("Failed to parse config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> crate::error::Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("reel").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("reel.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Reject parameter combinations the engine cannot honour.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::ReelError;

        if !(0.0..=1.0).contains(&self.search.hybrid_alpha) {
            return Err(ReelError::config(format!(
                "search.hybrid_alpha must be within [0, 1], got {}",
                self.search.hybrid_alpha
            )));
        }
        if self.search.rrf_k <= 0.0 {
            return Err(ReelError::config(format!(
                "search.rrf_k must be positive, got {}",
                self.search.rrf_k
            )));
        }
        if self.chunking.chunk_size == 0 || self.chunking.overlap >= self.chunking.chunk_size {
            return Err(ReelError::config(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(ReelError::config("embedding.batch_size must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReelConfig::default();
        assert_eq!(config.search.default_limit, 5);
        assert_eq!(config.search.rrf_k, 60.0);
        assert_eq!(config.chunking.chunk_size, 4);
        assert_eq!(config.chunking.overlap, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lexical_config_default() {
        let config = LexicalConfig::default();
        assert_eq!(config.k1, 1.5);
        assert_eq!(config.b, 0.75);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ReelConfig = toml::from_str(
            r#"
            [search]
            hybrid_alpha = 0.8

            [chunking]
            chunk_size = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.search.hybrid_alpha, 0.8);
        assert_eq!(config.search.rrf_k, 60.0);
        assert_eq!(config.chunking.chunk_size, 3);
        assert_eq!(config.chunking.overlap, 1);
        assert_eq!(config.lexical.k1, 1.5);
    }

    #[test]
    fn test_validate_rejects_bad_overlap() {
        let mut config = ReelConfig::default();
        config.chunking.overlap = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_alpha_out_of_range() {
        let mut config = ReelConfig::default();
        config.search.hybrid_alpha = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reel.toml");
        std::fs::write(&path, "[lexical]\nk1 = 1.2\n").unwrap();

        let config = ReelConfig::load(&path).unwrap();
        assert_eq!(config.lexical.k1, 1.2);
        assert_eq!(config.lexical.b, 0.75);
    }
}
