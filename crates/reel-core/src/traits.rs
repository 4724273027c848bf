//! Core traits defining the interfaces between components.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DocumentEmbeddings, EmbeddingCache, IndexSnapshot};

/// Turns free text into an ordered sequence of normalized terms.
///
/// Implementations must be deterministic and must preserve duplicates,
/// since term frequencies are counted from the returned sequence.
pub trait Tokenizer: Send + Sync {
    /// Tokenize text into terms.
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Embedding model trait.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of document (chunk) texts.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Request/response text completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a prompt, returning the model's text response.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Scores (query, document) pairs directly, e.g. a cross-encoder.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Score each document against the query. Output is parallel to `documents`.
    async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>>;
}

/// Chunking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Sentences per chunk.
    pub chunk_size: usize,

    /// Sentences shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4,
            overlap: 1,
        }
    }
}

/// Chunking strategy trait.
pub trait Chunker: Send + Sync {
    /// Chunk text content into pieces.
    fn chunk(&self, content: &str, config: &ChunkConfig) -> Result<Vec<ChunkData>>;
}

/// Raw chunk data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    /// Chunk text content.
    pub content: String,

    /// Index of the first sentence in the chunk (0-based).
    pub first_sentence: usize,

    /// Index one past the last sentence in the chunk.
    pub end_sentence: usize,
}

/// Persistence for the lexical index and the embedding caches.
///
/// Saving fully replaces previously persisted artifacts.
pub trait IndexStore: Send + Sync {
    /// Persist a lexical index.
    fn save_index(&self, snapshot: &IndexSnapshot) -> Result<()>;

    /// Load the persisted lexical index, failing with `IndexUnavailable` if none exists.
    fn load_index(&self) -> Result<IndexSnapshot>;

    /// Persist chunk embeddings and their metadata.
    fn save_chunk_embeddings(&self, cache: &EmbeddingCache) -> Result<()>;

    /// Load cached chunk embeddings, `None` if nothing was cached yet.
    fn load_chunk_embeddings(&self) -> Result<Option<EmbeddingCache>>;

    /// Persist whole-document embeddings.
    fn save_document_embeddings(&self, embeddings: &DocumentEmbeddings) -> Result<()>;

    /// Load cached whole-document embeddings, `None` if nothing was cached yet.
    fn load_document_embeddings(&self) -> Result<Option<DocumentEmbeddings>>;
}
