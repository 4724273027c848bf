//! Core domain types for the reel search engine.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Stable document identifier, unique within a corpus. Any JSON integer,
/// negative values included.
pub type DocId = i64;

/// A document in the corpus. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique, stable identifier.
    pub id: DocId,

    /// Document title.
    pub title: String,

    /// Free-text description (may be empty).
    #[serde(default)]
    pub description: String,
}

impl Document {
    /// Create a new document.
    pub fn new(id: DocId, title: &str, description: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    /// Text fed to the lexical index: title and description joined by a space.
    pub fn indexed_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// Text fed to whole-document embedding: `"title: description"`.
    pub fn embedding_text(&self) -> String {
        format!("{}: {}", self.title, self.description)
    }

    /// First `max_chars` characters of the description, for display.
    pub fn snippet(&self, max_chars: usize) -> String {
        self.description.chars().take(max_chars).collect()
    }
}

/// Position of a chunk inside its owning document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Index of the owning document in the corpus ordering.
    pub document_index: usize,

    /// Index of the chunk within the document (0-based).
    pub chunk_index: usize,

    /// Number of chunks the document was split into.
    pub total_chunks: usize,
}

/// Serializable form of the lexical index.
///
/// Holds the posting lists, term frequency table, document lengths and
/// document map exactly as built; the tokenizer is not part of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Indexed documents, ascending by id.
    pub documents: Vec<Document>,

    /// term -> ids of documents containing the term.
    pub postings: BTreeMap<String, BTreeSet<DocId>>,

    /// doc id -> term -> occurrence count.
    pub term_frequencies: BTreeMap<DocId, BTreeMap<String, u32>>,

    /// doc id -> token count.
    pub doc_lengths: BTreeMap<DocId, u32>,
}

/// Persisted chunk embeddings with their parallel metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingCache {
    /// One vector per chunk, in chunking order.
    pub embeddings: Vec<Vec<f32>>,

    /// One metadata record per chunk, parallel to `embeddings`.
    pub metadata: Vec<ChunkMetadata>,

    /// Fingerprint of the corpus and chunking parameters the cache was built from.
    pub fingerprint: String,
}

impl EmbeddingCache {
    /// Number of cached chunks.
    pub fn chunk_count(&self) -> usize {
        self.metadata.len()
    }

    /// Vector length of the cached embeddings, `None` when empty.
    pub fn dimension(&self) -> Option<usize> {
        self.embeddings.first().map(Vec::len)
    }
}

/// Persisted whole-document embeddings, one per corpus document in corpus order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentEmbeddings {
    pub embeddings: Vec<Vec<f32>>,

    /// Fingerprint of the corpus the vectors were built from.
    pub fingerprint: String,
}

impl DocumentEmbeddings {
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Vector length of the cached embeddings, `None` when empty.
    pub fn dimension(&self) -> Option<usize> {
        self.embeddings.first().map(Vec::len)
    }
}

/// A single chunk-level semantic match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkHit {
    /// Index of the owning document in the corpus ordering.
    pub document_index: usize,

    /// Id of the owning document.
    pub doc_id: DocId,

    /// Cosine similarity between the query and the chunk.
    pub score: f32,

    /// Title of the owning document.
    pub title: String,

    /// Leading part of the owning document's description.
    pub snippet: String,

    /// Chunk position metadata.
    pub metadata: ChunkMetadata,
}

/// How a result's score was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreBreakdown {
    /// Plain BM25.
    Keyword { bm25: f32 },

    /// Best chunk cosine similarity.
    Semantic { cosine: f32, chunk: ChunkMetadata },

    /// Cosine similarity against the whole-document embedding.
    Document { cosine: f32 },

    /// Weighted min-max fusion.
    Weighted {
        keyword: f32,
        semantic: f32,
        hybrid: f32,
    },

    /// Reciprocal rank fusion. A missing rank means the side did not rank the document.
    Rrf {
        rrf: f32,
        keyword_rank: Option<u32>,
        semantic_rank: Option<u32>,
    },
}

/// Signal attached by a reranker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RerankSignal {
    /// Pointwise 0-10 rating from a language model.
    Rating(f32),

    /// 1-based position in a listwise permutation.
    ListPosition(u32),

    /// Cross-encoder relevance score.
    CrossEncoder(f32),
}

/// A search result ready for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result rank (1-indexed).
    pub rank: u32,

    /// Primary score (higher is better).
    pub score: f32,

    /// The matched document.
    pub document: Document,

    /// Leading part of the description.
    pub snippet: String,

    /// Per-signal score breakdown.
    pub breakdown: ScoreBreakdown,

    /// Reranker signal, when a reranker ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank: Option<RerankSignal>,
}

/// Search results container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// The original query.
    pub query: String,

    /// The query actually searched, when enhancement rewrote it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_query: Option<String>,

    /// Total results returned.
    pub total_results: usize,

    /// Search latency in milliseconds.
    pub latency_ms: u64,

    /// Individual results.
    pub results: Vec<SearchResult>,
}

impl SearchResults {
    /// Wrap a ranked list, renumbering ranks from 1.
    pub fn new(query: &str, mut results: Vec<SearchResult>, latency_ms: u64) -> Self {
        for (i, result) in results.iter_mut().enumerate() {
            result.rank = i as u32 + 1;
        }
        Self {
            query: query.to_string(),
            enhanced_query: None,
            total_results: results.len(),
            latency_ms,
            results,
        }
    }
}
