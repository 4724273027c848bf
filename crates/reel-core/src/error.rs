//! Error types for the reel search engine.

use thiserror::Error;

/// Result type alias using ReelError.
pub type Result<T> = std::result::Result<T, ReelError>;

/// Errors that can occur while indexing or querying.
#[derive(Error, Debug)]
pub enum ReelError {
    /// A single-term operation received input that did not tokenize to exactly one term.
    #[error("Expected exactly one term in {term:?}, tokenizer produced {count}")]
    TooManyTerms { term: String, count: usize },

    /// The lexical index was queried before being built, or its persisted state is unusable.
    #[error("Index unavailable: {reason}")]
    IndexUnavailable { reason: String },

    /// Empty or whitespace-only query text.
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    /// The chunk embedding store was queried before being built or loaded.
    #[error("Embeddings unavailable: {reason}")]
    EmbeddingUnavailable { reason: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Embedding model error.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Language model (completion) error.
    #[error("LLM error: {message}")]
    Llm { message: String },

    /// Database error.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Chunking error.
    #[error("Chunking error: {message}")]
    Chunking { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ReelError {
    /// Create a term-arity error.
    pub fn too_many_terms(term: impl Into<String>, count: usize) -> Self {
        Self::TooManyTerms {
            term: term.into(),
            count,
        }
    }

    /// Create an index-unavailable error.
    pub fn index_unavailable(reason: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            reason: reason.into(),
        }
    }

    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create an embedding-unavailable error.
    pub fn embedding_unavailable(reason: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable {
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create a chunking error.
    pub fn chunking(message: impl Into<String>) -> Self {
        Self::Chunking {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get a stable error code, used in CLI output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TooManyTerms { .. } => "TOO_MANY_TERMS",
            Self::IndexUnavailable { .. } => "INDEX_UNAVAILABLE",
            Self::InvalidQuery { .. } => "INVALID_QUERY",
            Self::EmbeddingUnavailable { .. } => "EMBEDDING_UNAVAILABLE",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Llm { .. } => "LLM_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Chunking { .. } => "CHUNKING_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller should rebuild persisted state before retrying.
    pub fn needs_rebuild(&self) -> bool {
        matches!(
            self,
            Self::IndexUnavailable { .. } | Self::EmbeddingUnavailable { .. }
        )
    }
}
