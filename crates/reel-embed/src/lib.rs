//! reel-embed - Embedding models and vector similarity
//!
//! This crate provides the embedding collaborators used by semantic search:
//!
//! - [`HashingEmbedder`]: deterministic feature-hashing embedder that needs
//!   no model files. Used as the fallback and in tests.
//! - `OnnxEmbedder` (feature `onnx`): sentence-transformer models such as
//!   all-MiniLM-L6-v2 through ONNX Runtime, with mean pooling and L2
//!   normalization.
//! - `OnnxCrossEncoder` (feature `onnx`): (query, document) relevance
//!   scoring with an ms-marco cross-encoder.
//!
//! [`preview_embedding`] backs the `embed-text` and `embed-query` diagnostics.

mod hashing;
mod inspect;
#[cfg(feature = "onnx")]
mod onnx;
mod similarity;

pub use hashing::HashingEmbedder;
pub use inspect::{preview_embedding, EmbeddingPreview, EmbeddingRole};
#[cfg(feature = "onnx")]
pub use onnx::{OnnxCrossEncoder, OnnxEmbedder};
pub use similarity::{cosine_similarity, l2_normalize};

// Re-export the collaborator traits for convenience
pub use reel_core::{Embedder, RelevanceScorer};
