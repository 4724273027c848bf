//! reel-chunk - Sentence-window chunking
//!
//! Splits document descriptions into overlapping windows of sentences,
//! the unit that gets embedded for semantic search.
//!
//! # Example
//!
//! ```rust
//! use reel_chunk::chunk_text;
//!
//! let chunks = chunk_text("A. B. C. D. E.", 2, 1).unwrap();
//! assert_eq!(chunks, vec!["A. B.", "B. C.", "C. D.", "D. E."]);
//! ```

mod sentence;

pub use sentence::{chunk_text, split_sentences, SentenceChunker};

// Re-export types for convenience
pub use reel_core::{ChunkConfig, ChunkData, Chunker};
