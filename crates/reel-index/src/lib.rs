//! reel-index - Lexical indexing and scoring
//!
//! This crate provides the keyword side of hybrid search: a pluggable
//! tokenizer and an inverted index scored with TF-IDF and BM25.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use reel_core::{Document, LexicalConfig};
//! use reel_index::{EnglishTokenizer, LexicalIndex};
//!
//! let docs = vec![
//!     Document::new(1, "The Revenant", "bear attack survival"),
//!     Document::new(2, "Paddington", "bear marmalade comedy"),
//! ];
//! let index = LexicalIndex::build(&docs, Arc::new(EnglishTokenizer::new()), LexicalConfig::default());
//! let results = index.bm25_search("bear", 2).unwrap();
//! assert_eq!(results.len(), 2);
//! ```

mod inverted_index;
mod tokenizer;

pub use inverted_index::{LexicalIndex, ScoredDoc};
pub use tokenizer::{single_term, EnglishTokenizer, DEFAULT_STOP_WORDS};

// Re-export the Tokenizer trait for convenience
pub use reel_core::Tokenizer;
