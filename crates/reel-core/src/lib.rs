//! reel-core - Core types and traits for the reel search engine
//!
//! This crate provides the domain types, collaborator traits, error taxonomy
//! and configuration shared by every other reel crate.

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use corpus::{
    corpus_fingerprint, document_fingerprint, load_corpus, parse_corpus, GoldenDataset,
    GoldenTestCase,
};
pub use error::{ReelError, Result};
pub use traits::*;
pub use types::*;
