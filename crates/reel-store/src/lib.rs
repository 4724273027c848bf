//! reel-store - SQLite persistence
//!
//! This crate persists the lexical index artifacts (documents, postings,
//! term frequencies, document lengths) and the embedding caches in a
//! single SQLite file, behind the [`IndexStore`] trait.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

// Re-export schema for testing/migrations
pub use schema::{SCHEMA, SCHEMA_VERSION};

// Re-export the IndexStore trait for convenience
pub use reel_core::IndexStore;
