//! Corpus and golden-dataset loading.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReelError, Result};
use crate::traits::ChunkConfig;
use crate::types::Document;

#[derive(Deserialize)]
struct CorpusFile {
    movies: Vec<Document>,
}

/// Load an ordered document collection from a `{"movies": [...]}` JSON file.
///
/// Document ids must be unique. Any integer is accepted, including negatives.
pub fn load_corpus(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)?;
    parse_corpus(&content)
}

/// Parse a corpus from its JSON text.
pub fn parse_corpus(json: &str) -> Result<Vec<Document>> {
    let file: CorpusFile = serde_json::from_str(json)?;

    let mut seen = HashSet::with_capacity(file.movies.len());
    for doc in &file.movies {
        if !seen.insert(doc.id) {
            return Err(ReelError::invalid_argument(format!(
                "duplicate document id {} in corpus",
                doc.id
            )));
        }
    }

    Ok(file.movies)
}

fn hash_documents(hasher: &mut blake3::Hasher, documents: &[Document]) {
    for doc in documents {
        hasher.update(&doc.id.to_le_bytes());
        // Length prefixes keep field boundaries unambiguous.
        hasher.update(&(doc.title.len() as u64).to_le_bytes());
        hasher.update(doc.title.as_bytes());
        hasher.update(&(doc.description.len() as u64).to_le_bytes());
        hasher.update(doc.description.as_bytes());
    }
}

/// Fingerprint of a corpus and the chunking parameters applied to it.
///
/// Any edit to an id, title or description changes the fingerprint.
pub fn corpus_fingerprint(documents: &[Document], config: &ChunkConfig) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(config.chunk_size as u64).to_le_bytes());
    hasher.update(&(config.overlap as u64).to_le_bytes());
    hash_documents(&mut hasher, documents);
    hex::encode(hasher.finalize().as_bytes())
}

/// Fingerprint of a corpus for whole-document embeddings.
pub fn document_fingerprint(documents: &[Document]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"documents");
    hash_documents(&mut hasher, documents);
    hex::encode(hasher.finalize().as_bytes())
}

/// A labelled query for retrieval evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenTestCase {
    /// Query text.
    pub query: String,

    /// Titles of documents considered relevant.
    pub relevant_docs: Vec<String>,
}

/// A set of labelled queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoldenDataset {
    pub test_cases: Vec<GoldenTestCase>,
}

impl GoldenDataset {
    /// Load a dataset from a `{"test_cases": [...]}` JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = r#"{"movies": [
        {"id": 1, "title": "The Revenant", "description": "bear attack survival"},
        {"id": 2, "title": "Paddington", "description": "bear marmalade comedy"}
    ]}"#;

    #[test]
    fn test_parse_corpus_preserves_order() {
        let docs = parse_corpus(CORPUS).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title, "The Revenant");
        assert_eq!(docs[1].id, 2);
    }

    #[test]
    fn test_parse_corpus_rejects_duplicate_ids() {
        let json = r#"{"movies": [
            {"id": 1, "title": "A", "description": ""},
            {"id": 1, "title": "B", "description": ""}
        ]}"#;
        let err = parse_corpus(json).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_fingerprint_tracks_edits() {
        let docs = parse_corpus(CORPUS).unwrap();
        let config = ChunkConfig::default();
        let original = corpus_fingerprint(&docs, &config);
        assert_eq!(original, corpus_fingerprint(&docs, &config));

        let mut edited = docs.clone();
        edited[1].description = "bear marmalade drama".to_string();
        assert_ne!(original, corpus_fingerprint(&edited, &config));

        let other_config = ChunkConfig {
            chunk_size: 3,
            overlap: 1,
        };
        assert_ne!(original, corpus_fingerprint(&docs, &other_config));
    }

    #[test]
    fn test_parse_corpus_accepts_negative_ids() {
        let json = r#"{"movies": [
            {"id": -3, "title": "Prequel", "description": "before the beginning"},
            {"id": 0, "title": "Origin", "description": ""}
        ]}"#;
        let docs = parse_corpus(json).unwrap();
        assert_eq!(docs[0].id, -3);
        assert_eq!(docs[1].id, 0);
    }

    #[test]
    fn test_document_fingerprint_differs_from_chunk_fingerprint() {
        let docs = parse_corpus(CORPUS).unwrap();
        let fingerprint = document_fingerprint(&docs);
        assert_eq!(fingerprint, document_fingerprint(&docs));
        assert_ne!(fingerprint, corpus_fingerprint(&docs, &ChunkConfig::default()));

        let mut edited = docs.clone();
        edited[0].title = "The Revenant (2015)".to_string();
        assert_ne!(fingerprint, document_fingerprint(&edited));
    }

    #[test]
    fn test_load_golden_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("golden.json");
        std::fs::write(
            &path,
            r#"{"test_cases": [{"query": "bear", "relevant_docs": ["Paddington"]}]}"#,
        )
        .unwrap();

        let dataset = GoldenDataset::load(&path).unwrap();
        assert_eq!(dataset.test_cases.len(), 1);
        assert_eq!(dataset.test_cases[0].relevant_docs, vec!["Paddington"]);
    }
}
