//! Database schema definitions.

/// Main schema SQL for initializing the database.
pub const SCHEMA: &str = r#"
-- Indexed documents, in corpus order
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY,
    position INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL
);

-- Inverted index: term -> document
CREATE TABLE IF NOT EXISTS postings (
    term TEXT NOT NULL,
    doc_id INTEGER NOT NULL,
    PRIMARY KEY (term, doc_id)
) WITHOUT ROWID;

-- Per-document term counts
CREATE TABLE IF NOT EXISTS term_frequencies (
    doc_id INTEGER NOT NULL,
    term TEXT NOT NULL,
    count INTEGER NOT NULL,
    PRIMARY KEY (doc_id, term)
) WITHOUT ROWID;

-- Per-document token counts
CREATE TABLE IF NOT EXISTS doc_lengths (
    doc_id INTEGER PRIMARY KEY,
    length INTEGER NOT NULL
);

-- Chunk embeddings (little-endian f32 blobs) with chunk -> document metadata
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    position INTEGER PRIMARY KEY,
    document_index INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL,
    total_chunks INTEGER NOT NULL,
    embedding BLOB NOT NULL
);

-- Whole-document embeddings, in corpus order
CREATE TABLE IF NOT EXISTS document_embeddings (
    position INTEGER PRIMARY KEY,
    embedding BLOB NOT NULL
);

-- Build markers and cache fingerprints
CREATE TABLE IF NOT EXISTS cache_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Schema version for migrations, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: u32 = 1;

/// `cache_meta` key written when a lexical index is saved.
pub(crate) const META_INDEX_DOCUMENTS: &str = "index_documents";

/// `cache_meta` key holding the chunk-embedding fingerprint.
pub(crate) const META_EMBEDDINGS_FINGERPRINT: &str = "embeddings_fingerprint";

/// `cache_meta` key holding the whole-document embedding fingerprint.
pub(crate) const META_DOCUMENT_EMBEDDINGS_FINGERPRINT: &str = "document_embeddings_fingerprint";
