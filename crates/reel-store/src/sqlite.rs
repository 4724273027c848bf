//! SQLite-based storage implementation.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use reel_core::{
    ChunkMetadata, Document, DocumentEmbeddings, EmbeddingCache, IndexSnapshot, IndexStore,
    ReelError, Result,
};

use crate::schema::{
    META_DOCUMENT_EMBEDDINGS_FINGERPRINT, META_EMBEDDINGS_FINGERPRINT, META_INDEX_DOCUMENTS,
    SCHEMA, SCHEMA_VERSION,
};

/// SQLite-backed [`IndexStore`].
///
/// Every save runs in a single transaction that replaces the previous
/// artifacts of the same kind, so readers never see a half-written index.
pub struct SqliteStore {
    /// Connection wrapped in blocking Mutex.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| ReelError::database(format!("Failed to open database: {}", e)))?;

        Self::init(conn, path)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ReelError::database(format!("Failed to open in-memory database: {}", e))
        })?;

        Self::init(conn, Path::new(":memory:"))
    }

    fn init(conn: Connection, path: &Path) -> Result<Self> {
        Self::configure_connection(&conn)?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| ReelError::database(format!("Failed to initialize schema: {}", e)))?;

        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| ReelError::database(e.to_string()))?;
        if version == 0 {
            conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
                .map_err(|e| ReelError::database(e.to_string()))?;
        } else if version != SCHEMA_VERSION {
            return Err(ReelError::index_unavailable(format!(
                "cache schema version {} is not supported (expected {})",
                version, SCHEMA_VERSION
            )));
        }

        info!("Database opened at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Configure SQLite connection for optimal performance.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -16000;
            PRAGMA busy_timeout = 30000;
            PRAGMA temp_store = MEMORY;
            "#,
        )
        .map_err(|e| ReelError::database(format!("Failed to configure connection: {}", e)))?;

        Ok(())
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ReelError::database(e.to_string()))?;
        f(&conn)
    }

    /// Whether a lexical index has been saved.
    pub fn has_index(&self) -> Result<bool> {
        self.with_conn(|conn| Ok(get_meta(conn, META_INDEX_DOCUMENTS)?.is_some()))
    }

    /// Drop every persisted artifact.
    pub fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                DELETE FROM documents;
                DELETE FROM postings;
                DELETE FROM term_frequencies;
                DELETE FROM doc_lengths;
                DELETE FROM chunk_embeddings;
                DELETE FROM document_embeddings;
                DELETE FROM cache_meta;
                "#,
            )
            .map_err(|e| ReelError::database(format!("Failed to clear cache: {}", e)))?;
            info!("Cleared persisted index and embeddings");
            Ok(())
        })
    }

    fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_vec(bytes: &[u8]) -> Option<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        Some(
            bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        )
    }

    /// Decode one blob, rejecting truncated blobs and vectors whose length
    /// differs from the ones already read.
    fn decode_embedding(bytes: &[u8], previous: &[Vec<f32>], table: &str) -> Result<Vec<f32>> {
        let embedding = Self::bytes_to_vec(bytes).ok_or_else(|| {
            warn!("{} row {} has a truncated blob", table, previous.len());
            ReelError::embedding_unavailable("cached embedding blob is corrupt")
        })?;
        if let Some(first) = previous.first() {
            if first.len() != embedding.len() {
                return Err(ReelError::embedding_unavailable(format!(
                    "cached embeddings have mixed dimensions ({} and {})",
                    first.len(),
                    embedding.len()
                )));
            }
        }
        Ok(embedding)
    }
}

fn db_err(e: rusqlite::Error) -> ReelError {
    ReelError::database(e.to_string())
}

fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM cache_meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(db_err)
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO cache_meta (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .map_err(db_err)?;
    Ok(())
}

impl IndexStore for SqliteStore {
    fn save_index(&self, snapshot: &IndexSnapshot) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().map_err(db_err)?;

            tx.execute_batch(
                r#"
                DELETE FROM documents;
                DELETE FROM postings;
                DELETE FROM term_frequencies;
                DELETE FROM doc_lengths;
                "#,
            )
            .map_err(db_err)?;

            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO documents (id, position, title, description) VALUES (?1, ?2, ?3, ?4)",
                    )
                    .map_err(db_err)?;
                for (position, doc) in snapshot.documents.iter().enumerate() {
                    stmt.execute(params![doc.id, position as i64, doc.title, doc.description])
                        .map_err(|e| {
                            ReelError::database(format!("Failed to insert document: {}", e))
                        })?;
                }
            }

            {
                let mut stmt = tx
                    .prepare("INSERT INTO postings (term, doc_id) VALUES (?1, ?2)")
                    .map_err(db_err)?;
                for (term, docs) in &snapshot.postings {
                    for doc_id in docs {
                        stmt.execute(params![term, doc_id]).map_err(db_err)?;
                    }
                }
            }

            {
                let mut stmt = tx
                    .prepare("INSERT INTO term_frequencies (doc_id, term, count) VALUES (?1, ?2, ?3)")
                    .map_err(db_err)?;
                for (doc_id, terms) in &snapshot.term_frequencies {
                    for (term, count) in terms {
                        stmt.execute(params![doc_id, term, count]).map_err(db_err)?;
                    }
                }
            }

            {
                let mut stmt = tx
                    .prepare("INSERT INTO doc_lengths (doc_id, length) VALUES (?1, ?2)")
                    .map_err(db_err)?;
                for (doc_id, length) in &snapshot.doc_lengths {
                    stmt.execute(params![doc_id, length]).map_err(db_err)?;
                }
            }

            set_meta(&tx, META_INDEX_DOCUMENTS, &snapshot.documents.len().to_string())?;

            tx.commit().map_err(db_err)?;

            debug!(
                "Saved index: {} documents, {} terms",
                snapshot.documents.len(),
                snapshot.postings.len()
            );
            Ok(())
        })
    }

    fn load_index(&self) -> Result<IndexSnapshot> {
        self.with_conn(|conn| {
            let expected = match get_meta(conn, META_INDEX_DOCUMENTS)? {
                Some(count) => count.parse::<usize>().map_err(|_| {
                    ReelError::index_unavailable("index marker is corrupt; rebuild required")
                })?,
                None => {
                    return Err(ReelError::index_unavailable(
                        "no index has been built; run a build first",
                    ))
                }
            };

            let mut snapshot = IndexSnapshot::default();

            let mut stmt = conn
                .prepare("SELECT id, title, description FROM documents ORDER BY position")
                .map_err(db_err)?;
            snapshot.documents = stmt
                .query_map([], |row| {
                    Ok(Document {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                    })
                })
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;

            if snapshot.documents.len() != expected {
                return Err(ReelError::index_unavailable(format!(
                    "persisted index holds {} documents, marker says {}",
                    snapshot.documents.len(),
                    expected
                )));
            }

            let mut stmt = conn
                .prepare("SELECT term, doc_id FROM postings")
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .map_err(db_err)?;
            for row in rows {
                let (term, doc_id) = row.map_err(db_err)?;
                snapshot
                    .postings
                    .entry(term)
                    .or_default()
                    .insert(doc_id);
            }

            let mut stmt = conn
                .prepare("SELECT doc_id, term, count FROM term_frequencies")
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                    ))
                })
                .map_err(db_err)?;
            for row in rows {
                let (doc_id, term, count) = row.map_err(db_err)?;
                snapshot
                    .term_frequencies
                    .entry(doc_id)
                    .or_default()
                    .insert(term, count);
            }

            let mut stmt = conn
                .prepare("SELECT doc_id, length FROM doc_lengths")
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, u32>(1)?)))
                .map_err(db_err)?;
            for row in rows {
                let (doc_id, length) = row.map_err(db_err)?;
                snapshot.doc_lengths.insert(doc_id, length);
            }

            debug!(
                "Loaded index: {} documents, {} terms",
                snapshot.documents.len(),
                snapshot.postings.len()
            );
            Ok(snapshot)
        })
    }

    fn save_chunk_embeddings(&self, cache: &EmbeddingCache) -> Result<()> {
        if cache.embeddings.len() != cache.metadata.len() {
            return Err(ReelError::invalid_argument(format!(
                "{} embeddings but {} metadata records",
                cache.embeddings.len(),
                cache.metadata.len()
            )));
        }

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().map_err(db_err)?;

            tx.execute("DELETE FROM chunk_embeddings", [])
                .map_err(db_err)?;

            {
                let mut stmt = tx
                    .prepare(
                        r#"
                        INSERT INTO chunk_embeddings
                            (position, document_index, chunk_index, total_chunks, embedding)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        "#,
                    )
                    .map_err(db_err)?;

                for (position, (embedding, meta)) in
                    cache.embeddings.iter().zip(&cache.metadata).enumerate()
                {
                    stmt.execute(params![
                        position as i64,
                        meta.document_index as i64,
                        meta.chunk_index as i64,
                        meta.total_chunks as i64,
                        Self::vec_to_bytes(embedding),
                    ])
                    .map_err(|e| ReelError::database(format!("Failed to insert embedding: {}", e)))?;
                }
            }

            set_meta(&tx, META_EMBEDDINGS_FINGERPRINT, &cache.fingerprint)?;

            tx.commit().map_err(db_err)?;

            debug!("Saved {} chunk embeddings", cache.embeddings.len());
            Ok(())
        })
    }

    fn load_chunk_embeddings(&self) -> Result<Option<EmbeddingCache>> {
        self.with_conn(|conn| {
            let fingerprint = match get_meta(conn, META_EMBEDDINGS_FINGERPRINT)? {
                Some(fingerprint) => fingerprint,
                None => return Ok(None),
            };

            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT document_index, chunk_index, total_chunks, embedding
                    FROM chunk_embeddings ORDER BY position
                    "#,
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        ChunkMetadata {
                            document_index: row.get::<_, i64>(0)? as usize,
                            chunk_index: row.get::<_, i64>(1)? as usize,
                            total_chunks: row.get::<_, i64>(2)? as usize,
                        },
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                })
                .map_err(db_err)?;

            let mut cache = EmbeddingCache {
                embeddings: Vec::new(),
                metadata: Vec::new(),
                fingerprint,
            };

            for row in rows {
                let (meta, bytes) = row.map_err(db_err)?;
                let embedding =
                    Self::decode_embedding(&bytes, &cache.embeddings, "chunk_embeddings")?;
                cache.embeddings.push(embedding);
                cache.metadata.push(meta);
            }

            debug!("Loaded {} cached chunk embeddings", cache.embeddings.len());
            Ok(Some(cache))
        })
    }

    fn save_document_embeddings(&self, embeddings: &DocumentEmbeddings) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().map_err(db_err)?;

            tx.execute("DELETE FROM document_embeddings", [])
                .map_err(db_err)?;

            {
                let mut stmt = tx
                    .prepare("INSERT INTO document_embeddings (position, embedding) VALUES (?1, ?2)")
                    .map_err(db_err)?;
                for (position, embedding) in embeddings.embeddings.iter().enumerate() {
                    stmt.execute(params![position as i64, Self::vec_to_bytes(embedding)])
                        .map_err(|e| {
                            ReelError::database(format!("Failed to insert embedding: {}", e))
                        })?;
                }
            }

            set_meta(&tx, META_DOCUMENT_EMBEDDINGS_FINGERPRINT, &embeddings.fingerprint)?;

            tx.commit().map_err(db_err)?;

            debug!("Saved {} document embeddings", embeddings.len());
            Ok(())
        })
    }

    fn load_document_embeddings(&self) -> Result<Option<DocumentEmbeddings>> {
        self.with_conn(|conn| {
            let fingerprint = match get_meta(conn, META_DOCUMENT_EMBEDDINGS_FINGERPRINT)? {
                Some(fingerprint) => fingerprint,
                None => return Ok(None),
            };

            let mut stmt = conn
                .prepare("SELECT embedding FROM document_embeddings ORDER BY position")
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))
                .map_err(db_err)?;

            let mut cached = DocumentEmbeddings {
                embeddings: Vec::new(),
                fingerprint,
            };
            for row in rows {
                let bytes = row.map_err(db_err)?;
                let embedding =
                    Self::decode_embedding(&bytes, &cached.embeddings, "document_embeddings")?;
                cached.embeddings.push(embedding);
            }

            debug!("Loaded {} cached document embeddings", cached.len());
            Ok(Some(cached))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn sample_snapshot() -> IndexSnapshot {
        let mut snapshot = IndexSnapshot {
            documents: vec![
                Document::new(2, "Paddington", "bear marmalade comedy"),
                Document::new(1, "The Revenant", "bear attack survival"),
            ],
            ..Default::default()
        };
        for (term, docs) in [("bear", vec![1, 2]), ("marmalad", vec![2]), ("attack", vec![1])] {
            snapshot
                .postings
                .insert(term.to_string(), docs.into_iter().collect::<BTreeSet<_>>());
        }
        snapshot.term_frequencies.insert(
            1,
            BTreeMap::from([("bear".to_string(), 1), ("attack".to_string(), 1)]),
        );
        snapshot.term_frequencies.insert(
            2,
            BTreeMap::from([("bear".to_string(), 1), ("marmalad".to_string(), 1)]),
        );
        snapshot.doc_lengths.insert(1, 2);
        snapshot.doc_lengths.insert(2, 2);
        snapshot
    }

    fn sample_cache() -> EmbeddingCache {
        EmbeddingCache {
            embeddings: vec![vec![0.5, -0.25, 1.0], vec![0.0, 0.0, 0.0]],
            metadata: vec![
                ChunkMetadata {
                    document_index: 0,
                    chunk_index: 0,
                    total_chunks: 1,
                },
                ChunkMetadata {
                    document_index: 1,
                    chunk_index: 0,
                    total_chunks: 1,
                },
            ],
            fingerprint: "abc123".to_string(),
        }
    }

    #[test]
    fn test_open_memory() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(!store.has_index().unwrap());
        assert!(store.load_chunk_embeddings().unwrap().is_none());
    }

    #[test]
    fn test_load_before_build_is_unavailable() {
        let store = SqliteStore::open_memory().unwrap();
        let err = store.load_index().unwrap_err();
        assert!(matches!(err, ReelError::IndexUnavailable { .. }));
        assert!(err.needs_rebuild());
    }

    #[test]
    fn test_index_round_trip_preserves_order() {
        let store = SqliteStore::open_memory().unwrap();
        let snapshot = sample_snapshot();
        store.save_index(&snapshot).unwrap();

        let loaded = store.load_index().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.documents[0].id, 2);
        assert!(store.has_index().unwrap());
    }

    #[test]
    fn test_save_replaces_previous_index() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_index(&sample_snapshot()).unwrap();

        let smaller = IndexSnapshot {
            documents: vec![Document::new(7, "Heat", "")],
            doc_lengths: BTreeMap::from([(7, 1)]),
            term_frequencies: BTreeMap::from([(7, BTreeMap::from([("heat".to_string(), 1)]))]),
            postings: BTreeMap::from([("heat".to_string(), BTreeSet::from([7]))]),
        };
        store.save_index(&smaller).unwrap();

        assert_eq!(store.load_index().unwrap(), smaller);
    }

    #[test]
    fn test_empty_index_is_loadable() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_index(&IndexSnapshot::default()).unwrap();
        assert_eq!(store.load_index().unwrap(), IndexSnapshot::default());
    }

    #[test]
    fn test_embeddings_round_trip() {
        let store = SqliteStore::open_memory().unwrap();
        let cache = sample_cache();
        store.save_chunk_embeddings(&cache).unwrap();

        let loaded = store.load_chunk_embeddings().unwrap().unwrap();
        assert_eq!(loaded.embeddings, cache.embeddings);
        assert_eq!(loaded.metadata, cache.metadata);
        assert_eq!(loaded.fingerprint, "abc123");
    }

    #[test]
    fn test_mismatched_cache_rejected() {
        let store = SqliteStore::open_memory().unwrap();
        let mut cache = sample_cache();
        cache.metadata.pop();
        assert!(store.save_chunk_embeddings(&cache).is_err());
    }

    #[test]
    fn test_corrupt_blob_is_embedding_unavailable() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_chunk_embeddings(&sample_cache()).unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE chunk_embeddings SET embedding = ?1 WHERE position = 1",
                    params![vec![1u8, 2, 3]],
                )
                .map_err(db_err)?;
                Ok(())
            })
            .unwrap();

        let err = store.load_chunk_embeddings().unwrap_err();
        assert!(matches!(err, ReelError::EmbeddingUnavailable { .. }));
    }

    #[test]
    fn test_document_embeddings_round_trip() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.load_document_embeddings().unwrap().is_none());

        let embeddings = DocumentEmbeddings {
            embeddings: vec![vec![1.0, 0.0], vec![0.25, -0.5]],
            fingerprint: "docs".to_string(),
        };
        store.save_document_embeddings(&embeddings).unwrap();
        assert_eq!(store.load_document_embeddings().unwrap().unwrap(), embeddings);

        // Independent of the chunk cache.
        assert!(store.load_chunk_embeddings().unwrap().is_none());

        let replacement = DocumentEmbeddings {
            embeddings: vec![vec![0.0, 1.0, 0.0]],
            fingerprint: "docs2".to_string(),
        };
        store.save_document_embeddings(&replacement).unwrap();
        assert_eq!(store.load_document_embeddings().unwrap().unwrap(), replacement);
    }

    #[test]
    fn test_negative_ids_round_trip() {
        let store = SqliteStore::open_memory().unwrap();
        let snapshot = IndexSnapshot {
            documents: vec![Document::new(-4, "Prequel", "before")],
            doc_lengths: BTreeMap::from([(-4, 2)]),
            term_frequencies: BTreeMap::from([(-4, BTreeMap::from([("prequel".to_string(), 1)]))]),
            postings: BTreeMap::from([("prequel".to_string(), BTreeSet::from([-4]))]),
        };
        store.save_index(&snapshot).unwrap();
        assert_eq!(store.load_index().unwrap(), snapshot);
    }

    #[test]
    fn test_clear() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_index(&sample_snapshot()).unwrap();
        store.save_chunk_embeddings(&sample_cache()).unwrap();
        store
            .save_document_embeddings(&DocumentEmbeddings {
                embeddings: vec![vec![1.0]],
                fingerprint: "docs".to_string(),
            })
            .unwrap();
        store.clear().unwrap();

        assert!(store.load_index().is_err());
        assert!(store.load_chunk_embeddings().unwrap().is_none());
        assert!(store.load_document_embeddings().unwrap().is_none());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("reel.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_index(&sample_snapshot()).unwrap();
            store.save_chunk_embeddings(&sample_cache()).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_index().unwrap(), sample_snapshot());
        assert_eq!(
            store.load_chunk_embeddings().unwrap().unwrap().embeddings,
            sample_cache().embeddings
        );
    }
}
