//! Chunk-level semantic index.
//!
//! Document descriptions are split into sentence windows, each window is
//! embedded once, and queries are ranked against every chunk by cosine
//! similarity. Results are chunks, so one document may appear several times.

use std::sync::Arc;

use tracing::{debug, info, warn};

use reel_chunk::SentenceChunker;
use reel_core::{
    corpus_fingerprint, ChunkConfig, ChunkHit, ChunkMetadata, Chunker, ChunkingConfig, Document,
    Embedder, EmbeddingCache, IndexStore, ReelError, Result,
};
use reel_embed::cosine_similarity;

/// A chunk queued for embedding.
struct PendingChunk {
    metadata: ChunkMetadata,
    text: String,
}

/// Semantic index over chunk embeddings.
pub struct ChunkedSemanticIndex<E: ?Sized> {
    embedder: Arc<E>,
    chunker: Box<dyn Chunker>,
    chunk_config: ChunkConfig,
    batch_size: usize,
    snippet_chars: usize,

    /// Corpus the cache was built or validated against.
    documents: Vec<Document>,

    /// `None` until built or loaded.
    cache: Option<EmbeddingCache>,
}

impl<E> ChunkedSemanticIndex<E>
where
    E: Embedder + ?Sized,
{
    /// Create an empty index using the sentence chunker.
    pub fn new(embedder: Arc<E>, chunking: &ChunkingConfig, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(ReelError::invalid_argument("embedding batch size must be positive"));
        }
        Ok(Self {
            embedder,
            chunker: Box::new(SentenceChunker::new()),
            chunk_config: chunking.chunk_config(),
            batch_size,
            snippet_chars: chunking.snippet_chars,
            documents: Vec::new(),
            cache: None,
        })
    }

    /// Swap the chunking strategy.
    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// The embedding collaborator.
    pub fn embedder(&self) -> &Arc<E> {
        &self.embedder
    }

    /// The current embedding cache, if built or loaded.
    pub fn cache(&self) -> Option<&EmbeddingCache> {
        self.cache.as_ref()
    }

    /// Whether embeddings are available for search.
    pub fn is_ready(&self) -> bool {
        self.cache.is_some()
    }

    /// Number of embedded chunks, 0 before build.
    pub fn chunk_count(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.chunk_count())
    }

    /// Corpus ordering the chunk metadata refers to.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    fn chunk_corpus(&self, documents: &[Document]) -> Result<Vec<PendingChunk>> {
        let mut pending = Vec::new();

        for (document_index, doc) in documents.iter().enumerate() {
            if doc.description.trim().is_empty() {
                continue;
            }
            let chunks = self.chunker.chunk(&doc.description, &self.chunk_config)?;
            let total_chunks = chunks.len();
            for (chunk_index, chunk) in chunks.into_iter().enumerate() {
                pending.push(PendingChunk {
                    metadata: ChunkMetadata {
                        document_index,
                        chunk_index,
                        total_chunks,
                    },
                    text: chunk.content,
                });
            }
        }

        Ok(pending)
    }

    /// Chunk and embed every document with a non-empty description.
    ///
    /// Replaces any previous cache. Metadata is parallel to the embeddings.
    pub async fn build_chunk_embeddings(&mut self, documents: &[Document]) -> Result<&EmbeddingCache> {
        let pending = self.chunk_corpus(documents)?;

        info!(
            "Embedding {} chunks from {} documents",
            pending.len(),
            documents.len()
        );

        let mut embeddings = Vec::with_capacity(pending.len());
        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = self.embedder.embed_documents(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(ReelError::embedding(format!(
                    "Embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    texts.len()
                )));
            }
            embeddings.extend(vectors);
            debug!("Embedded {}/{} chunks", embeddings.len(), pending.len());
        }

        let cache = EmbeddingCache {
            embeddings,
            metadata: pending.into_iter().map(|c| c.metadata).collect(),
            fingerprint: corpus_fingerprint(documents, &self.chunk_config),
        };

        self.documents = documents.to_vec();
        Ok(self.cache.insert(cache))
    }

    /// Use the persisted cache if it matches `documents`, otherwise rebuild and save.
    ///
    /// A cache is reused only when its chunk count and corpus fingerprint
    /// match a fresh chunking pass and its vectors have the embedder's dimension.
    pub async fn load_or_create_chunk_embeddings(
        &mut self,
        documents: &[Document],
        store: &dyn IndexStore,
    ) -> Result<()> {
        let cached = match store.load_chunk_embeddings() {
            Ok(cached) => cached,
            Err(e) if e.needs_rebuild() => {
                warn!("Chunk-embedding cache unreadable ({}); rebuilding", e);
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(cache) = cached {
            let expected_chunks = self.chunk_corpus(documents)?.len();
            let fingerprint = corpus_fingerprint(documents, &self.chunk_config);
            let dimension = self.embedder.dimension();
            let dimension_matches = cache.dimension().map_or(true, |d| d == dimension);

            if cache.chunk_count() == expected_chunks
                && cache.fingerprint == fingerprint
                && dimension_matches
            {
                info!("Loaded {} cached chunk embeddings", cache.chunk_count());
                self.documents = documents.to_vec();
                self.cache = Some(cache);
                return Ok(());
            }

            warn!(
                "Stale chunk-embedding cache (cached {} chunks of dimension {:?}, corpus yields {} for dimension {}; fingerprint {}); rebuilding",
                cache.chunk_count(),
                cache.dimension(),
                expected_chunks,
                dimension,
                if cache.fingerprint == fingerprint { "matches" } else { "differs" }
            );
        } else {
            info!("No chunk-embedding cache found; building");
        }

        let cache = self.build_chunk_embeddings(documents).await?;
        store.save_chunk_embeddings(cache)
    }

    /// Rank every chunk against `query` and return the top `limit` chunks.
    ///
    /// Ties keep chunk order.
    pub async fn search_chunks(&self, query: &str, limit: usize) -> Result<Vec<ChunkHit>> {
        if query.trim().is_empty() {
            return Err(ReelError::invalid_query("query must not be empty"));
        }
        let cache = self.cache.as_ref().ok_or_else(|| {
            ReelError::embedding_unavailable("chunk embeddings have not been built or loaded")
        })?;

        let query_embedding = self.embedder.embed_query(query).await?;
        if let Some(dimension) = cache.dimension() {
            if dimension != query_embedding.len() {
                return Err(ReelError::embedding_unavailable(format!(
                    "chunk embeddings have dimension {} but the query embedding has {}",
                    dimension,
                    query_embedding.len()
                )));
            }
        }

        let mut scored: Vec<(usize, f32)> = cache
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, embedding)| (i, cosine_similarity(&query_embedding, embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let mut hits = Vec::with_capacity(scored.len());
        for (position, score) in scored {
            let metadata = cache.metadata[position];
            let doc = self.documents.get(metadata.document_index).ok_or_else(|| {
                ReelError::embedding_unavailable(format!(
                    "chunk {} refers to missing document index {}",
                    position, metadata.document_index
                ))
            })?;
            hits.push(ChunkHit {
                document_index: metadata.document_index,
                doc_id: doc.id,
                score,
                title: doc.title.clone(),
                snippet: doc.snippet(self.snippet_chars),
                metadata,
            });
        }

        debug!("Chunk search for {:?}: {} hits", query, hits.len());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_embed::HashingEmbedder;
    use reel_store::SqliteStore;

    fn corpus() -> Vec<Document> {
        vec![
            Document::new(
                10,
                "The Revenant",
                "A frontiersman is mauled by a bear. He survives the attack. He crawls through the frozen wilderness. He seeks revenge on those who left him.",
            ),
            Document::new(20, "Untitled", ""),
            Document::new(30, "Paddington", "A polite bear travels from Peru to London."),
            Document::new(
                40,
                "Heat",
                "A detective hunts a crew of thieves. The crew plans one last heist in Los Angeles.",
            ),
        ]
    }

    fn index_with_dimension(dimension: usize) -> ChunkedSemanticIndex<HashingEmbedder> {
        let chunking = ChunkingConfig {
            chunk_size: 2,
            overlap: 1,
            snippet_chars: 20,
        };
        ChunkedSemanticIndex::new(Arc::new(HashingEmbedder::new(dimension).unwrap()), &chunking, 2)
            .unwrap()
    }

    fn index() -> ChunkedSemanticIndex<HashingEmbedder> {
        index_with_dimension(256)
    }

    #[tokio::test]
    async fn test_build_records_metadata() {
        let mut index = index();
        let cache = index.build_chunk_embeddings(&corpus()).await.unwrap();

        // Revenant: 4 sentences -> 3 windows; Untitled skipped; Paddington 1; Heat 1.
        assert_eq!(cache.chunk_count(), 5);
        assert_eq!(cache.embeddings.len(), cache.metadata.len());
        assert_eq!(
            cache.metadata[0],
            ChunkMetadata {
                document_index: 0,
                chunk_index: 0,
                total_chunks: 3
            }
        );
        assert_eq!(cache.metadata[3].document_index, 2);
        assert_eq!(cache.metadata[4].document_index, 3);
        assert!(cache.metadata.iter().all(|m| m.document_index != 1));
    }

    #[tokio::test]
    async fn test_search_before_build() {
        let index = index();
        let err = index.search_chunks("bear", 5).await.unwrap_err();
        assert!(matches!(err, ReelError::EmbeddingUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query() {
        let mut index = index();
        index.build_chunk_embeddings(&corpus()).await.unwrap();
        let err = index.search_chunks("  ", 5).await.unwrap_err();
        assert!(matches!(err, ReelError::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn test_search_ranks_chunks() {
        let mut index = index();
        index.build_chunk_embeddings(&corpus()).await.unwrap();

        let hits = index.search_chunks("crew of thieves heist", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].doc_id, 40);
        assert_eq!(hits[0].title, "Heat");
        assert_eq!(hits[0].snippet, "A detective hunts a ");
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_search_returns_raw_chunks() {
        let mut index = index();
        index.build_chunk_embeddings(&corpus()).await.unwrap();

        let hits = index.search_chunks("bear", 10).await.unwrap();
        assert_eq!(hits.len(), 5);
        let revenant_chunks = hits.iter().filter(|h| h.doc_id == 10).count();
        assert_eq!(revenant_chunks, 3);
    }

    #[tokio::test]
    async fn test_load_or_create_reuses_valid_cache() {
        let store = SqliteStore::open_memory().unwrap();
        let docs = corpus();

        let mut first = index();
        first.load_or_create_chunk_embeddings(&docs, &store).await.unwrap();
        let saved = store.load_chunk_embeddings().unwrap().unwrap();
        assert_eq!(saved.chunk_count(), 5);

        let mut second = index();
        second.load_or_create_chunk_embeddings(&docs, &store).await.unwrap();
        assert_eq!(second.cache().unwrap().embeddings, saved.embeddings);
        assert_eq!(second.documents().len(), 4);
    }

    #[tokio::test]
    async fn test_load_or_create_rebuilds_on_edit() {
        let store = SqliteStore::open_memory().unwrap();
        let mut docs = corpus();

        let mut first = index();
        first.load_or_create_chunk_embeddings(&docs, &store).await.unwrap();
        let before = store.load_chunk_embeddings().unwrap().unwrap();

        // Same chunk count, different content.
        docs[2].description = "A polite bear travels from Peru to Lima.".to_string();
        let mut second = index();
        second.load_or_create_chunk_embeddings(&docs, &store).await.unwrap();

        let after = store.load_chunk_embeddings().unwrap().unwrap();
        assert_eq!(after.chunk_count(), before.chunk_count());
        assert_ne!(after.fingerprint, before.fingerprint);
        assert_ne!(after.embeddings[3], before.embeddings[3]);
    }

    #[tokio::test]
    async fn test_load_or_create_rebuilds_on_dimension_change() {
        let store = SqliteStore::open_memory().unwrap();
        let docs = corpus();

        let mut small = index_with_dimension(64);
        small.load_or_create_chunk_embeddings(&docs, &store).await.unwrap();
        assert_eq!(store.load_chunk_embeddings().unwrap().unwrap().dimension(), Some(64));

        let mut large = index_with_dimension(128);
        large.load_or_create_chunk_embeddings(&docs, &store).await.unwrap();
        assert_eq!(large.cache().unwrap().dimension(), Some(128));
        assert_eq!(store.load_chunk_embeddings().unwrap().unwrap().dimension(), Some(128));

        let hits = large.search_chunks("crew of thieves", 2).await.unwrap();
        assert_eq!(hits[0].doc_id, 40);
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_search_rejects_query_of_other_dimension() {
        let docs = corpus();
        let mut built = index_with_dimension(64);
        built.build_chunk_embeddings(&docs).await.unwrap();

        let mut other = index_with_dimension(128);
        other.documents = docs;
        other.cache = built.cache.clone();

        let err = other.search_chunks("crew of thieves", 2).await.unwrap_err();
        assert!(matches!(err, ReelError::EmbeddingUnavailable { .. }));
        assert!(err.needs_rebuild());
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let result = ChunkedSemanticIndex::new(
            Arc::new(HashingEmbedder::new(8).unwrap()),
            &ChunkingConfig::default(),
            0,
        );
        assert!(result.is_err());
    }
}
