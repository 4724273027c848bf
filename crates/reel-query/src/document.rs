//! Whole-document semantic index.
//!
//! Every document is embedded once as `"title: description"` and queries are
//! ranked against those vectors. Unlike the chunked index, each document
//! appears at most once in the results.

use std::sync::Arc;

use tracing::{debug, info, warn};

use reel_core::{
    document_fingerprint, Document, DocumentEmbeddings, Embedder, IndexStore, ReelError, Result,
};
use reel_embed::cosine_similarity;

/// Semantic index over one embedding per document.
pub struct DocumentSemanticIndex<E: ?Sized> {
    embedder: Arc<E>,
    batch_size: usize,
    documents: Vec<Document>,
    embeddings: Option<DocumentEmbeddings>,
}

impl<E> DocumentSemanticIndex<E>
where
    E: Embedder + ?Sized,
{
    pub fn new(embedder: Arc<E>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(ReelError::invalid_argument("embedding batch size must be positive"));
        }
        Ok(Self {
            embedder,
            batch_size,
            documents: Vec::new(),
            embeddings: None,
        })
    }

    /// The current embeddings, if built or loaded.
    pub fn embeddings(&self) -> Option<&DocumentEmbeddings> {
        self.embeddings.as_ref()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Embed every document, replacing any previous embeddings.
    pub async fn build_embeddings(&mut self, documents: &[Document]) -> Result<&DocumentEmbeddings> {
        info!("Embedding {} documents", documents.len());

        let texts: Vec<String> = documents.iter().map(Document::embedding_text).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch: Vec<&str> = batch.iter().map(String::as_str).collect();
            let vectors = self.embedder.embed_documents(&batch).await?;
            if vectors.len() != batch.len() {
                return Err(ReelError::embedding(format!(
                    "Embedder returned {} vectors for {} documents",
                    vectors.len(),
                    batch.len()
                )));
            }
            embeddings.extend(vectors);
            debug!("Embedded {}/{} documents", embeddings.len(), texts.len());
        }

        self.documents = documents.to_vec();
        Ok(self.embeddings.insert(DocumentEmbeddings {
            embeddings,
            fingerprint: document_fingerprint(documents),
        }))
    }

    /// Use the persisted embeddings if they match `documents`, otherwise rebuild and save.
    ///
    /// Reuse requires one vector per document, a matching corpus fingerprint
    /// and vectors of the embedder's dimension.
    pub async fn load_or_create_embeddings(
        &mut self,
        documents: &[Document],
        store: &dyn IndexStore,
    ) -> Result<()> {
        let cached = match store.load_document_embeddings() {
            Ok(cached) => cached,
            Err(e) if e.needs_rebuild() => {
                warn!("Document-embedding cache unreadable ({}); rebuilding", e);
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(cached) = cached {
            let fingerprint = document_fingerprint(documents);
            let dimension = self.embedder.dimension();

            if cached.len() == documents.len()
                && cached.fingerprint == fingerprint
                && cached.dimension().map_or(true, |d| d == dimension)
            {
                info!("Loaded {} cached document embeddings", cached.len());
                self.documents = documents.to_vec();
                self.embeddings = Some(cached);
                return Ok(());
            }

            warn!(
                "Stale document-embedding cache ({} vectors of dimension {:?} for {} documents of dimension {}); rebuilding",
                cached.len(),
                cached.dimension(),
                documents.len(),
                dimension
            );
        } else {
            info!("No document-embedding cache found; building");
        }

        let embeddings = self.build_embeddings(documents).await?;
        store.save_document_embeddings(embeddings)
    }

    /// Rank every document against `query` and return the top `limit`.
    ///
    /// Ties keep corpus order.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<(&Document, f32)>> {
        if query.trim().is_empty() {
            return Err(ReelError::invalid_query("query must not be empty"));
        }
        let cached = self.embeddings.as_ref().ok_or_else(|| {
            ReelError::embedding_unavailable("document embeddings have not been built or loaded")
        })?;

        let query_embedding = self.embedder.embed_query(query).await?;
        if let Some(dimension) = cached.dimension() {
            if dimension != query_embedding.len() {
                return Err(ReelError::embedding_unavailable(format!(
                    "document embeddings have dimension {} but the query embedding has {}",
                    dimension,
                    query_embedding.len()
                )));
            }
        }

        let mut scored: Vec<(&Document, f32)> = self
            .documents
            .iter()
            .zip(&cached.embeddings)
            .map(|(doc, embedding)| (doc, cosine_similarity(&query_embedding, embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        debug!("Document search for {:?}: {} hits", query, scored.len());
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_embed::HashingEmbedder;
    use reel_store::SqliteStore;

    fn corpus() -> Vec<Document> {
        vec![
            Document::new(1, "The Revenant", "A frontiersman is mauled by a bear."),
            Document::new(2, "Heat", "A detective hunts a crew of thieves."),
            Document::new(3, "Solaris", ""),
        ]
    }

    fn index(dimension: usize) -> DocumentSemanticIndex<HashingEmbedder> {
        DocumentSemanticIndex::new(Arc::new(HashingEmbedder::new(dimension).unwrap()), 2).unwrap()
    }

    #[tokio::test]
    async fn test_build_embeds_every_document() {
        let mut index = index(64);
        let embeddings = index.build_embeddings(&corpus()).await.unwrap();
        // Documents without a description are still embedded by title.
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings.dimension(), Some(64));
    }

    #[tokio::test]
    async fn test_search_ranks_documents() {
        let mut index = index(256);
        index.build_embeddings(&corpus()).await.unwrap();

        let hits = index.search("crew of thieves", 5).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0.title, "Heat");
        for pair in hits.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }

        let hits = index.search("solaris", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, 3);
    }

    #[tokio::test]
    async fn test_search_before_build() {
        let err = index(64).search("bear", 5).await.unwrap_err();
        assert!(matches!(err, ReelError::EmbeddingUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query() {
        let mut index = index(64);
        index.build_embeddings(&corpus()).await.unwrap();
        let err = index.search(" ", 5).await.unwrap_err();
        assert!(matches!(err, ReelError::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn test_load_or_create_reuses_matching_cache() {
        let store = SqliteStore::open_memory().unwrap();
        let docs = corpus();

        let mut first = index(64);
        first.load_or_create_embeddings(&docs, &store).await.unwrap();
        let saved = store.load_document_embeddings().unwrap().unwrap();
        assert_eq!(saved.len(), 3);

        let mut second = index(64);
        second.load_or_create_embeddings(&docs, &store).await.unwrap();
        assert_eq!(second.embeddings().unwrap(), &saved);
        assert_eq!(second.documents().len(), 3);
    }

    #[tokio::test]
    async fn test_load_or_create_rebuilds_when_corpus_grows() {
        let store = SqliteStore::open_memory().unwrap();
        let mut docs = corpus();

        index(64).load_or_create_embeddings(&docs, &store).await.unwrap();

        docs.push(Document::new(4, "Paddington", "A polite bear travels to London."));
        let mut grown = index(64);
        grown.load_or_create_embeddings(&docs, &store).await.unwrap();
        assert_eq!(store.load_document_embeddings().unwrap().unwrap().len(), 4);
        assert_eq!(grown.search("polite bear", 1).await.unwrap()[0].0.id, 4);
    }

    #[tokio::test]
    async fn test_load_or_create_rebuilds_on_dimension_change() {
        let store = SqliteStore::open_memory().unwrap();
        let docs = corpus();

        index(64).load_or_create_embeddings(&docs, &store).await.unwrap();

        let mut wider = index(128);
        wider.load_or_create_embeddings(&docs, &store).await.unwrap();
        assert_eq!(wider.embeddings().unwrap().dimension(), Some(128));
        assert_eq!(wider.search("crew of thieves", 1).await.unwrap()[0].0.id, 2);
    }
}
