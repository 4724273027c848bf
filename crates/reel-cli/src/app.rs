//! Wiring between configuration, the SQLite cache and the search engine.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use reel_core::{
    load_corpus, Document, Embedder, GoldenDataset, IndexStore, LanguageModel, ReelConfig,
    RelevanceScorer, Result, Tokenizer,
};
use reel_embed::HashingEmbedder;
use reel_index::{EnglishTokenizer, LexicalIndex};
use reel_llm::GeminiClient;
use reel_query::{ChunkedSemanticIndex, DocumentSemanticIndex, HybridSearch};
use reel_store::SqliteStore;

/// Collaborators a command needs beyond the indexes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Needs {
    pub llm: bool,
    pub scorer: bool,
}

/// Counts reported by `reel build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub documents: usize,
    pub terms: usize,
    pub chunks: usize,
}

/// Shape of both embedding caches, reported by `reel verify-embeddings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddingReport {
    pub documents: usize,
    pub document_vectors: usize,
    pub chunks: usize,
    pub dimension: usize,
}

pub struct App {
    config: ReelConfig,
    store: SqliteStore,
}

impl App {
    /// Open the cache database named by `config`.
    pub fn open(config: ReelConfig) -> Result<Self> {
        config.validate()?;
        let store = SqliteStore::open(&config.storage.database_path)?;
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &ReelConfig {
        &self.config
    }

    pub fn corpus(&self) -> Result<Vec<Document>> {
        load_corpus(&self.config.storage.corpus_path)
    }

    pub fn golden_dataset(&self) -> Result<GoldenDataset> {
        GoldenDataset::load(&self.config.storage.golden_path)
    }

    fn tokenizer() -> Arc<dyn Tokenizer> {
        Arc::new(EnglishTokenizer::new())
    }

    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        #[cfg(feature = "onnx")]
        {
            let model_path = &self.config.embedding.model_path;
            if model_path.exists() {
                info!("Using ONNX embedder from {:?}", model_path);
                let embedder =
                    reel_embed::OnnxEmbedder::from_dir(model_path, self.config.embedding.num_threads)?;
                return Ok(Arc::new(embedder));
            }
        }

        info!(
            "Using hashing embedder ({} dimensions)",
            self.config.embedding.hashing_dimension
        );
        Ok(Arc::new(HashingEmbedder::new(
            self.config.embedding.hashing_dimension,
        )?))
    }

    fn scorer(&self) -> Result<Arc<dyn RelevanceScorer>> {
        #[cfg(feature = "onnx")]
        {
            let model_path = &self.config.embedding.cross_encoder_path;
            if model_path.exists() {
                let scorer = reel_embed::OnnxCrossEncoder::from_dir(
                    model_path,
                    self.config.embedding.num_threads,
                )?;
                return Ok(Arc::new(scorer));
            }
        }

        Err(reel_core::ReelError::config(format!(
            "no cross-encoder model at {:?} (requires the `onnx` feature)",
            self.config.embedding.cross_encoder_path
        )))
    }

    fn llm(&self) -> Result<Arc<dyn LanguageModel>> {
        Ok(Arc::new(GeminiClient::from_config(&self.config.llm)?))
    }

    fn semantic_index(&self) -> Result<ChunkedSemanticIndex<dyn Embedder>> {
        ChunkedSemanticIndex::new(
            self.embedder()?,
            &self.config.chunking,
            self.config.embedding.batch_size,
        )
    }

    fn document_index(&self) -> Result<DocumentSemanticIndex<dyn Embedder>> {
        DocumentSemanticIndex::new(self.embedder()?, self.config.embedding.batch_size)
    }

    /// Rebuild the lexical index and both embedding caches from the corpus and persist them.
    pub async fn build(&self) -> Result<BuildSummary> {
        let documents = self.corpus()?;

        let lexical = LexicalIndex::build(&documents, Self::tokenizer(), self.config.lexical);
        let snapshot = lexical.snapshot();
        self.store.save_index(&snapshot)?;

        let mut semantic = self.semantic_index()?;
        let cache = semantic.build_chunk_embeddings(&documents).await?;
        self.store.save_chunk_embeddings(cache)?;

        let mut whole = self.document_index()?;
        self.store
            .save_document_embeddings(whole.build_embeddings(&documents).await?)?;

        let summary = BuildSummary {
            documents: documents.len(),
            terms: snapshot.postings.len(),
            chunks: cache.chunk_count(),
        };
        info!("Build complete: {:?}", summary);
        Ok(summary)
    }

    /// The persisted lexical index. Fails with `IndexUnavailable` before `build`.
    pub fn lexical(&self) -> Result<LexicalIndex> {
        let snapshot = self.store.load_index()?;
        LexicalIndex::from_snapshot(snapshot, Self::tokenizer(), self.config.lexical)
    }

    /// Semantic index for the current corpus, rebuilding a stale cache.
    pub async fn semantic(&self) -> Result<ChunkedSemanticIndex<dyn Embedder>> {
        let documents = self.corpus()?;
        let mut semantic = self.semantic_index()?;
        semantic
            .load_or_create_chunk_embeddings(&documents, &self.store)
            .await?;
        Ok(semantic)
    }

    /// Whole-document index for the current corpus, rebuilding a stale cache.
    pub async fn documents(&self) -> Result<DocumentSemanticIndex<dyn Embedder>> {
        let documents = self.corpus()?;
        let mut index = self.document_index()?;
        index.load_or_create_embeddings(&documents, &self.store).await?;
        Ok(index)
    }

    /// Load (or rebuild) both embedding caches and report their shape.
    pub async fn verify_embeddings(&self) -> Result<EmbeddingReport> {
        let whole = self.documents().await?;
        let chunked = self.semantic().await?;
        Ok(EmbeddingReport {
            documents: whole.documents().len(),
            document_vectors: whole.embeddings().map_or(0, |e| e.len()),
            chunks: chunked.chunk_count(),
            dimension: chunked.embedder().dimension(),
        })
    }

    /// Assemble the hybrid engine with the collaborators in `needs`.
    pub async fn engine(&self, needs: Needs) -> Result<HybridSearch<dyn Embedder>> {
        let lexical = self.lexical()?;
        let semantic = self.semantic().await?;

        let mut engine = HybridSearch::new(Arc::new(lexical), Arc::new(semantic), &self.config);
        if needs.llm {
            engine = engine.with_llm(self.llm()?);
        }
        if needs.scorer {
            engine = engine.with_scorer(self.scorer()?);
        }
        Ok(engine)
    }
}
