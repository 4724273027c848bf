//! Hybrid search engine.
//!
//! Owns the lexical index and the chunked semantic index and exposes the
//! query-facing operations: plain BM25, chunk-level semantic search,
//! weighted fusion, and RRF with optional enhancement and reranking.
//! Whole-document semantic search stands alone in [`document_search`].

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use reel_core::{
    DocId, Document, Embedder, LanguageModel, ReelConfig, ReelError, RelevanceScorer,
    RerankConfig, Result, ScoreBreakdown, SearchConfig, SearchResult, SearchResults,
};
use reel_index::{LexicalIndex, ScoredDoc};

use crate::document::DocumentSemanticIndex;
use crate::enhance::{enhance_query, QueryEnhancement};
use crate::fusion::{collapse_by_document, reciprocal_rank_fusion, weighted_fusion};
use crate::generate::{generate_answer, Answer, AnswerStyle};
use crate::rerank::{
    CrossEncoderReranker, ListwiseReranker, PointwiseReranker, RerankMethod, Reranker,
};
use crate::semantic::ChunkedSemanticIndex;

/// Optional stages of an RRF search.
#[derive(Debug, Clone, Copy, Default)]
pub struct RrfOptions {
    /// Rewrite the query with the language model before searching.
    pub enhancement: Option<QueryEnhancement>,

    /// Rerank the fused candidates before truncating.
    pub rerank: Option<RerankMethod>,
}

/// BM25 search over a lexical index alone, for callers without embeddings.
pub fn keyword_search(
    index: &LexicalIndex,
    query: &str,
    limit: usize,
    snippet_chars: usize,
) -> Result<SearchResults> {
    let start = Instant::now();
    let results = index
        .bm25_search(query, limit)?
        .into_iter()
        .map(|(doc_id, score)| {
            let document = index.document(doc_id).cloned().ok_or_else(|| {
                ReelError::index_unavailable(format!("document {} is not indexed", doc_id))
            })?;
            Ok(SearchResult {
                rank: 0,
                score,
                snippet: document.snippet(snippet_chars),
                document,
                breakdown: ScoreBreakdown::Keyword { bm25: score },
                rerank: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SearchResults::new(query, results, start.elapsed().as_millis() as u64))
}

/// Semantic search over whole-document embeddings.
pub async fn document_search<E: Embedder + ?Sized>(
    index: &DocumentSemanticIndex<E>,
    query: &str,
    limit: usize,
    snippet_chars: usize,
) -> Result<SearchResults> {
    let start = Instant::now();
    let results = index
        .search(query, limit)
        .await?
        .into_iter()
        .map(|(document, cosine)| SearchResult {
            rank: 0,
            score: cosine,
            snippet: document.snippet(snippet_chars),
            document: document.clone(),
            breakdown: ScoreBreakdown::Document { cosine },
            rerank: None,
        })
        .collect();

    Ok(SearchResults::new(query, results, start.elapsed().as_millis() as u64))
}

/// Hybrid keyword + semantic search over one corpus.
pub struct HybridSearch<E: ?Sized> {
    lexical: Arc<LexicalIndex>,
    semantic: Arc<ChunkedSemanticIndex<E>>,
    search: SearchConfig,
    rerank: RerankConfig,
    snippet_chars: usize,
    llm: Option<Arc<dyn LanguageModel>>,
    scorer: Option<Arc<dyn RelevanceScorer>>,
}

impl<E> HybridSearch<E>
where
    E: Embedder + ?Sized,
{
    pub fn new(
        lexical: Arc<LexicalIndex>,
        semantic: Arc<ChunkedSemanticIndex<E>>,
        config: &ReelConfig,
    ) -> Self {
        Self {
            lexical,
            semantic,
            search: config.search.clone(),
            rerank: config.rerank.clone(),
            snippet_chars: config.chunking.snippet_chars,
            llm: None,
            scorer: None,
        }
    }

    /// Language model used for enhancement, LLM reranking and answers.
    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Scorer used by cross-encoder reranking.
    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }

    pub fn semantic(&self) -> &ChunkedSemanticIndex<E> {
        &self.semantic
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    /// Look a document up by id, lexical index first.
    fn document(&self, doc_id: DocId) -> Result<&Document> {
        self.lexical
            .document(doc_id)
            .or_else(|| self.semantic.documents().iter().find(|d| d.id == doc_id))
            .ok_or_else(|| {
                ReelError::index_unavailable(format!("document {} is not indexed", doc_id))
            })
    }

    fn result(&self, doc_id: DocId, score: f32, breakdown: ScoreBreakdown) -> Result<SearchResult> {
        let document = self.document(doc_id)?.clone();
        Ok(SearchResult {
            rank: 0,
            score,
            snippet: document.snippet(self.snippet_chars),
            document,
            breakdown,
            rerank: None,
        })
    }

    fn require_llm(&self, purpose: &str) -> Result<Arc<dyn LanguageModel>> {
        self.llm.clone().ok_or_else(|| {
            ReelError::invalid_argument(format!("{} requires a language model", purpose))
        })
    }

    fn reranker(&self, method: RerankMethod) -> Result<Box<dyn Reranker>> {
        let reranker: Box<dyn Reranker> = match method {
            RerankMethod::Individual => {
                Box::new(PointwiseReranker::new(self.require_llm("individual reranking")?))
            }
            RerankMethod::Batch => Box::new(ListwiseReranker::new(self.require_llm("batch reranking")?)),
            RerankMethod::CrossEncoder => {
                let scorer = self.scorer.clone().ok_or_else(|| {
                    ReelError::invalid_argument("cross-encoder reranking requires a relevance scorer")
                })?;
                Box::new(CrossEncoderReranker::new(scorer))
            }
        };
        Ok(reranker)
    }

    /// Both rankings for a fusion pass, each over-fetched from `limit`.
    ///
    /// The semantic side is collapsed to one entry per document.
    async fn fusion_inputs(&self, query: &str, limit: usize) -> Result<(Vec<ScoredDoc>, Vec<ScoredDoc>)> {
        let fetch = limit.saturating_mul(self.search.fusion_overfetch).max(limit);

        let keyword = self.lexical.bm25_search(query, fetch)?;
        let hits = self.semantic.search_chunks(query, fetch).await?;
        let semantic: Vec<ScoredDoc> = collapse_by_document(&hits)
            .into_iter()
            .map(|hit| (hit.doc_id, hit.score))
            .collect();

        debug!(
            "Fusion inputs for {:?}: {} keyword, {} semantic ({} chunks)",
            query,
            keyword.len(),
            semantic.len(),
            hits.len()
        );
        Ok((keyword, semantic))
    }

    /// BM25 keyword search.
    pub fn bm25_search(&self, query: &str, limit: usize) -> Result<SearchResults> {
        keyword_search(&self.lexical, query, limit, self.snippet_chars)
    }

    /// Chunk-level semantic search. A document may appear more than once.
    pub async fn semantic_search(&self, query: &str, limit: usize) -> Result<SearchResults> {
        let start = Instant::now();
        let hits = self.semantic.search_chunks(query, limit).await?;

        let results = hits
            .into_iter()
            .map(|hit| {
                self.result(
                    hit.doc_id,
                    hit.score,
                    ScoreBreakdown::Semantic {
                        cosine: hit.score,
                        chunk: hit.metadata,
                    },
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchResults::new(query, results, start.elapsed().as_millis() as u64))
    }

    /// Weighted min-max fusion: `alpha` weighs the keyword side.
    pub async fn weighted_search(&self, query: &str, alpha: f32, limit: usize) -> Result<SearchResults> {
        let start = Instant::now();
        let (keyword, semantic) = self.fusion_inputs(query, limit).await?;

        let mut fused = weighted_fusion(&keyword, &semantic, alpha)?;
        fused.truncate(limit);

        let results = fused
            .into_iter()
            .map(|c| {
                self.result(
                    c.doc_id,
                    c.hybrid,
                    ScoreBreakdown::Weighted {
                        keyword: c.keyword,
                        semantic: c.semantic,
                        hybrid: c.hybrid,
                    },
                )
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Weighted search for {:?} (alpha={}): {} results",
            query,
            alpha,
            results.len()
        );
        Ok(SearchResults::new(query, results, start.elapsed().as_millis() as u64))
    }

    /// Reciprocal rank fusion with optional enhancement and reranking.
    ///
    /// With reranking, `limit * candidate_multiplier` fused candidates are
    /// reranked against the searched query and then truncated to `limit`.
    pub async fn rrf_search(
        &self,
        query: &str,
        k: f32,
        limit: usize,
        options: &RrfOptions,
    ) -> Result<SearchResults> {
        let start = Instant::now();
        if query.trim().is_empty() {
            return Err(ReelError::invalid_query("query must not be empty"));
        }

        let searched = match options.enhancement {
            Some(method) => {
                let llm = self.require_llm("query enhancement")?;
                enhance_query(llm.as_ref(), query, method).await?
            }
            None => query.to_string(),
        };

        let reranker = options.rerank.map(|m| self.reranker(m)).transpose()?;
        let candidates = if reranker.is_some() {
            limit.saturating_mul(self.rerank.candidate_multiplier)
        } else {
            limit
        };

        let (keyword, semantic) = self.fusion_inputs(&searched, candidates).await?;
        let mut fused = reciprocal_rank_fusion(&keyword, &semantic, k)?;
        fused.truncate(candidates);

        let mut results = fused
            .into_iter()
            .map(|c| {
                self.result(
                    c.doc_id,
                    c.score,
                    ScoreBreakdown::Rrf {
                        rrf: c.score,
                        keyword_rank: c.keyword_rank,
                        semantic_rank: c.semantic_rank,
                    },
                )
            })
            .collect::<Result<Vec<_>>>()?;

        if let (Some(reranker), Some(method)) = (reranker, options.rerank) {
            debug!("Reranking {} candidates ({})", results.len(), method);
            results = reranker.rerank(&searched, results, limit).await?;
        }
        results.truncate(limit);

        info!("RRF search for {:?} (k={}): {} results", searched, k, results.len());

        let mut out = SearchResults::new(query, results, start.elapsed().as_millis() as u64);
        if options.enhancement.is_some() {
            out.enhanced_query = Some(searched);
        }
        Ok(out)
    }

    /// Answer `query` from the top RRF results.
    pub async fn answer(&self, query: &str, style: AnswerStyle, limit: usize) -> Result<Answer> {
        let llm = self.require_llm("answer generation")?;
        let results = self
            .rrf_search(query, self.search.rrf_k, limit, &RrfOptions::default())
            .await?;
        generate_answer(llm.as_ref(), style, query, results).await
    }
}
