//! reel-query - Hybrid search engine
//!
//! This crate combines the lexical index with chunk-level semantic search:
//! - Chunked and whole-document semantic indexes with fingerprinted embedding caches
//! - Weighted min-max fusion and reciprocal rank fusion
//! - LLM query enhancement and reranking (pointwise, listwise, cross-encoder)
//! - Retrieval-augmented answers and golden-set evaluation
//!
//! # Example
//!
//! ```rust,ignore
//! use reel_query::{HybridSearch, RrfOptions};
//!
//! let engine = HybridSearch::new(lexical, semantic, &config);
//! let results = engine.rrf_search("bear attack", 60.0, 5, &RrfOptions::default()).await?;
//! for result in &results.results {
//!     println!("{}. {}", result.rank, result.document.title);
//! }
//! ```

mod document;
mod engine;
mod enhance;
mod evaluation;
mod fusion;
mod generate;
mod rerank;
mod semantic;

#[cfg(test)]
mod testing;

pub use document::DocumentSemanticIndex;
pub use engine::{document_search, keyword_search, HybridSearch, RrfOptions};
pub use enhance::{enhance_query, QueryEnhancement};
pub use evaluation::{evaluate, score_retrieval, EvaluationReport, QueryEvaluation, RetrievalScore};
pub use fusion::{
    collapse_by_document, normalize_scores, reciprocal_rank_fusion, weighted_fusion, RrfCandidate,
    WeightedCandidate,
};
pub use generate::{build_prompt, generate_answer, Answer, AnswerStyle};
pub use rerank::{
    parse_id_list, parse_rating, CrossEncoderReranker, ListwiseReranker, PointwiseReranker,
    RerankMethod, Reranker,
};
pub use semantic::ChunkedSemanticIndex;
