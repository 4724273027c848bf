//! Retrieval evaluation against a golden dataset.

use serde::{Deserialize, Serialize};
use tracing::info;

use reel_core::{Embedder, GoldenDataset, Result};

use crate::engine::{HybridSearch, RrfOptions};

/// Precision, recall and F1 for one query.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RetrievalScore {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
}

/// Score retrieved titles against the relevant set.
///
/// Titles are matched exactly. A zero denominator yields 0.
pub fn score_retrieval<S: AsRef<str>>(retrieved: &[S], relevant: &[S]) -> RetrievalScore {
    let hits = retrieved
        .iter()
        .filter(|title| relevant.iter().any(|r| r.as_ref() == title.as_ref()))
        .count() as f32;

    let ratio = |n: f32, d: usize| if d == 0 { 0.0 } else { n / d as f32 };
    let precision = ratio(hits, retrieved.len());
    let recall = ratio(hits, relevant.len());
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    RetrievalScore {
        precision,
        recall,
        f1,
    }
}

/// Evaluation outcome for one golden query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEvaluation {
    pub query: String,
    pub score: RetrievalScore,

    /// Titles returned, in rank order.
    pub retrieved: Vec<String>,

    /// Retrieved titles that are relevant.
    pub relevant_retrieved: Vec<String>,
}

/// Evaluation over a whole dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Cutoff `k` used for every query.
    pub limit: usize,
    pub queries: Vec<QueryEvaluation>,
    pub mean: RetrievalScore,
}

impl EvaluationReport {
    fn new(limit: usize, queries: Vec<QueryEvaluation>) -> Self {
        let n = queries.len().max(1) as f32;
        let mean = queries.iter().fold(RetrievalScore::default(), |acc, q| RetrievalScore {
            precision: acc.precision + q.score.precision / n,
            recall: acc.recall + q.score.recall / n,
            f1: acc.f1 + q.score.f1 / n,
        });
        Self {
            limit,
            queries,
            mean,
        }
    }
}

/// Run every golden query through RRF search and score the top `limit`.
pub async fn evaluate<E>(
    engine: &HybridSearch<E>,
    dataset: &GoldenDataset,
    limit: usize,
) -> Result<EvaluationReport>
where
    E: Embedder + ?Sized,
{
    let k = engine.search_config().rrf_k;
    let mut queries = Vec::with_capacity(dataset.test_cases.len());

    for case in &dataset.test_cases {
        let results = engine
            .rrf_search(&case.query, k, limit, &RrfOptions::default())
            .await?;

        let retrieved: Vec<String> = results
            .results
            .iter()
            .map(|r| r.document.title.clone())
            .collect();
        let relevant_retrieved = retrieved
            .iter()
            .filter(|t| case.relevant_docs.contains(t))
            .cloned()
            .collect();
        let score = score_retrieval(&retrieved, &case.relevant_docs);

        queries.push(QueryEvaluation {
            query: case.query.clone(),
            score,
            retrieved,
            relevant_retrieved,
        });
    }

    let report = EvaluationReport::new(limit, queries);
    info!(
        "Evaluated {} queries at k={}: mean precision {:.4}, recall {:.4}, f1 {:.4}",
        report.queries.len(),
        limit,
        report.mean.precision,
        report.mean.recall,
        report.mean.f1
    );
    Ok(report)
}
