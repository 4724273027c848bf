//! Second-pass rerankers.
//!
//! A reranker only reorders or filters the candidates it is given; it never
//! fetches new documents. Judges that return fewer candidates than asked for
//! are tolerated and the result simply shrinks.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use reel_core::{
    DocId, LanguageModel, ReelError, RelevanceScorer, RerankSignal, Result, SearchResult,
};

/// Reranking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankMethod {
    /// Pointwise: the language model rates each candidate 0-10.
    Individual,

    /// Listwise: the language model returns a permutation of candidate ids.
    Batch,

    /// A cross-encoder scores each (query, candidate) pair.
    CrossEncoder,
}

impl RerankMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Batch => "batch",
            Self::CrossEncoder => "cross_encoder",
        }
    }
}

impl fmt::Display for RerankMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RerankMethod {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "individual" => Ok(Self::Individual),
            "batch" => Ok(Self::Batch),
            "cross_encoder" => Ok(Self::CrossEncoder),
            other => Err(ReelError::invalid_argument(format!(
                "unknown rerank method {:?} (expected individual, batch or cross_encoder)",
                other
            ))),
        }
    }
}

/// Reorders fused candidates.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank `candidates` for `query` and keep at most `limit`.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;
}

fn candidate_text(result: &SearchResult) -> String {
    format!("{} - {}", result.document.title, result.document.description)
}

/// Stable descending sort on an attached score.
fn sort_by_signal(results: &mut [SearchResult], score: impl Fn(&SearchResult) -> f32) {
    results.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Pointwise LLM reranker.
pub struct PointwiseReranker {
    llm: Arc<dyn LanguageModel>,
}

impl PointwiseReranker {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    fn prompt(query: &str, result: &SearchResult) -> String {
        format!(
            "Rate how well this movie matches the search query.\n\n\
             Query: \"{}\"\n\n\
             Movie: {}\n\n\
             Consider:\n\
             - Direct relevance to the query\n\
             - User intent (what they're looking for)\n\
             - Content appropriateness\n\n\
             Rate 0-10 (10 = perfect match).\n\
             Give me ONLY the number in your response, no other text or explanation.\n\n\
             Score:",
            query,
            candidate_text(result)
        )
    }
}

/// First number in a judge's reply, clamped to `[0, 10]`.
pub fn parse_rating(reply: &str) -> Option<f32> {
    let start = reply.find(|c: char| c.is_ascii_digit())?;
    let number: String = reply[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f32 = number.trim_end_matches('.').parse().ok()?;
    Some(value.clamp(0.0, 10.0))
}

#[async_trait]
impl Reranker for PointwiseReranker {
    async fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<SearchResult>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        info!("Rating {} candidates individually", candidates.len());

        for result in &mut candidates {
            let reply = self.llm.complete(&Self::prompt(query, result)).await?;
            let rating = parse_rating(&reply).unwrap_or_else(|| {
                warn!(
                    "Unparseable rating {:?} for {:?}; scoring 0",
                    reply.trim(),
                    result.document.title
                );
                0.0
            });
            debug!("Rated {:?}: {}", result.document.title, rating);
            result.rerank = Some(RerankSignal::Rating(rating));
        }

        sort_by_signal(&mut candidates, |r| match r.rerank {
            Some(RerankSignal::Rating(rating)) => rating,
            _ => 0.0,
        });
        candidates.truncate(limit);
        Ok(candidates)
    }
}

/// Listwise LLM reranker.
pub struct ListwiseReranker {
    llm: Arc<dyn LanguageModel>,
}

impl ListwiseReranker {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    fn prompt(query: &str, candidates: &[SearchResult]) -> String {
        let listing: Vec<String> = candidates
            .iter()
            .map(|r| format!("ID: {}\n{}", r.document.id, candidate_text(r)))
            .collect();
        format!(
            "Rank these movies by relevance to the search query.\n\n\
             Query: \"{}\"\n\n\
             Movies:\n{}\n\n\
             Return ONLY the IDs in order of relevance (best match first). \
             Return a valid JSON list, nothing else. For example:\n\n\
             [75, 12, 34, 2, 1]",
            query,
            listing.join("\n\n")
        )
    }
}

/// Document ids from a judge's JSON-array reply. Accepts numbers and numeric
/// strings; anything else in the array is skipped.
pub fn parse_id_list(reply: &str) -> Result<Vec<DocId>> {
    let (start, end) = match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(ReelError::llm(format!(
                "expected a JSON list of ids, got {:?}",
                reply.trim()
            )))
        }
    };

    let values: Vec<serde_json::Value> = serde_json::from_str(&reply[start..=end])
        .map_err(|e| ReelError::llm(format!("invalid id list: {}", e)))?;

    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect())
}

#[async_trait]
impl Reranker for ListwiseReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        info!("Ranking {} candidates as a batch", candidates.len());

        let reply = self.llm.complete(&Self::prompt(query, &candidates)).await?;
        let order = parse_id_list(&reply)?;

        let mut remaining: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
        let mut seen = HashSet::new();
        let mut reranked = Vec::new();

        for doc_id in order {
            if !seen.insert(doc_id) {
                continue;
            }
            let slot = remaining
                .iter_mut()
                .find(|slot| matches!(slot, Some(r) if r.document.id == doc_id));
            match slot.and_then(Option::take) {
                Some(mut result) => {
                    result.rerank = Some(RerankSignal::ListPosition(reranked.len() as u32 + 1));
                    reranked.push(result);
                }
                None => debug!("Judge returned unknown id {}", doc_id),
            }
        }

        let dropped = remaining.iter().filter(|slot| slot.is_some()).count();
        if dropped > 0 {
            debug!("Judge omitted {} candidates; dropping them", dropped);
        }

        reranked.truncate(limit);
        Ok(reranked)
    }
}

/// Reranker backed by a [`RelevanceScorer`] such as a cross-encoder.
pub struct CrossEncoderReranker {
    scorer: Arc<dyn RelevanceScorer>,
}

impl CrossEncoderReranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<SearchResult>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        info!("Cross-encoding {} candidates", candidates.len());

        let texts: Vec<String> = candidates.iter().map(candidate_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let scores = self.scorer.score(query, &refs).await?;

        if scores.len() != candidates.len() {
            return Err(ReelError::embedding(format!(
                "scorer returned {} scores for {} candidates",
                scores.len(),
                candidates.len()
            )));
        }

        for (result, score) in candidates.iter_mut().zip(scores) {
            result.rerank = Some(RerankSignal::CrossEncoder(score));
        }

        sort_by_signal(&mut candidates, |r| match r.rerank {
            Some(RerankSignal::CrossEncoder(score)) => score,
            _ => f32::NEG_INFINITY,
        });
        candidates.truncate(limit);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{result, ScriptedLlm};

    fn candidates() -> Vec<SearchResult> {
        vec![
            result(1, "Heat", "A detective hunts thieves."),
            result(2, "Paddington", "A polite bear moves to London."),
            result(3, "The Revenant", "A frontiersman survives a bear attack."),
            result(4, "Grizzly Man", "A man lives among wild bears."),
        ]
    }

    fn titles(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.document.title.as_str()).collect()
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("7"), Some(7.0));
        assert_eq!(parse_rating("Score: 8.5/10"), Some(8.5));
        assert_eq!(parse_rating("15"), Some(10.0));
        assert_eq!(parse_rating("3."), Some(3.0));
        assert_eq!(parse_rating("no idea"), None);
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("[3, 1, 2]").unwrap(), vec![3, 1, 2]);
        assert_eq!(
            parse_id_list("```json\n[\"4\", 2, null]\n```").unwrap(),
            vec![4, 2]
        );
        assert_eq!(parse_id_list("[-2, 5]").unwrap(), vec![-2, 5]);
        assert!(parse_id_list("I cannot rank these").is_err());
    }

    #[test]
    fn test_rerank_method_from_str() {
        assert_eq!("individual".parse::<RerankMethod>().unwrap(), RerankMethod::Individual);
        assert_eq!("Batch".parse::<RerankMethod>().unwrap(), RerankMethod::Batch);
        assert_eq!(
            "cross-encoder".parse::<RerankMethod>().unwrap(),
            RerankMethod::CrossEncoder
        );
        assert!("pairwise".parse::<RerankMethod>().is_err());
    }

    #[tokio::test]
    async fn test_pointwise_sorts_by_rating() {
        let llm = ScriptedLlm::new(["2", "9", "7", "garbage"]);
        let reranker = PointwiseReranker::new(Arc::new(llm));

        let reranked = reranker.rerank("bear", candidates(), 10).await.unwrap();
        assert_eq!(
            titles(&reranked),
            vec!["Paddington", "The Revenant", "Heat", "Grizzly Man"]
        );
        assert_eq!(reranked[0].rerank, Some(RerankSignal::Rating(9.0)));
        assert_eq!(reranked[3].rerank, Some(RerankSignal::Rating(0.0)));
    }

    #[tokio::test]
    async fn test_pointwise_ties_keep_fused_order() {
        let llm = ScriptedLlm::new(["5", "8", "5", "8"]);
        let reranker = PointwiseReranker::new(Arc::new(llm));

        let reranked = reranker.rerank("bear", candidates(), 3).await.unwrap();
        assert_eq!(titles(&reranked), vec!["Paddington", "Grizzly Man", "Heat"]);
    }

    #[tokio::test]
    async fn test_listwise_follows_permutation() {
        let llm = ScriptedLlm::new(["[3, 4, 2, 1]"]);
        let reranker = ListwiseReranker::new(Arc::new(llm));

        let reranked = reranker.rerank("bear", candidates(), 3).await.unwrap();
        assert_eq!(
            titles(&reranked),
            vec!["The Revenant", "Grizzly Man", "Paddington"]
        );
        assert_eq!(reranked[2].rerank, Some(RerankSignal::ListPosition(3)));
    }

    #[tokio::test]
    async fn test_listwise_tolerates_short_and_noisy_replies() {
        let llm = ScriptedLlm::new(["[4, 99, 4, 2]"]);
        let reranker = ListwiseReranker::new(Arc::new(llm));

        let reranked = reranker.rerank("bear", candidates(), 5).await.unwrap();
        assert_eq!(titles(&reranked), vec!["Grizzly Man", "Paddington"]);
        assert_eq!(reranked[1].rerank, Some(RerankSignal::ListPosition(2)));
    }

    #[tokio::test]
    async fn test_listwise_rejects_unparseable_reply() {
        let llm = ScriptedLlm::new(["The best one is Paddington."]);
        let reranker = ListwiseReranker::new(Arc::new(llm));
        let err = reranker.rerank("bear", candidates(), 5).await.unwrap_err();
        assert_eq!(err.error_code(), "LLM_ERROR");
    }

    struct KeywordScorer;

    #[async_trait]
    impl RelevanceScorer for KeywordScorer {
        async fn score(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
            Ok(documents
                .iter()
                .map(|doc| doc.matches(query).count() as f32)
                .collect())
        }
    }

    #[tokio::test]
    async fn test_cross_encoder_sorts_by_score() {
        let reranker = CrossEncoderReranker::new(Arc::new(KeywordScorer));
        let reranked = reranker.rerank("bear", candidates(), 2).await.unwrap();

        assert_eq!(reranked.len(), 2);
        assert_eq!(titles(&reranked), vec!["Paddington", "The Revenant"]);
        assert_eq!(reranked[0].rerank, Some(RerankSignal::CrossEncoder(1.0)));
    }

    struct ShortScorer;

    #[async_trait]
    impl RelevanceScorer for ShortScorer {
        async fn score(&self, _query: &str, _documents: &[&str]) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    #[tokio::test]
    async fn test_cross_encoder_rejects_wrong_score_count() {
        let reranker = CrossEncoderReranker::new(Arc::new(ShortScorer));
        assert!(reranker.rerank("bear", candidates(), 2).await.is_err());
    }
}
