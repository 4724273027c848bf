//! Score fusion for combining keyword and semantic rankings.
//!
//! Both strategies create an explicit zero-valued record for every document
//! in the union of the two rankings before merging, so a document is never
//! dropped for missing on one side. Sorting is stable: ties keep keyword
//! order first, then semantic-only documents in semantic order.

use std::collections::{HashMap, HashSet};

use reel_core::{ChunkHit, DocId, ReelError, Result};
use reel_index::ScoredDoc;

/// Min-max normalize scores to `[0, 1]`.
///
/// A constant score set normalizes to all 1s.
pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    scores
        .iter()
        .map(|&s| if range > 0.0 { (s - min) / range } else { 1.0 })
        .collect()
}

/// Reduce a chunk ranking to a document ranking, keeping each document's
/// first (best) chunk.
pub fn collapse_by_document(hits: &[ChunkHit]) -> Vec<ChunkHit> {
    let mut seen = HashSet::new();
    hits.iter()
        .filter(|hit| seen.insert(hit.doc_id))
        .cloned()
        .collect()
}

/// A document's weighted-fusion record.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedCandidate {
    pub doc_id: DocId,

    /// Normalized keyword score, 0 if the keyword side did not rank it.
    pub keyword: f32,

    /// Normalized semantic score, 0 if the semantic side did not rank it.
    pub semantic: f32,

    /// `alpha * keyword + (1 - alpha) * semantic`.
    pub hybrid: f32,
}

impl WeightedCandidate {
    fn new(doc_id: DocId) -> Self {
        Self {
            doc_id,
            keyword: 0.0,
            semantic: 0.0,
            hybrid: 0.0,
        }
    }
}

/// A document's RRF record.
#[derive(Debug, Clone, PartialEq)]
pub struct RrfCandidate {
    pub doc_id: DocId,

    /// Sum of `1 / (k + rank)` over the sides that ranked the document.
    pub score: f32,

    /// 1-based keyword rank.
    pub keyword_rank: Option<u32>,

    /// 1-based semantic rank.
    pub semantic_rank: Option<u32>,
}

impl RrfCandidate {
    fn new(doc_id: DocId) -> Self {
        Self {
            doc_id,
            score: 0.0,
            keyword_rank: None,
            semantic_rank: None,
        }
    }
}

/// Ordered candidate records keyed by document.
struct CandidateSet<T> {
    positions: HashMap<DocId, usize>,
    candidates: Vec<T>,
}

impl<T> CandidateSet<T> {
    fn new() -> Self {
        Self {
            positions: HashMap::new(),
            candidates: Vec::new(),
        }
    }

    /// The record for `doc_id`, created with `init` on first sight.
    fn entry(&mut self, doc_id: DocId, init: impl FnOnce(DocId) -> T) -> &mut T {
        let candidates = &mut self.candidates;
        let position = *self.positions.entry(doc_id).or_insert_with(|| {
            candidates.push(init(doc_id));
            candidates.len() - 1
        });
        &mut self.candidates[position]
    }
}

/// Weighted min-max fusion of two document rankings.
///
/// Each side is normalized independently. Within a side only a document's
/// first occurrence counts.
pub fn weighted_fusion(
    keyword: &[ScoredDoc],
    semantic: &[ScoredDoc],
    alpha: f32,
) -> Result<Vec<WeightedCandidate>> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(ReelError::invalid_argument(format!(
            "alpha must be within [0, 1], got {}",
            alpha
        )));
    }

    let keyword_norm = normalize_scores(&keyword.iter().map(|(_, s)| *s).collect::<Vec<_>>());
    let semantic_norm = normalize_scores(&semantic.iter().map(|(_, s)| *s).collect::<Vec<_>>());

    let mut set = CandidateSet::new();
    let mut seen = HashSet::new();
    for ((doc_id, _), norm) in keyword.iter().zip(keyword_norm) {
        if seen.insert(*doc_id) {
            set.entry(*doc_id, WeightedCandidate::new).keyword = norm;
        }
    }
    seen.clear();
    for ((doc_id, _), norm) in semantic.iter().zip(semantic_norm) {
        if seen.insert(*doc_id) {
            set.entry(*doc_id, WeightedCandidate::new).semantic = norm;
        }
    }

    let mut fused = set.candidates;
    for candidate in &mut fused {
        candidate.hybrid = alpha * candidate.keyword + (1.0 - alpha) * candidate.semantic;
    }
    fused.sort_by(|a, b| {
        b.hybrid
            .partial_cmp(&a.hybrid)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(fused)
}

/// Reciprocal Rank Fusion of two document rankings.
///
/// Ranks are 1-based list positions; only a document's first occurrence in
/// a list counts.
pub fn reciprocal_rank_fusion(
    keyword: &[ScoredDoc],
    semantic: &[ScoredDoc],
    k: f32,
) -> Result<Vec<RrfCandidate>> {
    if !(k > 0.0 && k.is_finite()) {
        return Err(ReelError::invalid_argument(format!(
            "RRF k must be positive, got {}",
            k
        )));
    }

    let mut set = CandidateSet::new();
    for (rank, (doc_id, _)) in keyword.iter().enumerate() {
        let candidate = set.entry(*doc_id, RrfCandidate::new);
        if candidate.keyword_rank.is_none() {
            candidate.keyword_rank = Some(rank as u32 + 1);
        }
    }
    for (rank, (doc_id, _)) in semantic.iter().enumerate() {
        let candidate = set.entry(*doc_id, RrfCandidate::new);
        if candidate.semantic_rank.is_none() {
            candidate.semantic_rank = Some(rank as u32 + 1);
        }
    }

    let mut fused = set.candidates;
    for candidate in &mut fused {
        candidate.score = [candidate.keyword_rank, candidate.semantic_rank]
            .into_iter()
            .flatten()
            .map(|rank| 1.0 / (k + rank as f32))
            .sum();
    }
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(fused)
}
