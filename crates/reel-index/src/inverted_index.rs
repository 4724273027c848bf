//! Inverted index with TF-IDF and BM25 scoring.
//!
//! The index is built once from a full corpus and is immutable afterwards;
//! a changed corpus means a new index. Every query rescores the whole
//! corpus, so documents that match no query term still appear with score 0.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info};

use reel_core::{DocId, Document, IndexSnapshot, LexicalConfig, ReelError, Result, Tokenizer};

use crate::tokenizer::single_term;

/// A document id with its score.
pub type ScoredDoc = (DocId, f32);

/// Lexical index over a static corpus.
pub struct LexicalIndex {
    /// Tokenizer used for documents and queries alike.
    tokenizer: Arc<dyn Tokenizer>,

    /// Default BM25 parameters for `bm25` and `bm25_search`.
    params: LexicalConfig,

    /// term -> documents containing it.
    postings: HashMap<String, BTreeSet<DocId>>,

    /// doc id -> term -> count.
    term_frequencies: HashMap<DocId, HashMap<String, u32>>,

    /// doc id -> token count.
    doc_lengths: BTreeMap<DocId, u32>,

    /// doc id -> document.
    docmap: BTreeMap<DocId, Document>,
}

impl std::fmt::Debug for LexicalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexicalIndex")
            .field("params", &self.params)
            .field("documents", &self.docmap.len())
            .field("terms", &self.postings.len())
            .finish_non_exhaustive()
    }
}

impl LexicalIndex {
    /// Build an index over `documents`, indexing `title + " " + description`.
    pub fn build(documents: &[Document], tokenizer: Arc<dyn Tokenizer>, params: LexicalConfig) -> Self {
        let mut index = Self {
            tokenizer,
            params,
            postings: HashMap::new(),
            term_frequencies: HashMap::with_capacity(documents.len()),
            doc_lengths: BTreeMap::new(),
            docmap: BTreeMap::new(),
        };

        for doc in documents {
            index.add_document(doc);
        }

        info!(
            "Built lexical index: {} documents, {} terms",
            index.docmap.len(),
            index.postings.len()
        );

        index
    }

    fn add_document(&mut self, doc: &Document) {
        let tokens = self.tokenizer.tokenize(&doc.indexed_text());

        let mut counts: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }

        for term in counts.keys() {
            self.postings.entry(term.clone()).or_default().insert(doc.id);
        }

        self.doc_lengths.insert(doc.id, tokens.len() as u32);
        self.term_frequencies.insert(doc.id, counts);
        self.docmap.insert(doc.id, doc.clone());
    }

    /// Rebuild an index from persisted artifacts.
    ///
    /// Fails with `IndexUnavailable` if the artifacts are mutually inconsistent.
    pub fn from_snapshot(
        snapshot: IndexSnapshot,
        tokenizer: Arc<dyn Tokenizer>,
        params: LexicalConfig,
    ) -> Result<Self> {
        let docmap: BTreeMap<DocId, Document> = snapshot
            .documents
            .into_iter()
            .map(|doc| (doc.id, doc))
            .collect();

        for (doc_id, terms) in &snapshot.term_frequencies {
            if !docmap.contains_key(doc_id) {
                return Err(ReelError::index_unavailable(format!(
                    "term frequencies reference unknown document {}",
                    doc_id
                )));
            }
            let total: u32 = terms.values().sum();
            if snapshot.doc_lengths.get(doc_id) != Some(&total) {
                return Err(ReelError::index_unavailable(format!(
                    "length of document {} does not match its term frequencies",
                    doc_id
                )));
            }
        }

        let postings = snapshot.postings.into_iter().collect();
        let term_frequencies = snapshot
            .term_frequencies
            .into_iter()
            .map(|(doc_id, terms)| (doc_id, terms.into_iter().collect()))
            .collect();

        Ok(Self {
            tokenizer,
            params,
            postings,
            term_frequencies,
            doc_lengths: snapshot.doc_lengths,
            docmap,
        })
    }

    /// Export the index in its persisted shape.
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            documents: self.docmap.values().cloned().collect(),
            postings: self
                .postings
                .iter()
                .map(|(term, docs)| (term.clone(), docs.clone()))
                .collect(),
            term_frequencies: self
                .term_frequencies
                .iter()
                .map(|(doc_id, terms)| {
                    let terms = terms.iter().map(|(t, c)| (t.clone(), *c)).collect();
                    (*doc_id, terms)
                })
                .collect(),
            doc_lengths: self.doc_lengths.clone(),
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.docmap.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.docmap.is_empty()
    }

    /// Look up an indexed document.
    pub fn document(&self, doc_id: DocId) -> Option<&Document> {
        self.docmap.get(&doc_id)
    }

    /// Token count of a document, if indexed.
    pub fn doc_length(&self, doc_id: DocId) -> Option<u32> {
        self.doc_lengths.get(&doc_id).copied()
    }

    /// The tokenizer this index was built with.
    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Default BM25 parameters.
    pub fn params(&self) -> LexicalConfig {
        self.params
    }

    /// Mean document length, 0 for an empty index.
    pub fn average_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        let total: u64 = self.doc_lengths.values().map(|&l| l as u64).sum();
        total as f32 / self.doc_lengths.len() as f32
    }

    /// Ids of documents containing `term`, ascending. Empty if the term is unseen.
    pub fn get_documents(&self, term: &str) -> Result<Vec<DocId>> {
        let term = single_term(self.tokenizer.as_ref(), term)?;
        Ok(self
            .postings
            .get(&term)
            .map(|docs| docs.iter().copied().collect())
            .unwrap_or_default())
    }

    /// Occurrences of `term` in a document; 0 if either is absent.
    pub fn get_term_frequency(&self, doc_id: DocId, term: &str) -> Result<u32> {
        let term = single_term(self.tokenizer.as_ref(), term)?;
        Ok(self.term_frequency(doc_id, &term))
    }

    /// Smoothed IDF: `ln((N + 1) / (df + 1))`.
    pub fn get_idf(&self, term: &str) -> Result<f32> {
        let term = single_term(self.tokenizer.as_ref(), term)?;
        Ok(self.idf(&term))
    }

    /// BM25 IDF: `ln((N - df + 0.5) / (df + 0.5) + 1)`.
    pub fn get_bm25_idf(&self, term: &str) -> Result<f32> {
        let term = single_term(self.tokenizer.as_ref(), term)?;
        Ok(self.bm25_idf(&term))
    }

    /// Term frequency times smoothed IDF.
    pub fn tf_idf(&self, doc_id: DocId, term: &str) -> Result<f32> {
        let term = single_term(self.tokenizer.as_ref(), term)?;
        Ok(self.term_frequency(doc_id, &term) as f32 * self.idf(&term))
    }

    /// Saturated, length-normalized term frequency component of BM25.
    pub fn get_bm25_term_score(&self, doc_id: DocId, term: &str, k1: f32, b: f32) -> Result<f32> {
        let term = single_term(self.tokenizer.as_ref(), term)?;
        let avg_doc_len = self.checked_average_doc_length()?;
        Ok(self.bm25_tf(doc_id, &term, k1, b, avg_doc_len))
    }

    /// BM25 score of one term in one document, using the index's default parameters.
    pub fn bm25(&self, doc_id: DocId, term: &str) -> Result<f32> {
        let term = single_term(self.tokenizer.as_ref(), term)?;
        let avg_doc_len = self.checked_average_doc_length()?;
        let LexicalConfig { k1, b } = self.params;
        Ok(self.bm25_tf(doc_id, &term, k1, b, avg_doc_len) * self.bm25_idf(&term))
    }

    /// Score every document against `query` and return the top `limit`.
    ///
    /// Scores are the sum of per-term BM25 over the query's terms (duplicates
    /// counted). Ties keep ascending document id order.
    pub fn bm25_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDoc>> {
        if query.trim().is_empty() {
            return Err(ReelError::invalid_query("query must not be empty"));
        }
        if self.docmap.is_empty() {
            return Ok(Vec::new());
        }

        let query_terms = self.tokenizer.tokenize(query);
        let LexicalConfig { k1, b } = self.params;
        let avg_doc_len = if query_terms.is_empty() {
            0.0
        } else {
            self.checked_average_doc_length()?
        };

        let idfs: HashMap<&str, f32> = query_terms
            .iter()
            .map(|term| (term.as_str(), self.bm25_idf(term)))
            .collect();

        let mut scores: Vec<ScoredDoc> = self
            .docmap
            .keys()
            .map(|&doc_id| {
                let score = query_terms
                    .iter()
                    .map(|term| self.bm25_tf(doc_id, term, k1, b, avg_doc_len) * idfs[term.as_str()])
                    .sum();
                (doc_id, score)
            })
            .collect();

        // Stable sort: equal scores stay in ascending id order.
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scores.truncate(limit);

        debug!(
            "BM25 search for {:?}: {} query terms, {} results",
            query,
            query_terms.len(),
            scores.len()
        );

        Ok(scores)
    }

    fn term_frequency(&self, doc_id: DocId, term: &str) -> u32 {
        self.term_frequencies
            .get(&doc_id)
            .and_then(|terms| terms.get(term))
            .copied()
            .unwrap_or(0)
    }

    fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, |docs| docs.len())
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.docmap.len() as f32;
        let df = self.document_frequency(term) as f32;
        ((n + 1.0) / (df + 1.0)).ln()
    }

    fn bm25_idf(&self, term: &str) -> f32 {
        let n = self.docmap.len() as f32;
        let df = self.document_frequency(term) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn bm25_tf(&self, doc_id: DocId, term: &str, k1: f32, b: f32, avg_doc_len: f32) -> f32 {
        let tf = self.term_frequency(doc_id, term) as f32;
        if tf == 0.0 {
            return 0.0;
        }
        let doc_len = self.doc_lengths.get(&doc_id).copied().unwrap_or(0) as f32;
        let length_norm = 1.0 - b + b * (doc_len / avg_doc_len);
        (tf * (k1 + 1.0)) / (tf + k1 * length_norm)
    }

    fn checked_average_doc_length(&self) -> Result<f32> {
        let avg = self.average_doc_length();
        if avg <= 0.0 {
            return Err(ReelError::index_unavailable(
                "index contains no tokens; BM25 length normalization is undefined",
            ));
        }
        Ok(avg)
    }
}
