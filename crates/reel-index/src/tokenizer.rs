//! English tokenizer with stop-word removal and Snowball stemming.
//!
//! Pipeline, in order: lowercase, strip ASCII punctuation, split on
//! whitespace, drop stop words, stem. Order and duplicates are preserved.

use std::collections::HashSet;

use rust_stemmers::{Algorithm, Stemmer};

use reel_core::{ReelError, Result, Tokenizer};

/// Stop words removed by [`EnglishTokenizer::new`].
///
/// Entries are punctuation-free since punctuation is stripped before lookup.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "arent", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "cant", "could", "couldnt", "did", "didnt", "do", "does", "doesnt",
    "doing", "dont", "down", "during", "each", "few", "for", "from", "further", "had", "hadnt",
    "has", "hasnt", "have", "havent", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "isnt", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "wasnt", "we", "were", "werent", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "wont", "would", "wouldnt",
    "you", "your", "yours", "yourself", "yourselves",
];

/// Default tokenizer for English text.
pub struct EnglishTokenizer {
    stop_words: HashSet<String>,
    stemmer: Stemmer,
}

impl EnglishTokenizer {
    /// Create a tokenizer with the default stop-word list.
    pub fn new() -> Self {
        Self::with_stop_words(DEFAULT_STOP_WORDS.iter().copied())
    }

    /// Create a tokenizer with a custom stop-word list.
    ///
    /// Stop words are lowercased; matching happens before stemming.
    pub fn with_stop_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stop_words: words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Check whether a (lowercased, punctuation-free) word is a stop word.
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }
}

impl Default for EnglishTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for EnglishTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let cleaned: String = text
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_ascii_punctuation())
            .collect();

        cleaned
            .split_whitespace()
            .filter(|word| !self.is_stop_word(word))
            .map(|word| self.stemmer.stem(word).into_owned())
            .filter(|term| !term.is_empty())
            .collect()
    }
}

/// Tokenize `input` and require exactly one resulting term.
///
/// Blank input fails with `InvalidQuery`; any other input that does not
/// produce exactly one term fails with `TooManyTerms`.
pub fn single_term(tokenizer: &dyn Tokenizer, input: &str) -> Result<String> {
    if input.trim().is_empty() {
        return Err(ReelError::invalid_query("term must not be empty"));
    }

    let mut terms = tokenizer.tokenize(input);
    if terms.len() != 1 {
        return Err(ReelError::too_many_terms(input, terms.len()));
    }
    Ok(terms.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_strips_punctuation() {
        let tokenizer = EnglishTokenizer::new();
        let terms = tokenizer.tokenize("Bear! ATTACK, (forest)");
        assert_eq!(terms, vec!["bear", "attack", "forest"]);
    }

    #[test]
    fn test_tokenize_removes_stop_words() {
        let tokenizer = EnglishTokenizer::new();
        let terms = tokenizer.tokenize("The bear and the wolf");
        assert_eq!(terms, vec!["bear", "wolf"]);
    }

    #[test]
    fn test_tokenize_stems() {
        let tokenizer = EnglishTokenizer::new();
        assert_eq!(tokenizer.tokenize("running bears jumps"), vec!["run", "bear", "jump"]);
    }

    #[test]
    fn test_tokenize_preserves_duplicates_and_order() {
        let tokenizer = EnglishTokenizer::new();
        let terms = tokenizer.tokenize("wolf bear wolf");
        assert_eq!(terms, vec!["wolf", "bear", "wolf"]);
    }

    #[test]
    fn test_tokenize_is_deterministic() {
        let tokenizer = EnglishTokenizer::new();
        let text = "A grizzly bear hunts salmon in the frozen river.";
        assert_eq!(tokenizer.tokenize(text), tokenizer.tokenize(text));
    }

    #[test]
    fn test_punctuation_only_token_disappears() {
        let tokenizer = EnglishTokenizer::new();
        assert_eq!(tokenizer.tokenize("bear -- wolf"), vec!["bear", "wolf"]);
        assert!(tokenizer.tokenize("...!?").is_empty());
    }

    #[test]
    fn test_custom_stop_words() {
        let tokenizer = EnglishTokenizer::with_stop_words(["Bear"]);
        assert_eq!(tokenizer.tokenize("the bear"), vec!["the"]);
    }

    #[test]
    fn test_single_term() {
        let tokenizer = EnglishTokenizer::new();
        assert_eq!(single_term(&tokenizer, "Bears").unwrap(), "bear");

        let err = single_term(&tokenizer, "bear attack").unwrap_err();
        assert!(matches!(err, ReelError::TooManyTerms { count: 2, .. }));

        let err = single_term(&tokenizer, "the").unwrap_err();
        assert!(matches!(err, ReelError::TooManyTerms { count: 0, .. }));

        let err = single_term(&tokenizer, "   ").unwrap_err();
        assert!(matches!(err, ReelError::InvalidQuery { .. }));
    }
}
