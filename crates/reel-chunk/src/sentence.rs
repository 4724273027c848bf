//! Sentence-window chunker.
//!
//! Text is split after `.`, `!` or `?` followed by whitespace, then grouped
//! into windows of `chunk_size` sentences where consecutive windows share
//! `overlap` sentences. The last window absorbs the remainder so no
//! sentence is dropped.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use reel_core::{ChunkConfig, ChunkData, Chunker, ReelError, Result};

fn sentence_boundary() -> Result<&'static Regex> {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = BOUNDARY.get() {
        return Ok(re);
    }
    let re = Regex::new(r"[.!?]\s+")
        .map_err(|e| ReelError::chunking(format!("Invalid sentence pattern: {}", e)))?;
    Ok(BOUNDARY.get_or_init(|| re))
}

/// Split text into trimmed, non-empty sentences. Terminal punctuation stays
/// with its sentence.
pub fn split_sentences(text: &str) -> Result<Vec<String>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let boundary = sentence_boundary()?;
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in boundary.find_iter(text) {
        // Punctuation is a single ASCII byte.
        let end = m.start() + 1;
        push_sentence(&mut sentences, &text[start..end]);
        start = m.end();
    }
    push_sentence(&mut sentences, &text[start..]);

    Ok(sentences)
}

fn push_sentence(sentences: &mut Vec<String>, sentence: &str) {
    let sentence = sentence.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }
}

/// Sentence ranges `[start, end)` for `count` sentences.
fn windows(count: usize, chunk_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let step = chunk_size - overlap;
    let mut ranges = Vec::new();
    let mut start = 0;

    while start < count {
        let next = start + step;
        if start + chunk_size >= count || next >= count - 1 {
            ranges.push((start, count));
            break;
        }
        ranges.push((start, start + chunk_size));
        start = next;
    }

    ranges
}

fn validate(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(ReelError::chunking("chunk size must be at least one sentence"));
    }
    if overlap >= chunk_size {
        return Err(ReelError::chunking(format!(
            "overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Split `text` into overlapping sentence windows.
///
/// Empty or whitespace-only text yields no chunks; a single sentence without
/// terminal punctuation yields the trimmed text.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let chunker = SentenceChunker::new();
    let config = ChunkConfig {
        chunk_size,
        overlap,
    };
    Ok(chunker
        .chunk(text, &config)?
        .into_iter()
        .map(|chunk| chunk.content)
        .collect())
}

/// [`Chunker`] grouping whole sentences.
#[derive(Debug, Default, Clone, Copy)]
pub struct SentenceChunker;

impl SentenceChunker {
    pub fn new() -> Self {
        Self
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, content: &str, config: &ChunkConfig) -> Result<Vec<ChunkData>> {
        validate(config.chunk_size, config.overlap)?;

        let sentences = split_sentences(content)?;
        let chunks: Vec<ChunkData> = windows(sentences.len(), config.chunk_size, config.overlap)
            .into_iter()
            .map(|(start, end)| ChunkData {
                content: sentences[start..end].join(" "),
                first_sentence: start,
                end_sentence: end,
            })
            .collect();

        debug!(
            "Chunked {} sentences into {} chunks (size {}, overlap {})",
            sentences.len(),
            chunks.len(),
            config.chunk_size,
            config.overlap
        );

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_windows() {
        let chunks = chunk_text("A. B. C. D. E.", 2, 1).unwrap();
        assert_eq!(chunks, vec!["A. B.", "B. C.", "C. D.", "D. E."]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 4, 1).unwrap().is_empty());
        assert!(chunk_text("   \n\t ", 4, 1).unwrap().is_empty());
    }

    #[test]
    fn test_single_sentence_without_punctuation() {
        let chunks = chunk_text("  a lone bear wanders  ", 4, 1).unwrap();
        assert_eq!(chunks, vec!["a lone bear wanders"]);
    }

    #[test]
    fn test_fewer_sentences_than_window() {
        let chunks = chunk_text("One. Two!", 4, 1).unwrap();
        assert_eq!(chunks, vec!["One. Two!"]);
    }

    #[test]
    fn test_remainder_is_absorbed() {
        // step 2 over 5 sentences: the window starting at C would leave only E.
        let chunks = chunk_text("A. B. C. D. E.", 2, 0).unwrap();
        assert_eq!(chunks, vec!["A. B.", "C. D. E."]);
    }

    #[test]
    fn test_default_config_windows() {
        let text = "S1. S2. S3. S4. S5. S6.";
        let chunks = SentenceChunker::new()
            .chunk(text, &ChunkConfig::default())
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "S1. S2. S3. S4.");
        assert_eq!((chunks[1].first_sentence, chunks[1].end_sentence), (3, 6));
        assert_eq!(chunks[1].content, "S4. S5. S6.");
    }

    #[test]
    fn test_no_sentence_dropped() {
        let text = "One. Two? Three! Four. Five. Six. Seven.";
        for (size, overlap) in [(1, 0), (2, 1), (3, 1), (3, 2), (4, 1), (5, 0)] {
            let chunks = SentenceChunker::new()
                .chunk(text, &ChunkConfig { chunk_size: size, overlap })
                .unwrap();
            assert_eq!(chunks[0].first_sentence, 0);
            assert_eq!(chunks.last().unwrap().end_sentence, 7);
            for pair in chunks.windows(2) {
                assert!(pair[1].first_sentence <= pair[0].end_sentence);
            }
        }
    }

    #[test]
    fn test_split_sentences_keeps_punctuation() {
        let sentences = split_sentences("Run!  Hide? Fight.\nThen rest").unwrap();
        assert_eq!(sentences, vec!["Run!", "Hide?", "Fight.", "Then rest"]);
    }

    #[test]
    fn test_abbreviation_without_space_is_not_a_boundary() {
        let sentences = split_sentences("Set in the U.S.A. in 1999.").unwrap();
        assert_eq!(sentences, vec!["Set in the U.S.A.", "in 1999."]);
    }

    #[test]
    fn test_invalid_overlap() {
        assert!(matches!(
            chunk_text("A. B.", 2, 2),
            Err(ReelError::Chunking { .. })
        ));
        assert!(matches!(
            chunk_text("A. B.", 0, 0),
            Err(ReelError::Chunking { .. })
        ));
    }
}
