//! Feature-hashing embedder.
//!
//! Each lowercased alphanumeric word and each adjacent word pair is hashed
//! with blake3 into a signed bucket of a fixed-size vector, which is then L2
//! normalized. Texts sharing vocabulary land close together in cosine space.
//! No model files are needed and output is fully deterministic.

use async_trait::async_trait;
use tracing::debug;

use reel_core::{Embedder, ReelError, Result};

use crate::similarity::l2_normalize;

/// Word pairs contribute less than single words.
const BIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic embedder based on the hashing trick.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(ReelError::invalid_argument(
                "embedding dimension must be positive",
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut vector = vec![0.0f32; self.dimension];
        for word in &words {
            self.accumulate(&mut vector, word.as_bytes(), 1.0);
        }
        for pair in words.windows(2) {
            let feature = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, feature.as_bytes(), BIGRAM_WEIGHT);
        }

        l2_normalize(vector)
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = blake3::hash(feature);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        let value = u64::from_le_bytes(bytes);

        let bucket = (value % self.dimension as u64) as usize;
        let sign = if value >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!("Hashing {} texts into {} dimensions", texts.len(), self.dimension);
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosine_similarity;

    #[tokio::test]
    async fn test_dimension_and_normalization() {
        let embedder = HashingEmbedder::new(384).unwrap();
        assert_eq!(embedder.dimension(), 384);

        let embeddings = embedder
            .embed_documents(&["A bear attacks a hunter.", "Marmalade sandwiches"])
            .await
            .unwrap();
        assert_eq!(embeddings.len(), 2);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), 384);
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4);
        }
    }

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let e1 = embedder.embed_query("consistent input").await.unwrap();
        let e2 = embedder.embed_query("consistent input").await.unwrap();
        assert_eq!(e1, e2);

        let docs = embedder.embed_documents(&["consistent input"]).await.unwrap();
        assert_eq!(docs[0], e1);
    }

    #[tokio::test]
    async fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::new(128).unwrap();
        let e1 = embedder.embed_query("Grizzly bear!").await.unwrap();
        let e2 = embedder.embed_query("grizzly, BEAR").await.unwrap();
        assert_eq!(e1, e2);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let query = embedder.embed_query("bear attack in the forest").await.unwrap();
        let related = embedder
            .embed_query("a hunter survives a bear attack deep in the forest")
            .await
            .unwrap();
        let unrelated = embedder
            .embed_query("heist crew robs a casino vault")
            .await
            .unwrap();

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_text_without_words_is_zero_vector() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let embedding = embedder.embed_query("  ... !!").await.unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }
}
