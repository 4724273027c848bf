//! Embedding previews for the CLI diagnostics.

use serde::Serialize;

use reel_core::{Embedder, ReelError, Result};

/// Which side of the embedder produced a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingRole {
    /// `embed_documents`, as used for corpus text.
    Document,

    /// `embed_query`.
    Query,
}

/// Leading components and size of one embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingPreview {
    pub text: String,
    pub role: EmbeddingRole,
    pub dimension: usize,
    pub head: Vec<f32>,
}

/// Embed `text` once and keep its first `head` components.
pub async fn preview_embedding<E: Embedder + ?Sized>(
    embedder: &E,
    text: &str,
    role: EmbeddingRole,
    head: usize,
) -> Result<EmbeddingPreview> {
    if text.trim().is_empty() {
        return Err(ReelError::invalid_argument("text to embed must not be blank"));
    }

    let embedding = match role {
        EmbeddingRole::Document => embedder
            .embed_documents(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ReelError::embedding("embedder returned no vector"))?,
        EmbeddingRole::Query => embedder.embed_query(text).await?,
    };

    Ok(EmbeddingPreview {
        text: text.to_string(),
        role,
        dimension: embedding.len(),
        head: embedding.into_iter().take(head).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashingEmbedder;

    #[tokio::test]
    async fn test_preview_document_and_query() {
        let embedder = HashingEmbedder::new(16).unwrap();

        let document = preview_embedding(&embedder, "bear attack", EmbeddingRole::Document, 3)
            .await
            .unwrap();
        assert_eq!(document.dimension, 16);
        assert_eq!(document.head.len(), 3);

        let query = preview_embedding(&embedder, "bear attack", EmbeddingRole::Query, 5)
            .await
            .unwrap();
        assert_eq!(query.role, EmbeddingRole::Query);
        assert_eq!(query.head.len(), 5);
        assert_eq!(&query.head[..3], &document.head[..]);
    }

    #[tokio::test]
    async fn test_preview_rejects_blank_text() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let err = preview_embedding(&embedder, "   ", EmbeddingRole::Query, 3)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }
}
