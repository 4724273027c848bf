//! Retrieval-augmented answer generation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use reel_core::{LanguageModel, ReelError, Result, SearchResult, SearchResults};

/// Shape of the generated answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStyle {
    /// Answer grounded in the retrieved documents.
    Rag,

    /// Dense multi-document summary.
    Summarize,

    /// Answer citing documents as `[1]`, `[2]`, ...
    Citations,

    /// Short conversational answer to a question.
    Question,
}

impl AnswerStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rag => "rag",
            Self::Summarize => "summarize",
            Self::Citations => "citations",
            Self::Question => "question",
        }
    }
}

impl fmt::Display for AnswerStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerStyle {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rag" => Ok(Self::Rag),
            "summarize" => Ok(Self::Summarize),
            "citations" => Ok(Self::Citations),
            "question" => Ok(Self::Question),
            other => Err(ReelError::invalid_argument(format!(
                "unknown answer style {:?} (expected rag, summarize, citations or question)",
                other
            ))),
        }
    }
}

/// A generated answer and the results it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub style: AnswerStyle,
    pub answer: String,
    pub results: SearchResults,
}

/// Numbered `title - description` lines.
fn document_listing(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} - {}", i + 1, r.document.title, r.document.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the completion prompt for `style`.
pub fn build_prompt(style: AnswerStyle, query: &str, results: &[SearchResult]) -> String {
    let documents = document_listing(results);
    const AUDIENCE: &str = "This should be tailored to users of a movie streaming service.";

    match style {
        AnswerStyle::Rag => format!(
            "Answer the question or provide information based on the provided documents. {}\n\n\
             Query: {}\n\n\
             Documents:\n{}\n\n\
             Provide a comprehensive answer that addresses the query:",
            AUDIENCE, query, documents
        ),
        AnswerStyle::Summarize => format!(
            "Provide information useful to this query by synthesizing information from multiple search results in detail.\n\
             The goal is to provide comprehensive information so that users know what their options are.\n\
             Your response should be information-dense and concise, with several key pieces of information \
             about the genre, plot, etc. of each movie.\n\
             {}\n\n\
             Query: {}\n\n\
             Search Results:\n{}\n\n\
             Provide a comprehensive 3-4 sentence answer that combines information from multiple sources:",
            AUDIENCE, query, documents
        ),
        AnswerStyle::Citations => format!(
            "Answer the question or provide information based on the provided documents.\n\n\
             {}\n\n\
             If not enough information is available to give a good answer, say so but give as good \
             of an answer as you can while citing the sources you have.\n\n\
             Query: {}\n\n\
             Documents:\n{}\n\n\
             Instructions:\n\
             - Provide a comprehensive answer that addresses the query\n\
             - Cite sources using [1], [2], etc. format when referencing information\n\
             - If sources disagree, mention the different viewpoints\n\
             - If the answer isn't in the documents, say \"I don't have enough information\"\n\
             - Be direct and informative\n\n\
             Answer:",
            AUDIENCE, query, documents
        ),
        AnswerStyle::Question => format!(
            "Answer the user's question based on the provided movies.\n\n\
             {}\n\n\
             Question: {}\n\n\
             Documents:\n{}\n\n\
             Instructions:\n\
             - Answer questions directly and concisely\n\
             - Be casual and conversational\n\
             - Talk like a normal person would in a chat conversation\n\n\
             Answer:",
            AUDIENCE, query, documents
        ),
    }
}

/// Generate an answer for `query` from already-retrieved results.
pub async fn generate_answer(
    llm: &dyn LanguageModel,
    style: AnswerStyle,
    query: &str,
    results: SearchResults,
) -> Result<Answer> {
    let prompt = build_prompt(style, query, &results.results);
    debug!(
        "Generating {} answer from {} documents",
        style,
        results.results.len()
    );

    let answer = llm.complete(&prompt).await?.trim().to_string();
    Ok(Answer {
        style,
        answer,
        results,
    })
}
