//! Test doubles shared by the query tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use reel_core::{
    DocId, Document, LanguageModel, ReelError, Result, ScoreBreakdown, SearchResult,
};

/// Language model that replays canned replies in order and records prompts.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ReelError::llm("script exhausted"))
    }
}

/// A fused result with a placeholder breakdown.
pub fn result(id: DocId, title: &str, description: &str) -> SearchResult {
    SearchResult {
        rank: 0,
        score: 0.0,
        document: Document::new(id, title, description),
        snippet: description.to_string(),
        breakdown: ScoreBreakdown::Rrf {
            rrf: 0.0,
            keyword_rank: None,
            semantic_rank: None,
        },
        rerank: None,
    }
}
