//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use reel_core::{LanguageModel, LlmConfig, ReelError, Result};

/// First retry delay; doubles on every further attempt.
const BASE_BACKOFF_MS: u64 = 500;

/// Text completion through the Gemini REST API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Outcome of one HTTP attempt.
enum Attempt {
    Done(String),
    Retry(ReelError),
    Fail(ReelError),
}

impl GeminiClient {
    /// Create a client with an explicit API key.
    pub fn new(api_key: impl Into<String>, config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReelError::llm(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    /// Create a client reading the API key from `config.api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ReelError::config(format!(
                "Environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        if api_key.trim().is_empty() {
            return Err(ReelError::config(format!(
                "Environment variable {} is empty",
                config.api_key_env
            )));
        }
        Self::new(api_key, config)
    }

    /// Model name requests are sent to.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    async fn attempt(&self, body: &GenerateRequest<'_>) -> Attempt {
        let response = match self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(ReelError::llm(format!("HTTP error: {}", e))),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Attempt::Retry(ReelError::llm(format!("Failed to read body: {}", e))),
        };

        if !status.is_success() {
            let err = ReelError::llm(format!("API returned {}: {}", status, text));
            return if is_retryable(status) {
                Attempt::Retry(err)
            } else {
                Attempt::Fail(err)
            };
        }

        match parse_response(&text) {
            Ok(completion) => Attempt::Done(completion),
            Err(e) => Attempt::Fail(e),
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Concatenated text parts of the first candidate.
fn parse_response(body: &str) -> Result<String> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ReelError::llm(format!("JSON parse error: {}", e)))?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ReelError::llm("Response contained no candidates"))?;

    Ok(candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt - 1));
                debug!(attempt, "retrying completion request after {:?}", delay);
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&body).await {
                Attempt::Done(text) => {
                    debug!("Completion returned {} characters", text.len());
                    return Ok(text);
                }
                Attempt::Fail(e) => return Err(e),
                Attempt::Retry(e) => {
                    warn!(attempt, error = %e, "completion request failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ReelError::llm("all retries exhausted")))
    }
}
