//! LLM query enhancement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use reel_core::{LanguageModel, ReelError, Result};

/// How a query is rewritten before searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryEnhancement {
    /// Fix spelling errors only.
    Spell,

    /// Rewrite into a concise, search-friendly query.
    Rewrite,

    /// Append related terms to the original query.
    Expand,
}

impl QueryEnhancement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spell => "spell",
            Self::Rewrite => "rewrite",
            Self::Expand => "expand",
        }
    }

    fn prompt(&self, query: &str) -> String {
        match self {
            Self::Spell => format!(
                "Fix any spelling errors in this movie search query.\n\n\
                 Only correct obvious typos. Don't change correctly spelled words.\n\n\
                 Query: \"{}\"\n\n\
                 If no errors, return the original query.\n\
                 Corrected:",
                query
            ),
            Self::Rewrite => format!(
                "Rewrite this movie search query to be more specific and searchable.\n\n\
                 Original: \"{}\"\n\n\
                 Consider:\n\
                 - Common movie knowledge (famous actors, popular films)\n\
                 - Genre conventions (horror = scary, animation = cartoon)\n\
                 - Keep it concise (under 10 words)\n\
                 - It should be a search query, not a sentence\n\n\
                 Rewritten query:",
                query
            ),
            Self::Expand => format!(
                "Expand this movie search query with related terms.\n\n\
                 Add synonyms and related concepts that might appear in movie descriptions.\n\
                 Keep expansions relevant and focused.\n\
                 Return only the additional terms, separated by spaces.\n\n\
                 Query: \"{}\"\n\n\
                 Additional terms:",
                query
            ),
        }
    }
}

impl fmt::Display for QueryEnhancement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryEnhancement {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "spell" => Ok(Self::Spell),
            "rewrite" => Ok(Self::Rewrite),
            "expand" => Ok(Self::Expand),
            other => Err(ReelError::invalid_argument(format!(
                "unknown enhancement {:?} (expected spell, rewrite or expand)",
                other
            ))),
        }
    }
}

/// Strip whitespace and one layer of surrounding quotes.
fn clean_reply(reply: &str) -> &str {
    let reply = reply.trim();
    reply
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(reply)
        .trim()
}

/// Enhance `query` with one completion. An empty reply keeps the original query.
pub async fn enhance_query(
    llm: &dyn LanguageModel,
    query: &str,
    method: QueryEnhancement,
) -> Result<String> {
    let reply = llm.complete(&method.prompt(query)).await?;
    let reply = clean_reply(&reply);

    if reply.is_empty() {
        warn!("Empty {} reply; keeping original query", method);
        return Ok(query.to_string());
    }

    let enhanced = match method {
        QueryEnhancement::Spell | QueryEnhancement::Rewrite => reply.to_string(),
        QueryEnhancement::Expand => format!("{} {}", query, reply),
    };

    debug!("Enhanced query ({}): {:?} -> {:?}", method, query, enhanced);
    Ok(enhanced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;

    #[tokio::test]
    async fn test_spell_replaces_query() {
        let llm = ScriptedLlm::new(["\"bear attack\"\n"]);
        let enhanced = enhance_query(&llm, "baer atack", QueryEnhancement::Spell)
            .await
            .unwrap();
        assert_eq!(enhanced, "bear attack");
        assert!(llm.prompts()[0].contains("baer atack"));
    }

    #[tokio::test]
    async fn test_expand_appends_terms() {
        let llm = ScriptedLlm::new(["grizzly wilderness survival"]);
        let enhanced = enhance_query(&llm, "bear", QueryEnhancement::Expand)
            .await
            .unwrap();
        assert_eq!(enhanced, "bear grizzly wilderness survival");
    }

    #[tokio::test]
    async fn test_empty_reply_keeps_query() {
        let llm = ScriptedLlm::new(["   "]);
        let enhanced = enhance_query(&llm, "bear movie", QueryEnhancement::Rewrite)
            .await
            .unwrap();
        assert_eq!(enhanced, "bear movie");
    }

    #[tokio::test]
    async fn test_llm_failure_propagates() {
        let llm = ScriptedLlm::new(Vec::<String>::new());
        assert!(enhance_query(&llm, "bear", QueryEnhancement::Spell).await.is_err());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Rewrite".parse::<QueryEnhancement>().unwrap(), QueryEnhancement::Rewrite);
        assert!("translate".parse::<QueryEnhancement>().is_err());
    }
}
