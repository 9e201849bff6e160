//! Next-query policy shared by both research agents.
//!
//! Priority: an unused arbiter-suggested query, then a generated query, then
//! a deterministic keyword query. The result is never empty.

use std::fmt;
use std::sync::{Arc, LazyLock};

use coordination::retry::RetryPolicy;
use regex::Regex;
use tracing::{debug, info, warn};

use super::researcher::ResearchProfile;
use crate::backend::{extract_text, GenerationBackend, GenerationRequest};
use crate::errors::with_retry;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

const QUOTE_CHARS: &[char] = &['"', '\'', '`', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}'];

/// Where a research query came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrigin {
    /// Taken from the arbiter's suggestion list.
    Suggested,
    /// Produced by the generation backend.
    Generated,
    /// Built from the profile keywords after generation failed.
    Fallback,
}

impl fmt::Display for QueryOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suggested => write!(f, "suggested"),
            Self::Generated => write!(f, "generated"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Collapse newlines and runs of whitespace, strip surrounding quotes.
pub fn sanitize_query(raw: &str) -> String {
    let flat = WHITESPACE_RE.replace_all(raw, " ");
    let stripped = flat.trim().trim_matches(QUOTE_CHARS).trim();
    WHITESPACE_RE.replace_all(stripped, " ").into_owned()
}

/// Prefix the quoted topic when the query does not mention it
/// (case-insensitive).
pub fn ensure_topic(topic: &str, query: &str) -> String {
    if query.to_lowercase().contains(&topic.to_lowercase()) {
        query.to_string()
    } else {
        format!("\"{topic}\" {query}")
    }
}

/// First suggestion not already tried (exact match).
pub fn first_unused<'a>(suggested: &'a [String], previous: &[String]) -> Option<&'a str> {
    suggested
        .iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty() && !previous.iter().any(|p| p.as_str() == *s))
}

pub struct QueryGenerator {
    backend: Arc<dyn GenerationBackend>,
    profile: &'static ResearchProfile,
    retry: RetryPolicy,
    temperature: f64,
}

impl QueryGenerator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        profile: &'static ResearchProfile,
        retry: RetryPolicy,
        temperature: f64,
    ) -> Self {
        Self {
            backend,
            profile,
            retry,
            temperature,
        }
    }

    fn build_prompt(topic: &str, feedback: &str, previous: &[String]) -> String {
        let feedback = if feedback.trim().is_empty() {
            "None"
        } else {
            feedback.trim()
        };
        let mut prompt = format!("TOPIC: {topic}\nFEEDBACK: {feedback}\n");
        if !previous.is_empty() {
            prompt.push_str("\nDO NOT REPEAT these queries:\n");
            for q in previous {
                prompt.push_str("- ");
                prompt.push_str(q);
                prompt.push('\n');
            }
        }
        prompt.push_str("\nReply with the next search query only.");
        prompt
    }

    /// Choose the next search query for `topic`.
    pub async fn next_query(
        &self,
        topic: &str,
        feedback: &str,
        previous: &[String],
        suggested: &[String],
    ) -> (String, QueryOrigin) {
        if let Some(query) = first_unused(suggested, previous) {
            info!(agent = self.profile.name, query, "Using arbiter-suggested query");
            return (query.to_string(), QueryOrigin::Suggested);
        }

        let request = GenerationRequest::new(
            self.profile.name,
            self.profile.preamble,
            Self::build_prompt(topic, feedback, previous),
        )
        .with_temperature(self.temperature);

        let label = format!("{} query", self.profile.name);
        match with_retry(&self.retry, &label, || self.backend.generate(&request)).await {
            Ok(parts) => {
                let generated = extract_text(&parts)
                    .map(|t| sanitize_query(&t))
                    .filter(|q| !q.is_empty());
                if let Some(q) = generated {
                    let query = ensure_topic(topic, &q);
                    debug!(agent = self.profile.name, query = %query, "Generated query");
                    return (query, QueryOrigin::Generated);
                }
                warn!(agent = self.profile.name, "Query generation returned no text");
            }
            Err(e) => {
                warn!(agent = self.profile.name, error = %e, "Query generation failed");
            }
        }

        let query = self.profile.keyword_query(topic);
        info!(agent = self.profile.name, query = %query, "Using keyword fallback query");
        (query, QueryOrigin::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_query() {
        assert_eq!(sanitize_query("  \"Marie Curie\nachievements\"  "), "Marie Curie achievements");
        assert_eq!(sanitize_query("\u{201c}legacy   reforms\u{201d}"), "legacy reforms");
        assert_eq!(sanitize_query("\"\""), "");
    }

    #[test]
    fn test_ensure_topic() {
        assert_eq!(ensure_topic("Napoleon", "napoleon reforms"), "napoleon reforms");
        assert_eq!(ensure_topic("Napoleon", "civil code"), "\"Napoleon\" civil code");
    }

    #[test]
    fn test_first_unused_is_case_sensitive() {
        let suggested = vec!["Tesla patents".to_string(), "Tesla AC motor".to_string()];
        let previous = vec!["Tesla patents".to_string()];
        assert_eq!(first_unused(&suggested, &previous), Some("Tesla AC motor"));

        let previous = vec!["tesla patents".to_string()];
        assert_eq!(first_unused(&suggested, &previous), Some("Tesla patents"));

        let previous = suggested.clone();
        assert_eq!(first_unused(&suggested, &previous), None);
    }

    #[test]
    fn test_prompt_lists_previous_queries() {
        let prompt = QueryGenerator::build_prompt("Topic", "", &["a b".to_string()]);
        assert!(prompt.contains("FEEDBACK: None"));
        assert!(prompt.contains("DO NOT REPEAT"));
        assert!(prompt.contains("- a b"));
    }
}
