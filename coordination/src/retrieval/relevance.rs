//! Secondary-source (web search) relevance rules.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RELEVANCE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9]+").expect("valid regex"));

/// URL fragments of listing pages that never carry substantive content.
pub const LOW_QUALITY_URL_MARKERS: &[&str] = &["/tag/", "/category/"];

/// One web search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Prefix the topic unless the query already contains it.
pub fn web_query(topic: &str, query: &str) -> String {
    if query.contains(topic) {
        query.to_string()
    } else {
        format!("{topic} {query}")
    }
}

/// Lowercase alphanumeric tokens longer than three characters.
pub fn relevance_tokens(text: &str) -> Vec<String> {
    RELEVANCE_TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| t.len() > 3)
        .collect()
}

/// Pick the first hit that is not a listing page and mentions enough
/// relevance tokens in its title and snippet.
///
/// Tokens come from `focus`, else `query`, else `topic`. Two matches are
/// required when there is more than one token.
pub fn select_relevant_hit<'a>(
    hits: &'a [WebHit],
    query: &str,
    topic: &str,
    focus: Option<&str>,
) -> Option<&'a WebHit> {
    let seed = focus.unwrap_or(if query.is_empty() { topic } else { query });
    let mut tokens = relevance_tokens(seed);
    if tokens.is_empty() {
        tokens = relevance_tokens(topic);
    }
    let min_matches = if tokens.len() > 1 { 2 } else { 1 };

    hits.iter()
        .filter(|h| !h.title.trim().is_empty() && !h.snippet.trim().is_empty())
        .filter(|h| !LOW_QUALITY_URL_MARKERS.iter().any(|m| h.url.contains(m)))
        .find(|h| {
            let haystack = format!("{} {}", h.title, h.snippet).to_lowercase();
            tokens.iter().filter(|t| haystack.contains(t.as_str())).count() >= min_matches
        })
}

/// Evidence text for a web hit, with source attribution first.
pub fn render_web_evidence(hit: &WebHit) -> String {
    format!(
        "Source: DuckDuckGo web search ({})\nTitle: {}\nSummary: {}",
        hit.url,
        hit.title.trim(),
        hit.snippet.trim()
    )
}
