//! Evidence retrieval rules: parsing, on-topic filtering, truncation, and
//! secondary-source relevance.
//!
//! Everything here is pure. The HTTP clients that feed these functions live
//! in `tribunal-agents::sources`.

pub mod filter;
pub mod relevance;
pub mod text;

use serde::{Deserialize, Serialize};

pub use filter::{
    extract_quoted_phrase, filter_candidates, focus_tokens, is_excluded_title,
    looks_like_entertainment,
};
pub use relevance::{
    render_web_evidence, relevance_tokens, select_relevant_hit, web_query, WebHit,
};
pub use text::{format_blocks, format_evidence_list, truncate_at_sentence};

/// One primary-source article: a page title and its summary text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub summary: String,
}

impl Candidate {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
        }
    }
}

/// Parse repeated `Page: {title}\nSummary: {summary}` sections.
///
/// Summary text runs until the next `Page:` line and may span lines.
/// Sections without a title are skipped.
pub fn parse_pages(raw: &str) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::new();
    let mut current: Option<Candidate> = None;
    let mut in_summary = false;

    for line in raw.lines() {
        if let Some(title) = line.strip_prefix("Page:") {
            if let Some(done) = current.take() {
                out.push(done);
            }
            current = Some(Candidate::new(title.trim(), ""));
            in_summary = false;
            continue;
        }
        let Some(cand) = current.as_mut() else {
            continue;
        };
        if let Some(summary) = line.strip_prefix("Summary:") {
            cand.summary = summary.trim_start().to_string();
            in_summary = true;
        } else if in_summary {
            cand.summary.push('\n');
            cand.summary.push_str(line);
        }
    }
    if let Some(done) = current {
        out.push(done);
    }

    out.into_iter()
        .filter(|c| !c.title.is_empty())
        .map(|c| Candidate::new(c.title, c.summary.trim()))
        .collect()
}
