//! Evidence retrieval: primary source, on-topic filtering, optional web
//! fallback.
//!
//! Retrieval never returns an error. Transport failures become
//! [`RetrievalOutcome::Failed`] and an empty filtered set becomes
//! [`RetrievalOutcome::Empty`], so callers branch on a tag instead of
//! sniffing string prefixes.

use std::fmt;
use std::sync::Arc;

use coordination::config::{TrialConfig, MAX_RESULTS_CAP};
use coordination::retrieval::{
    filter_candidates, format_blocks, parse_pages, render_web_evidence, select_relevant_hit,
    web_query,
};
use tracing::{debug, info, warn};

use crate::sources::{PrimarySource, SecondarySource};

/// Web hits requested from the secondary source per fallback search.
const WEB_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// Formatted `Title:`/`Summary:` evidence.
    Found(String),
    /// The source answered but nothing survived filtering.
    Empty { query: String },
    /// The source could not be reached or its answer could not be read.
    Failed { reason: String },
}

impl RetrievalOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn into_evidence(self) -> Option<String> {
        match self {
            Self::Found(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for RetrievalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(text) => write!(f, "{text}"),
            Self::Empty { query } => write!(f, "No information found for {query}"),
            Self::Failed { reason } => write!(f, "Retrieval failed: {reason}"),
        }
    }
}

/// Runs queries against the knowledge sources and shapes the result into
/// evidence text.
#[derive(Clone)]
pub struct EvidenceRetriever {
    primary: Arc<dyn PrimarySource>,
    secondary: Option<Arc<dyn SecondarySource>>,
    config: Arc<TrialConfig>,
}

impl EvidenceRetriever {
    pub fn new(primary: Arc<dyn PrimarySource>, config: Arc<TrialConfig>) -> Self {
        Self {
            primary,
            secondary: None,
            config,
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn SecondarySource>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Query the primary source and keep only on-topic pages.
    ///
    /// `max_results` defaults to the configured value and is capped at
    /// [`MAX_RESULTS_CAP`].
    pub async fn retrieve(
        &self,
        query: &str,
        focus: Option<&str>,
        max_results: Option<usize>,
    ) -> RetrievalOutcome {
        let count = max_results
            .unwrap_or(self.config.max_results)
            .clamp(1, MAX_RESULTS_CAP);

        let raw = match self.primary.lookup(query, count).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(query, error = %e, "Primary source lookup failed");
                return RetrievalOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let candidates = parse_pages(&raw);
        let survivors = filter_candidates(&candidates, query, focus);
        debug!(
            query,
            candidates = candidates.len(),
            kept = survivors.len(),
            "Filtered primary results"
        );
        if survivors.is_empty() {
            return RetrievalOutcome::Empty {
                query: query.to_string(),
            };
        }
        RetrievalOutcome::Found(format_blocks(&survivors, self.config.summary_chars_max))
    }

    /// [`retrieve`](Self::retrieve), falling back to web search when the
    /// primary source yields nothing usable.
    ///
    /// Without a configured secondary source this is plain `retrieve`.
    pub async fn retrieve_with_fallback(
        &self,
        query: &str,
        topic: &str,
        focus: Option<&str>,
    ) -> RetrievalOutcome {
        let primary = self.retrieve(query, focus, None).await;
        if primary.is_found() {
            return primary;
        }
        let Some(secondary) = &self.secondary else {
            return primary;
        };

        let shaped = web_query(topic, query);
        info!(query = %shaped, "Primary source empty, trying web search");
        let hits = secondary.search(&shaped, WEB_RESULTS).await;
        match select_relevant_hit(&hits, query, topic, focus) {
            Some(hit) => {
                info!(url = %hit.url, "Web search supplied evidence");
                RetrievalOutcome::Found(render_web_evidence(hit))
            }
            None => {
                debug!(hits = hits.len(), "No relevant web hit");
                RetrievalOutcome::Empty {
                    query: format!("{query} via Wikipedia or DuckDuckGo"),
                }
            }
        }
    }
}
