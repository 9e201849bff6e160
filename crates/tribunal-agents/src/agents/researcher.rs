//! Research agents: the Advocate and the Skeptic.
//!
//! Both run the same round: pick a query, retrieve with the topic as focus,
//! and on nothing usable retry once with a fixed profile query and no
//! focus. They differ only in their [`ResearchProfile`].

use std::fmt;
use std::sync::Arc;

use coordination::config::TrialConfig;
use coordination::trial::Side;
use tracing::{info, warn};

use super::query::{QueryGenerator, QueryOrigin};
use crate::backend::GenerationBackend;
use crate::prompts::{ADVOCATE_PREAMBLE, SKEPTIC_PREAMBLE};
use crate::retriever::EvidenceRetriever;

/// Everything that distinguishes one research agent from the other.
#[derive(Debug)]
pub struct ResearchProfile {
    pub name: &'static str,
    pub side: Side,
    pub preamble: &'static str,
    /// Appended to the topic when query generation fails.
    pub keywords: [&'static str; 2],
    /// Appended to the topic for the second retrieval attempt.
    pub fallback_suffix: &'static str,
}

impl ResearchProfile {
    pub fn for_side(side: Side) -> &'static Self {
        match side {
            Side::Positive => &ADVOCATE,
            Side::Negative => &SKEPTIC,
        }
    }

    pub fn keyword_query(&self, topic: &str) -> String {
        format!("{topic} {} {}", self.keywords[0], self.keywords[1])
    }

    pub fn fallback_query(&self, topic: &str) -> String {
        format!("{topic} {}", self.fallback_suffix)
    }
}

pub static ADVOCATE: ResearchProfile = ResearchProfile {
    name: "advocate",
    side: Side::Positive,
    preamble: ADVOCATE_PREAMBLE,
    keywords: ["achievements", "legacy"],
    fallback_suffix: "biography legacy",
};

pub static SKEPTIC: ResearchProfile = ResearchProfile {
    name: "skeptic",
    side: Side::Negative,
    preamble: SKEPTIC_PREAMBLE,
    keywords: ["scandal", "failures"],
    fallback_suffix: "controversy criticism",
};

/// A round's research result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    Found(String),
    /// Nothing usable; the text explains what was missing.
    Missing(String),
}

impl Evidence {
    pub fn text(&self) -> &str {
        match self {
            Self::Found(t) | Self::Missing(t) => t,
        }
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

#[derive(Debug, Clone)]
pub struct ResearchFindings {
    /// Query chosen by the query policy.
    pub query: String,
    pub origin: QueryOrigin,
    pub evidence: Evidence,
}

pub struct ResearchAgent {
    profile: &'static ResearchProfile,
    queries: QueryGenerator,
    retriever: EvidenceRetriever,
    web_fallback: bool,
}

impl ResearchAgent {
    pub fn new(
        side: Side,
        backend: Arc<dyn GenerationBackend>,
        retriever: EvidenceRetriever,
        config: &TrialConfig,
        temperature: f64,
    ) -> Self {
        let profile = ResearchProfile::for_side(side);
        Self {
            profile,
            queries: QueryGenerator::new(backend, profile, config.query_retry.clone(), temperature),
            retriever,
            web_fallback: config.web_fallback(side),
        }
    }

    pub fn side(&self) -> Side {
        self.profile.side
    }

    pub fn name(&self) -> &'static str {
        self.profile.name
    }

    /// Gather this side's evidence for one round.
    pub async fn research_round(
        &self,
        topic: &str,
        feedback: &str,
        previous: &[String],
        suggested: &[String],
    ) -> ResearchFindings {
        let (query, origin) = self
            .queries
            .next_query(topic, feedback, previous, suggested)
            .await;
        info!(agent = self.profile.name, %origin, query = %query, "Researching");

        let primary = if self.web_fallback {
            self.retriever
                .retrieve_with_fallback(&query, topic, Some(topic))
                .await
        } else {
            self.retriever.retrieve(&query, Some(topic), None).await
        };
        if let Some(text) = primary.into_evidence() {
            return ResearchFindings {
                query,
                origin,
                evidence: Evidence::Found(text),
            };
        }

        let fallback = self.profile.fallback_query(topic);
        info!(agent = self.profile.name, query = %fallback, "Primary query empty, using fallback query");
        let evidence = match self.retriever.retrieve(&fallback, None, None).await.into_evidence() {
            Some(text) => Evidence::Found(text),
            None => {
                warn!(agent = self.profile.name, topic, "No evidence found");
                Evidence::Missing(format!("No {} evidence found for: {topic}", self.profile.side))
            }
        };
        ResearchFindings {
            query,
            origin,
            evidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_mirror_each_other() {
        assert_eq!(ResearchProfile::for_side(Side::Positive).side, Side::Positive);
        assert_eq!(ResearchProfile::for_side(Side::Negative).side, Side::Negative);
        assert_eq!(ADVOCATE.fallback_query("Tesla"), "Tesla biography legacy");
        assert_eq!(SKEPTIC.fallback_query("Tesla"), "Tesla controversy criticism");
        assert_eq!(SKEPTIC.keyword_query("Tesla"), "Tesla scandal failures");
        assert_eq!(ADVOCATE.keyword_query("Tesla"), "Tesla achievements legacy");
        for profile in [&ADVOCATE, &SKEPTIC] {
            assert_ne!(profile.keyword_query("Tesla"), profile.fallback_query("Tesla"));
        }
    }

    #[test]
    fn test_missing_evidence_text() {
        let e = Evidence::Missing("No negative evidence found for: X".into());
        assert_eq!(e.to_string(), "No negative evidence found for: X");
    }
}
