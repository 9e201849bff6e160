//! Knowledge-source collaborators.
//!
//! The primary source returns raw `Page:`/`Summary:` text that the
//! retrieval rules in `coordination::retrieval` parse and filter. The
//! secondary source returns structured web hits and never fails: an
//! unavailable search engine simply yields no hits.

pub mod web;
pub mod wikipedia;

use async_trait::async_trait;
use coordination::retrieval::WebHit;

use crate::errors::SourceError;

pub use web::DuckDuckGoSource;
pub use wikipedia::WikipediaClient;

#[async_trait]
pub trait PrimarySource: Send + Sync {
    /// Up to `count` articles as repeated `Page: {title}\nSummary: {summary}` sections.
    async fn lookup(&self, query: &str, count: usize) -> Result<String, SourceError>;
}

#[async_trait]
pub trait SecondarySource: Send + Sync {
    /// Up to `count` hits; empty on no results or unavailability.
    async fn search(&self, query: &str, count: usize) -> Vec<WebHit>;
}
