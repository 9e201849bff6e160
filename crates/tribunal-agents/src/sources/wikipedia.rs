//! MediaWiki search client.
//!
//! One `generator=search` request returns titles and plain-text intro
//! extracts together, rendered as `Page:`/`Summary:` sections in search
//! rank order.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::PrimarySource;
use crate::errors::SourceError;

pub const DEFAULT_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const USER_AGENT: &str = concat!("tribunal/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<ApiQuery>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    #[serde(default)]
    index: u32,
    #[serde(default)]
    extract: String,
}

#[derive(Debug, Clone)]
pub struct WikipediaClient {
    http: reqwest::Client,
    api_url: String,
}

impl WikipediaClient {
    pub fn new() -> Result<Self, SourceError> {
        Self::with_api_url(DEFAULT_API_URL)
    }

    /// Point at another MediaWiki `api.php` endpoint.
    pub fn with_api_url(api_url: impl Into<String>) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
        })
    }
}

fn render_pages(mut pages: Vec<ApiPage>) -> String {
    pages.sort_by_key(|p| p.index);
    pages
        .into_iter()
        .filter(|p| !p.title.trim().is_empty())
        .map(|p| format!("Page: {}\nSummary: {}", p.title.trim(), p.extract.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl PrimarySource for WikipediaClient {
    async fn lookup(&self, query: &str, count: usize) -> Result<String, SourceError> {
        let limit = count.max(1).to_string();
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("generator", "search"),
                ("gsrsearch", query),
                ("gsrlimit", limit.as_str()),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("exlimit", limit.as_str()),
                ("redirects", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let pages = body.query.map(|q| q.pages).unwrap_or_default();
        debug!(query, pages = pages.len(), "Wikipedia lookup complete");
        Ok(render_pages(pages))
    }
}
