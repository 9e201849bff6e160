//! DuckDuckGo web search via daedra.

use async_trait::async_trait;
use coordination::retrieval::WebHit;
use tracing::{debug, warn};

use super::SecondarySource;

/// Secondary source backed by daedra's DuckDuckGo search.
#[derive(Debug, Default, Clone)]
pub struct DuckDuckGoSource;

impl DuckDuckGoSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SecondarySource for DuckDuckGoSource {
    async fn search(&self, query: &str, count: usize) -> Vec<WebHit> {
        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: count.max(1),
                ..Default::default()
            }),
        };

        match daedra::tools::search::perform_search(&search_args).await {
            Ok(response) => {
                let hits: Vec<WebHit> = response
                    .data
                    .iter()
                    .map(|r| WebHit {
                        title: r.title.to_string(),
                        snippet: r.description.to_string(),
                        url: r.url.to_string(),
                    })
                    .collect();
                debug!(query, hits = hits.len(), "Web search complete");
                hits
            }
            Err(e) => {
                warn!(query, error = %e, "Web search failed");
                Vec::new()
            }
        }
    }
}
