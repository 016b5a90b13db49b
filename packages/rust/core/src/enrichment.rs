//! Search enrichment: query a provider, then attach scraped page context to
//! each result.
//!
//! Results are processed strictly in provider order on the calling task.
//! Consecutive page fetches are separated by the configured politeness delay.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use url::Url;

use channelwatch_crawler::{ContextScraper, HttpFetcher};
use channelwatch_search::{SearchBackend, SearchHit, SearchOptions};
use channelwatch_shared::{
    ChannelWatchError, NO_SNIPPET, NO_TITLE, Result, SearchResult, WatchConfig,
};

/// Queries a search provider and enriches each hit with page context.
#[derive(Debug, Clone)]
pub struct SearchEnricher {
    backend: SearchBackend,
    scraper: ContextScraper,
    max_results: usize,
    politeness_delay: Duration,
}

impl SearchEnricher {
    pub fn new(
        backend: SearchBackend,
        scraper: ContextScraper,
        max_results: usize,
        politeness_delay: Duration,
    ) -> Self {
        Self {
            backend,
            scraper,
            max_results,
            politeness_delay,
        }
    }

    /// Build an enricher from the runtime config, sharing `fetcher` for page
    /// context requests.
    pub fn from_config(config: &WatchConfig, fetcher: HttpFetcher) -> Result<Self> {
        let backend = SearchBackend::new(&SearchOptions::from_watch_config(config))?;
        Ok(Self::new(
            backend,
            ContextScraper::new(fetcher),
            config.max_results,
            config.politeness_delay,
        ))
    }

    /// Configured result limit.
    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Search with the configured result limit.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        self.search_with_limit(query, self.max_results).await
    }

    /// Search for up to `max_results` results and enrich each with context.
    ///
    /// Never fails: a provider error yields an empty list, and a result that
    /// cannot be processed is logged and skipped.
    #[instrument(skip_all, fields(provider = self.backend.name(), max_results = max_results))]
    pub async fn search_with_limit(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        info!(query = %preview(query, 100), "performing web search");

        let hits = match self.backend.search(query, max_results).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "search provider failed");
                return Vec::new();
            }
        };

        let mut results = Vec::new();
        let mut fetched_any = false;

        for (rank, hit) in hits.into_iter().take(max_results).enumerate() {
            let (url, title, snippet) = match resolve_hit(hit) {
                Ok(parts) => parts,
                Err(e) => {
                    warn!(rank, error = %e, "skipping search result");
                    continue;
                }
            };

            if fetched_any && !self.politeness_delay.is_zero() {
                tokio::time::sleep(self.politeness_delay).await;
            }
            fetched_any = true;

            let context = self.scraper.fetch_context(&url).await;
            debug!(rank, %url, context_chars = context.chars().count(), "enriched result");

            results.push(SearchResult {
                url,
                title,
                snippet,
                context,
            });
        }

        if results.is_empty() {
            warn!("no web search results found");
        } else {
            info!(count = results.len(), "web search complete");
        }

        results
    }
}

/// Validate a provider hit and apply placeholder title/snippet.
fn resolve_hit(hit: SearchHit) -> Result<(String, String, String)> {
    let raw = hit
        .url
        .ok_or_else(|| ChannelWatchError::validation("search result has no URL"))?;

    let url = Url::parse(&raw)
        .map_err(|e| ChannelWatchError::validation(format!("invalid result URL {raw}: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ChannelWatchError::validation(format!(
            "unsupported result URL scheme: {raw}"
        )));
    }

    Ok((
        raw,
        hit.title.unwrap_or_else(|| NO_TITLE.to_string()),
        hit.snippet.unwrap_or_else(|| NO_SNIPPET.to_string()),
    ))
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
