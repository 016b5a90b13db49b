//! External web search providers used to enrich detected items.
//!
//! A [`SearchBackend`] turns a free-text query into an ordered list of raw
//! [`SearchHit`]s. Hits carry whatever the provider supplied; defaults for
//! missing titles/snippets are applied by the enricher, not here.

mod duckduckgo;
mod serper;

use std::time::Duration;

use channelwatch_shared::{ChannelWatchError, Result, SearchProviderKind, WatchConfig};
use reqwest::Client;
use tracing::{info, instrument};

pub use duckduckgo::{DuckDuckGo, parse_results};
pub use serper::Serper;

/// Maximum number of redirects to follow on provider requests.
const MAX_REDIRECTS: usize = 3;

// ---------------------------------------------------------------------------
// SearchHit
// ---------------------------------------------------------------------------

/// One organic result as reported by a provider, in provider ranking order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHit {
    pub url: Option<String>,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

// ---------------------------------------------------------------------------
// Search options
// ---------------------------------------------------------------------------

/// Configuration for building a [`SearchBackend`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Which provider to talk to.
    pub provider: SearchProviderKind,
    /// Base URL override (defaults to the provider's public endpoint).
    pub endpoint: Option<String>,
    /// API key, for providers that need one.
    pub api_key: Option<String>,
    /// Timeout for the provider request.
    pub timeout: Duration,
    /// Identification header string.
    pub user_agent: String,
}

impl SearchOptions {
    /// Derive options from the runtime config, reading the API key from its env var.
    pub fn from_watch_config(config: &WatchConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        Self {
            provider: config.provider,
            endpoint: config.provider_endpoint.clone(),
            api_key,
            timeout: config.http_timeout,
            user_agent: config.user_agent.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// SearchBackend
// ---------------------------------------------------------------------------

/// A configured search provider.
#[derive(Debug, Clone)]
pub enum SearchBackend {
    DuckDuckGo(DuckDuckGo),
    Serper(Serper),
}

impl SearchBackend {
    /// Build the backend selected by `opts`.
    pub fn new(opts: &SearchOptions) -> Result<Self> {
        let client = build_client(opts)?;
        match opts.provider {
            SearchProviderKind::DuckDuckGo => Ok(Self::DuckDuckGo(DuckDuckGo::new(
                client,
                opts.endpoint.as_deref(),
            ))),
            SearchProviderKind::Serper => {
                let key = opts.api_key.clone().ok_or_else(|| {
                    ChannelWatchError::config("the serper provider requires an API key")
                })?;
                Ok(Self::Serper(Serper::new(client, key, opts.endpoint.as_deref())))
            }
        }
    }

    /// Provider name for tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DuckDuckGo(_) => "duckduckgo",
            Self::Serper(_) => "serper",
        }
    }

    /// Query the provider for up to `max_results` organic results.
    ///
    /// Any transport or decoding failure is a [`ChannelWatchError::Provider`].
    #[instrument(skip_all, fields(provider = self.name(), max_results = max_results))]
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let mut hits = match self {
            Self::DuckDuckGo(ddg) => ddg.search(query, max_results).await?,
            Self::Serper(serper) => serper.search(query, max_results).await?,
        };
        hits.truncate(max_results);

        info!(count = hits.len(), "provider returned results");
        Ok(hits)
    }
}

/// Build a reqwest client with the configured identification and timeout.
fn build_client(opts: &SearchOptions) -> Result<Client> {
    Client::builder()
        .user_agent(opts.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(opts.timeout)
        .build()
        .map_err(|e| ChannelWatchError::Network(format!("failed to build HTTP client: {e}")))
}

/// Treat blank provider strings as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
