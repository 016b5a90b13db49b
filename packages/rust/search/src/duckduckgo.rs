//! DuckDuckGo HTML endpoint backend.
//!
//! The HTML endpoint returns a plain results page: one `.result` block per
//! hit with a `.result__title` link and a `.result__snippet`. Links are
//! usually redirects carrying the real target in the `uddg` parameter.

use std::sync::LazyLock;

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use channelwatch_shared::{ChannelWatchError, Result};

use crate::{SearchHit, non_empty};

/// Public endpoint used when no override is configured.
const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com";

static RESULT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result").expect("result selector"));
static TITLE_LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result__title a, a.result__a").expect("title selector"));
static SNIPPET_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result__snippet").expect("snippet selector"));

/// DuckDuckGo HTML search client.
#[derive(Debug, Clone)]
pub struct DuckDuckGo {
    client: Client,
    endpoint: String,
}

impl DuckDuckGo {
    pub(crate) fn new(client: Client, endpoint: Option<&str>) -> Self {
        Self {
            client,
            endpoint: endpoint
                .unwrap_or(DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub(crate) async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let mut url = Url::parse(&format!("{}/html/", self.endpoint))
            .map_err(|e| ChannelWatchError::config(format!("invalid search endpoint: {e}")))?;
        url.query_pairs_mut().append_pair("q", query);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ChannelWatchError::Provider(format!("duckduckgo: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelWatchError::Provider(format!(
                "duckduckgo: HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| {
                ChannelWatchError::Provider(format!("duckduckgo: body read failed: {e}"))
            })?;

        let base = Url::parse(&self.endpoint).ok();
        let hits = parse_results(&body, base.as_ref(), max_results);
        debug!(count = hits.len(), "parsed duckduckgo results page");
        Ok(hits)
    }
}

/// Parse a DuckDuckGo HTML results page into at most `max_results` hits.
///
/// Ads (`result--ad`) and blocks without a resolvable link are skipped and do
/// not count toward `max_results`.
pub fn parse_results(html: &str, base: Option<&Url>, max_results: usize) -> Vec<SearchHit> {
    let doc = Html::parse_document(html);
    let mut hits = Vec::new();

    for block in doc.select(&RESULT_SEL) {
        if hits.len() >= max_results {
            break;
        }
        if block.value().classes().any(|c| c == "result--ad") {
            continue;
        }

        let link = block.select(&TITLE_LINK_SEL).next();
        let Some(url) = link
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_result_url(href, base))
        else {
            debug!("skipping result block without a link");
            continue;
        };
        let title = link.and_then(|a| non_empty(Some(element_text(a))));
        let snippet = block
            .select(&SNIPPET_SEL)
            .next()
            .and_then(|s| non_empty(Some(element_text(s))));

        hits.push(SearchHit {
            url: Some(url),
            title,
            snippet,
        });
    }

    hits
}

fn element_text(el: ElementRef<'_>) -> String {
    let raw = el.text().collect::<Vec<_>>().join(" ");
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a result link, unwrapping `uddg=` redirect links to their target.
fn resolve_result_url(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let absolute = if href.starts_with("//") {
        Url::parse(&format!("https:{href}")).ok()?
    } else {
        match Url::parse(href) {
            Ok(url) => url,
            Err(_) => base?.join(href).ok()?,
        }
    };

    if let Some((_, target)) = absolute.query_pairs().find(|(k, _)| k == "uddg") {
        return Some(target.into_owned());
    }

    Some(absolute.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> String {
        std::fs::read_to_string("../../../fixtures/html/ddg_results.html")
            .expect("read ddg fixture")
    }

    #[test]
    fn parses_titles_snippets_and_urls_in_order() {
        let hits = parse_results(&fixture(), None, 10);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].url.as_deref(), Some("https://example.com/1"));
        assert_eq!(hits[0].title.as_deref(), Some("Test Title 1"));
        assert_eq!(hits[0].snippet.as_deref(), Some("Test Snippet 1"));
        assert_eq!(hits[1].url.as_deref(), Some("https://example.com/2"));
    }

    #[test]
    fn skips_ads_and_linkless_blocks() {
        let hits = parse_results(&fixture(), None, 10);
        assert!(hits.iter().all(|h| h.url.as_deref() != Some("https://ads.example.com/")));
        assert!(hits.iter().all(|h| h.url.is_some()));

        // Third block has a link but no snippet
        assert_eq!(hits[2].url.as_deref(), Some("https://example.org/no-snippet"));
        assert!(hits[2].snippet.is_none());
    }

    #[test]
    fn respects_max_results() {
        assert_eq!(parse_results(&fixture(), None, 1).len(), 1);
        assert!(parse_results(&fixture(), None, 0).is_empty());
    }

    #[test]
    fn linkless_blocks_do_not_use_up_the_limit() {
        let html = r#"<html><body>
            <div class="result"><h2 class="result__title">No link</h2></div>
            <div class="result"><h2 class="result__title">Also none</h2></div>
            <div class="result"><h2 class="result__title"><a class="result__a" href="https://example.com/a">A</a></h2></div>
            <div class="result"><h2 class="result__title"><a class="result__a" href="https://example.com/b">B</a></h2></div>
        </body></html>"#;

        let hits = parse_results(html, None, 2);
        let urls: Vec<_> = hits.iter().filter_map(|h| h.url.as_deref()).collect();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[test]
    fn empty_page_yields_no_hits() {
        assert!(parse_results("<html></html>", None, 5).is_empty());
    }

    #[test]
    fn unwraps_redirect_links() {
        let base = Url::parse("https://html.duckduckgo.com").unwrap();
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpath%3Fa%3D1&rut=abc";
        assert_eq!(
            resolve_result_url(href, Some(&base)).as_deref(),
            Some("https://example.com/path?a=1")
        );

        let relative = "/l/?uddg=https%3A%2F%2Fexample.net%2F";
        assert_eq!(
            resolve_result_url(relative, Some(&base)).as_deref(),
            Some("https://example.net/")
        );
        assert_eq!(resolve_result_url("/relative", None), None);
    }

    #[tokio::test]
    async fn non_success_status_is_a_provider_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/html/"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let ddg = DuckDuckGo::new(Client::new(), Some(&server.uri()));
        let err = ddg.search("query", 5).await.unwrap_err();
        assert!(matches!(err, ChannelWatchError::Provider(_)));
    }
}
