//! Page context scraping: fetch a result page and reduce it to bounded
//! plain text.

use scraper::{ElementRef, Html, Node};
use tracing::{debug, warn};

use crate::fetcher::HttpFetcher;

/// Hard cap on context length, in characters.
pub const MAX_CONTEXT_CHARS: usize = 1000;

/// Elements whose text never counts as visible content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style"];

/// Fetches single pages and reduces them to plain text.
#[derive(Debug, Clone)]
pub struct ContextScraper {
    fetcher: HttpFetcher,
}

impl ContextScraper {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch `url` and return up to [`MAX_CONTEXT_CHARS`] characters of its
    /// visible text.
    ///
    /// Never fails: any network or protocol error yields an empty string and
    /// a warning.
    pub async fn fetch_context(&self, url: &str) -> String {
        match self.fetcher.get_text(url).await {
            Ok(body) => {
                let text = visible_text(&body);
                debug!(%url, chars = text.chars().count(), "extracted page context");
                text
            }
            Err(e) => {
                warn!(%url, error = %e, "failed to fetch page context");
                String::new()
            }
        }
    }
}

/// Reduce an HTML document to its visible text, truncated to
/// [`MAX_CONTEXT_CHARS`].
///
/// Script and style subtrees are dropped, text nodes are trimmed and joined
/// with single spaces, and runs of whitespace collapse to one space. The cut
/// is by character, not by word.
pub fn visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut pieces = Vec::new();
    collect_text(doc.root_element(), &mut pieces);

    let joined = pieces.join(" ");
    let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_CONTEXT_CHARS).collect()
}

fn collect_text<'a>(el: ElementRef<'a>, out: &mut Vec<&'a str>) {
    if SKIPPED_ELEMENTS.contains(&el.value().name()) {
        return;
    }

    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed);
                }
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn strips_script_and_style_text() {
        let text = visible_text(&load_fixture("article.html"));
        assert!(text.starts_with("Release Notes"));
        assert!(text.contains("The new version ships today."));
        assert!(!text.contains("trackVisit"));
        assert!(!text.contains("font-family"));
    }

    #[test]
    fn collapses_whitespace() {
        let text = visible_text("<html><body><p>  one \n\n two</p>\t<p>three</p></body></html>");
        assert_eq!(text, "one two three");
    }

    #[test]
    fn truncates_to_max_chars() {
        let long = "word ".repeat(600);
        let text = visible_text(&format!("<html><body><p>{long}</p></body></html>"));
        assert_eq!(text.chars().count(), MAX_CONTEXT_CHARS);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long = "é".repeat(1500);
        let text = visible_text(&format!("<p>{long}</p>"));
        assert_eq!(text.chars().count(), MAX_CONTEXT_CHARS);
    }

    #[tokio::test]
    async fn fetch_failure_yields_empty_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new("ua", Duration::from_secs(5)).unwrap();
        let scraper = ContextScraper::new(fetcher);
        assert_eq!(scraper.fetch_context(&server.uri()).await, "");
    }

    #[tokio::test]
    async fn fetch_success_returns_visible_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("article.html")))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new("ua", Duration::from_secs(5)).unwrap();
        let scraper = ContextScraper::new(fetcher);
        let text = scraper
            .fetch_context(&format!("{}/article", server.uri()))
            .await;
        assert!(text.contains("The new version ships today."));
    }
}
