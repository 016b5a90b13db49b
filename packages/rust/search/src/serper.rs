//! Serper (Google results API) backend.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use channelwatch_shared::{ChannelWatchError, Result};

use crate::{SearchHit, non_empty};

const DEFAULT_ENDPOINT: &str = "https://google.serper.dev";

/// Serper JSON API client.
#[derive(Debug, Clone)]
pub struct Serper {
    client: Client,
    api_key: String,
    endpoint: String,
}

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    link: Option<String>,
    title: Option<String>,
    snippet: Option<String>,
}

impl Serper {
    pub(crate) fn new(client: Client, api_key: String, endpoint: Option<&str>) -> Self {
        Self {
            client,
            api_key,
            endpoint: endpoint
                .unwrap_or(DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub(crate) async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let url = format!("{}/search", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&SerperRequest {
                q: query,
                num: max_results,
            })
            .send()
            .await
            .map_err(|e| ChannelWatchError::Provider(format!("serper: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelWatchError::Provider(format!("serper: HTTP {status}")));
        }

        let body: SerperResponse = response
            .json()
            .await
            .map_err(|e| ChannelWatchError::Provider(format!("serper: invalid JSON: {e}")))?;

        debug!(count = body.organic.len(), "decoded serper response");

        Ok(body
            .organic
            .into_iter()
            .take(max_results)
            .map(|r| SearchHit {
                url: non_empty(r.link),
                title: non_empty(r.title),
                snippet: non_empty(r.snippet),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_key_and_decodes_organic_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "secret"))
            .and(body_json(serde_json::json!({ "q": "new upload", "num": 3 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "searchParameters": { "q": "new upload" },
                "organic": [
                    { "link": "https://a.example/", "title": "A", "snippet": "first" },
                    { "link": "https://b.example/", "title": "" },
                    { "title": "no link" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let serper = Serper::new(Client::new(), "secret".into(), Some(&server.uri()));
        let hits = serper.search("new upload", 3).await.unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].url.as_deref(), Some("https://a.example/"));
        assert_eq!(hits[0].snippet.as_deref(), Some("first"));
        assert!(hits[1].title.is_none());
        assert!(hits[1].snippet.is_none());
        assert!(hits[2].url.is_none());
    }

    #[tokio::test]
    async fn missing_organic_array_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let serper = Serper::new(Client::new(), "k".into(), Some(&server.uri()));
        assert!(serper.search("q", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let serper = Serper::new(Client::new(), "bad".into(), Some(&server.uri()));
        let err = serper.search("q", 5).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
