//! Retrieval client: web search returning ranked page content.
//!
//! [`SearchClient`] is the seam the pipeline depends on; [`TavilyClient`]
//! calls the Tavily search API. Results keep the provider's relevance
//! order and are capped at the requested count.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use deepresearch_shared::{Credentials, DeepResearchError, Result, RetrievalConfig, SearchHit};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use url::Url;

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("DeepResearch/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// Runs a web search.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Search for `query`, returning at most `max_results` hits in rank order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

impl From<TavilyResult> for SearchHit {
    fn from(r: TavilyResult) -> Self {
        Self {
            url: r.url,
            content: r.content,
            title: r.title.filter(|t| !t.is_empty()),
            score: r.score,
        }
    }
}

// ---------------------------------------------------------------------------
// Tavily client
// ---------------------------------------------------------------------------

/// Search client for the Tavily API.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    search_depth: String,
}

impl TavilyClient {
    /// Build a client from config and the already-resolved credentials.
    pub fn new(config: &RetrievalConfig, credentials: &Credentials) -> Result<Self> {
        let endpoint = search_endpoint(&config.base_url)?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeepResearchError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            api_key: credentials.retrieval_key.clone(),
            search_depth: config.search_depth.clone(),
        })
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    #[instrument(skip_all, fields(max_results = max_results, query_len = query.len()))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let body = TavilySearchRequest {
            query,
            max_results,
            search_depth: &self.search_depth,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeepResearchError::retrieval(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DeepResearchError::retrieval(format!(
                "HTTP {status}: {}",
                text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: TavilySearchResponse = response
            .json()
            .await
            .map_err(|e| DeepResearchError::retrieval(format!("malformed response: {e}")))?;

        let hits: Vec<SearchHit> = parsed
            .results
            .into_iter()
            .take(max_results)
            .map(SearchHit::from)
            .collect();

        info!(
            hits = hits.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "search complete"
        );

        Ok(hits)
    }
}

/// `<base>/search`, tolerating a trailing slash on the base.
fn search_endpoint(base_url: &str) -> Result<Url> {
    let base = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&base)
        .and_then(|u| u.join("search"))
        .map_err(|e| {
            DeepResearchError::config(format!("invalid retrieval base_url '{base_url}': {e}"))
        })
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            completion_key: "or-test-key".into(),
            retrieval_key: "tv-test-key".into(),
        }
    }

    fn client_for(server: &MockServer) -> TavilyClient {
        let config = RetrievalConfig {
            base_url: server.uri(),
            ..RetrievalConfig::default()
        };
        TavilyClient::new(&config, &credentials()).expect("build client")
    }

    fn result(url: &str, content: &str, score: f64) -> serde_json::Value {
        serde_json::json!({ "title": format!("Title {url}"), "url": url, "content": content, "score": score })
    }

    #[test]
    fn search_endpoint_handles_trailing_slash() {
        assert_eq!(
            search_endpoint("https://api.tavily.com").unwrap().as_str(),
            "https://api.tavily.com/search"
        );
        assert_eq!(
            search_endpoint("http://localhost:9000/v1/").unwrap().as_str(),
            "http://localhost:9000/v1/search"
        );
        assert!(search_endpoint("::nope").is_err());
    }

    #[tokio::test]
    async fn search_returns_hits_in_provider_order() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("Authorization", "Bearer tv-test-key"))
            .and(body_partial_json(serde_json::json!({
                "query": "rust web frameworks",
                "max_results": 5,
                "search_depth": "basic"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "rust web frameworks",
                "results": [
                    result("https://b.example", "content b", 0.91),
                    result("https://a.example", "content a", 0.42),
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let hits = client_for(&server)
            .search("rust web frameworks", 5)
            .await
            .unwrap();

        let urls: Vec<&str> = hits.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, ["https://b.example", "https://a.example"]);
        assert_eq!(hits[0].content, "content b");
        assert_eq!(hits[0].title.as_deref(), Some("Title https://b.example"));
        assert_eq!(hits[1].score, Some(0.42));
    }

    #[tokio::test]
    async fn search_caps_results_locally() {
        let server = MockServer::start().await;

        let results: Vec<_> = (0..8)
            .map(|i| result(&format!("https://{i}.example"), "c", 1.0))
            .collect();

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": results })),
            )
            .mount(&server)
            .await;

        let hits = client_for(&server).search("q", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[2].url, "https://2.example");
    }

    #[tokio::test]
    async fn zero_cap_skips_the_network() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let hits = client_for(&server).search("q", 0).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = client_for(&server).search("q", 5).await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("invalid api key"));
    }

    #[tokio::test]
    async fn malformed_payload_is_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "answer": "no results field" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).search("q", 5).await.unwrap_err();
        assert!(err.to_string().contains("malformed response"));
    }
}
