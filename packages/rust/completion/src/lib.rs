//! Completion client: turns a prompt into generated text.
//!
//! [`CompletionClient`] is the seam the pipeline depends on;
//! [`OpenRouterClient`] is the HTTP implementation speaking the
//! OpenAI-compatible chat-completions protocol.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use deepresearch_shared::{
    CompletionConfig, Credentials, DeepResearchError, Result, ToolInvocationHint,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("DeepResearch/", env!("CARGO_PKG_VERSION"));

/// How much of an error body is echoed back in error messages.
const ERROR_BODY_PREVIEW: usize = 200;

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// Response from a tool-hinted invocation.
#[derive(Debug, Clone)]
pub struct HintedCompletion {
    pub content: String,
    pub tool_hint: ToolInvocationHint,
}

/// Sends prompts to a text-generation service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `prompt` as a single user message and return the reply text.
    async fn invoke(&self, prompt: &str) -> Result<String>;

    /// Invoke, then attach a tool hint asking for a web search.
    ///
    /// The service has no native tool calling, so the hint is fixed: it
    /// always names the search capability and carries `prompt` verbatim
    /// as the query.
    async fn invoke_with_tool_hint(&self, prompt: &str) -> Result<HintedCompletion> {
        let content = self.invoke(prompt).await?;
        Ok(HintedCompletion {
            content,
            tool_hint: ToolInvocationHint::search(prompt),
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// OpenRouter client
// ---------------------------------------------------------------------------

/// Chat-completions client for OpenRouter (or any compatible endpoint).
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    referer: String,
    app_title: String,
}

impl OpenRouterClient {
    /// Build a client from config and the already-resolved credentials.
    pub fn new(config: &CompletionConfig, credentials: &Credentials) -> Result<Self> {
        let endpoint = Url::parse(&config.base_url).map_err(|e| {
            DeepResearchError::config(format!(
                "invalid completion base_url '{}': {e}",
                config.base_url
            ))
        })?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeepResearchError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            api_key: credentials.completion_key.clone(),
            model: config.model.clone(),
            referer: config.referer.clone(),
            app_title: config.app_title.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn invoke(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.app_title)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeepResearchError::completion(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DeepResearchError::completion(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(DeepResearchError::completion(format!(
                "HTTP {status}: {}",
                preview(&text)
            )));
        }

        let content = parse_reply(&text)?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            reply_len = content.len(),
            "completion received"
        );

        Ok(content)
    }
}

/// Extract `choices[0].message.content` from a response body.
fn parse_reply(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        DeepResearchError::completion(format!("malformed response: {e} (got: {})", preview(body)))
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            DeepResearchError::completion(format!(
                "malformed response: missing choices[0].message.content (got: {})",
                preview(body)
            ))
        })
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use deepresearch_shared::SEARCH_TOOL_NAME;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            completion_key: "or-test-key".into(),
            retrieval_key: "tv-test-key".into(),
        }
    }

    fn client_for(server: &MockServer) -> OpenRouterClient {
        let config = CompletionConfig {
            base_url: format!("{}/api/v1/chat/completions", server.uri()),
            ..CompletionConfig::default()
        };
        OpenRouterClient::new(&config, &credentials()).expect("build client")
    }

    fn reply(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "gen-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
    }

    #[test]
    fn parse_reply_extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"content":"first"}},{"message":{"content":"second"}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "first");
    }

    #[test]
    fn parse_reply_rejects_missing_content() {
        for body in [
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"error":{"message":"overloaded"}}"#,
        ] {
            let err = parse_reply(body).unwrap_err();
            assert!(err.is_upstream(), "{body}");
            assert!(err.to_string().contains("missing choices[0].message.content"));
        }
    }

    #[test]
    fn parse_reply_rejects_non_json() {
        let err = parse_reply("<html>gateway</html>").unwrap_err();
        assert!(err.to_string().contains("malformed response"));
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let config = CompletionConfig {
            base_url: "not a url".into(),
            ..CompletionConfig::default()
        };
        let err = OpenRouterClient::new(&config, &credentials()).unwrap_err();
        assert!(matches!(err, DeepResearchError::Config { .. }));
    }

    #[tokio::test]
    async fn invoke_sends_chat_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("Authorization", "Bearer or-test-key"))
            .and(header("X-Title", "Deep Research System"))
            .and(header("HTTP-Referer", "http://localhost"))
            .and(body_partial_json(serde_json::json!({
                "model": "thudm/glm-4-32b:free",
                "messages": [{ "role": "user", "content": "Say hi" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("hi there")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let text = client.invoke("Say hi").await.unwrap();
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn configured_model_is_sent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "model": "openai/gpt-4o-mini" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let config = CompletionConfig {
            base_url: format!("{}/api/v1/chat/completions", server.uri()),
            model: "openai/gpt-4o-mini".into(),
            ..CompletionConfig::default()
        };
        let client = OpenRouterClient::new(&config, &credentials()).unwrap();

        assert_eq!(client.model(), "openai/gpt-4o-mini");
        assert_eq!(client.invoke("hi").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn invoke_fails_on_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.invoke("anything").await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn tool_hint_names_search_and_echoes_prompt() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("I will search.")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let hinted = client
            .invoke_with_tool_hint("gather info on rust")
            .await
            .unwrap();

        assert_eq!(hinted.content, "I will search.");
        assert_eq!(hinted.tool_hint.name, SEARCH_TOOL_NAME);
        assert_eq!(hinted.tool_hint.query(), Some("gather info on rust"));
    }
}
