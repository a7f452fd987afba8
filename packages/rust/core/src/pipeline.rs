//! End-to-end research pipeline: query → research → draft → refine.
//!
//! The workflow is a fixed, ordered list of [`STEPS`]. Each step takes the
//! [`PipelineState`] by value and hands back the state with exactly one more
//! field populated. Any error aborts the run; nothing partial is returned.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};

use deepresearch_completion::{CompletionClient, OpenRouterClient};
use deepresearch_retrieval::{SearchClient, TavilyClient};
use deepresearch_shared::{
    AppConfig, Credentials, DeepResearchError, PipelineState, Result, ResearchItem,
    SEARCH_TOOL_NAME, ToolInvocationHint,
};

use crate::prompts;

/// Default number of search results summarized per query.
pub const DEFAULT_MAX_RESULTS: usize = 5;

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One named stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Research,
    Draft,
    Refine,
}

/// Execution order. There is no branching: every run visits each step once.
pub const STEPS: [Step; 3] = [Step::Research, Step::Draft, Step::Refine];

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Draft => "draft",
            Self::Refine => "refine",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a step begins.
    fn step_started(&self, step: Step);
    /// Called after each retrieved source has been summarized.
    fn source_summarized(&self, url: &str, current: usize, total: usize);
    /// Called once the terminal state is reached.
    fn done(&self, state: &PipelineState);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn step_started(&self, _step: Step) {}
    fn source_summarized(&self, _url: &str, _current: usize, _total: usize) {}
    fn done(&self, _state: &PipelineState) {}
}

// ---------------------------------------------------------------------------
// Query validation
// ---------------------------------------------------------------------------

/// Reject blank queries; returns the trimmed query otherwise.
pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(DeepResearchError::validation("Please enter a query."));
    }
    Ok(trimmed)
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs the research workflow against a completion and a search client.
///
/// The clients are stateless; one pipeline can serve any number of
/// sequential runs, each with its own [`PipelineState`].
#[derive(Clone)]
pub struct ResearchPipeline {
    completion: Arc<dyn CompletionClient>,
    retrieval: Arc<dyn SearchClient>,
    max_results: usize,
}

impl ResearchPipeline {
    pub fn new(completion: Arc<dyn CompletionClient>, retrieval: Arc<dyn SearchClient>) -> Self {
        Self {
            completion,
            retrieval,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Wire the HTTP clients from config.
    ///
    /// Credentials are resolved from the environment here, once; a missing
    /// key is a config error and no pipeline is built.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let credentials = Credentials::from_env(config)?;
        let completion = OpenRouterClient::new(&config.completion, &credentials)?;
        debug!(model = completion.model(), "completion client ready");
        let retrieval = TavilyClient::new(&config.retrieval, &credentials)?;

        Ok(Self::new(Arc::new(completion), Arc::new(retrieval))
            .with_max_results(config.retrieval.max_results))
    }

    /// Cap the number of retrieved sources.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Run every step in order for `query`.
    ///
    /// A blank query fails with a validation error before either client
    /// is called. The state keeps the query exactly as entered.
    #[instrument(skip_all, fields(max_results = self.max_results))]
    pub async fn run(&self, query: &str, progress: &dyn ProgressReporter) -> Result<PipelineState> {
        validate_query(query)?;
        let start = Instant::now();

        info!(query, "starting research pipeline");

        let mut state = PipelineState::new(query);
        for step in STEPS {
            progress.step_started(step);
            let step_start = Instant::now();
            state = self.run_step(step, state, progress).await?;
            info!(
                %step,
                elapsed_ms = step_start.elapsed().as_millis() as u64,
                "step complete"
            );
        }

        progress.done(&state);

        info!(
            sources = state.research_items().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "research pipeline complete"
        );

        Ok(state)
    }

    async fn run_step(
        &self,
        step: Step,
        state: PipelineState,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineState> {
        match step {
            Step::Research => self.research(state, progress).await,
            Step::Draft => self.draft(state).await,
            Step::Refine => self.refine(state).await,
        }
    }

    /// Search the web and summarize every hit, one at a time, in rank order.
    async fn research(
        &self,
        state: PipelineState,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineState> {
        let prompt = prompts::research_prompt(&state.query);
        let planned = self.completion.invoke_with_tool_hint(&prompt).await?;
        debug!(plan_len = planned.content.len(), "research plan received");

        let search_query = hinted_search_query(&planned.tool_hint)?;
        let hits = self
            .retrieval
            .search(search_query, self.max_results)
            .await?;

        let total = hits.len().min(self.max_results);
        let mut items = Vec::with_capacity(total);

        for (i, hit) in hits.into_iter().take(self.max_results).enumerate() {
            let summary = self
                .completion
                .invoke(&prompts::summarize_prompt(&hit.content))
                .await?;

            if summary.trim().is_empty() {
                return Err(DeepResearchError::completion(format!(
                    "empty summary returned for {}",
                    hit.url
                )));
            }

            progress.source_summarized(&hit.url, i + 1, total);
            items.push(ResearchItem::from_hit(hit, summary));
        }

        state.with_research_data(items)
    }

    async fn draft(&self, state: PipelineState) -> Result<PipelineState> {
        let prompt = prompts::draft_prompt(&state.query, state.research_items());
        let draft = self.completion.invoke(&prompt).await?;
        state.with_draft_answer(draft)
    }

    async fn refine(&self, state: PipelineState) -> Result<PipelineState> {
        let draft = state.draft_answer.as_deref().unwrap_or_default();
        let prompt = prompts::refine_prompt(&state.query, draft);
        let answer = self.completion.invoke(&prompt).await?;
        state.with_final_answer(answer)
    }
}

/// The search query carried by a tool hint.
fn hinted_search_query(hint: &ToolInvocationHint) -> Result<&str> {
    if hint.name != SEARCH_TOOL_NAME {
        return Err(DeepResearchError::completion(format!(
            "unsupported tool hint '{}'",
            hint.name
        )));
    }
    hint.query()
        .ok_or_else(|| DeepResearchError::completion("search tool hint has no query argument"))
}


/// The pipeline wired to the real HTTP clients, both backed by mock servers.
#[cfg(test)]
mod http_tests {
    use deepresearch_completion::OpenRouterClient;
    use deepresearch_retrieval::TavilyClient;
    use deepresearch_shared::{CompletionConfig, Credentials, RetrievalConfig};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        }))
    }

    async fn mock_completion(server: &MockServer, marker: &str, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_string_contains(marker))
            .respond_with(response)
            .mount(server)
            .await;
    }

    async fn build(completion: &MockServer, search: &MockServer) -> ResearchPipeline {
        let credentials = Credentials {
            completion_key: "or-key".into(),
            retrieval_key: "tv-key".into(),
        };
        let completion_config = CompletionConfig {
            base_url: format!("{}/chat", completion.uri()),
            ..CompletionConfig::default()
        };
        let retrieval_config = RetrievalConfig {
            base_url: search.uri(),
            ..RetrievalConfig::default()
        };

        ResearchPipeline::new(
            Arc::new(OpenRouterClient::new(&completion_config, &credentials).unwrap()),
            Arc::new(TavilyClient::new(&retrieval_config, &credentials).unwrap()),
        )
    }

    #[tokio::test]
    async fn full_run_over_http() {
        let completion = MockServer::start().await;
        let search = MockServer::start().await;

        mock_completion(&completion, "You are a research agent", reply("searching")).await;
        mock_completion(&completion, "sentences: alpha body", reply("sum-A")).await;
        mock_completion(&completion, "sentences: beta body", reply("sum-B")).await;
        mock_completion(&completion, "You are an answer drafter", reply("draft")).await;
        mock_completion(&completion, "You are a final answer refiner", reply("final")).await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_string_contains("latest AI in healthcare"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "url": "https://a.example", "content": "alpha body", "score": 0.9 },
                    { "url": "https://b.example", "content": "beta body", "score": 0.8 }
                ]
            })))
            .expect(1)
            .mount(&search)
            .await;

        let state = build(&completion, &search)
            .await
            .run("latest AI in healthcare", &SilentProgress)
            .await
            .unwrap();

        let summaries: Vec<&str> = state
            .research_items()
            .iter()
            .map(|i| i.summary.as_str())
            .collect();
        assert_eq!(summaries, ["sum-A", "sum-B"]);
        assert_eq!(state.draft_answer.as_deref(), Some("draft"));
        assert_eq!(state.final_answer.as_deref(), Some("final"));
    }

    #[tokio::test]
    async fn search_outage_stops_the_run() {
        let completion = MockServer::start().await;
        let search = MockServer::start().await;

        mock_completion(&completion, "You are a research agent", reply("searching")).await;
        Mock::given(method("POST"))
            .and(body_string_contains("You are an answer drafter"))
            .respond_with(reply("draft"))
            .expect(0)
            .mount(&completion)
            .await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&search)
            .await;

        let err = build(&completion, &search)
            .await
            .run("anything", &SilentProgress)
            .await
            .unwrap_err();

        assert!(err.is_upstream());
        assert!(err.to_string().contains("502"));
    }
}
