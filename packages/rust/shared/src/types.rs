//! Core domain types threaded through the research pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DeepResearchError, Result};

/// Name of the retrieval capability advertised in tool hints.
pub const SEARCH_TOOL_NAME: &str = "tavily_search_results_json";

/// Number of content characters shown in a source preview.
pub const CONTENT_PREVIEW_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// SearchHit
// ---------------------------------------------------------------------------

/// One record returned by the retrieval service, in provider rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Provider-assigned relevance; opaque to the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

// ---------------------------------------------------------------------------
// ResearchItem
// ---------------------------------------------------------------------------

/// A retrieved source together with its derived summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchItem {
    pub url: String,
    /// Raw retrieved text.
    pub content: String,
    /// Summary derived from `content` by the completion service.
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ResearchItem {
    /// Build an item from the hit it summarizes.
    pub fn from_hit(hit: SearchHit, summary: String) -> Self {
        Self {
            url: hit.url,
            content: hit.content,
            summary,
            title: hit.title,
        }
    }

    /// First `limit` characters of the content, and whether anything was cut.
    pub fn content_preview(&self, limit: usize) -> (&str, bool) {
        match self.content.char_indices().nth(limit) {
            Some((idx, _)) => (&self.content[..idx], true),
            None => (&self.content, false),
        }
    }
}

// ---------------------------------------------------------------------------
// ToolInvocationHint
// ---------------------------------------------------------------------------

/// A (synthetic) request from the completion step to run a named tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocationHint {
    pub name: String,
    pub args: BTreeMap<String, String>,
}

impl ToolInvocationHint {
    /// Hint asking the retrieval capability to search for `query`.
    pub fn search(query: impl Into<String>) -> Self {
        Self {
            name: SEARCH_TOOL_NAME.to_string(),
            args: BTreeMap::from([("query".to_string(), query.into())]),
        }
    }

    /// The `query` argument, if present.
    pub fn query(&self) -> Option<&str> {
        self.args.get("query").map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Accumulated state for one query's run through the pipeline.
///
/// Each later field stays `None` until the step that produces it has run,
/// and a populated field is never overwritten. The setters consume the
/// state so it moves by ownership from step to step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub query: String,
    #[serde(default)]
    pub research_data: Option<Vec<ResearchItem>>,
    #[serde(default)]
    pub draft_answer: Option<String>,
    #[serde(default)]
    pub final_answer: Option<String>,
}

impl PipelineState {
    /// Initial state: only the query is known.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            research_data: None,
            draft_answer: None,
            final_answer: None,
        }
    }

    pub fn with_research_data(mut self, items: Vec<ResearchItem>) -> Result<Self> {
        if self.research_data.is_some() {
            return Err(already_set("research_data"));
        }
        self.research_data = Some(items);
        Ok(self)
    }

    pub fn with_draft_answer(mut self, draft: String) -> Result<Self> {
        if self.research_data.is_none() {
            return Err(out_of_order("draft_answer", "research_data"));
        }
        if self.draft_answer.is_some() {
            return Err(already_set("draft_answer"));
        }
        self.draft_answer = Some(draft);
        Ok(self)
    }

    pub fn with_final_answer(mut self, answer: String) -> Result<Self> {
        if self.draft_answer.is_none() {
            return Err(out_of_order("final_answer", "draft_answer"));
        }
        if self.final_answer.is_some() {
            return Err(already_set("final_answer"));
        }
        self.final_answer = Some(answer);
        Ok(self)
    }

    /// Research items collected so far (empty before the research step).
    pub fn research_items(&self) -> &[ResearchItem] {
        self.research_data.as_deref().unwrap_or_default()
    }

    /// True once every field has been populated.
    pub fn is_complete(&self) -> bool {
        self.research_data.is_some() && self.draft_answer.is_some() && self.final_answer.is_some()
    }
}

fn already_set(field: &str) -> DeepResearchError {
    DeepResearchError::validation(format!("pipeline state field `{field}` is already set"))
}

fn out_of_order(field: &str, requires: &str) -> DeepResearchError {
    DeepResearchError::validation(format!(
        "pipeline state field `{field}` cannot be set before `{requires}`"
    ))
}
