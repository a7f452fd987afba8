//! Shared types, error model, and configuration for DeepResearch.
//!
//! This crate is the foundation depended on by all other DeepResearch crates.
//! It provides:
//! - [`DeepResearchError`], the unified error type
//! - Pipeline types ([`PipelineState`], [`ResearchItem`], [`SearchHit`], [`ToolInvocationHint`])
//! - Configuration ([`AppConfig`], [`Credentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompletionConfig, Credentials, RetrievalConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{DeepResearchError, Result, Service};
pub use types::{
    CONTENT_PREVIEW_CHARS, PipelineState, ResearchItem, SEARCH_TOOL_NAME, SearchHit,
    ToolInvocationHint,
};
