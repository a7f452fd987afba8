//! Core research pipeline for DeepResearch.
//!
//! Ties the completion and retrieval clients together into the fixed
//! research → draft → refine workflow (see [`pipeline::ResearchPipeline`]).

pub mod pipeline;
pub mod prompts;

pub use pipeline::{
    DEFAULT_MAX_RESULTS, ProgressReporter, ResearchPipeline, STEPS, SilentProgress, Step,
    validate_query,
};
