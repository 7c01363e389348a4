pub mod avatar;
pub mod cache_commands;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod domain_utils;
pub mod geo;
pub mod hashing;
pub mod logger;
pub mod metadata;
pub mod model;
pub mod org_normalizer;
pub mod pipeline;
pub mod result_cache;
pub mod retry;
pub mod run_supervisor;

pub use model::AnalysisResult;
pub use pipeline::{AnalysisPipeline, PipelineError, RunOutcome};
