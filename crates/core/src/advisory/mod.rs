//! Advisory service integration.
//!
//! Each pipeline stage may consult an external qualitative-judgment
//! provider (an LLM) for signals the statistics cannot capture. The
//! service is opaque beyond its request/response contract:
//!
//! - forecast stage: qualitative factors + rationale (informational only)
//! - adjustment stage: a single event adjustment factor with confidence
//! - allocation stage: single-vs-split strategy and supplier preferences
//!
//! Responses wrapped in code fences or prose are tolerated; a truly
//! unparsable response is retried exactly once with a stricter
//! instruction, after which the stage falls back to its deterministic
//! default. Advisory failures never fail the pipeline.

mod client;
mod config;
mod json;
mod llm;
mod traits;
mod types;

pub use client::{create_advisory_client, LlmAdvisory};
pub use config::{AdvisoryConfig, AdvisoryProvider};
pub use json::extract_json_object;
pub use llm::{
    AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, OllamaClient,
};
pub use traits::{AdvisoryClient, AdvisoryError};
pub use types::{
    AdjustmentAdvice, AdjustmentContext, AllocationAdvice, AllocationContext, CandidateSummary,
    ForecastAdvice, ForecastContext,
};
