//! The advisory capability trait.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{
    AdjustmentAdvice, AdjustmentContext, AllocationAdvice, AllocationContext, ForecastAdvice,
    ForecastContext,
};

/// Errors that can occur while querying the advisory service.
///
/// These never surface to pipeline callers: each stage absorbs them by
/// falling back to its deterministic default advice.
#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Unparsable advisory response: {0}")]
    Unparsable(String),

    #[error("Advisory call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Advisory service not configured")]
    NotConfigured,
}

/// Qualitative-judgment provider consulted by each stage.
///
/// The service is opaque beyond this contract; implementations own their
/// transport, parsing tolerance, and retry policy. The numeric core only
/// sees typed advice or an error it maps to a stage-defined default.
#[async_trait]
pub trait AdvisoryClient: Send + Sync {
    /// Name of this client for logging and rationale text.
    fn name(&self) -> &str;

    /// Qualitative demand factors for the forecast stage.
    async fn forecast_advice(
        &self,
        context: &ForecastContext,
    ) -> Result<ForecastAdvice, AdvisoryError>;

    /// Event-driven adjustment factor for the adjustment stage.
    async fn adjustment_advice(
        &self,
        context: &AdjustmentContext,
    ) -> Result<AdjustmentAdvice, AdvisoryError>;

    /// Supplier strategy recommendation for the allocation stage.
    async fn allocation_advice(
        &self,
        context: &AllocationContext,
    ) -> Result<AllocationAdvice, AdvisoryError>;
}
