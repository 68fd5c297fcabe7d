//! The three computation stages of the replenishment pipeline.
//!
//! Stages run strictly in sequence over the shared [`PipelineState`](crate::session::PipelineState):
//!
//! 1. **Forecast**: statistical demand baseline per item.
//! 2. **Adjustment**: calendar/category factors plus a confidence-weighted
//!    advisory event factor, bounded and pack-rounded.
//! 3. **Allocation**: supplier scoring and single-vs-split order decisions.
//!
//! Each stage consults the advisory service through its own timeout and
//! fallback; items are processed in a loop, not fanned out.

mod adjustment;
mod allocation;
mod forecast;
mod types;
mod util;

use thiserror::Error;

pub use adjustment::{AdjustmentConfig, AdjustmentStage};
pub use allocation::{AllocationConfig, AllocationStage};
pub use forecast::{ForecastConfig, ForecastStage};
pub use types::{
    AdjustedQuantity, AllocationLine, AllocationStrategy, ItemForecast, NamedFactor,
    SupplierAllocation,
};
pub use util::round_to_pack;

/// Errors a stage can surface to the orchestrator.
///
/// Advisory and input problems are absorbed inside the stages; this is
/// the seam for genuinely unexpected conditions, which the orchestrator
/// converts into a failed run instead of crashing.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} stage failed: {message}")]
    Internal {
        stage: &'static str,
        message: String,
    },
}
