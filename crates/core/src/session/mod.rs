//! Run state, progress reporting, and reasoning traces.
//!
//! A generation run owns a single [`PipelineState`] that is mutated in
//! place by each stage. Progress flows to the caller through a
//! [`ProgressHandle`]; the audit-style [`ReasoningTrace`] records explain
//! each stage's decisions independently of the numeric results.

mod progress;
mod state;
mod types;

pub use progress::{ProgressHandle, ProgressUpdate};
pub use state::PipelineState;
pub use types::{ProgressRecord, ReasoningTrace, RunStatus, StageName};
