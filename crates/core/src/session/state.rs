//! The mutable state threaded through a generation run.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stages::{AdjustedQuantity, ItemForecast, SupplierAllocation};

use super::types::{ProgressRecord, ReasoningTrace, RunStatus, StageName};

/// All mutable state for one generation run.
///
/// Created once by the generator, passed `&mut` through each stage in
/// sequence, and discarded after the response is built. There are no
/// process-wide singletons; concurrent runs each own an independent state.
///
/// Invariant: each result map contains an entry for every item that
/// reached that stage. Stages never remove entries; items whose id is
/// unknown are skipped with a decision-point note instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: String,
    pub status: RunStatus,
    /// Populated when status is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub progress: ProgressRecord,
    /// Append-only per-stage reasoning traces.
    pub traces: Vec<ReasoningTrace>,
    /// Forecast results keyed by item id.
    pub forecasts: HashMap<String, ItemForecast>,
    /// Adjustment results keyed by item id.
    pub adjustments: HashMap<String, AdjustedQuantity>,
    /// Allocation results keyed by item id.
    pub allocations: HashMap<String, SupplierAllocation>,
    /// Informational messages accumulated during the run.
    pub messages: Vec<String>,
}

impl PipelineState {
    pub fn new(run_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            status: RunStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
            progress: ProgressRecord::default(),
            traces: Vec::new(),
            forecasts: HashMap::new(),
            adjustments: HashMap::new(),
            allocations: HashMap::new(),
            messages: Vec::new(),
        }
    }

    /// Transition into a stage, updating status and the progress record.
    pub fn begin_stage(&mut self, stage: StageName) {
        let all = StageName::all();
        let idx = all.iter().position(|s| *s == stage).unwrap_or(0);

        self.status = RunStatus::Processing { stage };
        self.progress = ProgressRecord {
            stage: stage.label().to_string(),
            action: stage.action().to_string(),
            percent: stage.percent(),
            completed_stages: all[..idx].iter().map(|s| s.label().to_string()).collect(),
            remaining_stages: all[idx..].iter().map(|s| s.label().to_string()).collect(),
        };
        self.touch();
    }

    /// Mark the run completed and the progress record fully done.
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.progress.stage = "completed".to_string();
        self.progress.action = "Done".to_string();
        self.progress.percent = 100;
        self.progress.completed_stages =
            StageName::all().iter().map(|s| s.label().to_string()).collect();
        self.progress.remaining_stages.clear();
        self.touch();
    }

    /// Mark the run failed. Remaining stages stay in `remaining_stages`
    /// so callers can see where the run stopped.
    pub fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.status = RunStatus::Failed {
            error: error.clone(),
        };
        self.error = Some(error);
        self.progress.action = "Failed".to_string();
        self.progress.percent = 100;
        self.touch();
    }

    pub fn push_trace(&mut self, trace: ReasoningTrace) {
        self.traces.push(trace);
        self.touch();
    }

    /// Latest trace recorded for the given stage, if any.
    pub fn latest_trace(&self, stage: StageName) -> Option<&ReasoningTrace> {
        self.traces.iter().rev().find(|t| t.stage == stage.label())
    }

    pub fn push_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Stage result maps that are empty after finalize. A non-empty return
    /// means the run is incomplete even though no stage returned an error.
    pub fn empty_stages(&self) -> Vec<StageName> {
        let mut missing = Vec::new();
        if self.forecasts.is_empty() {
            missing.push(StageName::Forecasting);
        }
        if self.adjustments.is_empty() {
            missing.push(StageName::Adjusting);
        }
        if self.allocations.is_empty() {
            missing.push(StageName::Allocating);
        }
        missing
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
