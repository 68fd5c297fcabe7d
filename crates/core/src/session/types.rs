//! Run status, progress, and reasoning-trace types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Forecasting,
    Adjusting,
    Allocating,
    Finalizing,
}

impl StageName {
    /// All stages in execution order.
    pub fn all() -> [StageName; 4] {
        [
            StageName::Forecasting,
            StageName::Adjusting,
            StageName::Allocating,
            StageName::Finalizing,
        ]
    }

    /// Stable string label (used in progress records and trace keys).
    pub fn label(&self) -> &'static str {
        match self {
            StageName::Forecasting => "forecasting",
            StageName::Adjusting => "adjusting",
            StageName::Allocating => "allocating",
            StageName::Finalizing => "finalizing",
        }
    }

    /// Human-readable action text shown to callers while the stage runs.
    pub fn action(&self) -> &'static str {
        match self {
            StageName::Forecasting => "Forecasting demand from consumption history",
            StageName::Adjusting => "Applying contextual adjustments",
            StageName::Allocating => "Scoring suppliers and splitting orders",
            StageName::Finalizing => "Assembling purchase-order proposal",
        }
    }

    /// Percent-complete checkpoint reported when the stage begins.
    pub fn percent(&self) -> u8 {
        match self {
            StageName::Forecasting => 10,
            StageName::Adjusting => 40,
            StageName::Allocating => 70,
            StageName::Finalizing => 90,
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Current status of a generation run.
///
/// State machine flow:
/// ```text
/// Pending -> Processing(forecasting -> adjusting -> allocating -> finalizing)
///         -> Completed | Failed
/// ```
/// Transitions are strictly linear; a stage failure short-circuits to
/// `Failed` and remaining stages are skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunStatus {
    /// Run created, no stage started yet.
    Pending,
    /// A stage is executing.
    Processing { stage: StageName },
    /// All stages finished and the completeness check passed (terminal).
    Completed,
    /// The run failed; not retryable under the same run id (terminal).
    Failed { error: String },
}

impl RunStatus {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunStatus::Failed { .. })
    }

    /// Returns the status type as a string (for filtering and logs).
    pub fn status_type(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Processing { .. } => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Failed { .. } => "failed",
        }
    }
}

/// Caller-visible progress of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressRecord {
    /// Label of the stage currently executing (or last executed).
    pub stage: String,
    /// Human-readable description of the current action.
    pub action: String,
    /// Percent complete, 0-100.
    pub percent: u8,
    /// Stages that have finished, in order.
    pub completed_stages: Vec<String>,
    /// Stages not yet started, in order.
    pub remaining_stages: Vec<String>,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            stage: "pending".to_string(),
            action: "Queued".to_string(),
            percent: 0,
            completed_stages: Vec::new(),
            remaining_stages: StageName::all().iter().map(|s| s.label().to_string()).collect(),
        }
    }
}

/// Structured record of the decisions one stage made during a run.
///
/// Traces are append-only and independent of the numeric results: they
/// exist so a pharmacist can audit why a quantity was proposed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningTrace {
    /// Label of the stage that produced this trace.
    pub stage: String,
    pub timestamp: DateTime<Utc>,
    /// Short description of the stage's input.
    pub input_summary: String,
    /// Ordered decision points, including skip notes for unknown item ids.
    pub decision_points: Vec<String>,
    /// Short description of the stage's output.
    pub output_summary: String,
    /// Stage-level confidence, 0-1.
    pub confidence: f64,
}

impl ReasoningTrace {
    /// Start a trace for a stage; decisions and the output summary are
    /// filled in as the stage runs.
    pub fn new(stage: StageName, input_summary: impl Into<String>) -> Self {
        Self {
            stage: stage.label().to_string(),
            timestamp: Utc::now(),
            input_summary: input_summary.into(),
            decision_points: Vec::new(),
            output_summary: String::new(),
            confidence: 0.0,
        }
    }

    pub fn push_decision(&mut self, decision: impl Into<String>) {
        self.decision_points.push(decision.into());
    }

    pub fn finish(&mut self, output_summary: impl Into<String>, confidence: f64) {
        self.output_summary = output_summary.into();
        self.confidence = confidence;
    }
}
