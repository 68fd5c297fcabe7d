//! Request, response, and error types for the generation pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{ConsumptionSample, MedicationItem, Supplier};
use crate::session::{ProgressRecord, RunStatus};
use crate::stages::{AdjustedQuantity, ItemForecast, StageError, SupplierAllocation};

/// Internal error for a generation run.
///
/// Never escapes the generator: it is converted into a `Failed` response
/// status so callers always receive a response.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The overall run deadline expired.
    #[error("timeout — generation took too long")]
    Timeout,

    /// Finalize found stage result maps with no entries.
    #[error("finalize found no results from: {0}")]
    Incomplete(String),

    /// A stage failed.
    #[error(transparent)]
    Stage(#[from] StageError),
}

/// Inputs for one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Items to replenish.
    pub items: Vec<MedicationItem>,
    /// Live stock counts, overriding the catalog snapshot where present.
    #[serde(default)]
    pub current_stock: HashMap<String, u32>,
    /// Consumption history per item id, most-recent-last.
    #[serde(default)]
    pub history: HashMap<String, Vec<ConsumptionSample>>,
    /// Suppliers available for allocation.
    pub suppliers: Vec<Supplier>,
    /// Caller-supplied run id; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl GenerationRequest {
    pub fn new(items: Vec<MedicationItem>, suppliers: Vec<Supplier>) -> Self {
        Self {
            items,
            current_stock: HashMap::new(),
            history: HashMap::new(),
            suppliers,
            run_id: None,
        }
    }

    pub fn with_history(mut self, history: HashMap<String, Vec<ConsumptionSample>>) -> Self {
        self.history = history;
        self
    }

    pub fn with_current_stock(mut self, stock: HashMap<String, u32>) -> Self {
        self.current_stock = stock;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

/// One purchase-order line in the response, flattened from the per-item
/// supplier allocations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub item_id: String,
    pub item_name: String,
    pub supplier_id: String,
    pub supplier_name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub lead_time_days: f64,
    pub subtotal: f64,
}

/// Latest reasoning summary for one stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageSummary {
    pub stage: String,
    pub output_summary: String,
    pub confidence: f64,
    pub decision_points: Vec<String>,
}

/// Aggregate numbers for the response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResponseMetadata {
    pub total_line_items: usize,
    pub total_cost: f64,
    /// Quantity-weighted average lead time across all order lines.
    pub avg_lead_time_days: f64,
    /// Wall-clock duration of the run in milliseconds.
    pub generation_ms: u64,
}

/// The result of a generation run.
///
/// Always produced, whatever happened: failures are encoded in `status`
/// and `error`, never raised to the caller. `Failed` is non-retryable
/// for this run id; construct a new run instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Flattened purchase-order lines. Empty on failure.
    pub order_lines: Vec<OrderLine>,
    /// Forecast results keyed by item id.
    pub forecasts: HashMap<String, ItemForecast>,
    /// Adjustment results keyed by item id.
    pub adjustments: HashMap<String, AdjustedQuantity>,
    /// Allocation results keyed by item id.
    pub allocations: HashMap<String, SupplierAllocation>,
    /// Latest reasoning summary per stage, in stage order.
    pub reasoning: Vec<StageSummary>,
    pub progress: ProgressRecord,
    /// Informational message log.
    pub messages: Vec<String>,
    pub metadata: ResponseMetadata,
}
