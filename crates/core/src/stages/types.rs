//! Result types produced by the three computation stages.

use serde::{Deserialize, Serialize};

/// Demand forecast for one item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemForecast {
    /// Forecast quantity, rounded to a pack-size multiple.
    pub quantity: u32,
    /// Method used: "statistical" or "simple" (no-history fallback).
    pub method: String,
    /// Mean daily consumption over the lookback window.
    pub avg_daily: f64,
    /// Recent-vs-prior consumption ratio; 1.0 = flat.
    pub trend_factor: f64,
    /// Variability buffer applied to the baseline, capped at 1.3.
    pub safety_multiplier: f64,
    /// Confidence in the forecast, 0-1.
    pub confidence: f64,
    /// Qualitative factors reported by the advisory service (informational).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualitative_factors: Vec<String>,
    /// Human-readable explanation of the forecast.
    pub rationale: String,
}

/// A single named multiplicative adjustment factor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedFactor {
    pub name: String,
    pub value: f64,
}

impl NamedFactor {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Contextually adjusted order quantity for one item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustedQuantity {
    /// Quantity coming out of the forecast stage.
    pub original_quantity: u32,
    /// Quantity after adjustment, pack-rounded and bounded.
    pub adjusted_quantity: u32,
    /// Factors that were applied, in application order.
    pub factors: Vec<NamedFactor>,
    /// Product of all factors, clamped to [0.5, 2.0].
    pub total_factor: f64,
    /// Confidence in the adjustment, 0-1.
    pub confidence: f64,
    /// Human-readable explanation listing each non-unity factor.
    pub rationale: String,
}

/// How an item's order is distributed across suppliers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// Entire quantity goes to the top-scored supplier.
    Single,
    /// Quantity is split across multiple suppliers.
    Split,
}

impl AllocationStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            AllocationStrategy::Single => "single",
            AllocationStrategy::Split => "split",
        }
    }
}

/// One supplier's share of an item's order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationLine {
    pub supplier_id: String,
    pub supplier_name: String,
    pub quantity: u32,
    /// Unit price for this supplier (non-primary suppliers carry a markup).
    pub unit_price: f64,
    pub lead_time_days: f64,
    /// quantity * unit_price.
    pub subtotal: f64,
}

/// Supplier allocation decision for one item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupplierAllocation {
    /// Per-supplier allocations; their quantities sum exactly to the
    /// adjusted quantity.
    pub allocations: Vec<AllocationLine>,
    /// Sum of subtotals.
    pub total_cost: f64,
    /// Quantity-weighted average lead time.
    pub avg_lead_time_days: f64,
    pub strategy: AllocationStrategy,
    /// Human-readable explanation of the strategy and shares.
    pub rationale: String,
}

impl SupplierAllocation {
    /// Total allocated quantity across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.allocations.iter().map(|a| a.quantity).sum()
    }
}
