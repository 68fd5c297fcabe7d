//! Typed advice payloads and the context each stage sends with a query.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Qualitative signal for the forecast stage.
///
/// Informational only: it never changes the forecast quantity, only the
/// qualitative factors, rationale, and a small confidence nudge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ForecastAdvice {
    /// Free-form qualitative factors (e.g. "flu season approaching").
    #[serde(default)]
    pub qualitative_factors: Vec<String>,
    #[serde(default)]
    pub rationale: String,
    /// Confidence in the qualitative assessment, 0-1.
    #[serde(default)]
    pub confidence: f64,
}

/// Event-driven adjustment signal for the adjustment stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentAdvice {
    /// Multiplicative factor for the anticipated event.
    pub event_adjustment: f64,
    /// Name of the event driving the factor.
    #[serde(default)]
    pub event_name: String,
    /// Confidence in the event assessment, 0-1.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub rationale: String,
}

impl AdjustmentAdvice {
    /// Neutral advice: factor 1.0 at zero confidence. Used as the
    /// fallback when the advisory service fails, so the quantity is
    /// never moved by an unavailable service.
    pub fn neutral() -> Self {
        Self {
            event_adjustment: 1.0,
            event_name: String::new(),
            confidence: 0.0,
            rationale: String::new(),
        }
    }

    /// Clamp parsed values into their valid ranges.
    pub fn clamped(mut self) -> Self {
        self.event_adjustment = self.event_adjustment.clamp(0.5, 2.0);
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}

impl Default for AdjustmentAdvice {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Supplier strategy signal for the allocation stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AllocationAdvice {
    /// "single" or "split".
    #[serde(default)]
    pub strategy: String,
    /// Supplier names to prefer when splitting, in priority order.
    #[serde(default)]
    pub preferred_suppliers: Vec<String>,
    /// Percentage shares aligned with `preferred_suppliers` (e.g. [70, 30]).
    #[serde(default)]
    pub split_ratios: Vec<f64>,
    #[serde(default)]
    pub rationale: String,
}

impl AllocationAdvice {
    pub fn recommends_split(&self) -> bool {
        self.strategy.eq_ignore_ascii_case("split")
    }
}

/// Context sent with a forecast-stage query.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastContext {
    pub item_id: String,
    pub item_name: String,
    pub category: String,
    /// Mean daily consumption over the lookback window.
    pub avg_daily: f64,
    /// Standard deviation of daily consumption.
    pub std_dev: f64,
    pub trend_factor: f64,
    pub horizon_months: u32,
    /// Date the forecast is computed for.
    pub as_of: NaiveDate,
}

/// Context sent with an adjustment-stage query.
#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentContext {
    pub item_id: String,
    pub item_name: String,
    pub category: String,
    pub forecast_quantity: u32,
    /// Calendar month 1-12.
    pub month: u32,
}

/// One scored supplier candidate, summarized for the advisory prompt.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub name: String,
    pub score: f64,
    pub lead_time_days: f64,
}

/// Context sent with an allocation-stage query.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationContext {
    pub item_id: String,
    pub item_name: String,
    pub quantity: u32,
    /// Qualifying candidates, best score first.
    pub candidates: Vec<CandidateSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_adjustment_is_noop() {
        let advice = AdjustmentAdvice::neutral();
        assert_eq!(advice.event_adjustment, 1.0);
        assert_eq!(advice.confidence, 0.0);
    }

    #[test]
    fn test_adjustment_clamping() {
        let advice = AdjustmentAdvice {
            event_adjustment: 9.0,
            event_name: "pandemic".to_string(),
            confidence: 1.7,
            rationale: String::new(),
        }
        .clamped();

        assert_eq!(advice.event_adjustment, 2.0);
        assert_eq!(advice.confidence, 1.0);
    }

    #[test]
    fn test_recommends_split_case_insensitive() {
        let advice = AllocationAdvice {
            strategy: "Split".to_string(),
            ..Default::default()
        };
        assert!(advice.recommends_split());

        let single = AllocationAdvice {
            strategy: "single".to_string(),
            ..Default::default()
        };
        assert!(!single.recommends_split());
    }

    #[test]
    fn test_forecast_advice_tolerates_missing_fields() {
        let advice: ForecastAdvice = serde_json::from_str("{}").unwrap();
        assert!(advice.qualitative_factors.is_empty());
        assert_eq!(advice.confidence, 0.0);
    }

    #[test]
    fn test_allocation_advice_parses_partial_payload() {
        let json = r#"{"strategy": "split", "preferred_suppliers": ["Alpha Pharma"]}"#;
        let advice: AllocationAdvice = serde_json::from_str(json).unwrap();
        assert!(advice.recommends_split());
        assert_eq!(advice.preferred_suppliers, vec!["Alpha Pharma"]);
        assert!(advice.split_ratios.is_empty());
    }
}
