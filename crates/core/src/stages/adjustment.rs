//! Contextual adjustment stage.
//!
//! Multiplies each forecast by deterministic calendar and category
//! factors, blends in a confidence-weighted advisory event factor, and
//! bounds the result: the total factor is clamped to [0.5, 2.0], the
//! quantity is pack-rounded, floored at a two-pack minimum order, and
//! capped by the storage ceiling.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::advisory::{AdjustmentAdvice, AdjustmentContext, AdvisoryClient};
use crate::catalog::MedicationItem;
use crate::session::{PipelineState, ReasoningTrace, StageName};

use super::util::round_to_pack;
use super::{AdjustedQuantity, NamedFactor, StageError};

/// Bounds on the combined adjustment factor.
const MIN_TOTAL_FACTOR: f64 = 0.5;
const MAX_TOTAL_FACTOR: f64 = 2.0;

/// Advisory factors below this confidence are applied but not named in
/// the factor breakdown.
const ADVISORY_REPORT_THRESHOLD: f64 = 0.3;

/// Minimum order, in packs.
const MIN_ORDER_PACKS: u32 = 2;

/// Configuration for the adjustment stage.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdjustmentConfig {
    /// Calendar month (1-12) to seasonal factor. Months absent from the
    /// table contribute no factor. Serialized with string keys because
    /// TOML tables cannot carry integer keys.
    #[serde(default = "default_seasonal_factors", with = "month_table")]
    pub seasonal_factors: HashMap<u32, f64>,
    /// Months considered flu season.
    #[serde(default = "default_flu_months")]
    pub flu_months: HashSet<u32>,
    /// Boost applied during flu season to matching categories.
    #[serde(default = "default_flu_boost")]
    pub flu_boost: f64,
    /// Category keywords that qualify for the flu-season boost.
    #[serde(default = "default_flu_categories")]
    pub flu_categories: Vec<String>,
    /// Reduction applied in December.
    #[serde(default = "default_holiday_reduction")]
    pub holiday_reduction: f64,
    /// Reduction applied June-August to non-chronic categories.
    #[serde(default = "default_summer_reduction")]
    pub summer_reduction: f64,
}

fn default_seasonal_factors() -> HashMap<u32, f64> {
    HashMap::from([(1, 1.15), (2, 1.10), (10, 1.05), (11, 1.10), (12, 1.15)])
}

/// Serde adapter for month-keyed tables with string keys.
mod month_table {
    use std::collections::HashMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        table: &HashMap<u32, f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let by_name: HashMap<String, f64> =
            table.iter().map(|(month, f)| (month.to_string(), *f)).collect();
        by_name.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<u32, f64>, D::Error> {
        let by_name = HashMap::<String, f64>::deserialize(deserializer)?;
        by_name
            .into_iter()
            .map(|(month, f)| {
                month
                    .parse::<u32>()
                    .map(|m| (m, f))
                    .map_err(|_| serde::de::Error::custom(format!("invalid month key '{}'", month)))
            })
            .collect()
    }
}

fn default_flu_months() -> HashSet<u32> {
    HashSet::from([10, 11, 12, 1, 2, 3])
}

fn default_flu_boost() -> f64 {
    1.25
}

fn default_flu_categories() -> Vec<String> {
    vec![
        "respiratory".to_string(),
        "antibiotic".to_string(),
        "cold".to_string(),
        "flu".to_string(),
    ]
}

fn default_holiday_reduction() -> f64 {
    0.9
}

fn default_summer_reduction() -> f64 {
    0.85
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            seasonal_factors: default_seasonal_factors(),
            flu_months: default_flu_months(),
            flu_boost: default_flu_boost(),
            flu_categories: default_flu_categories(),
            holiday_reduction: default_holiday_reduction(),
            summer_reduction: default_summer_reduction(),
        }
    }
}

/// The adjustment stage.
pub struct AdjustmentStage {
    config: AdjustmentConfig,
    advisory: Option<Arc<dyn AdvisoryClient>>,
}

impl AdjustmentStage {
    pub fn new(config: AdjustmentConfig) -> Self {
        Self {
            config,
            advisory: None,
        }
    }

    pub fn with_advisory(mut self, advisory: Arc<dyn AdvisoryClient>) -> Self {
        self.advisory = Some(advisory);
        self
    }

    /// Adjust every forecast item for the given calendar month (1-12).
    pub async fn run(
        &self,
        items: &[MedicationItem],
        month: u32,
        state: &mut PipelineState,
    ) -> Result<(), StageError> {
        let mut trace = ReasoningTrace::new(
            StageName::Adjusting,
            format!("{} forecasts, month {}", state.forecasts.len(), month),
        );

        let mut advisory_confidences = Vec::new();

        // Iterate the item list, not the map, for deterministic order.
        for item in items {
            let Some(forecast) = state.forecasts.get(&item.id) else {
                continue;
            };
            let original = forecast.quantity;

            let mut factors = self.rule_factors(item, month);

            let advice = match &self.advisory {
                Some(advisory) => {
                    let context = AdjustmentContext {
                        item_id: item.id.clone(),
                        item_name: item.name.clone(),
                        category: item.category.clone(),
                        forecast_quantity: original,
                        month,
                    };
                    match advisory.adjustment_advice(&context).await {
                        Ok(advice) => advice,
                        Err(e) => {
                            tracing::warn!(item = %item.id, "Adjustment advisory failed: {}", e);
                            trace.push_decision(format!(
                                "{}: advisory unavailable ({}), event factor neutral",
                                item.id, e
                            ));
                            AdjustmentAdvice::neutral()
                        }
                    }
                }
                None => AdjustmentAdvice::neutral(),
            };

            // Pull the event factor toward neutral by its confidence, so a
            // low-confidence signal barely moves the order.
            let weighted = 1.0 + (advice.event_adjustment - 1.0) * advice.confidence;
            if advice.confidence > ADVISORY_REPORT_THRESHOLD {
                let name = if advice.event_name.is_empty() {
                    "event_adjustment".to_string()
                } else {
                    format!("event:{}", advice.event_name)
                };
                factors.push(NamedFactor::new(name, weighted));
            }
            advisory_confidences.push(advice.confidence);

            let raw_total: f64 = factors.iter().map(|f| f.value).product::<f64>()
                * if advice.confidence <= ADVISORY_REPORT_THRESHOLD {
                    weighted
                } else {
                    1.0
                };
            let total = raw_total.clamp(MIN_TOTAL_FACTOR, MAX_TOTAL_FACTOR);

            let mut adjusted = round_to_pack(original as f64 * total, item.pack_size);
            adjusted = adjusted.max(MIN_ORDER_PACKS * item.pack_size);
            if let Some(max_stock) = item.max_stock {
                adjusted = adjusted.min(max_stock.saturating_sub(item.current_stock));
            }

            let rationale = build_rationale(&factors, total, &advice);
            trace.push_decision(format!(
                "{}: {} -> {} units (factor x{:.2})",
                item.id, original, adjusted, total
            ));

            state.adjustments.insert(
                item.id.clone(),
                AdjustedQuantity {
                    original_quantity: original,
                    adjusted_quantity: adjusted,
                    factors,
                    total_factor: total,
                    confidence: 0.75 + advice.confidence * 0.25,
                    rationale,
                },
            );
        }

        let avg_confidence = if advisory_confidences.is_empty() {
            0.75
        } else {
            0.75 + advisory_confidences.iter().sum::<f64>() / advisory_confidences.len() as f64
                * 0.25
        };
        trace.finish(
            format!("{} quantities adjusted", state.adjustments.len()),
            avg_confidence,
        );
        state.push_trace(trace);

        Ok(())
    }

    /// Deterministic calendar and category factors, in application order.
    fn rule_factors(&self, item: &MedicationItem, month: u32) -> Vec<NamedFactor> {
        let mut factors = Vec::new();
        let category = item.category.to_lowercase();

        if let Some(&seasonal) = self.config.seasonal_factors.get(&month) {
            factors.push(NamedFactor::new("seasonal", seasonal));
        }

        let flu_category = self
            .config
            .flu_categories
            .iter()
            .any(|kw| category.contains(kw.as_str()));
        if self.config.flu_months.contains(&month) && flu_category {
            factors.push(NamedFactor::new("flu_season", self.config.flu_boost));
        }

        if month == 12 {
            factors.push(NamedFactor::new(
                "holiday_reduction",
                self.config.holiday_reduction,
            ));
        }

        if (6..=8).contains(&month) && !category.contains("chronic") {
            factors.push(NamedFactor::new(
                "summer_reduction",
                self.config.summer_reduction,
            ));
        }

        if category.contains("chronic") {
            factors.push(NamedFactor::new("category_stability", 1.0));
        } else if category.contains("intermittent") {
            factors.push(NamedFactor::new("category_stability", 1.1));
        } else if category.contains("sporadic") {
            factors.push(NamedFactor::new("category_stability", 1.2));
        }

        factors
    }
}

/// List each non-unity factor as a signed percentage.
fn build_rationale(factors: &[NamedFactor], total: f64, advice: &AdjustmentAdvice) -> String {
    let mut parts: Vec<String> = factors
        .iter()
        .filter(|f| (f.value - 1.0).abs() > f64::EPSILON)
        .map(|f| format!("{} {:+.0}%", f.name, (f.value - 1.0) * 100.0))
        .collect();

    if parts.is_empty() {
        parts.push("no adjustments".to_string());
    }

    let mut rationale = format!("{}; total x{:.2}", parts.join(", "), total);
    if advice.confidence > ADVISORY_REPORT_THRESHOLD && !advice.rationale.is_empty() {
        rationale.push_str(&format!("; advisory: {}", advice.rationale));
    }
    rationale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::ItemForecast;

    fn item(category: &str) -> MedicationItem {
        MedicationItem::new("med-1", "Test Med")
            .with_category(category)
            .with_pack_size(30)
            .with_stock_levels(40, 50, 20)
            .with_avg_daily_consumption(10.0)
    }

    fn state_with_forecast(quantity: u32) -> PipelineState {
        let mut state = PipelineState::new("run-1");
        state.forecasts.insert(
            "med-1".to_string(),
            ItemForecast {
                quantity,
                method: "statistical".to_string(),
                avg_daily: 10.0,
                trend_factor: 1.0,
                safety_multiplier: 1.0,
                confidence: 0.75,
                qualitative_factors: vec![],
                rationale: String::new(),
            },
        );
        state
    }

    fn stage() -> AdjustmentStage {
        AdjustmentStage::new(AdjustmentConfig::default())
    }

    #[test]
    fn test_flu_boost_applies_to_matching_category_in_season() {
        let factors = stage().rule_factors(&item("antibiotic"), 11);
        assert!(factors.iter().any(|f| f.name == "flu_season"));

        // Same month, unrelated category.
        let factors = stage().rule_factors(&item("dermatology"), 11);
        assert!(!factors.iter().any(|f| f.name == "flu_season"));

        // Matching category outside flu season.
        let factors = stage().rule_factors(&item("antibiotic"), 5);
        assert!(!factors.iter().any(|f| f.name == "flu_season"));
    }

    #[test]
    fn test_december_gets_holiday_reduction() {
        let factors = stage().rule_factors(&item("dermatology"), 12);
        assert!(factors.iter().any(|f| f.name == "holiday_reduction"));
    }

    #[test]
    fn test_summer_reduction_spares_chronic_categories() {
        let factors = stage().rule_factors(&item("dermatology"), 7);
        assert!(factors.iter().any(|f| f.name == "summer_reduction"));

        let factors = stage().rule_factors(&item("chronic cardiovascular"), 7);
        assert!(!factors.iter().any(|f| f.name == "summer_reduction"));
    }

    #[test]
    fn test_category_stability_factors() {
        let get = |category: &str| -> Option<f64> {
            stage()
                .rule_factors(&item(category), 5)
                .iter()
                .find(|f| f.name == "category_stability")
                .map(|f| f.value)
        };

        assert_eq!(get("chronic cardiovascular"), Some(1.0));
        assert_eq!(get("intermittent pain relief"), Some(1.1));
        assert_eq!(get("sporadic emergency"), Some(1.2));
        assert_eq!(get("dermatology"), None);
    }

    #[tokio::test]
    async fn test_no_advisory_applies_only_rule_factors() {
        let items = vec![item("dermatology")];
        let mut state = state_with_forecast(300);
        // May: no seasonal entry, no flu, no holiday, no summer.
        stage().run(&items, 5, &mut state).await.unwrap();

        let adjusted = &state.adjustments["med-1"];
        assert_eq!(adjusted.total_factor, 1.0);
        assert_eq!(adjusted.adjusted_quantity, 300);
        assert_eq!(adjusted.confidence, 0.75);
    }

    #[tokio::test]
    async fn test_adjusted_quantity_is_pack_multiple_and_min_two_packs() {
        let items = vec![item("dermatology")];
        // Tiny forecast: 30 units; no factors in May, but the minimum
        // order is 2 packs.
        let mut state = state_with_forecast(30);
        stage().run(&items, 5, &mut state).await.unwrap();

        let adjusted = &state.adjustments["med-1"];
        assert_eq!(adjusted.adjusted_quantity, 60);
        assert_eq!(adjusted.adjusted_quantity % 30, 0);
    }

    #[tokio::test]
    async fn test_max_stock_cap_wins_over_minimum_order() {
        let items = vec![item("dermatology").with_max_stock(80)];
        let mut state = state_with_forecast(300);
        stage().run(&items, 5, &mut state).await.unwrap();

        // Cap is 80 - 40 = 40, below the 60-unit minimum order.
        let adjusted = &state.adjustments["med-1"];
        assert_eq!(adjusted.adjusted_quantity, 40);
    }

    #[tokio::test]
    async fn test_total_factor_clamped() {
        // January antibiotic: seasonal 1.15 x flu 1.25 = 1.4375; fine.
        // Force the clamp with a config carrying extreme factors.
        let config = AdjustmentConfig {
            seasonal_factors: HashMap::from([(1, 3.0)]),
            ..Default::default()
        };
        let items = vec![item("antibiotic")];
        let mut state = state_with_forecast(300);
        AdjustmentStage::new(config)
            .run(&items, 1, &mut state)
            .await
            .unwrap();

        let adjusted = &state.adjustments["med-1"];
        assert_eq!(adjusted.total_factor, MAX_TOTAL_FACTOR);
    }

    #[tokio::test]
    async fn test_rationale_lists_signed_percentages() {
        let items = vec![item("antibiotic")];
        let mut state = state_with_forecast(300);
        stage().run(&items, 11, &mut state).await.unwrap();

        let adjusted = &state.adjustments["med-1"];
        assert!(adjusted.rationale.contains("seasonal +10%"));
        assert!(adjusted.rationale.contains("flu_season +25%"));
    }

    #[tokio::test]
    async fn test_items_without_forecast_are_skipped() {
        let items = vec![item("dermatology"), MedicationItem::new("med-2", "Other")];
        let mut state = state_with_forecast(300);
        stage().run(&items, 5, &mut state).await.unwrap();

        assert_eq!(state.adjustments.len(), 1);
        assert!(!state.adjustments.contains_key("med-2"));
    }
}
