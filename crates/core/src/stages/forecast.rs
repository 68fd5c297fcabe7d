//! Demand forecast stage.
//!
//! Computes a baseline order quantity per item from consumption history:
//! mean daily consumption over a lookback window, a recent-vs-prior trend
//! factor, and a variability buffer capped at +30%. Items without history
//! fall back to the catalog's stated average. The advisory service
//! contributes qualitative factors and a confidence nudge but never
//! changes the quantity.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;

use crate::advisory::{AdvisoryClient, ForecastContext};
use crate::catalog::{ConsumptionSample, MedicationItem};
use crate::session::{PipelineState, ReasoningTrace, StageName};

use super::util::round_to_pack;
use super::{ItemForecast, StageError};

/// Samples in the "recent" window when computing the trend factor.
const TREND_WINDOW: usize = 7;

/// Cap on the variability buffer: safety stock adds at most 30%.
const MAX_SAFETY_MULTIPLIER: f64 = 1.3;

/// Confidence for the statistical path.
const STATISTICAL_CONFIDENCE: f64 = 0.75;

/// Confidence for the no-history fallback.
const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Configuration for the forecast stage.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ForecastConfig {
    /// Forecast horizon in months.
    #[serde(default = "default_horizon_months")]
    pub horizon_months: u32,
    /// Number of most-recent samples considered.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: usize,
}

fn default_horizon_months() -> u32 {
    1
}

fn default_lookback_days() -> usize {
    90
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_months: default_horizon_months(),
            lookback_days: default_lookback_days(),
        }
    }
}

/// The forecast stage.
pub struct ForecastStage {
    config: ForecastConfig,
    advisory: Option<Arc<dyn AdvisoryClient>>,
}

impl ForecastStage {
    pub fn new(config: ForecastConfig) -> Self {
        Self {
            config,
            advisory: None,
        }
    }

    pub fn with_advisory(mut self, advisory: Arc<dyn AdvisoryClient>) -> Self {
        self.advisory = Some(advisory);
        self
    }

    /// Forecast every item and record the results in `state.forecasts`.
    ///
    /// History entries whose item id is not in the item list are skipped
    /// with a decision-point note, never an error.
    pub async fn run(
        &self,
        items: &[MedicationItem],
        history: &HashMap<String, Vec<ConsumptionSample>>,
        state: &mut PipelineState,
    ) -> Result<(), StageError> {
        let mut trace = ReasoningTrace::new(
            StageName::Forecasting,
            format!("{} items, {} history series", items.len(), history.len()),
        );

        let known: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
        for id in history.keys() {
            if !known.contains(id.as_str()) {
                trace.push_decision(format!(
                    "history for unknown item '{}' ignored (not in item list)",
                    id
                ));
            }
        }

        for item in items {
            let samples = history.get(&item.id).map(Vec::as_slice).unwrap_or(&[]);
            let mut forecast = self.forecast_item(item, samples);

            if let Some(advisory) = &self.advisory {
                let context = ForecastContext {
                    item_id: item.id.clone(),
                    item_name: item.name.clone(),
                    category: item.category.clone(),
                    avg_daily: forecast.avg_daily,
                    std_dev: std_dev(samples, forecast.avg_daily),
                    trend_factor: forecast.trend_factor,
                    horizon_months: self.config.horizon_months,
                    as_of: Utc::now().date_naive(),
                };
                match advisory.forecast_advice(&context).await {
                    Ok(advice) => {
                        forecast.qualitative_factors = advice.qualitative_factors;
                        if !advice.rationale.is_empty() {
                            forecast.rationale =
                                format!("{}; advisory: {}", forecast.rationale, advice.rationale);
                        }
                        // Informational only: nudges the confidence score,
                        // never the quantity.
                        forecast.confidence =
                            (forecast.confidence + 0.05 * advice.confidence).min(0.95);
                    }
                    Err(e) => {
                        tracing::warn!(item = %item.id, "Forecast advisory failed: {}", e);
                        forecast.rationale =
                            format!("{}; advisory unavailable: {}", forecast.rationale, e);
                    }
                }
            }

            trace.push_decision(format!(
                "{}: {} forecast of {} units (trend {:.2}, safety x{:.2})",
                item.id, forecast.method, forecast.quantity, forecast.trend_factor,
                forecast.safety_multiplier,
            ));
            state.forecasts.insert(item.id.clone(), forecast);
        }

        let avg_confidence = if state.forecasts.is_empty() {
            0.0
        } else {
            state.forecasts.values().map(|f| f.confidence).sum::<f64>()
                / state.forecasts.len() as f64
        };
        trace.finish(
            format!("{} forecasts produced", state.forecasts.len()),
            avg_confidence,
        );
        state.push_trace(trace);

        Ok(())
    }

    /// Pure numeric forecast for one item.
    fn forecast_item(&self, item: &MedicationItem, all_samples: &[ConsumptionSample]) -> ItemForecast {
        let horizon_days = 30.0 * self.config.horizon_months as f64;

        let (method, avg_daily, trend, safety, confidence) = if all_samples.is_empty() {
            ("simple", item.avg_daily_consumption, 1.0, 1.0, FALLBACK_CONFIDENCE)
        } else {
            let start = all_samples.len().saturating_sub(self.config.lookback_days);
            let samples = &all_samples[start..];

            let avg = mean(samples);
            let std = std_dev(samples, avg);
            let safety = if avg > 0.0 {
                (1.0 + std / avg).min(MAX_SAFETY_MULTIPLIER)
            } else {
                1.0
            };
            (
                "statistical",
                avg,
                trend_factor(samples),
                safety,
                STATISTICAL_CONFIDENCE,
            )
        };
        let mut baseline = avg_daily * horizon_days * trend * safety;

        // Never forecast below what restores reorder point + safety stock.
        let floor = (item.reorder_point + item.safety_stock).saturating_sub(item.current_stock);
        baseline = baseline.max(floor as f64);

        // Storage ceiling wins over the floor.
        if let Some(max_stock) = item.max_stock {
            let ceiling = max_stock.saturating_sub(item.current_stock);
            baseline = baseline.min(ceiling as f64);
        }

        let quantity = round_to_pack(baseline, item.pack_size);
        let rationale = format!(
            "{} forecast: {:.1}/day x {:.0} days x trend {:.2} x safety {:.2} -> {} units (pack {})",
            method, avg_daily, horizon_days, trend, safety, quantity, item.pack_size,
        );

        ItemForecast {
            quantity,
            method: method.to_string(),
            avg_daily,
            trend_factor: trend,
            safety_multiplier: safety,
            confidence,
            qualitative_factors: Vec::new(),
            rationale,
        }
    }
}

fn mean(samples: &[ConsumptionSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.quantity).sum::<f64>() / samples.len() as f64
}

/// Population standard deviation around a precomputed mean.
fn std_dev(samples: &[ConsumptionSample], mean: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let variance = samples
        .iter()
        .map(|s| (s.quantity - mean).powi(2))
        .sum::<f64>()
        / samples.len() as f64;
    variance.sqrt()
}

/// Ratio of recent consumption to the consumption preceding it.
///
/// 1.0 when there are not enough samples to split or the prior mean is
/// zero.
fn trend_factor(samples: &[ConsumptionSample]) -> f64 {
    if samples.len() <= TREND_WINDOW {
        return 1.0;
    }
    let split = samples.len() - TREND_WINDOW;
    let prior = mean(&samples[..split]);
    if prior == 0.0 {
        return 1.0;
    }
    mean(&samples[split..]) / prior
}
