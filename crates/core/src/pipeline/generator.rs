//! The plan generator: the pipeline's state machine.
//!
//! Drives one run through the stage sequence
//! `forecasting -> adjusting -> allocating -> finalizing` under a single
//! wall-clock timeout, emitting a progress update at every transition.
//! A stage failure short-circuits to a failed response; finalize
//! additionally verifies that every stage produced results. Successful
//! responses are cached by item set with a TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Datelike, Utc};
use tracing::{info, warn};

use crate::advisory::AdvisoryClient;
use crate::catalog::MedicationItem;
use crate::metrics;
use crate::session::{PipelineState, ProgressHandle, ProgressUpdate, RunStatus, StageName};
use crate::stages::{
    AdjustmentConfig, AdjustmentStage, AllocationConfig, AllocationStage, ForecastConfig,
    ForecastStage,
};

use super::cache::ResponseCache;
use super::config::GeneratorConfig;
use super::types::{
    GenerationError, GenerationRequest, GenerationResponse, OrderLine, ResponseMetadata,
    StageSummary,
};

/// The plan generator.
///
/// One instance serves many concurrent runs; each run owns its own
/// [`PipelineState`] and shares only the response cache.
pub struct PlanGenerator {
    forecast: ForecastStage,
    adjustment: AdjustmentStage,
    allocation: AllocationStage,
    cache: ResponseCache,
}

impl PlanGenerator {
    pub fn new(
        config: GeneratorConfig,
        forecast_config: ForecastConfig,
        adjustment_config: AdjustmentConfig,
        allocation_config: AllocationConfig,
    ) -> Self {
        Self {
            forecast: ForecastStage::new(forecast_config),
            adjustment: AdjustmentStage::new(adjustment_config),
            allocation: AllocationStage::new(allocation_config),
            cache: ResponseCache::new(Duration::from_secs(config.cache_ttl_secs)),
        }
    }

    /// Build a generator from the root configuration, wiring the
    /// advisory client when one is configured.
    pub fn from_config(config: &crate::config::Config) -> Result<Self, crate::advisory::AdvisoryError> {
        let generator = Self::new(
            config.generator.clone(),
            config.forecast.clone(),
            config.adjustment.clone(),
            config.allocation.clone(),
        );
        match &config.advisory {
            Some(advisory_config) => {
                let advisory = crate::advisory::create_advisory_client(advisory_config)?;
                info!(provider = advisory.name(), "Advisory service enabled");
                Ok(generator.with_advisory(advisory))
            }
            None => {
                info!("No advisory service configured, stages use deterministic fallbacks");
                Ok(generator)
            }
        }
    }

    /// Wire the advisory client into every stage.
    pub fn with_advisory(mut self, advisory: Arc<dyn AdvisoryClient>) -> Self {
        self.forecast = self.forecast.with_advisory(advisory.clone());
        self.adjustment = self.adjustment.with_advisory(advisory.clone());
        self.allocation = self.allocation.with_advisory(advisory);
        self
    }

    /// Run the full pipeline and always return a response within
    /// `timeout`; failures of any kind are encoded in the response
    /// status, never raised.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        progress: Option<ProgressHandle>,
        timeout: Duration,
    ) -> GenerationResponse {
        let start = Instant::now();
        let run_id = request
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        // Cache check happens before any stage runs.
        let cache_key = ResponseCache::key(&request.items);
        if let Some(mut cached) = self.cache.get(&cache_key).await {
            info!(%run_id, "Serving generation response from cache");
            metrics::CACHE_HITS.inc();
            cached
                .messages
                .push("response served from cache for identical item set".to_string());
            return cached;
        }

        let mut state = PipelineState::new(run_id.clone());
        let items = self.effective_items(&request, &mut state);
        let month = Utc::now().month();

        info!(%run_id, items = items.len(), "Starting generation run");

        let outcome = match tokio::time::timeout(
            timeout,
            self.run_stages(&items, &request, month, &mut state, progress.as_ref()),
        )
        .await
        {
            Err(_) => Err(GenerationError::Timeout),
            Ok(Err(e)) => Err(e),
            Ok(Ok(())) => {
                // Completeness check: an empty result map means a stage
                // silently produced nothing, which is a failure even
                // though no error was returned.
                let missing = state.empty_stages();
                if items.is_empty() || missing.is_empty() {
                    Ok(())
                } else {
                    let names = missing
                        .iter()
                        .map(|s| s.label())
                        .collect::<Vec<_>>()
                        .join(", ");
                    Err(GenerationError::Incomplete(names))
                }
            }
        };

        match outcome {
            Ok(()) => {
                state.complete();
                info!(%run_id, "Generation run completed");
            }
            Err(e) => {
                if matches!(e, GenerationError::Timeout) {
                    // Partial per-item results are discarded; traces and
                    // progress remain for diagnosis.
                    state.forecasts.clear();
                    state.adjustments.clear();
                    state.allocations.clear();
                }
                warn!(%run_id, "Generation run failed: {}", e);
                state.fail(e.to_string());
            }
        }

        // Final update on completion, success or failure.
        if let Some(handle) = progress.as_ref() {
            handle.emit(ProgressUpdate {
                run_id: run_id.clone(),
                stage: state.progress.stage.clone(),
                action: state.progress.action.clone(),
                percent: 100,
            });
        }

        let response = build_response(&items, state, start.elapsed());

        let result_label = response.status.status_type();
        metrics::GENERATION_RUNS.with_label_values(&[result_label]).inc();
        metrics::GENERATION_DURATION
            .with_label_values(&[result_label])
            .observe(start.elapsed().as_secs_f64());

        if response.status == RunStatus::Completed {
            self.cache.insert(cache_key, response.clone()).await;
        }

        response
    }

    /// The strictly sequential stage drive. Each transition updates the
    /// state machine and emits a progress update.
    async fn run_stages(
        &self,
        items: &[MedicationItem],
        request: &GenerationRequest,
        month: u32,
        state: &mut PipelineState,
        progress: Option<&ProgressHandle>,
    ) -> Result<(), GenerationError> {
        self.transition(state, StageName::Forecasting, progress);
        let stage_start = Instant::now();
        self.forecast.run(items, &request.history, state).await?;
        observe_stage(StageName::Forecasting, stage_start);

        self.transition(state, StageName::Adjusting, progress);
        let stage_start = Instant::now();
        self.adjustment.run(items, month, state).await?;
        observe_stage(StageName::Adjusting, stage_start);

        self.transition(state, StageName::Allocating, progress);
        let stage_start = Instant::now();
        self.allocation.run(items, &request.suppliers, state).await?;
        observe_stage(StageName::Allocating, stage_start);

        self.transition(state, StageName::Finalizing, progress);
        Ok(())
    }

    fn transition(
        &self,
        state: &mut PipelineState,
        stage: StageName,
        progress: Option<&ProgressHandle>,
    ) {
        state.begin_stage(stage);
        info!(run_id = %state.run_id, stage = stage.label(), "Stage transition");
        if let Some(handle) = progress {
            handle.emit(ProgressUpdate {
                run_id: state.run_id.clone(),
                stage: stage.label().to_string(),
                action: stage.action().to_string(),
                percent: stage.percent(),
            });
        }
    }

    /// Apply live stock overrides to the catalog snapshot. Overrides for
    /// unknown item ids are noted and ignored.
    fn effective_items(
        &self,
        request: &GenerationRequest,
        state: &mut PipelineState,
    ) -> Vec<MedicationItem> {
        let mut items = request.items.clone();
        let by_id: HashMap<&str, usize> = request
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.id.as_str(), idx))
            .collect();

        for (id, &stock) in &request.current_stock {
            match by_id.get(id.as_str()) {
                Some(&idx) => items[idx].current_stock = stock,
                None => {
                    state.push_message(format!(
                        "stock level for unknown item '{}' ignored (not in item list)",
                        id
                    ));
                }
            }
        }
        items
    }
}

fn observe_stage(stage: StageName, start: Instant) {
    metrics::STAGE_DURATION
        .with_label_values(&[stage.label()])
        .observe(start.elapsed().as_secs_f64());
}

/// Transform the final state into the caller-facing response.
fn build_response(
    items: &[MedicationItem],
    state: PipelineState,
    elapsed: Duration,
) -> GenerationResponse {
    // Flatten allocations into order lines, preserving item order.
    let mut order_lines = Vec::new();
    for item in items {
        if let Some(allocation) = state.allocations.get(&item.id) {
            for line in &allocation.allocations {
                order_lines.push(OrderLine {
                    item_id: item.id.clone(),
                    item_name: item.name.clone(),
                    supplier_id: line.supplier_id.clone(),
                    supplier_name: line.supplier_name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    lead_time_days: line.lead_time_days,
                    subtotal: line.subtotal,
                });
            }
        }
    }

    let total_cost: f64 = order_lines.iter().map(|l| l.subtotal).sum();
    let total_quantity: u32 = order_lines.iter().map(|l| l.quantity).sum();
    let avg_lead_time_days = if total_quantity > 0 {
        order_lines
            .iter()
            .map(|l| l.quantity as f64 * l.lead_time_days)
            .sum::<f64>()
            / total_quantity as f64
    } else {
        0.0
    };

    let reasoning: Vec<StageSummary> = StageName::all()
        .iter()
        .filter_map(|stage| state.latest_trace(*stage))
        .map(|trace| StageSummary {
            stage: trace.stage.clone(),
            output_summary: trace.output_summary.clone(),
            confidence: trace.confidence,
            decision_points: trace.decision_points.clone(),
        })
        .collect();

    let metadata = ResponseMetadata {
        total_line_items: order_lines.len(),
        total_cost,
        avg_lead_time_days,
        generation_ms: elapsed.as_millis() as u64,
    };

    GenerationResponse {
        run_id: state.run_id,
        status: state.status,
        error: state.error,
        created_at: state.created_at,
        updated_at: state.updated_at,
        order_lines,
        forecasts: state.forecasts,
        adjustments: state.adjustments,
        allocations: state.allocations,
        reasoning,
        progress: state.progress,
        messages: state.messages,
        metadata,
    }
}
