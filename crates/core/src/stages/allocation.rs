//! Supplier allocation stage.
//!
//! Scores every supplier once, builds a per-item candidate list, and
//! decides between a single-supplier order and a split order. Splits
//! follow advisory-provided supplier preferences and ratios; rounding
//! drift is absorbed by the last allocation so the lines always sum
//! exactly to the adjusted quantity.

use std::sync::Arc;

use crate::advisory::{
    AdvisoryClient, AllocationAdvice, AllocationContext, CandidateSummary,
};
use crate::catalog::{MedicationItem, Supplier};
use crate::session::{PipelineState, ReasoningTrace, StageName};

use super::util::round_to_pack;
use super::{AllocationLine, AllocationStrategy, StageError, SupplierAllocation};

/// Minimum units per allocation line, in packs.
const MIN_ALLOCATION_PACKS: u32 = 2;

/// Configuration for the supplier allocation stage.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AllocationConfig {
    /// Weight of the lead-time component. Weights sum to 1.0.
    #[serde(default = "default_lead_weight")]
    pub lead_weight: f64,
    /// Weight of the status component.
    #[serde(default = "default_status_weight")]
    pub status_weight: f64,
    /// Weight of the price component.
    #[serde(default = "default_price_weight")]
    pub price_weight: f64,
    /// Lead-time normalization bound and candidate cutoff, in days.
    #[serde(default = "default_max_lead_time_days")]
    pub max_lead_time_days: f64,
    /// Minimum score for a supplier to qualify as a candidate.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    /// Placeholder price score; no comparative pricing data is available.
    #[serde(default = "default_price_score")]
    pub price_score: f64,
    /// Markup applied to non-primary suppliers' unit price.
    #[serde(default = "default_non_primary_markup")]
    pub non_primary_markup: f64,
    /// Master switch for split ordering.
    #[serde(default = "default_split_enabled")]
    pub split_enabled: bool,
    /// Minimum adjusted quantity before a split is considered.
    #[serde(default = "default_split_min_quantity")]
    pub split_min_quantity: u32,
    /// Maximum suppliers in a split order.
    #[serde(default = "default_max_split_suppliers")]
    pub max_split_suppliers: usize,
}

fn default_lead_weight() -> f64 {
    0.4
}

fn default_status_weight() -> f64 {
    0.4
}

fn default_price_weight() -> f64 {
    0.2
}

fn default_max_lead_time_days() -> f64 {
    30.0
}

fn default_min_score() -> f64 {
    0.3
}

fn default_price_score() -> f64 {
    0.5
}

fn default_non_primary_markup() -> f64 {
    0.05
}

fn default_split_enabled() -> bool {
    true
}

fn default_split_min_quantity() -> u32 {
    100
}

fn default_max_split_suppliers() -> usize {
    3
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            lead_weight: default_lead_weight(),
            status_weight: default_status_weight(),
            price_weight: default_price_weight(),
            max_lead_time_days: default_max_lead_time_days(),
            min_score: default_min_score(),
            price_score: default_price_score(),
            non_primary_markup: default_non_primary_markup(),
            split_enabled: default_split_enabled(),
            split_min_quantity: default_split_min_quantity(),
            max_split_suppliers: default_max_split_suppliers(),
        }
    }
}

/// A supplier that qualified for an item, with its score and the unit
/// price this item would pay.
#[derive(Debug, Clone)]
struct Candidate<'a> {
    supplier: &'a Supplier,
    score: f64,
    unit_price: f64,
}

/// The supplier allocation stage.
pub struct AllocationStage {
    config: AllocationConfig,
    advisory: Option<Arc<dyn AdvisoryClient>>,
}

impl AllocationStage {
    pub fn new(config: AllocationConfig) -> Self {
        Self {
            config,
            advisory: None,
        }
    }

    pub fn with_advisory(mut self, advisory: Arc<dyn AdvisoryClient>) -> Self {
        self.advisory = Some(advisory);
        self
    }

    /// Allocate suppliers for every adjusted item.
    pub async fn run(
        &self,
        items: &[MedicationItem],
        suppliers: &[Supplier],
        state: &mut PipelineState,
    ) -> Result<(), StageError> {
        let mut trace = ReasoningTrace::new(
            StageName::Allocating,
            format!(
                "{} adjusted items, {} suppliers",
                state.adjustments.len(),
                suppliers.len()
            ),
        );

        // Score each supplier once; scores are item-independent.
        let scored: Vec<(&Supplier, f64)> = suppliers
            .iter()
            .map(|s| (s, self.score_supplier(s)))
            .collect();

        for item in items {
            let Some(adjusted) = state.adjustments.get(&item.id) else {
                continue;
            };
            let quantity = adjusted.adjusted_quantity;

            let candidates = self.candidates_for(item, &scored);
            if candidates.is_empty() {
                trace.push_decision(format!(
                    "{}: no supplier meets score/lead-time thresholds, skipped",
                    item.id
                ));
                continue;
            }

            let allocation = self.allocate_item(item, quantity, &candidates, &mut trace).await;
            state.allocations.insert(item.id.clone(), allocation);
        }

        trace.finish(
            format!("{} items allocated", state.allocations.len()),
            0.8,
        );
        state.push_trace(trace);

        Ok(())
    }

    /// `w_lead * lead_component + w_status * status + w_price * price`.
    fn score_supplier(&self, supplier: &Supplier) -> f64 {
        let lead_component =
            (1.0 - supplier.avg_lead_time_days / self.config.max_lead_time_days).max(0.0);
        self.config.lead_weight * lead_component
            + self.config.status_weight * supplier.status.score()
            + self.config.price_weight * self.config.price_score
    }

    /// Qualifying candidates for an item, best score first (stable order
    /// for ties).
    fn candidates_for<'a>(
        &self,
        item: &MedicationItem,
        scored: &[(&'a Supplier, f64)],
    ) -> Vec<Candidate<'a>> {
        let mut candidates: Vec<Candidate<'a>> = scored
            .iter()
            .filter(|(supplier, score)| {
                *score >= self.config.min_score
                    && supplier.avg_lead_time_days <= self.config.max_lead_time_days
            })
            .map(|&(supplier, score)| {
                let unit_price = if supplier.id == item.primary_supplier_id {
                    item.unit_price
                } else {
                    item.unit_price * (1.0 + self.config.non_primary_markup)
                };
                Candidate {
                    supplier,
                    score,
                    unit_price,
                }
            })
            .collect();

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        candidates
    }

    /// Decide the strategy and build the allocation for one item.
    async fn allocate_item(
        &self,
        item: &MedicationItem,
        quantity: u32,
        candidates: &[Candidate<'_>],
        trace: &mut ReasoningTrace,
    ) -> SupplierAllocation {
        let split_possible = self.config.split_enabled
            && candidates.len() >= 2
            && quantity >= self.config.split_min_quantity;

        let advice = if split_possible {
            match &self.advisory {
                Some(advisory) => {
                    let context = AllocationContext {
                        item_id: item.id.clone(),
                        item_name: item.name.clone(),
                        quantity,
                        candidates: candidates
                            .iter()
                            .map(|c| CandidateSummary {
                                name: c.supplier.name.clone(),
                                score: c.score,
                                lead_time_days: c.supplier.avg_lead_time_days,
                            })
                            .collect(),
                    };
                    match advisory.allocation_advice(&context).await {
                        Ok(advice) => Some(advice),
                        Err(e) => {
                            tracing::warn!(item = %item.id, "Allocation advisory failed: {}", e);
                            trace.push_decision(format!(
                                "{}: advisory unavailable ({}), defaulting to single supplier",
                                item.id, e
                            ));
                            None
                        }
                    }
                }
                None => None,
            }
        } else {
            None
        };

        let advice_rationale = advice
            .as_ref()
            .filter(|a| !a.rationale.is_empty())
            .map(|a| a.rationale.clone());

        if let Some(advice) = advice.filter(|a| a.recommends_split()) {
            if let Some(allocation) =
                self.split_allocation(item, quantity, candidates, &advice, advice_rationale.clone())
            {
                trace.push_decision(format!(
                    "{}: split across {} suppliers",
                    item.id,
                    allocation.allocations.len()
                ));
                return allocation;
            }
            trace.push_decision(format!(
                "{}: split shares collapsed after rounding, using single supplier",
                item.id
            ));
        }

        trace.push_decision(format!(
            "{}: single supplier '{}' (score {:.2})",
            item.id, candidates[0].supplier.name, candidates[0].score
        ));
        self.single_allocation(quantity, &candidates[0], advice_rationale)
    }

    /// 100% of the quantity to the top-scored candidate.
    fn single_allocation(
        &self,
        quantity: u32,
        candidate: &Candidate<'_>,
        advice_rationale: Option<String>,
    ) -> SupplierAllocation {
        let line = AllocationLine {
            supplier_id: candidate.supplier.id.clone(),
            supplier_name: candidate.supplier.name.clone(),
            quantity,
            unit_price: candidate.unit_price,
            lead_time_days: candidate.supplier.avg_lead_time_days,
            subtotal: quantity as f64 * candidate.unit_price,
        };
        let mut rationale = format!(
            "single supplier: {} x{} @ {:.2}",
            line.supplier_name, line.quantity, line.unit_price
        );
        if let Some(advisory) = advice_rationale {
            rationale.push_str(&format!("; advisory: {}", advisory));
        }

        SupplierAllocation {
            total_cost: line.subtotal,
            avg_lead_time_days: line.lead_time_days,
            allocations: vec![line],
            strategy: AllocationStrategy::Single,
            rationale,
        }
    }

    /// Split the quantity across advisory-preferred candidates.
    ///
    /// Returns None when rounding leaves the last share empty, in which
    /// case the caller falls back to a single-supplier order.
    fn split_allocation(
        &self,
        item: &MedicationItem,
        quantity: u32,
        candidates: &[Candidate<'_>],
        advice: &AllocationAdvice,
        advice_rationale: Option<String>,
    ) -> Option<SupplierAllocation> {
        // Map preferred supplier names onto scored candidates.
        let mut chosen: Vec<&Candidate<'_>> = Vec::new();
        for preferred in &advice.preferred_suppliers {
            if chosen.len() >= self.config.max_split_suppliers {
                break;
            }
            let preferred_lower = preferred.to_lowercase();
            if let Some(candidate) = candidates.iter().find(|c| {
                let name = c.supplier.name.to_lowercase();
                name == preferred_lower
                    || name.contains(&preferred_lower)
                    || preferred_lower.contains(&name)
            }) {
                if !chosen.iter().any(|c| c.supplier.id == candidate.supplier.id) {
                    chosen.push(candidate);
                }
            }
        }
        if chosen.len() < 2 {
            chosen = candidates.iter().take(2).collect();
        }

        // Shares from advisory ratios where provided, else equal.
        let equal_shares = vec![1.0 / chosen.len() as f64; chosen.len()];
        let ratios: Vec<f64> = if advice.split_ratios.len() >= chosen.len() {
            let slice = &advice.split_ratios[..chosen.len()];
            let sum: f64 = slice.iter().sum();
            if sum > 0.0 {
                slice.iter().map(|r| r / sum).collect()
            } else {
                equal_shares
            }
        } else {
            equal_shares
        };

        // Round every share but the last; the last absorbs the residual
        // so the lines sum exactly to the target.
        let mut quantities: Vec<u32> = Vec::with_capacity(chosen.len());
        let mut allocated: u32 = 0;
        for ratio in ratios.iter().take(chosen.len() - 1) {
            let mut share = round_to_pack(quantity as f64 * ratio, item.pack_size);
            share = share.max(MIN_ALLOCATION_PACKS * item.pack_size);
            quantities.push(share);
            allocated += share;
        }
        let last = quantity.checked_sub(allocated)?;
        if last == 0 {
            return None;
        }
        quantities.push(last);

        let lines: Vec<AllocationLine> = chosen
            .iter()
            .zip(quantities.iter())
            .map(|(candidate, &qty)| AllocationLine {
                supplier_id: candidate.supplier.id.clone(),
                supplier_name: candidate.supplier.name.clone(),
                quantity: qty,
                unit_price: candidate.unit_price,
                lead_time_days: candidate.supplier.avg_lead_time_days,
                subtotal: qty as f64 * candidate.unit_price,
            })
            .collect();

        let total_cost = lines.iter().map(|l| l.subtotal).sum();
        let total_quantity: u32 = lines.iter().map(|l| l.quantity).sum();
        let avg_lead = lines
            .iter()
            .map(|l| l.quantity as f64 * l.lead_time_days)
            .sum::<f64>()
            / total_quantity as f64;

        let shares = lines
            .iter()
            .map(|l| format!("{} x{} @ {:.2}", l.supplier_name, l.quantity, l.unit_price))
            .collect::<Vec<_>>()
            .join(", ");
        let mut rationale = format!("split order: {}", shares);
        if let Some(advisory) = advice_rationale {
            rationale.push_str(&format!("; advisory: {}", advisory));
        }

        Some(SupplierAllocation {
            allocations: lines,
            total_cost,
            avg_lead_time_days: avg_lead,
            strategy: AllocationStrategy::Split,
            rationale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SupplierStatus;
    use crate::stages::AdjustedQuantity;
    use crate::testing::MockAdvisory;

    fn item() -> MedicationItem {
        MedicationItem::new("med-1", "Amoxicillin")
            .with_category("antibiotic")
            .with_pack_size(10)
            .with_stock_levels(40, 50, 20)
            .with_supplier("sup-1", 1.0)
    }

    fn suppliers() -> Vec<Supplier> {
        vec![
            Supplier::new("sup-1", "Alpha Pharma")
                .with_status(SupplierStatus::Nominal)
                .with_lead_time(3.0),
            Supplier::new("sup-2", "Beta Med")
                .with_status(SupplierStatus::Nominal)
                .with_lead_time(6.0),
            Supplier::new("sup-3", "Gamma Supplies")
                .with_status(SupplierStatus::Unknown)
                .with_lead_time(45.0),
        ]
    }

    fn state_with_adjustment(quantity: u32) -> PipelineState {
        let mut state = PipelineState::new("run-1");
        state.adjustments.insert(
            "med-1".to_string(),
            AdjustedQuantity {
                original_quantity: quantity,
                adjusted_quantity: quantity,
                factors: vec![],
                total_factor: 1.0,
                confidence: 0.75,
                rationale: String::new(),
            },
        );
        state
    }

    fn stage() -> AllocationStage {
        AllocationStage::new(AllocationConfig::default())
    }

    #[test]
    fn test_score_ranks_fast_nominal_suppliers_highest() {
        let stage = stage();
        let all = suppliers();
        let scores: Vec<f64> = all.iter().map(|s| stage.score_supplier(s)).collect();

        assert!(scores[0] > scores[1]); // shorter lead time wins
        assert!(scores[1] > scores[2]); // nominal beats unknown
    }

    #[test]
    fn test_candidates_exclude_slow_and_low_score_suppliers() {
        let stage = stage();
        let all = suppliers();
        let scored: Vec<(&Supplier, f64)> =
            all.iter().map(|s| (s, stage.score_supplier(s))).collect();

        let candidates = stage.candidates_for(&item(), &scored);
        // Gamma exceeds the 30-day lead cutoff.
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].supplier.id, "sup-1");
    }

    #[test]
    fn test_non_primary_price_markup() {
        let stage = stage();
        let all = suppliers();
        let scored: Vec<(&Supplier, f64)> =
            all.iter().map(|s| (s, stage.score_supplier(s))).collect();

        let candidates = stage.candidates_for(&item(), &scored);
        let primary = candidates.iter().find(|c| c.supplier.id == "sup-1").unwrap();
        let secondary = candidates.iter().find(|c| c.supplier.id == "sup-2").unwrap();

        assert_eq!(primary.unit_price, 1.0);
        assert!((secondary.unit_price - 1.05).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_advisory_falls_back_to_single_top_candidate() {
        let mut state = state_with_adjustment(200);
        stage().run(&[item()], &suppliers(), &mut state).await.unwrap();

        let allocation = &state.allocations["med-1"];
        assert_eq!(allocation.strategy, AllocationStrategy::Single);
        assert_eq!(allocation.allocations.len(), 1);
        assert_eq!(allocation.allocations[0].supplier_id, "sup-1");
        assert_eq!(allocation.total_quantity(), 200);
    }

    #[tokio::test]
    async fn test_split_follows_advisory_ratios_and_sums_exactly() {
        let advisory = Arc::new(MockAdvisory::new().with_allocation_advice(AllocationAdvice {
            strategy: "split".to_string(),
            preferred_suppliers: vec!["Alpha Pharma".to_string(), "Beta Med".to_string()],
            split_ratios: vec![70.0, 30.0],
            rationale: "diversify against shortage risk".to_string(),
        }));

        let mut state = state_with_adjustment(200);
        AllocationStage::new(AllocationConfig::default())
            .with_advisory(advisory)
            .run(&[item()], &suppliers(), &mut state)
            .await
            .unwrap();

        let allocation = &state.allocations["med-1"];
        assert_eq!(allocation.strategy, AllocationStrategy::Split);
        assert_eq!(allocation.allocations.len(), 2);
        assert_eq!(allocation.allocations[0].quantity, 140);
        assert_eq!(allocation.allocations[1].quantity, 60);
        assert_eq!(allocation.total_quantity(), 200);
        // Both lines are pack multiples.
        for line in &allocation.allocations {
            assert_eq!(line.quantity % 10, 0);
        }
        assert!(allocation.rationale.contains("diversify"));
    }

    #[tokio::test]
    async fn test_split_rounding_residual_lands_on_last_line() {
        // Pack 30 with a 70/30 split of 200: first share rounds to 150,
        // the last absorbs the remaining 50.
        let advisory = Arc::new(MockAdvisory::new().with_allocation_advice(AllocationAdvice {
            strategy: "split".to_string(),
            preferred_suppliers: vec!["Alpha Pharma".to_string(), "Beta Med".to_string()],
            split_ratios: vec![70.0, 30.0],
            rationale: String::new(),
        }));

        let coarse = item().with_pack_size(30);
        let mut state = state_with_adjustment(200);
        AllocationStage::new(AllocationConfig::default())
            .with_advisory(advisory)
            .run(&[coarse], &suppliers(), &mut state)
            .await
            .unwrap();

        let allocation = &state.allocations["med-1"];
        assert_eq!(allocation.allocations[0].quantity, 150);
        assert_eq!(allocation.allocations[1].quantity, 50);
        assert_eq!(allocation.total_quantity(), 200);
    }

    #[tokio::test]
    async fn test_split_below_quantity_threshold_stays_single() {
        let advisory = Arc::new(MockAdvisory::new().with_allocation_advice(AllocationAdvice {
            strategy: "split".to_string(),
            preferred_suppliers: vec!["Alpha Pharma".to_string(), "Beta Med".to_string()],
            split_ratios: vec![50.0, 50.0],
            rationale: String::new(),
        }));

        let mut state = state_with_adjustment(90); // below 100
        AllocationStage::new(AllocationConfig::default())
            .with_advisory(advisory.clone())
            .run(&[item()], &suppliers(), &mut state)
            .await
            .unwrap();

        let allocation = &state.allocations["med-1"];
        assert_eq!(allocation.strategy, AllocationStrategy::Single);
        // Advisory was never consulted below the threshold.
        assert_eq!(advisory.allocation_calls(), 0);
    }

    #[tokio::test]
    async fn test_unmatched_preferred_suppliers_fall_back_to_top_two() {
        let advisory = Arc::new(MockAdvisory::new().with_allocation_advice(AllocationAdvice {
            strategy: "split".to_string(),
            preferred_suppliers: vec!["Nonexistent Corp".to_string()],
            split_ratios: vec![],
            rationale: String::new(),
        }));

        let mut state = state_with_adjustment(200);
        AllocationStage::new(AllocationConfig::default())
            .with_advisory(advisory)
            .run(&[item()], &suppliers(), &mut state)
            .await
            .unwrap();

        let allocation = &state.allocations["med-1"];
        assert_eq!(allocation.strategy, AllocationStrategy::Split);
        assert_eq!(allocation.allocations.len(), 2);
        // Equal shares of 200 over pack 10.
        assert_eq!(allocation.allocations[0].quantity, 100);
        assert_eq!(allocation.allocations[1].quantity, 100);
        assert_eq!(allocation.allocations[0].supplier_id, "sup-1");
        assert_eq!(allocation.allocations[1].supplier_id, "sup-2");
    }

    #[tokio::test]
    async fn test_advisory_failure_falls_back_to_single() {
        let advisory = Arc::new(MockAdvisory::new().with_allocation_failure());

        let mut state = state_with_adjustment(200);
        AllocationStage::new(AllocationConfig::default())
            .with_advisory(advisory)
            .run(&[item()], &suppliers(), &mut state)
            .await
            .unwrap();

        let allocation = &state.allocations["med-1"];
        assert_eq!(allocation.strategy, AllocationStrategy::Single);
        assert_eq!(allocation.allocations[0].supplier_id, "sup-1");
    }

    #[tokio::test]
    async fn test_no_qualifying_suppliers_skips_item_with_note() {
        let slow = vec![Supplier::new("sup-9", "Slowpoke")
            .with_status(SupplierStatus::Unknown)
            .with_lead_time(90.0)];

        let mut state = state_with_adjustment(200);
        stage().run(&[item()], &slow, &mut state).await.unwrap();

        assert!(state.allocations.is_empty());
        let trace = state.latest_trace(StageName::Allocating).unwrap();
        assert!(trace
            .decision_points
            .iter()
            .any(|d| d.contains("no supplier meets")));
    }

    #[tokio::test]
    async fn test_weighted_lead_time_and_total_cost() {
        let advisory = Arc::new(MockAdvisory::new().with_allocation_advice(AllocationAdvice {
            strategy: "split".to_string(),
            preferred_suppliers: vec!["Alpha Pharma".to_string(), "Beta Med".to_string()],
            split_ratios: vec![50.0, 50.0],
            rationale: String::new(),
        }));

        let mut state = state_with_adjustment(200);
        AllocationStage::new(AllocationConfig::default())
            .with_advisory(advisory)
            .run(&[item()], &suppliers(), &mut state)
            .await
            .unwrap();

        let allocation = &state.allocations["med-1"];
        // 100 @ 1.00 (primary) + 100 @ 1.05 (markup).
        assert!((allocation.total_cost - 205.0).abs() < 1e-9);
        // Lead: (100*3 + 100*6) / 200 = 4.5 days.
        assert!((allocation.avg_lead_time_days - 4.5).abs() < 1e-9);
    }
}
