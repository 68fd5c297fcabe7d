//! Mock advisory client for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::advisory::{
    AdjustmentAdvice, AdjustmentContext, AdvisoryClient, AdvisoryError, AllocationAdvice,
    AllocationContext, ForecastAdvice, ForecastContext,
};

/// Mock implementation of the advisory client.
///
/// Provides controllable behavior for testing:
/// - Return configurable per-stage advice
/// - Simulate failures and slow responses
/// - Count calls per stage for assertions (e.g. verifying a cache hit
///   never re-invokes a stage)
///
/// # Example
///
/// ```rust,ignore
/// use restock_core::testing::MockAdvisory;
///
/// let advisory = MockAdvisory::new()
///     .with_adjustment_advice(AdjustmentAdvice {
///         event_adjustment: 1.2,
///         event_name: "flu wave".into(),
///         confidence: 0.8,
///         rationale: "regional outbreak".into(),
///     });
///
/// // ... run a stage, then:
/// assert_eq!(advisory.adjustment_calls(), 3);
/// ```
pub struct MockAdvisory {
    forecast_advice: Mutex<Option<ForecastAdvice>>,
    adjustment_advice: Mutex<Option<AdjustmentAdvice>>,
    allocation_advice: Mutex<Option<AllocationAdvice>>,
    fail_forecast: bool,
    fail_adjustment: bool,
    fail_allocation: bool,
    delay: Option<Duration>,
    forecast_count: AtomicUsize,
    adjustment_count: AtomicUsize,
    allocation_count: AtomicUsize,
}

impl Default for MockAdvisory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdvisory {
    /// Create a mock that answers every stage with default (empty or
    /// neutral) advice.
    pub fn new() -> Self {
        Self {
            forecast_advice: Mutex::new(None),
            adjustment_advice: Mutex::new(None),
            allocation_advice: Mutex::new(None),
            fail_forecast: false,
            fail_adjustment: false,
            fail_allocation: false,
            delay: None,
            forecast_count: AtomicUsize::new(0),
            adjustment_count: AtomicUsize::new(0),
            allocation_count: AtomicUsize::new(0),
        }
    }

    pub fn with_forecast_advice(self, advice: ForecastAdvice) -> Self {
        *self.forecast_advice.lock().unwrap() = Some(advice);
        self
    }

    pub fn with_adjustment_advice(self, advice: AdjustmentAdvice) -> Self {
        *self.adjustment_advice.lock().unwrap() = Some(advice);
        self
    }

    pub fn with_allocation_advice(self, advice: AllocationAdvice) -> Self {
        *self.allocation_advice.lock().unwrap() = Some(advice);
        self
    }

    /// Every forecast call fails.
    pub fn with_forecast_failure(mut self) -> Self {
        self.fail_forecast = true;
        self
    }

    /// Every adjustment call fails.
    pub fn with_adjustment_failure(mut self) -> Self {
        self.fail_adjustment = true;
        self
    }

    /// Every allocation call fails.
    pub fn with_allocation_failure(mut self) -> Self {
        self.fail_allocation = true;
        self
    }

    /// Every call fails.
    pub fn with_all_failures(self) -> Self {
        self.with_forecast_failure()
            .with_adjustment_failure()
            .with_allocation_failure()
    }

    /// Sleep this long before answering each call (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn forecast_calls(&self) -> usize {
        self.forecast_count.load(Ordering::SeqCst)
    }

    pub fn adjustment_calls(&self) -> usize {
        self.adjustment_count.load(Ordering::SeqCst)
    }

    pub fn allocation_calls(&self) -> usize {
        self.allocation_count.load(Ordering::SeqCst)
    }

    /// Total calls across all stages.
    pub fn total_calls(&self) -> usize {
        self.forecast_calls() + self.adjustment_calls() + self.allocation_calls()
    }

    async fn maybe_delay(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AdvisoryClient for MockAdvisory {
    fn name(&self) -> &str {
        "mock"
    }

    async fn forecast_advice(
        &self,
        _context: &ForecastContext,
    ) -> Result<ForecastAdvice, AdvisoryError> {
        self.forecast_count.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        if self.fail_forecast {
            return Err(AdvisoryError::Llm("advisory unavailable (mock)".to_string()));
        }
        Ok(self.forecast_advice.lock().unwrap().clone().unwrap_or_default())
    }

    async fn adjustment_advice(
        &self,
        _context: &AdjustmentContext,
    ) -> Result<AdjustmentAdvice, AdvisoryError> {
        self.adjustment_count.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        if self.fail_adjustment {
            return Err(AdvisoryError::Llm("advisory unavailable (mock)".to_string()));
        }
        Ok(self
            .adjustment_advice
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(AdjustmentAdvice::neutral))
    }

    async fn allocation_advice(
        &self,
        _context: &AllocationContext,
    ) -> Result<AllocationAdvice, AdvisoryError> {
        self.allocation_count.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        if self.fail_allocation {
            return Err(AdvisoryError::Llm("advisory unavailable (mock)".to_string()));
        }
        Ok(self.allocation_advice.lock().unwrap().clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast_context() -> ForecastContext {
        ForecastContext {
            item_id: "med-1".to_string(),
            item_name: "Test".to_string(),
            category: "antibiotic".to_string(),
            avg_daily: 10.0,
            std_dev: 1.0,
            trend_factor: 1.0,
            horizon_months: 1,
            as_of: chrono::NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_default_advice_and_counting() {
        let mock = MockAdvisory::new();
        let advice = mock.forecast_advice(&forecast_context()).await.unwrap();
        assert!(advice.qualitative_factors.is_empty());
        assert_eq!(mock.forecast_calls(), 1);
        assert_eq!(mock.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mock = MockAdvisory::new().with_forecast_failure();
        let result = mock.forecast_advice(&forecast_context()).await;
        assert!(matches!(result, Err(AdvisoryError::Llm(_))));
        // Failed calls still count.
        assert_eq!(mock.forecast_calls(), 1);
    }

    #[tokio::test]
    async fn test_configured_advice_is_returned() {
        let mock = MockAdvisory::new().with_forecast_advice(ForecastAdvice {
            qualitative_factors: vec!["flu season".to_string()],
            rationale: "winter".to_string(),
            confidence: 0.7,
        });
        let advice = mock.forecast_advice(&forecast_context()).await.unwrap();
        assert_eq!(advice.qualitative_factors, vec!["flu season"]);
    }
}
