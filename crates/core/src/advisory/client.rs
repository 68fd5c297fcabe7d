//! LLM-backed advisory client.
//!
//! Builds stage-specific prompts, extracts JSON from tolerant responses,
//! and retries exactly once with a stricter instruction before giving up.
//! Errors are returned to the stage, which applies its own fallback;
//! advisory latency or garbage must never cascade into pipeline failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::config::{AdvisoryConfig, AdvisoryProvider};
use super::json::extract_json_object;
use super::llm::{AnthropicClient, CompletionRequest, LlmClient, OllamaClient};
use super::traits::{AdvisoryClient, AdvisoryError};
use super::types::{
    AdjustmentAdvice, AdjustmentContext, AllocationAdvice, AllocationContext, ForecastAdvice,
    ForecastContext,
};

/// Appended to the prompt on the single retry after an unparsable response.
const STRICT_INSTRUCTION: &str =
    "\n\nIMPORTANT: respond with ONLY a single valid JSON object matching the schema. \
     No code fences, no commentary, no text before or after the object.";

/// Advisory client backed by an LLM.
///
/// Generic over the LLM client type to support different backends
/// (Anthropic, Ollama, mocks in tests).
pub struct LlmAdvisory<C: LlmClient> {
    client: Arc<C>,
    timeout: Duration,
    max_tokens: u32,
}

impl<C: LlmClient> LlmAdvisory<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(10),
            max_tokens: 1024,
        }
    }

    /// Per-call timeout, independent of the overall run timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// One completion attempt: call, extract JSON, parse.
    async fn query_once<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: String,
    ) -> Result<T, AdvisoryError> {
        let request = CompletionRequest::new(prompt)
            .with_system(system)
            .with_max_tokens(self.max_tokens);

        let response = tokio::time::timeout(self.timeout, self.client.complete(request))
            .await
            .map_err(|_| AdvisoryError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| AdvisoryError::Llm(e.to_string()))?;

        let json = extract_json_object(&response.text).ok_or_else(|| {
            AdvisoryError::Unparsable(format!("no JSON object in response: {}", response.text))
        })?;

        serde_json::from_str(&json)
            .map_err(|e| AdvisoryError::Unparsable(format!("{}: {}", e, json)))
    }

    /// Query with the retry policy: an unparsable response gets exactly
    /// one retry with a stricter instruction appended; transport errors
    /// and timeouts fail straight to the stage fallback.
    async fn query<T: DeserializeOwned>(
        &self,
        stage: &str,
        system: &str,
        prompt: String,
    ) -> Result<T, AdvisoryError> {
        let result = match self.query_once(system, prompt.clone()).await {
            Ok(advice) => Ok(advice),
            Err(AdvisoryError::Unparsable(reason)) => {
                tracing::warn!(stage, "Unparsable advisory response, retrying: {}", reason);
                self.query_once(system, format!("{}{}", prompt, STRICT_INSTRUCTION))
                    .await
            }
            Err(e) => Err(e),
        };

        let outcome = if result.is_ok() { "ok" } else { "error" };
        crate::metrics::ADVISORY_REQUESTS
            .with_label_values(&[stage, outcome])
            .inc();
        result
    }
}

fn forecast_system_prompt() -> &'static str {
    "You are a pharmacy supply planner. Given an item's consumption statistics, \
     identify qualitative demand factors the statistics cannot capture \
     (seasonal illness waves, regulatory changes, supply disruptions).\n\n\
     Respond with JSON only:\n\
     {\n\
       \"qualitative_factors\": [\"short factor descriptions\"],\n\
       \"rationale\": \"one or two sentences\",\n\
       \"confidence\": 0.0\n\
     }"
}

fn adjustment_system_prompt() -> &'static str {
    "You are a pharmacy supply planner. Given an item and the current month, \
     estimate a single multiplicative adjustment for any anticipated demand \
     event (outbreaks, holidays, policy changes). Use 1.0 when nothing is \
     anticipated. Keep the factor within 0.5 to 2.0.\n\n\
     Respond with JSON only:\n\
     {\n\
       \"event_adjustment\": 1.0,\n\
       \"event_name\": \"name of the event or empty\",\n\
       \"confidence\": 0.0,\n\
       \"rationale\": \"one or two sentences\"\n\
     }"
}

fn allocation_system_prompt() -> &'static str {
    "You are a pharmacy procurement planner. Given an order quantity and the \
     qualifying suppliers with their scores and lead times, recommend whether \
     to source from a single supplier or split the order for resilience.\n\n\
     Respond with JSON only:\n\
     {\n\
       \"strategy\": \"single\" or \"split\",\n\
       \"preferred_suppliers\": [\"supplier names, best first\"],\n\
       \"split_ratios\": [70, 30],\n\
       \"rationale\": \"one or two sentences\"\n\
     }"
}

fn forecast_prompt(context: &ForecastContext) -> String {
    format!(
        "ITEM: {} ({})\nCATEGORY: {}\nDATE: {}\n\n\
         STATISTICS:\n\
         - average daily consumption: {:.2} units\n\
         - standard deviation: {:.2}\n\
         - trend factor (recent vs prior): {:.2}\n\
         - forecast horizon: {} month(s)\n\n\
         What qualitative factors should a planner be aware of?",
        context.item_name,
        context.item_id,
        context.category,
        context.as_of,
        context.avg_daily,
        context.std_dev,
        context.trend_factor,
        context.horizon_months,
    )
}

fn adjustment_prompt(context: &AdjustmentContext) -> String {
    format!(
        "ITEM: {} ({})\nCATEGORY: {}\nCURRENT MONTH: {}\n\
         FORECAST QUANTITY: {} units\n\n\
         Is there an anticipated event that should adjust this order?",
        context.item_name, context.item_id, context.category, context.month,
        context.forecast_quantity,
    )
}

fn allocation_prompt(context: &AllocationContext) -> String {
    let mut prompt = format!(
        "ITEM: {} ({})\nORDER QUANTITY: {} units\n\nQUALIFYING SUPPLIERS:\n",
        context.item_name, context.item_id, context.quantity,
    );
    for candidate in &context.candidates {
        prompt.push_str(&format!(
            "- {} (score {:.2}, lead time {:.1} days)\n",
            candidate.name, candidate.score, candidate.lead_time_days,
        ));
    }
    prompt.push_str("\nShould this order go to one supplier or be split?");
    prompt
}

#[async_trait]
impl<C: LlmClient + 'static> AdvisoryClient for LlmAdvisory<C> {
    fn name(&self) -> &str {
        self.client.provider()
    }

    async fn forecast_advice(
        &self,
        context: &ForecastContext,
    ) -> Result<ForecastAdvice, AdvisoryError> {
        let mut advice: ForecastAdvice = self
            .query("forecast", forecast_system_prompt(), forecast_prompt(context))
            .await?;
        advice.confidence = advice.confidence.clamp(0.0, 1.0);
        Ok(advice)
    }

    async fn adjustment_advice(
        &self,
        context: &AdjustmentContext,
    ) -> Result<AdjustmentAdvice, AdvisoryError> {
        let advice: AdjustmentAdvice = self
            .query(
                "adjustment",
                adjustment_system_prompt(),
                adjustment_prompt(context),
            )
            .await?;
        Ok(advice.clamped())
    }

    async fn allocation_advice(
        &self,
        context: &AllocationContext,
    ) -> Result<AllocationAdvice, AdvisoryError> {
        let mut advice: AllocationAdvice = self
            .query(
                "allocation",
                allocation_system_prompt(),
                allocation_prompt(context),
            )
            .await?;
        advice.split_ratios.retain(|r| *r > 0.0);
        Ok(advice)
    }
}

/// Build an advisory client from configuration.
pub fn create_advisory_client(
    config: &AdvisoryConfig,
) -> Result<Arc<dyn AdvisoryClient>, AdvisoryError> {
    let timeout = Duration::from_secs(config.timeout_secs);

    match config.provider {
        AdvisoryProvider::Anthropic => {
            let api_key = config.api_key.as_ref().ok_or(AdvisoryError::NotConfigured)?;
            let mut client = AnthropicClient::new(api_key.clone(), config.model.clone())
                .with_timeout(timeout);
            if let Some(ref api_base) = config.api_base {
                client = client.with_api_base(api_base.clone());
            }
            Ok(Arc::new(
                LlmAdvisory::new(Arc::new(client))
                    .with_timeout(timeout)
                    .with_max_tokens(config.max_tokens),
            ))
        }
        AdvisoryProvider::Ollama => {
            let mut client = OllamaClient::new(config.model.clone()).with_timeout(timeout);
            if let Some(ref api_base) = config.api_base {
                client = client.with_api_base(api_base.clone());
            }
            Ok(Arc::new(
                LlmAdvisory::new(Arc::new(client))
                    .with_timeout(timeout)
                    .with_max_tokens(config.max_tokens),
            ))
        }
    }
}
