use serde::{Deserialize, Serialize};

use crate::advisory::AdvisoryConfig;
use crate::pipeline::GeneratorConfig;
use crate::stages::{AdjustmentConfig, AllocationConfig, ForecastConfig};

/// Root configuration.
///
/// Every section has working defaults; an empty file is a valid
/// configuration that runs the pipeline without an advisory service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub adjustment: AdjustmentConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
    /// Advisory service configuration. Absent = advisory disabled and
    /// every stage runs on its deterministic fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory: Option<AdvisoryConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::AdvisoryProvider;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.generator.cache_ttl_secs, 300);
        assert_eq!(config.forecast.horizon_months, 1);
        assert_eq!(config.forecast.lookback_days, 90);
        assert!(config.allocation.split_enabled);
        assert!(config.advisory.is_none());
    }

    #[test]
    fn test_deserialize_sections() {
        let toml = r#"
[generator]
cache_ttl_secs = 120

[forecast]
horizon_months = 2

[allocation]
split_min_quantity = 50

[advisory]
provider = "ollama"
model = "llama3"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.generator.cache_ttl_secs, 120);
        assert_eq!(config.forecast.horizon_months, 2);
        assert_eq!(config.allocation.split_min_quantity, 50);
        let advisory = config.advisory.unwrap();
        assert_eq!(advisory.provider, AdvisoryProvider::Ollama);
    }

    #[test]
    fn test_adjustment_table_override() {
        let toml = r#"
[adjustment]
flu_boost = 1.4

[adjustment.seasonal_factors]
1 = 1.3
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.adjustment.flu_boost, 1.4);
        assert_eq!(config.adjustment.seasonal_factors.get(&1), Some(&1.3));
        // Overriding the table replaces it entirely.
        assert!(config.adjustment.seasonal_factors.get(&12).is_none());
    }
}
