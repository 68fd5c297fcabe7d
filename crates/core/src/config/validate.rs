use super::{types::Config, ConfigError};

/// Validate cross-field constraints the type system cannot express:
/// - forecast horizon and lookback are non-zero
/// - allocation weights are in [0, 1] and sum to 1.0
/// - thresholds and lead-time bounds are in range
/// - adjustment factors are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.forecast.horizon_months == 0 {
        return Err(ConfigError::ValidationError(
            "forecast.horizon_months must be at least 1".to_string(),
        ));
    }
    if config.forecast.lookback_days == 0 {
        return Err(ConfigError::ValidationError(
            "forecast.lookback_days must be at least 1".to_string(),
        ));
    }

    let allocation = &config.allocation;
    for (name, weight) in [
        ("lead_weight", allocation.lead_weight),
        ("status_weight", allocation.status_weight),
        ("price_weight", allocation.price_weight),
    ] {
        if !(0.0..=1.0).contains(&weight) {
            return Err(ConfigError::ValidationError(format!(
                "allocation.{} must be within [0, 1], got {}",
                name, weight
            )));
        }
    }
    let weight_sum = allocation.lead_weight + allocation.status_weight + allocation.price_weight;
    if (weight_sum - 1.0).abs() > 0.01 {
        return Err(ConfigError::ValidationError(format!(
            "allocation weights must sum to 1.0, got {:.3}",
            weight_sum
        )));
    }
    if !(0.0..=1.0).contains(&allocation.min_score) {
        return Err(ConfigError::ValidationError(
            "allocation.min_score must be within [0, 1]".to_string(),
        ));
    }
    if allocation.max_lead_time_days <= 0.0 {
        return Err(ConfigError::ValidationError(
            "allocation.max_lead_time_days must be positive".to_string(),
        ));
    }

    let adjustment = &config.adjustment;
    for (name, factor) in [
        ("flu_boost", adjustment.flu_boost),
        ("holiday_reduction", adjustment.holiday_reduction),
        ("summer_reduction", adjustment.summer_reduction),
    ] {
        if factor <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "adjustment.{} must be positive, got {}",
                name, factor
            )));
        }
    }
    for (&month, &factor) in &adjustment.seasonal_factors {
        if !(1..=12).contains(&month) {
            return Err(ConfigError::ValidationError(format!(
                "adjustment.seasonal_factors has invalid month {}",
                month
            )));
        }
        if factor <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "adjustment.seasonal_factors[{}] must be positive",
                month
            )));
        }
    }

    if let Some(advisory) = &config.advisory {
        if advisory.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "advisory.timeout_secs must be at least 1".to_string(),
            ));
        }
        if advisory.model.is_empty() {
            return Err(ConfigError::ValidationError(
                "advisory.model must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_horizon_fails() {
        let mut config = Config::default();
        config.forecast.horizon_months = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = Config::default();
        config.allocation.lead_weight = 0.9;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_invalid_seasonal_month_fails() {
        let mut config = Config::default();
        config.adjustment.seasonal_factors.insert(13, 1.1);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("invalid month 13"));
    }

    #[test]
    fn test_advisory_requires_model() {
        let mut config = Config::default();
        config.advisory = Some(crate::advisory::AdvisoryConfig {
            provider: crate::advisory::AdvisoryProvider::Ollama,
            model: String::new(),
            api_key: None,
            api_base: None,
            timeout_secs: 10,
            max_tokens: 1024,
        });
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("advisory.model"));
    }
}
