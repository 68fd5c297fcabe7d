//! Generator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the plan generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Time-to-live for cached responses, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeneratorConfig::default();
        assert_eq!(config.cache_ttl_secs, 300);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: GeneratorConfig = toml::from_str("").unwrap();
        assert_eq!(config.cache_ttl_secs, 300);
    }

    #[test]
    fn test_deserialize_override() {
        let config: GeneratorConfig = toml::from_str("cache_ttl_secs = 60").unwrap();
        assert_eq!(config.cache_ttl_secs, 60);
    }
}
