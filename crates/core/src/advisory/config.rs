//! Advisory service configuration.

use serde::{Deserialize, Serialize};

/// Advisory LLM provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryProvider {
    /// Anthropic Claude API.
    Anthropic,
    /// Local Ollama instance.
    Ollama,
}

/// Configuration for the advisory client.
///
/// Absent configuration disables advisory queries entirely; every stage
/// then runs on its deterministic fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    pub provider: AdvisoryProvider,
    /// Model name/identifier.
    pub model: String,
    /// API key (required for Anthropic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API base URL (for proxies or self-hosted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Per-call timeout in seconds, independent of the run timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum tokens per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_tokens() -> u32 {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_ollama() {
        let toml = r#"
            provider = "ollama"
            model = "llama3"
        "#;
        let config: AdvisoryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.provider, AdvisoryProvider::Ollama);
        assert_eq!(config.model, "llama3");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.max_tokens, 1024);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_deserialize_full_anthropic() {
        let toml = r#"
            provider = "anthropic"
            model = "claude-3-haiku-20240307"
            api_key = "sk-test"
            timeout_secs = 5
            max_tokens = 512
        "#;
        let config: AdvisoryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.provider, AdvisoryProvider::Anthropic);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.timeout_secs, 5);
    }
}
