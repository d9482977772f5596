//! Configuration for earnings analysis runs

use crate::error::{EarningsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Peer quotes are display-only and capped at this many tickers
pub const MAX_PEER_QUOTES: usize = 3;

/// Configuration for the analysis pipeline and its collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Cache TTL for price snapshots and statements
    pub cache_ttl_quotes: Duration,

    /// Cache TTL for company information
    pub cache_ttl_company: Duration,

    /// Cache TTL for sector and peer data
    pub cache_ttl_sector: Duration,

    /// Cache TTL for extracted document text
    pub cache_ttl_documents: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Maximum number of retries for API calls
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Alpha Vantage requests allowed per minute
    pub requests_per_minute: u32,

    pub alpha_vantage_api_key: Option<String>,

    /// Appended to bare tickers for price lookups
    pub exchange_suffix: String,

    /// Quarters considered by the trend analyzer
    pub max_quarters: usize,

    /// Peer quotes fetched for display
    pub max_peers: usize,

    /// Replaces the built-in peer table when set
    pub peer_table_path: Option<PathBuf>,

    pub narration_enabled: bool,
    pub llm_api_base: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cache_ttl_quotes: Duration::from_secs(900),       // 15 minutes
            cache_ttl_company: Duration::from_secs(3600),     // 1 hour
            cache_ttl_sector: Duration::from_secs(1800),      // 30 minutes
            cache_ttl_documents: Duration::from_secs(86_400), // 24 hours
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff_base: Duration::from_secs(1),
            requests_per_minute: 5,
            alpha_vantage_api_key: None,
            exchange_suffix: ".NS".to_string(),
            max_quarters: 8,
            max_peers: MAX_PEER_QUOTES,
            peer_table_path: None,
            narration_enabled: true,
            llm_api_base: "https://api.openai.com/v1".to_string(),
            llm_api_key: None,
            llm_model: "gpt-4o-mini".to_string(),
            llm_max_tokens: 400,
            llm_temperature: 0.3,
        }
    }
}

impl AgentConfig {
    /// Create a new configuration builder
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Overlay settings from environment variables
    pub fn with_env(mut self) -> Self {
        if let Ok(key) = std::env::var("ALPHA_VANTAGE_API_KEY") {
            self.alpha_vantage_api_key = Some(key);
        }
        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            self.llm_api_base = base;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.llm_api_key = Some(key);
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            self.llm_model = model;
        }
        if let Ok(path) = std::env::var("EARNINGS_PEER_TABLE") {
            self.peer_table_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(EarningsError::ConfigError(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.max_quarters == 0 {
            return Err(EarningsError::ConfigError(
                "max_quarters must be greater than 0".to_string(),
            ));
        }

        if self.max_peers > MAX_PEER_QUOTES {
            return Err(EarningsError::ConfigError(format!(
                "max_peers must be at most {MAX_PEER_QUOTES}"
            )));
        }

        if self.requests_per_minute == 0 {
            return Err(EarningsError::ConfigError(
                "requests_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.narration_enabled && self.llm_model.trim().is_empty() {
            return Err(EarningsError::ConfigError(
                "llm_model is required when narration is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Ticker with the exchange suffix appended when it has none
    pub fn exchange_symbol(&self, ticker: &str) -> String {
        let ticker = ticker.trim().to_uppercase();
        if ticker.contains('.') || self.exchange_suffix.is_empty() {
            ticker
        } else {
            format!("{ticker}{}", self.exchange_suffix)
        }
    }
}

/// Builder for AgentConfig
#[derive(Debug, Default)]
pub struct AgentConfigBuilder {
    cache_ttl_quotes: Option<Duration>,
    cache_ttl_company: Option<Duration>,
    cache_ttl_sector: Option<Duration>,
    cache_ttl_documents: Option<Duration>,
    request_timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
    requests_per_minute: Option<u32>,
    alpha_vantage_api_key: Option<String>,
    exchange_suffix: Option<String>,
    max_quarters: Option<usize>,
    max_peers: Option<usize>,
    peer_table_path: Option<PathBuf>,
    narration_enabled: Option<bool>,
    llm_api_base: Option<String>,
    llm_api_key: Option<String>,
    llm_model: Option<String>,
}

impl AgentConfigBuilder {
    pub fn cache_ttl_quotes(mut self, duration: Duration) -> Self {
        self.cache_ttl_quotes = Some(duration);
        self
    }

    pub fn cache_ttl_company(mut self, duration: Duration) -> Self {
        self.cache_ttl_company = Some(duration);
        self
    }

    pub fn cache_ttl_sector(mut self, duration: Duration) -> Self {
        self.cache_ttl_sector = Some(duration);
        self
    }

    pub fn cache_ttl_documents(mut self, duration: Duration) -> Self {
        self.cache_ttl_documents = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set maximum retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    pub fn requests_per_minute(mut self, limit: u32) -> Self {
        self.requests_per_minute = Some(limit);
        self
    }

    /// Set Alpha Vantage API key
    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    pub fn exchange_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.exchange_suffix = Some(suffix.into());
        self
    }

    pub fn max_quarters(mut self, quarters: usize) -> Self {
        self.max_quarters = Some(quarters);
        self
    }

    pub fn max_peers(mut self, peers: usize) -> Self {
        self.max_peers = Some(peers);
        self
    }

    pub fn peer_table_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.peer_table_path = Some(path.into());
        self
    }

    pub fn narration_enabled(mut self, enabled: bool) -> Self {
        self.narration_enabled = Some(enabled);
        self
    }

    pub fn llm_api_base(mut self, base: impl Into<String>) -> Self {
        self.llm_api_base = Some(base.into());
        self
    }

    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.llm_api_key = Some(key.into());
        self
    }

    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = Some(model.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AgentConfig> {
        let defaults = AgentConfig::default();

        let config = AgentConfig {
            cache_ttl_quotes: self.cache_ttl_quotes.unwrap_or(defaults.cache_ttl_quotes),
            cache_ttl_company: self.cache_ttl_company.unwrap_or(defaults.cache_ttl_company),
            cache_ttl_sector: self.cache_ttl_sector.unwrap_or(defaults.cache_ttl_sector),
            cache_ttl_documents: self
                .cache_ttl_documents
                .unwrap_or(defaults.cache_ttl_documents),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_base: self.retry_backoff_base.unwrap_or(defaults.retry_backoff_base),
            requests_per_minute: self
                .requests_per_minute
                .unwrap_or(defaults.requests_per_minute),
            alpha_vantage_api_key: self.alpha_vantage_api_key,
            exchange_suffix: self.exchange_suffix.unwrap_or(defaults.exchange_suffix),
            max_quarters: self.max_quarters.unwrap_or(defaults.max_quarters),
            max_peers: self.max_peers.unwrap_or(defaults.max_peers),
            peer_table_path: self.peer_table_path,
            narration_enabled: self.narration_enabled.unwrap_or(defaults.narration_enabled),
            llm_api_base: self.llm_api_base.unwrap_or(defaults.llm_api_base),
            llm_api_key: self.llm_api_key,
            llm_model: self.llm_model.unwrap_or(defaults.llm_model),
            llm_max_tokens: defaults.llm_max_tokens,
            llm_temperature: defaults.llm_temperature,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.cache_ttl_quotes, Duration::from_secs(15 * 60));
        assert_eq!(config.cache_ttl_documents, Duration::from_secs(24 * 3600));
        assert_eq!(config.max_quarters, 8);
        assert_eq!(config.max_peers, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = AgentConfig::builder()
            .max_retries(5)
            .max_quarters(4)
            .request_timeout(Duration::from_secs(10))
            .narration_enabled(false)
            .build()
            .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_quarters, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(!config.narration_enabled);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(AgentConfig::builder().max_retries(0).build().is_err());
        assert!(AgentConfig::builder().max_quarters(0).build().is_err());
        assert!(AgentConfig::builder().max_peers(4).build().is_err());
        assert!(AgentConfig::builder().llm_model(" ").build().is_err());
        assert!(
            AgentConfig::builder()
                .llm_model("")
                .narration_enabled(false)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_exchange_symbol() {
        let config = AgentConfig::default();
        assert_eq!(config.exchange_symbol("reliance"), "RELIANCE.NS");
        assert_eq!(config.exchange_symbol("TCS.BO"), "TCS.BO");
    }
}
