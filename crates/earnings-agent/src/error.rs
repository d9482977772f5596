//! Error types for fetching, caching and narrating earnings data

use earnings_core::PeerTableError;
use thiserror::Error;

/// Errors raised at the collaborator boundary
///
/// The analytics themselves never fail with these; they report
/// [`earnings_core::Unavailable`] instead. Everything here is recoverable
/// from the orchestrator's point of view and ends up as a report warning.
#[derive(Debug, Error)]
pub enum EarningsError {
    /// API request failed
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Provider answered but had nothing for the symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    #[error("Alpha Vantage error: {0}")]
    AlphaVantageError(String),

    /// Language-model narration failed
    #[error("Narration error: {0}")]
    NarrationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Peer table error: {0}")]
    PeerTable(#[from] PeerTableError),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl EarningsError {
    /// Whether a message from an upstream service indicates throttling
    pub fn looks_rate_limited(message: &str) -> bool {
        let lower = message.to_lowercase();
        lower.contains("429") || lower.contains("too many requests")
    }

    pub fn is_rate_limit(&self) -> bool {
        match self {
            EarningsError::RateLimitExceeded { .. } => true,
            EarningsError::NetworkError(err) => {
                err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS)
            }
            EarningsError::YahooFinanceError(msg) | EarningsError::ApiError(msg) => {
                Self::looks_rate_limited(msg)
            }
            _ => false,
        }
    }
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, EarningsError>;
