//! Yahoo Finance price client

use crate::error::{EarningsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use yahoo_finance_api as yahoo;

/// Yahoo Finance API client
#[derive(Debug, Clone, Default)]
pub struct YahooFinanceClient {}

/// Latest daily quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: u64,
}

impl YahooFinanceClient {
    pub fn new() -> Self {
        Self {}
    }

    /// Get the latest quote for an exchange-qualified symbol
    #[tracing::instrument(skip(self))]
    pub async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let provider = yahoo::YahooConnector::new().map_err(map_yahoo_error)?;

        let response = provider
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(map_yahoo_error)?;

        let quote = response.last_quote().map_err(map_yahoo_error)?;

        Ok(Quote {
            symbol: symbol.to_string(),
            timestamp: DateTime::from_timestamp(quote.timestamp as i64, 0).unwrap_or_else(Utc::now),
            close: quote.close,
            volume: quote.volume,
        })
    }
}

fn map_yahoo_error(err: impl std::fmt::Display) -> EarningsError {
    let message = err.to_string();
    if EarningsError::looks_rate_limited(&message) {
        EarningsError::RateLimitExceeded {
            provider: "Yahoo Finance".to_string(),
        }
    } else {
        EarningsError::YahooFinanceError(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_mapping() {
        assert!(matches!(
            map_yahoo_error("fetching the data from yahoo! finance failed: 429 Too Many Requests"),
            EarningsError::RateLimitExceeded { .. }
        ));
        assert!(matches!(
            map_yahoo_error("no quotes found"),
            EarningsError::YahooFinanceError(_)
        ));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_get_quote() {
        let client = YahooFinanceClient::new();
        let quote = client.get_quote("RELIANCE.NS").await.unwrap();
        assert_eq!(quote.symbol, "RELIANCE.NS");
        assert!(quote.close > 0.0);
    }
}
