//! Alpha Vantage API client for fundamentals and quarterly statements

use crate::error::{EarningsError, Result};
use chrono::NaiveDate;
use earnings_core::StatementTable;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Alpha Vantage API client
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

/// Company overview data
///
/// Alpha Vantage sends every number as a string and uses `"None"` or `"-"`
/// for missing values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CompanyOverview {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    #[serde(rename = "MarketCapitalization")]
    pub market_cap: Option<String>,
    #[serde(rename = "PERatio")]
    pub pe_ratio: Option<String>,
    #[serde(rename = "PriceToBookRatio")]
    pub price_to_book: Option<String>,
    #[serde(rename = "ReturnOnEquityTTM")]
    pub return_on_equity: Option<String>,
    pub profit_margin: Option<String>,
}

impl CompanyOverview {
    pub fn pe_ratio(&self) -> Option<f64> {
        parse_number(self.pe_ratio.as_deref())
    }

    pub fn price_to_book(&self) -> Option<f64> {
        parse_number(self.price_to_book.as_deref())
    }

    pub fn return_on_equity(&self) -> Option<f64> {
        parse_number(self.return_on_equity.as_deref())
    }

    pub fn profit_margin(&self) -> Option<f64> {
        parse_number(self.profit_margin.as_deref())
    }

    pub fn market_cap(&self) -> Option<f64> {
        parse_number(self.market_cap.as_deref())
    }
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn field(report: &serde_json::Value, name: &str) -> Option<f64> {
    parse_number(report.get(name).and_then(serde_json::Value::as_str))
}

/// Turn `quarterlyReports` from INCOME_STATEMENT into a statement table
pub fn statement_from_reports(symbol: &str, data: &serde_json::Value) -> Result<StatementTable> {
    let reports = data
        .get("quarterlyReports")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| EarningsError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "no quarterly reports in income statement".to_string(),
        })?;

    let mut periods = Vec::with_capacity(reports.len());
    let mut revenue = Vec::with_capacity(reports.len());
    let mut net_income = Vec::with_capacity(reports.len());

    for report in reports {
        let Some(period) = report
            .get("fiscalDateEnding")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        else {
            tracing::warn!(symbol, "Skipping quarterly report without a fiscal date");
            continue;
        };
        periods.push(period);
        revenue.push(field(report, "totalRevenue"));
        net_income.push(field(report, "netIncome"));
    }

    // newest first regardless of response order
    let mut rows: Vec<_> = periods
        .into_iter()
        .zip(revenue.into_iter().zip(net_income))
        .collect();
    rows.sort_by(|a, b| b.0.cmp(&a.0));

    let periods = rows.iter().map(|(p, _)| *p).collect();
    let revenue = rows.iter().map(|(_, (r, _))| *r).collect();
    let net_income = rows.iter().map(|(_, (_, n))| *n).collect();

    Ok(StatementTable::new(periods)
        .with_row("Total Revenue", revenue)
        .with_row("Net Income", net_income))
}

/// Debt-to-equity of the newest quarterly balance sheet
pub fn debt_to_equity_from_balance_sheet(data: &serde_json::Value) -> Option<f64> {
    let latest = data
        .get("quarterlyReports")
        .and_then(serde_json::Value::as_array)?
        .iter()
        .max_by_key(|r| {
            r.get("fiscalDateEnding")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        })?;

    let equity = field(latest, "totalShareholderEquity").filter(|e| *e != 0.0)?;
    let debt = field(latest, "shortLongTermDebtTotal")
        .or_else(|| field(latest, "totalLiabilities"))?;
    Some(debt / equity)
}

impl AlphaVantageClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_key` - Alpha Vantage API key
    /// * `rate_limit` - Maximum requests per minute (5 on the free tier)
    /// * `timeout` - Per-request timeout
    pub fn new(api_key: impl Into<String>, rate_limit: u32, timeout: Duration) -> Result<Self> {
        let per_minute = NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            rate_limiter,
        })
    }

    /// Create from environment variable ALPHA_VANTAGE_API_KEY with the free tier limit
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ALPHA_VANTAGE_API_KEY").map_err(|_| {
            EarningsError::ConfigError(
                "ALPHA_VANTAGE_API_KEY environment variable not set".to_string(),
            )
        })?;

        Self::new(api_key, 5, Duration::from_secs(30))
    }

    /// Rate-limited GET against the query endpoint
    async fn query(&self, function: &str, symbol: &str) -> Result<serde_json::Value> {
        self.rate_limiter.until_ready().await;

        let mut params = HashMap::new();
        params.insert("function", function);
        params.insert("symbol", symbol);
        params.insert("apikey", self.api_key.as_str());

        let response = self.client.get(BASE_URL).query(&params).send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EarningsError::RateLimitExceeded {
                provider: PROVIDER.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(EarningsError::AlphaVantageError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let data: serde_json::Value = response.json().await?;
        check_response(symbol, data)
    }

    /// Get company overview and valuation ratios
    pub async fn get_company_overview(&self, symbol: &str) -> Result<CompanyOverview> {
        let data = self.query("OVERVIEW", symbol).await?;
        let overview: CompanyOverview = serde_json::from_value(data)?;
        Ok(overview)
    }

    /// Get quarterly revenue and net income
    pub async fn get_income_statement(&self, symbol: &str) -> Result<StatementTable> {
        let data = self.query("INCOME_STATEMENT", symbol).await?;
        statement_from_reports(symbol, &data)
    }

    /// Get the latest quarterly debt-to-equity ratio
    pub async fn get_debt_to_equity(&self, symbol: &str) -> Result<Option<f64>> {
        let data = self.query("BALANCE_SHEET", symbol).await?;
        Ok(debt_to_equity_from_balance_sheet(&data))
    }
}

/// Map Alpha Vantage's in-band error payloads onto errors
fn check_response(symbol: &str, data: serde_json::Value) -> Result<serde_json::Value> {
    if let Some(error) = data.get("Error Message") {
        return Err(EarningsError::AlphaVantageError(error.to_string()));
    }

    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(EarningsError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
        });
    }

    // an empty object means the symbol is unknown
    if data.as_object().is_none_or(serde_json::Map::is_empty) {
        return Err(EarningsError::InvalidSymbol(symbol.to_string()));
    }

    Ok(data)
}
