//! Fundamentals providers: live market data, offline fixtures and a caching decorator

use crate::api::{AlphaVantageClient, CompanyOverview, YahooFinanceClient};
use crate::cache::{
    CacheKey, CacheManager, ExpiringCache, PREFIX_COMPANY_INFO, PREFIX_STATEMENT,
    PREFIX_STOCK_DATA,
};
use crate::config::{AgentConfig, MAX_PEER_QUOTES};
use crate::error::{EarningsError, Result};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use earnings_core::{CompanyInfo, RawFundamentals, StatementTable, normalize_ticker};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// Source of price, ratios, quarterly statements and company details
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    /// Provider name for logs and warnings
    fn name(&self) -> &'static str;

    async fn fetch_snapshot(&self, symbol: &str) -> Result<RawFundamentals>;

    /// Quarterly income statement, newest period first
    async fn fetch_income_statement(&self, symbol: &str) -> Result<StatementTable>;

    async fn fetch_company_info(&self, symbol: &str) -> Result<CompanyInfo>;
}

#[async_trait]
impl<P: FundamentalsProvider + ?Sized> FundamentalsProvider for Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<RawFundamentals> {
        (**self).fetch_snapshot(symbol).await
    }

    async fn fetch_income_statement(&self, symbol: &str) -> Result<StatementTable> {
        (**self).fetch_income_statement(symbol).await
    }

    async fn fetch_company_info(&self, symbol: &str) -> Result<CompanyInfo> {
        (**self).fetch_company_info(symbol).await
    }
}

/// Alpha Vantage lists Indian equities under a `.BSE` suffix
pub fn alpha_vantage_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    let bare = normalize_ticker(&upper);
    if upper.ends_with(".NS") || upper.ends_with(".BO") {
        format!("{bare}.BSE")
    } else {
        upper
    }
}

/// Live provider: prices from Yahoo Finance, fundamentals from Alpha Vantage
pub struct MarketDataProvider {
    config: AgentConfig,
    yahoo: YahooFinanceClient,
    alpha_vantage: Option<AlphaVantageClient>,
    overviews: ExpiringCache,
    retry: RetryPolicy,
}

impl MarketDataProvider {
    pub fn new(config: AgentConfig) -> Result<Self> {
        let alpha_vantage = match &config.alpha_vantage_api_key {
            Some(key) => Some(AlphaVantageClient::new(
                key.clone(),
                config.requests_per_minute,
                config.request_timeout,
            )?),
            None => {
                tracing::warn!("ALPHA_VANTAGE_API_KEY not set; ratios and statements unavailable");
                None
            }
        };

        Ok(Self {
            overviews: ExpiringCache::new(config.cache_ttl_company),
            retry: RetryPolicy::from_config(&config),
            yahoo: YahooFinanceClient::new(),
            alpha_vantage,
            config,
        })
    }

    fn alpha_vantage(&self, symbol: &str) -> Result<&AlphaVantageClient> {
        self.alpha_vantage
            .as_ref()
            .ok_or_else(|| EarningsError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "Alpha Vantage API key not configured".to_string(),
            })
    }

    /// OVERVIEW feeds both the snapshot and the company info; fetch it once
    async fn overview(&self, symbol: &str) -> Result<CompanyOverview> {
        let client = self.alpha_vantage(symbol)?;
        let av_symbol = alpha_vantage_symbol(symbol);
        let av = av_symbol.as_str();
        let value = self
            .overviews
            .get_or_fetch(CacheKey::new("overview", &av_symbol), || async {
                let overview = self
                    .retry
                    .execute("overview", move || client.get_company_overview(av))
                    .await?;
                Ok::<_, EarningsError>(serde_json::to_value(overview)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl FundamentalsProvider for MarketDataProvider {
    fn name(&self) -> &'static str {
        "market-data"
    }

    #[instrument(skip(self))]
    async fn fetch_snapshot(&self, symbol: &str) -> Result<RawFundamentals> {
        let exchange_symbol = self.config.exchange_symbol(symbol);

        let yahoo = &self.yahoo;
        let quote_symbol = exchange_symbol.as_str();
        let quote = self
            .retry
            .execute("quote", move || yahoo.get_quote(quote_symbol))
            .await;
        let price = match quote {
            Ok(quote) => Some(quote.close),
            Err(e) => {
                tracing::warn!(symbol = %exchange_symbol, error = %e, "Price lookup failed");
                None
            }
        };

        let overview = match self.overview(&exchange_symbol).await {
            Ok(overview) => Some(overview),
            Err(e) if price.is_some() => {
                tracing::warn!(symbol = %exchange_symbol, error = %e, "Overview lookup failed");
                None
            }
            Err(e) => return Err(e),
        };

        let av_symbol = alpha_vantage_symbol(&exchange_symbol);
        let av = av_symbol.as_str();
        let debt_to_equity = match self.alpha_vantage(&exchange_symbol) {
            Ok(client) => self
                .retry
                .execute("balance sheet", move || client.get_debt_to_equity(av))
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        symbol = %exchange_symbol,
                        error = %e,
                        "Balance sheet lookup failed"
                    );
                    None
                }),
            Err(_) => None,
        };

        Ok(RawFundamentals {
            price,
            pe_ratio: overview.as_ref().and_then(CompanyOverview::pe_ratio),
            pb_ratio: overview.as_ref().and_then(CompanyOverview::price_to_book),
            debt_to_equity,
            roe: overview.as_ref().and_then(CompanyOverview::return_on_equity),
            profit_margin: overview.as_ref().and_then(CompanyOverview::profit_margin),
        })
    }

    #[instrument(skip(self))]
    async fn fetch_income_statement(&self, symbol: &str) -> Result<StatementTable> {
        let exchange_symbol = self.config.exchange_symbol(symbol);
        let client = self.alpha_vantage(&exchange_symbol)?;
        let av_symbol = alpha_vantage_symbol(&exchange_symbol);
        let av = av_symbol.as_str();
        self.retry
            .execute("income statement", move || client.get_income_statement(av))
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_company_info(&self, symbol: &str) -> Result<CompanyInfo> {
        let exchange_symbol = self.config.exchange_symbol(symbol);
        let overview = self.overview(&exchange_symbol).await?;
        Ok(CompanyInfo {
            market_cap: overview.market_cap(),
            symbol: exchange_symbol,
            name: overview.name,
            sector: overview.sector,
            industry: overview.industry,
        })
    }
}

/// One company in a fixture file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureEntry {
    pub fundamentals: Option<RawFundamentals>,
    pub statement: Option<StatementTable>,
    pub company: Option<CompanyInfo>,
}

/// Offline provider backed by a JSON file keyed by bare ticker
#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    entries: HashMap<String, FixtureEntry>,
}

impl FixtureProvider {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: HashMap<String, FixtureEntry> = serde_json::from_str(json)?;
        let entries = raw
            .into_iter()
            .map(|(ticker, entry)| (normalize_ticker(&ticker), entry))
            .collect();
        Ok(Self { entries })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn insert(&mut self, ticker: &str, entry: FixtureEntry) {
        self.entries.insert(normalize_ticker(ticker), entry);
    }

    fn section<T: Clone>(
        &self,
        symbol: &str,
        pick: impl Fn(&FixtureEntry) -> Option<&T>,
        what: &str,
    ) -> Result<T> {
        self.entries
            .get(&normalize_ticker(symbol))
            .and_then(pick)
            .cloned()
            .ok_or_else(|| EarningsError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no {what} in fixture"),
            })
    }
}

#[async_trait]
impl FundamentalsProvider for FixtureProvider {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<RawFundamentals> {
        self.section(symbol, |e| e.fundamentals.as_ref(), "fundamentals")
    }

    async fn fetch_income_statement(&self, symbol: &str) -> Result<StatementTable> {
        self.section(symbol, |e| e.statement.as_ref(), "income statement")
    }

    async fn fetch_company_info(&self, symbol: &str) -> Result<CompanyInfo> {
        self.section(symbol, |e| e.company.as_ref(), "company info")
    }
}

/// Serves provider calls through the cache tiers
///
/// Responses are stored as JSON, so a cached answer deserializes into exactly
/// what a fresh one would.
pub struct CachedProvider<P> {
    inner: P,
    cache: Arc<CacheManager>,
}

impl<P: FundamentalsProvider> CachedProvider<P> {
    pub fn new(inner: P, cache: Arc<CacheManager>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    async fn cached<T, F, Fut>(
        tier: &ExpiringCache,
        prefix: &str,
        symbol: &str,
        fetch: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let key = CacheKey::new(prefix, &normalize_ticker(symbol));
        let value = tier
            .get_or_fetch(key, || async move {
                Ok::<_, EarningsError>(serde_json::to_value(fetch().await?)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl<P: FundamentalsProvider> FundamentalsProvider for CachedProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<RawFundamentals> {
        Self::cached(&self.cache.quotes, PREFIX_STOCK_DATA, symbol, || {
            self.inner.fetch_snapshot(symbol)
        })
        .await
    }

    async fn fetch_income_statement(&self, symbol: &str) -> Result<StatementTable> {
        Self::cached(&self.cache.quotes, PREFIX_STATEMENT, symbol, || {
            self.inner.fetch_income_statement(symbol)
        })
        .await
    }

    async fn fetch_company_info(&self, symbol: &str) -> Result<CompanyInfo> {
        Self::cached(&self.cache.company, PREFIX_COMPANY_INFO, symbol, || {
            self.inner.fetch_company_info(symbol)
        })
        .await
    }
}

/// Display-only figures for a sector peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerQuote {
    pub ticker: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub pe_ratio: Option<f64>,
    /// Percent
    pub profit_margin: Option<f64>,
    /// Percent
    pub roe: Option<f64>,
    pub debt_to_equity: Option<f64>,
}

/// Fetch quotes for up to three peers.
///
/// Best effort: a peer that fails is logged and left out.
pub async fn fetch_peer_quotes<P>(
    provider: &P,
    peers: &[String],
    max_peers: usize,
) -> Vec<PeerQuote>
where
    P: FundamentalsProvider + ?Sized,
{
    let limit = max_peers.min(MAX_PEER_QUOTES);
    let lookups = peers.iter().take(limit).map(|ticker| async move {
        let raw = match provider.fetch_snapshot(ticker).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(peer = %ticker, error = %e, "Peer quote unavailable");
                return None;
            }
        };
        let name = provider
            .fetch_company_info(ticker)
            .await
            .ok()
            .and_then(|info| info.name);
        let snapshot = earnings_core::FinancialSnapshot::from_raw(&raw);
        Some(PeerQuote {
            ticker: ticker.clone(),
            name,
            price: Some(snapshot.price).filter(|p| *p > 0.0),
            pe_ratio: snapshot.pe_ratio,
            profit_margin: snapshot.profit_margin,
            roe: snapshot.roe,
            debt_to_equity: snapshot.debt_to_equity,
        })
    });

    futures::future::join_all(lookups)
        .await
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FIXTURE: &str = r#"{
        "TCS": {
            "fundamentals": { "price": 3900.0, "pe_ratio": 29.0, "roe": 0.45, "profit_margin": 0.19 },
            "statement": {
                "periods": ["2024-09-30", "2024-06-30"],
                "rows": { "Total Revenue": [120.0, 100.0], "Net Income": [8.0, 10.0] }
            },
            "company": { "symbol": "TCS.NS", "name": "Tata Consultancy Services" }
        },
        "infy.ns": {
            "fundamentals": { "price": 1500.0, "pe_ratio": 25.0 }
        }
    }"#;

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FundamentalsProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_snapshot(&self, _symbol: &str) -> Result<RawFundamentals> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawFundamentals {
                price: Some(10.0),
                ..Default::default()
            })
        }

        async fn fetch_income_statement(&self, symbol: &str) -> Result<StatementTable> {
            Err(EarningsError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "none".to_string(),
            })
        }

        async fn fetch_company_info(&self, symbol: &str) -> Result<CompanyInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompanyInfo {
                symbol: symbol.to_string(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_alpha_vantage_symbol() {
        assert_eq!(alpha_vantage_symbol("RELIANCE.NS"), "RELIANCE.BSE");
        assert_eq!(alpha_vantage_symbol("tcs.bo"), "TCS.BSE");
        assert_eq!(alpha_vantage_symbol("IBM"), "IBM");
    }

    #[tokio::test]
    async fn test_fixture_provider() {
        let provider = FixtureProvider::from_json_str(FIXTURE).unwrap();
        let raw = provider.fetch_snapshot("TCS.NS").await.unwrap();
        assert_eq!(raw.price, Some(3900.0));

        let statement = provider.fetch_income_statement("tcs").await.unwrap();
        assert_eq!(statement.periods.len(), 2);

        let company = provider.fetch_company_info("TCS").await.unwrap();
        assert_eq!(company.name.as_deref(), Some("Tata Consultancy Services"));

        // keys are normalized on load
        assert!(provider.fetch_snapshot("INFY").await.is_ok());
        assert!(matches!(
            provider.fetch_income_statement("INFY").await,
            Err(EarningsError::DataUnavailable { .. })
        ));
        assert!(provider.fetch_snapshot("WIPRO").await.is_err());
    }

    #[tokio::test]
    async fn test_fixture_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();
        let provider = FixtureProvider::from_path(file.path()).unwrap();
        assert_eq!(provider.name(), "fixture");
        assert!(provider.fetch_company_info("TCS").await.is_ok());
    }

    #[tokio::test]
    async fn test_cached_provider_serves_repeat_calls() {
        let cache = Arc::new(CacheManager::from_config(&AgentConfig::default()));
        let provider = CachedProvider::new(
            CountingProvider {
                calls: AtomicUsize::new(0),
            },
            Arc::clone(&cache),
        );

        let first = provider.fetch_snapshot("ITC.NS").await.unwrap();
        let second = provider.fetch_snapshot("ITC").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);

        provider.fetch_company_info("ITC").await.unwrap();
        let stats = cache.stats().await;
        assert_eq!(stats.quotes, 1);
        assert_eq!(stats.company, 1);
    }

    #[tokio::test]
    async fn test_cached_provider_does_not_cache_errors() {
        let cache = Arc::new(CacheManager::from_config(&AgentConfig::default()));
        let provider = CachedProvider::new(
            CountingProvider {
                calls: AtomicUsize::new(0),
            },
            Arc::clone(&cache),
        );
        assert!(provider.fetch_income_statement("ITC").await.is_err());
        assert!(cache.quotes.is_empty().await);
    }

    #[tokio::test]
    async fn test_peer_quotes_best_effort() {
        let mut mock = MockFundamentalsProvider::new();
        mock.expect_fetch_snapshot().returning(|symbol| {
            if symbol == "WIPRO" {
                Err(EarningsError::RateLimitExceeded {
                    provider: "mock".to_string(),
                })
            } else {
                Ok(RawFundamentals {
                    price: Some(100.0),
                    roe: Some(0.2),
                    ..Default::default()
                })
            }
        });
        mock.expect_fetch_company_info().returning(|symbol| {
            Ok(CompanyInfo {
                symbol: symbol.to_string(),
                name: Some(format!("{symbol} Ltd")),
                ..Default::default()
            })
        });

        let peers: Vec<String> = ["INFY", "WIPRO", "HCLTECH", "TECHM"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let quotes = fetch_peer_quotes(&mock, &peers, 3).await;

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].ticker, "INFY");
        assert_eq!(quotes[1].ticker, "HCLTECH");
        assert_eq!(quotes[0].name.as_deref(), Some("INFY Ltd"));
        assert!((quotes[0].roe.unwrap() - 20.0).abs() < 1e-9);
    }
}
