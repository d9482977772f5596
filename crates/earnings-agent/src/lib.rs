//! Earnings anomaly agent
//!
//! Fetches fundamentals and quarterly statements for a listed company and
//! runs them through the analytics in `earnings_core`:
//!
//! - Data fetching from Yahoo Finance (price) and Alpha Vantage (overview,
//!   income statement, balance sheet), rate limited and cached per tier
//! - Quarter-over-quarter delta with revenue/profit anomaly detection
//! - Data-quality validation, scoring and freshness checks
//! - Multi-quarter trend patterns with a naive next-quarter projection
//! - Sector comparison against a static peer table
//! - Optional language-model explanation when an anomaly is found
//! - Questions answered from an earnings document excerpt
//!
//! # Architecture
//!
//! [`EarningsAnalyzer`] owns the pipeline and receives its collaborators by
//! injection: a [`FundamentalsProvider`], an optional [`Narrator`], the
//! [`PeerTable`](earnings_core::PeerTable) and a [`CacheManager`]. Stages that
//! cannot run record why and the report is still produced.
//!
//! # Example
//!
//! ```rust,ignore
//! use earnings_agent::{AgentConfig, CacheManager, CachedProvider, EarningsAnalyzer, MarketDataProvider};
//! use earnings_core::PeerTable;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AgentConfig::default().with_env();
//!     let cache = Arc::new(CacheManager::from_config(&config));
//!     let provider = CachedProvider::new(MarketDataProvider::new(config.clone())?, cache.clone());
//!
//!     let analyzer = EarningsAnalyzer::new(config, Arc::new(provider), Arc::new(PeerTable::builtin()), cache);
//!     let report = analyzer.analyze("TCS", None).await;
//!     println!("{}", earnings_agent::report::render_text(&report));
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod api;
pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod narration;
pub mod provider;
pub mod report;
pub mod retry;

pub use analyzer::{AnalysisReport, EarningsAnalyzer, SectorReport, load_peer_table};
pub use cache::{CacheKey, CacheManager, CacheStats};
pub use config::AgentConfig;
pub use document::{DocumentExtract, answer_question, load_document};
pub use error::{EarningsError, Result};
pub use narration::{Narrator, OpenAiNarrator, QuestionRequest};
pub use provider::{CachedProvider, FixtureProvider, FundamentalsProvider, MarketDataProvider};
