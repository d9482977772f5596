//! # Earnings Core
//!
//! Pure analytics over quarterly financial statements:
//! - quarter-over-quarter revenue/profit deltas with anomaly classification
//! - sanity checks on price and valuation ratios, plus a quality score
//! - multi-quarter trend detection and a naive next-quarter projection
//! - comparison against static sector averages
//!
//! Nothing here performs I/O apart from loading a peer table from disk.
//! Every analysis either returns a result or an [`Unavailable`] describing
//! why it could not be computed.
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use earnings_core::{StatementTable, delta::compute_delta};
//!
//! let table = StatementTable::new(vec![
//!     NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
//! ])
//! .with_row("Total Revenue", vec![Some(120.0), Some(100.0)])
//! .with_row("Net Income", vec![Some(8.0), Some(10.0)]);
//!
//! let delta = compute_delta(&table).unwrap();
//! assert!(delta.anomaly_detected);
//! ```

pub mod delta;
pub mod error;
pub mod model;
pub mod peers;
pub mod scorer;
pub mod sector;
pub mod trend;
pub mod validator;

pub use delta::{AnomalyKind, DeltaResult};
pub use error::{Stage, StageResult, Unavailable};
pub use model::{
    CompanyInfo, DocumentMetrics, FinancialSnapshot, QuarterRecord, RawFundamentals,
    StatementTable, normalize_ratio_percent, normalize_ticker,
};
pub use peers::{IndustryAverages, PeerEntry, PeerTable, PeerTableError};
pub use scorer::{Grade, QualityScore};
pub use sector::{SectorComparison, SectorMetric, Verdict};
pub use trend::{TrendAnalysis, TrendPatterns, TrendSeries};
pub use validator::{DataFreshness, Severity, ValidationReport};
