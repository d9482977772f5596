//! Financial data model shared by every analysis stage

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Income-statement labels tried, in order, for the revenue row
pub const REVENUE_ALIASES: &[&str] = &[
    "Total Revenue",
    "Revenue",
    "Total Revenues",
    "Operating Revenue",
];

/// Income-statement labels tried, in order, for the profit row
pub const PROFIT_ALIASES: &[&str] = &[
    "Net Income",
    "Net Income Common Stockholders",
    "Net Income Applicable To Common Shares",
    "Normalized Income",
];

const EXCHANGE_SUFFIXES: &[&str] = &[".NS", ".BO"];

/// Strip NSE/BSE exchange suffixes and upper-case a ticker
pub fn normalize_ticker(ticker: &str) -> String {
    let upper = ticker.trim().to_uppercase();
    EXCHANGE_SUFFIXES
        .iter()
        .find_map(|suffix| upper.strip_suffix(suffix))
        .map_or_else(|| upper.clone(), str::to_string)
}

/// Convert a ratio that may arrive as a fraction (0.18) or as a percentage
/// (18.0) into percentage points.
///
/// Values below 1 are read as fractions and multiplied by 100. A genuine
/// sub-1% figure such as a 0.5% margin cannot be told apart from a fraction
/// and comes out as 50%. Providers disagree on the encoding, so this is the
/// single place where the guess is made.
pub fn normalize_ratio_percent(value: f64) -> f64 {
    if value < 1.0 { value * 100.0 } else { value }
}

/// Fundamentals exactly as a quote provider reports them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFundamentals {
    pub price: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    /// Fraction or percentage, depending on the provider
    pub roe: Option<f64>,
    /// Fraction or percentage, depending on the provider
    pub profit_margin: Option<f64>,
}

/// Price and ratio snapshot for one analysis run
///
/// `roe` and `profit_margin` are always in percentage points here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub price: f64,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub roe: Option<f64>,
    pub profit_margin: Option<f64>,
}

impl FinancialSnapshot {
    /// Build a snapshot from provider data.
    ///
    /// Providers fill unknown metrics with `0`, so zero and non-finite values
    /// count as missing. A missing price becomes `0.0`, which the price check
    /// reports as invalid.
    pub fn from_raw(raw: &RawFundamentals) -> Self {
        Self {
            price: raw.price.filter(|p| p.is_finite()).unwrap_or(0.0),
            pe_ratio: present(raw.pe_ratio),
            pb_ratio: present(raw.pb_ratio),
            debt_to_equity: present(raw.debt_to_equity),
            roe: present(raw.roe).map(normalize_ratio_percent),
            profit_margin: present(raw.profit_margin).map(normalize_ratio_percent),
        }
    }
}

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

/// Descriptive company data from the fundamentals provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
}

/// Metrics scraped from an earnings document, shown next to the analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetrics {
    pub revenue: Option<f64>,
    pub profit: Option<f64>,
    pub eps: Option<f64>,
    pub ebitda: Option<f64>,
}

impl DocumentMetrics {
    pub fn is_empty(&self) -> bool {
        self.revenue.is_none()
            && self.profit.is_none()
            && self.eps.is_none()
            && self.ebitda.is_none()
    }
}

/// One reporting period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuarterRecord {
    pub period_end: NaiveDate,
    pub revenue: f64,
    pub profit: f64,
}

impl QuarterRecord {
    pub fn new(period_end: NaiveDate, revenue: f64, profit: f64) -> Self {
        Self {
            period_end,
            revenue,
            profit,
        }
    }

    /// Net margin in percent, `0` when revenue is zero
    pub fn margin(&self) -> f64 {
        if self.revenue == 0.0 {
            0.0
        } else {
            self.profit / self.revenue * 100.0
        }
    }
}

/// Why quarters could not be read out of a statement table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("could not find revenue/profit rows in quarterly financials")]
    MissingRows,
    #[error("no reporting period carries both revenue and profit")]
    NoUsableQuarters,
}

/// Quarterly income statement as a provider reports it
///
/// Columns are period end dates, newest first. Each row is aligned with
/// `periods`; a short row or a `None` cell means the value was not reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementTable {
    pub periods: Vec<NaiveDate>,
    #[serde(default)]
    pub rows: BTreeMap<String, Vec<Option<f64>>>,
}

impl StatementTable {
    pub fn new(periods: Vec<NaiveDate>) -> Self {
        Self {
            periods,
            rows: BTreeMap::new(),
        }
    }

    pub fn with_row(mut self, label: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        self.insert_row(label, values);
        self
    }

    pub fn insert_row(&mut self, label: impl Into<String>, values: Vec<Option<f64>>) {
        self.rows.insert(label.into(), values);
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty() || self.rows.is_empty()
    }

    /// First row whose label matches one of `aliases`, in alias order
    pub fn find_row(&self, aliases: &[&str]) -> Option<(&str, &[Option<f64>])> {
        aliases.iter().find_map(|alias| {
            self.rows
                .get_key_value(*alias)
                .map(|(label, values)| (label.as_str(), values.as_slice()))
        })
    }

    /// Complete quarters among the `limit` newest periods, newest first.
    ///
    /// Periods missing either revenue or profit are skipped.
    pub fn quarter_records(&self, limit: usize) -> Result<Vec<QuarterRecord>, ExtractionError> {
        let (_, revenue) = self
            .find_row(REVENUE_ALIASES)
            .ok_or(ExtractionError::MissingRows)?;
        let (_, profit) = self
            .find_row(PROFIT_ALIASES)
            .ok_or(ExtractionError::MissingRows)?;

        let records: Vec<QuarterRecord> = self
            .periods
            .iter()
            .take(limit)
            .enumerate()
            .filter_map(|(idx, period)| {
                let rev = revenue.get(idx).copied().flatten().filter(|v| v.is_finite())?;
                let pro = profit.get(idx).copied().flatten().filter(|v| v.is_finite())?;
                Some(QuarterRecord::new(*period, rev, pro))
            })
            .collect();

        if records.is_empty() {
            return Err(ExtractionError::NoUsableQuarters);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker("reliance.ns"), "RELIANCE");
        assert_eq!(normalize_ticker("TCS.BO"), "TCS");
        assert_eq!(normalize_ticker(" infy "), "INFY");
        assert_eq!(normalize_ticker("M&M"), "M&M");
    }

    #[test]
    fn test_normalize_ratio_percent() {
        assert!((normalize_ratio_percent(0.18) - 18.0).abs() < 1e-9);
        assert!((normalize_ratio_percent(18.0) - 18.0).abs() < 1e-9);
        assert!((normalize_ratio_percent(-0.05) + 5.0).abs() < 1e-9);
        // sub-1% percentages are read as fractions
        assert!((normalize_ratio_percent(0.5) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_from_raw_normalizes_once() {
        let raw = RawFundamentals {
            price: Some(2450.0),
            pe_ratio: Some(24.0),
            pb_ratio: Some(0.0),
            debt_to_equity: None,
            roe: Some(0.12),
            profit_margin: Some(8.5),
        };
        let snapshot = FinancialSnapshot::from_raw(&raw);
        assert_eq!(snapshot.price, 2450.0);
        assert_eq!(snapshot.pb_ratio, None);
        assert!((snapshot.roe.unwrap() - 12.0).abs() < 1e-9);
        assert!((snapshot.profit_margin.unwrap() - 8.5).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_missing_price_is_zero() {
        let snapshot = FinancialSnapshot::from_raw(&RawFundamentals::default());
        assert_eq!(snapshot.price, 0.0);
        assert_eq!(snapshot.pe_ratio, None);
    }

    #[test]
    fn test_quarter_margin() {
        let q = QuarterRecord::new(date(2024, 3, 31), 200.0, 30.0);
        assert!((q.margin() - 15.0).abs() < 1e-9);
        let zero = QuarterRecord::new(date(2024, 3, 31), 0.0, 30.0);
        assert_eq!(zero.margin(), 0.0);
    }

    #[test]
    fn test_find_row_prefers_alias_order() {
        let table = StatementTable::new(vec![date(2024, 6, 30)])
            .with_row("Operating Revenue", vec![Some(1.0)])
            .with_row("Total Revenue", vec![Some(2.0)]);
        let (label, values) = table.find_row(REVENUE_ALIASES).unwrap();
        assert_eq!(label, "Total Revenue");
        assert_eq!(values, &[Some(2.0)]);
    }

    #[test]
    fn test_quarter_records_skip_incomplete_periods() {
        let periods = vec![date(2024, 9, 30), date(2024, 6, 30), date(2024, 3, 31)];
        let table = StatementTable::new(periods)
            .with_row("Revenue", vec![Some(120.0), None, Some(100.0)])
            .with_row("Net Income", vec![Some(8.0), Some(9.0), Some(10.0)]);
        let records = table.quarter_records(8).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].period_end, date(2024, 9, 30));
        assert_eq!(records[1].period_end, date(2024, 3, 31));
    }

    #[test]
    fn test_quarter_records_missing_rows() {
        let table = StatementTable::new(vec![date(2024, 9, 30)])
            .with_row("Gross Profit", vec![Some(5.0)]);
        assert_eq!(table.quarter_records(8), Err(ExtractionError::MissingRows));
    }

    #[test]
    fn test_statement_table_json_shape() {
        let json = r#"{
            "periods": ["2024-09-30", "2024-06-30"],
            "rows": { "Total Revenue": [120.0, 100.0], "Net Income": [8.0, null] }
        }"#;
        let table: StatementTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.periods.len(), 2);
        assert_eq!(table.rows["Net Income"], vec![Some(8.0), None]);
    }
}
