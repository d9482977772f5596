//! Sanity checks on price, valuation ratios and the quarterly delta

use crate::delta::DeltaResult;
use crate::error::{Stage, StageResult, Unavailable};
use crate::model::FinancialSnapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust level attached to the quoted price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "High"),
            Confidence::Low => write!(f, "Low"),
        }
    }
}

/// How far revenue and profit changes diverge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map an absolute divergence in percentage points to a severity
    pub fn from_divergence(divergence: f64) -> Self {
        if divergence > 30.0 {
            Severity::Critical
        } else if divergence > 20.0 {
            Severity::High
        } else if divergence > 10.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL: >30% divergence - major issue",
            Severity::High => "HIGH: >20% divergence - investigate immediately",
            Severity::Medium => "MEDIUM: >10% divergence - needs attention",
            Severity::Low => "LOW: normal variation",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCheck {
    pub price: f64,
    pub valid: bool,
    pub confidence: Confidence,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsCheck {
    /// Readings that count against the quality score
    pub warnings: Vec<String>,
    /// Unusual but not necessarily bad readings
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaCheck {
    pub divergence: f64,
    pub severity: Severity,
    pub severity_description: String,
    pub insights: Vec<String>,
}

/// Aggregated validation outcome for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub price: PriceCheck,
    pub metrics: MetricsCheck,
    pub delta: StageResult<DeltaCheck>,
}

impl ValidationReport {
    /// Every warning raised, price first
    pub fn all_warnings(&self) -> impl Iterator<Item = &str> {
        self.price
            .warnings
            .iter()
            .chain(self.metrics.warnings.iter())
            .map(String::as_str)
    }
}

/// Run every check against a snapshot and an optional delta
pub fn validate(snapshot: &FinancialSnapshot, delta: Option<&DeltaResult>) -> ValidationReport {
    let report = ValidationReport {
        price: check_price(snapshot.price),
        metrics: check_metrics(snapshot),
        delta: check_delta(delta),
    };
    tracing::debug!(
        price_confidence = %report.price.confidence,
        metric_warnings = report.metrics.warnings.len(),
        metric_flags = report.metrics.flags.len(),
        "Validated snapshot"
    );
    report
}

pub fn check_price(price: f64) -> PriceCheck {
    let mut warnings = Vec::new();
    let confidence = if price <= 0.0 || !price.is_finite() {
        warnings.push("Invalid price data (≤0)".to_string());
        Confidence::Low
    } else {
        Confidence::High
    };

    PriceCheck {
        price,
        valid: confidence == Confidence::High,
        confidence,
        warnings,
    }
}

/// Threshold checks on the valuation ratios.
///
/// Missing metrics are skipped; ROE and margin are already in percent.
pub fn check_metrics(snapshot: &FinancialSnapshot) -> MetricsCheck {
    let mut check = MetricsCheck::default();

    if let Some(pe) = snapshot.pe_ratio {
        if pe < 0.0 {
            check
                .warnings
                .push(format!("Negative P/E ratio ({pe:.2}) - company has losses"));
        } else if pe > 100.0 {
            check
                .flags
                .push(format!("Very high P/E ratio ({pe:.2}) - may be overvalued"));
        }
    }

    if let Some(de) = snapshot.debt_to_equity.filter(|de| *de > 2.0) {
        check
            .warnings
            .push(format!("High debt-to-equity ratio ({de:.2}) - leveraged balance sheet"));
    }

    if let Some(roe) = snapshot.roe {
        if roe < 0.0 {
            check
                .warnings
                .push(format!("Negative ROE ({roe:.1}%) - destroying shareholder value"));
        } else if roe > 30.0 {
            check
                .flags
                .push(format!("Exceptional ROE ({roe:.1}%) - verify sustainability"));
        }
    }

    if let Some(margin) = snapshot.profit_margin {
        if margin < 0.0 {
            check
                .warnings
                .push(format!("Negative profit margin ({margin:.1}%) - operating at a loss"));
        } else if margin > 25.0 {
            check
                .flags
                .push(format!("High profit margin ({margin:.1}%) - verify one-off gains"));
        }
    }

    check
}

pub fn check_delta(delta: Option<&DeltaResult>) -> StageResult<DeltaCheck> {
    let delta = delta.ok_or_else(|| Unavailable::new(Stage::Validation, "No delta data"))?;
    let revenue = delta.revenue_change_pct;
    let profit = delta.profit_change_pct;
    let divergence = delta.divergence();
    let severity = Severity::from_divergence(divergence);

    let mut insights = Vec::new();
    if revenue > 0.0 && profit < 0.0 {
        insights.push("Revenue growing but profit declining - INVESTIGATE COSTS".to_string());
    } else if revenue < 0.0 && profit > 0.0 {
        insights.push("Revenue falling but profit rising - COST CUTTING SUCCESS?".to_string());
    } else if revenue > 15.0 && profit > 15.0 {
        insights.push("Strong growth in both revenue and profit - HEALTHY".to_string());
    } else if revenue < -15.0 && profit < -15.0 {
        insights.push("Both revenue and profit declining - STRUGGLING".to_string());
    }

    Ok(DeltaCheck {
        divergence,
        severity,
        severity_description: severity.description().to_string(),
        insights,
    })
}

/// Age of the underlying data relative to `today`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFreshness {
    pub last_updated: NaiveDate,
    pub age_days: i64,
    pub is_fresh: bool,
    pub warning: Option<String>,
}

/// Data under a week old is fresh; past a month it is flagged as outdated
pub fn check_freshness(last_updated: NaiveDate, today: NaiveDate) -> DataFreshness {
    let age_days = (today - last_updated).num_days();
    let warning = if age_days > 30 {
        Some(format!("Data is {age_days} days old - may be outdated"))
    } else if age_days > 7 {
        Some(format!("Data is {age_days} days old"))
    } else {
        None
    };

    DataFreshness {
        last_updated,
        age_days,
        is_fresh: age_days < 7,
        warning,
    }
}
