//! Multi-quarter trend extraction, pattern detection and a naive forecast

use crate::error::{Stage, StageResult, Unavailable};
use crate::model::{QuarterRecord, StatementTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of trailing quarter-over-quarter changes that drive the trend
const RECENT_WINDOW: usize = 3;
const GROWTH_THRESHOLD: f64 = 5.0;
const MARGIN_THRESHOLD_PP: f64 = 2.0;
const VOLATILE_PREDICTION_PCT: f64 = 20.0;
const MIN_QUARTERS: usize = 3;

pub const PREDICTION_DISCLAIMER: &str = "Simple linear extrapolation - NOT financial advice";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period_end: NaiveDate,
    pub revenue: f64,
    pub profit: f64,
    pub margin: f64,
    /// `None` for the first quarter or when the previous value is zero
    pub revenue_change_pct: Option<f64>,
    pub profit_change_pct: Option<f64>,
    /// Percentage-point change in margin
    pub margin_change_pp: Option<f64>,
}

/// Quarters in chronological order, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    /// Build a series from quarters in any order
    pub fn from_quarters(mut quarters: Vec<QuarterRecord>) -> Self {
        quarters.sort_by_key(|q| q.period_end);

        let mut points: Vec<TrendPoint> = Vec::with_capacity(quarters.len());
        for quarter in &quarters {
            let margin = quarter.margin();
            let (revenue_change_pct, profit_change_pct, margin_change_pp) = match points.last() {
                Some(prev) => (
                    change_pct(quarter.revenue, prev.revenue),
                    change_pct(quarter.profit, prev.profit),
                    Some(margin - prev.margin),
                ),
                None => (None, None, None),
            };
            points.push(TrendPoint {
                period_end: quarter.period_end,
                revenue: quarter.revenue,
                profit: quarter.profit,
                margin,
                revenue_change_pct,
                profit_change_pct,
                margin_change_pp,
            });
        }

        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&TrendPoint> {
        self.points.last()
    }

    fn revenue_changes(&self) -> Vec<Option<f64>> {
        self.points.iter().skip(1).map(|p| p.revenue_change_pct).collect()
    }

    fn profit_changes(&self) -> Vec<Option<f64>> {
        self.points.iter().skip(1).map(|p| p.profit_change_pct).collect()
    }

    fn margin_changes(&self) -> Vec<Option<f64>> {
        self.points.iter().skip(1).map(|p| p.margin_change_pp).collect()
    }
}

/// Period-over-period change against a signed previous value
fn change_pct(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Growing,
    Declining,
    Stable,
}

impl TrendDirection {
    fn from_average(avg: Option<f64>) -> Self {
        match avg {
            Some(v) if v > GROWTH_THRESHOLD => TrendDirection::Growing,
            Some(v) if v < -GROWTH_THRESHOLD => TrendDirection::Declining,
            _ => TrendDirection::Stable,
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Growing => write!(f, "Growing"),
            TrendDirection::Declining => write!(f, "Declining"),
            TrendDirection::Stable => write!(f, "Stable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginTrend {
    Improving,
    Compressing,
    Stable,
}

impl fmt::Display for MarginTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginTrend::Improving => write!(f, "Improving"),
            MarginTrend::Compressing => write!(f, "Compressing"),
            MarginTrend::Stable => write!(f, "Stable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Consistency {
    HighlyConsistent,
    ModeratelyVolatile,
    HighlyVolatile,
}

impl Consistency {
    fn from_volatility(stdev: Option<f64>) -> Self {
        match stdev {
            Some(sd) if sd < 10.0 => Consistency::HighlyConsistent,
            Some(sd) if sd < 20.0 => Consistency::ModeratelyVolatile,
            _ => Consistency::HighlyVolatile,
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consistency::HighlyConsistent => write!(f, "Highly consistent"),
            Consistency::ModeratelyVolatile => write!(f, "Moderately volatile"),
            Consistency::HighlyVolatile => write!(f, "Highly volatile"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPatterns {
    pub revenue_trend: TrendDirection,
    pub profit_trend: TrendDirection,
    /// Mean of the last three defined revenue changes
    pub avg_revenue_change_pct: Option<f64>,
    pub avg_profit_change_pct: Option<f64>,
    pub margin_trend: MarginTrend,
    /// Last margin minus first margin
    pub margin_change_pp: f64,
    /// Sample standard deviation of the revenue changes
    pub revenue_volatility: Option<f64>,
    pub consistency: Consistency,
    pub alerts: Vec<String>,
}

impl TrendPatterns {
    pub fn revenue_label(&self) -> String {
        direction_label(self.revenue_trend, self.avg_revenue_change_pct)
    }

    pub fn profit_label(&self) -> String {
        direction_label(self.profit_trend, self.avg_profit_change_pct)
    }

    pub fn margin_label(&self) -> String {
        match self.margin_trend {
            MarginTrend::Stable => "Stable".to_string(),
            trend => format!("{trend} ({:+.1} pp)", self.margin_change_pp),
        }
    }
}

fn direction_label(direction: TrendDirection, avg: Option<f64>) -> String {
    match (direction, avg) {
        (TrendDirection::Stable, _) | (_, None) => direction.to_string(),
        (_, Some(avg)) => format!("{direction} (avg {avg:+.1}%/quarter)"),
    }
}

/// Classify growth, margin, volatility and alerts over a series
pub fn detect_patterns(series: &TrendSeries) -> StageResult<TrendPatterns> {
    if series.len() < MIN_QUARTERS {
        return Err(Unavailable::new(
            Stage::Trend,
            format!(
                "need at least {MIN_QUARTERS} quarters for pattern detection, have {}",
                series.len()
            ),
        ));
    }

    let revenue_changes = series.revenue_changes();
    let profit_changes = series.profit_changes();
    let margin_changes = series.margin_changes();

    let avg_revenue_change_pct = recent_mean(&revenue_changes);
    let avg_profit_change_pct = recent_mean(&profit_changes);
    let revenue_trend = TrendDirection::from_average(avg_revenue_change_pct);
    let profit_trend = TrendDirection::from_average(avg_profit_change_pct);

    let margin_change_pp = match (series.points.first(), series.points.last()) {
        (Some(first), Some(last)) => last.margin - first.margin,
        _ => 0.0,
    };
    let margin_trend = if margin_change_pp > MARGIN_THRESHOLD_PP {
        MarginTrend::Improving
    } else if margin_change_pp < -MARGIN_THRESHOLD_PP {
        MarginTrend::Compressing
    } else {
        MarginTrend::Stable
    };

    let revenue_volatility = sample_stdev(&revenue_changes);
    let consistency = Consistency::from_volatility(revenue_volatility);

    let mut alerts = Vec::new();
    if trailing_defined(&margin_changes).is_some_and(|tail| tail.iter().all(|c| *c < 0.0)) {
        alerts.push("3 consecutive quarters of margin compression".to_string());
    }
    if revenue_trend == TrendDirection::Growing && profit_trend == TrendDirection::Declining {
        alerts.push("Revenue growing but profit declining - CRITICAL".to_string());
    }
    if trailing_defined(&profit_changes).is_some_and(|tail| tail.windows(2).all(|w| w[1] < w[0])) {
        alerts.push("Profit decline is accelerating".to_string());
    }

    tracing::debug!(
        quarters = series.len(),
        revenue_trend = %revenue_trend,
        profit_trend = %profit_trend,
        margin_trend = %margin_trend,
        alerts = alerts.len(),
        "Detected trend patterns"
    );

    Ok(TrendPatterns {
        revenue_trend,
        profit_trend,
        avg_revenue_change_pct,
        avg_profit_change_pct,
        margin_trend,
        margin_change_pp,
        revenue_volatility,
        consistency,
        alerts,
    })
}

/// Mean of the defined values among the last three changes
fn recent_mean(changes: &[Option<f64>]) -> Option<f64> {
    let start = changes.len().saturating_sub(RECENT_WINDOW);
    let defined: Vec<f64> = changes[start..].iter().flatten().copied().collect();
    if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    }
}

/// The last three changes, only when all three are defined
fn trailing_defined(changes: &[Option<f64>]) -> Option<Vec<f64>> {
    if changes.len() < RECENT_WINDOW {
        return None;
    }
    changes[changes.len() - RECENT_WINDOW..]
        .iter()
        .copied()
        .collect()
}

/// Sample standard deviation (n - 1) of the defined values
fn sample_stdev(changes: &[Option<f64>]) -> Option<f64> {
    let defined: Vec<f64> = changes.iter().flatten().copied().collect();
    if defined.len() < 2 {
        return None;
    }
    let n = defined.len() as f64;
    let mean = defined.iter().sum::<f64>() / n;
    let variance = defined.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionConfidence {
    Low,
    Medium,
}

impl fmt::Display for PredictionConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionConfidence::Low => write!(f, "Low"),
            PredictionConfidence::Medium => write!(f, "Medium"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedValue {
    pub value: f64,
    pub growth_pct: f64,
    pub confidence: PredictionConfidence,
}

impl ProjectedValue {
    fn project(latest: f64, avg_change_pct: f64) -> Self {
        Self {
            value: latest * (1.0 + avg_change_pct / 100.0),
            growth_pct: avg_change_pct,
            confidence: if avg_change_pct.abs() > VOLATILE_PREDICTION_PCT {
                PredictionConfidence::Low
            } else {
                PredictionConfidence::Medium
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub revenue: ProjectedValue,
    pub profit: ProjectedValue,
    pub disclaimer: String,
}

/// Extrapolate the next quarter from the recent average growth rates
pub fn predict_next_quarter(series: &TrendSeries) -> StageResult<Prediction> {
    if series.len() < MIN_QUARTERS {
        return Err(Unavailable::new(
            Stage::Prediction,
            format!("need at least {MIN_QUARTERS} quarters to predict, have {}", series.len()),
        ));
    }
    let latest = series
        .latest()
        .ok_or_else(|| Unavailable::new(Stage::Prediction, "empty series"))?;
    let avg_revenue = recent_mean(&series.revenue_changes()).ok_or_else(|| {
        Unavailable::new(Stage::Prediction, "no defined revenue change in recent quarters")
    })?;
    let avg_profit = recent_mean(&series.profit_changes()).ok_or_else(|| {
        Unavailable::new(Stage::Prediction, "no defined profit change in recent quarters")
    })?;

    Ok(Prediction {
        revenue: ProjectedValue::project(latest.revenue, avg_revenue),
        profit: ProjectedValue::project(latest.profit, avg_profit),
        disclaimer: PREDICTION_DISCLAIMER.to_string(),
    })
}

/// Series plus whatever could be derived from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub series: TrendSeries,
    pub patterns: StageResult<TrendPatterns>,
    pub prediction: StageResult<Prediction>,
}

/// Pull up to `max_quarters` of the newest complete quarters from a statement
pub fn extract_series(statement: &StatementTable, max_quarters: usize) -> StageResult<TrendSeries> {
    let quarters = statement
        .quarter_records(max_quarters)
        .map_err(|err| Unavailable::new(Stage::Trend, err.to_string()))?;
    Ok(TrendSeries::from_quarters(quarters))
}

pub fn analyze(statement: &StatementTable, max_quarters: usize) -> StageResult<TrendAnalysis> {
    let series = extract_series(statement, max_quarters)?;
    let patterns = detect_patterns(&series);
    let prediction = predict_next_quarter(&series);
    Ok(TrendAnalysis {
        series,
        patterns,
        prediction,
    })
}
