//! Quarter-over-quarter revenue/profit delta and anomaly classification

use crate::error::{Stage, StageResult, Unavailable};
use crate::model::{ExtractionError, QuarterRecord, StatementTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Revenue and profit moving in opposite directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Normal,
    RevenueUpProfitDown,
    RevenueDownProfitUp,
}

impl AnomalyKind {
    /// Classify a pair of percentage changes
    pub fn classify(revenue_change_pct: f64, profit_change_pct: f64) -> Self {
        if revenue_change_pct > 0.0 && profit_change_pct < 0.0 {
            AnomalyKind::RevenueUpProfitDown
        } else if revenue_change_pct < 0.0 && profit_change_pct > 0.0 {
            AnomalyKind::RevenueDownProfitUp
        } else {
            AnomalyKind::Normal
        }
    }

    pub fn is_anomaly(&self) -> bool {
        !matches!(self, AnomalyKind::Normal)
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnomalyKind::Normal => "Normal",
            AnomalyKind::RevenueUpProfitDown => "Revenue Up, Profit Down",
            AnomalyKind::RevenueDownProfitUp => "Revenue Down, Profit Up",
        };
        f.write_str(label)
    }
}

/// Change between the two most recent quarters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaResult {
    pub latest_period: NaiveDate,
    pub previous_period: NaiveDate,
    /// Rounded to two decimals
    pub revenue_change_pct: f64,
    /// Rounded to two decimals
    pub profit_change_pct: f64,
    pub anomaly_detected: bool,
    pub anomaly_kind: AnomalyKind,
    pub latest_revenue: f64,
    pub latest_profit: f64,
}

impl DeltaResult {
    /// Gap between the two changes in percentage points
    pub fn divergence(&self) -> f64 {
        round2((self.revenue_change_pct - self.profit_change_pct).abs())
    }
}

/// Compute the delta from a quarterly income statement.
///
/// Uses the two newest periods that carry both revenue and profit.
pub fn compute_delta(statement: &StatementTable) -> StageResult<DeltaResult> {
    let quarters = statement.quarter_records(usize::MAX).map_err(|err| match err {
        ExtractionError::MissingRows => Unavailable::new(Stage::Delta, err.to_string()),
        ExtractionError::NoUsableQuarters => {
            Unavailable::new(Stage::Delta, "not enough quarterly data for delta analysis")
        }
    })?;

    match quarters.as_slice() {
        [latest, previous, ..] => compute_delta_from_quarters(latest, previous),
        _ => Err(Unavailable::new(
            Stage::Delta,
            "not enough quarterly data for delta analysis",
        )),
    }
}

/// Compute the delta between two quarters.
///
/// Changes are measured against the absolute previous value so that a move
/// from a loss to a smaller loss reads as an improvement.
pub fn compute_delta_from_quarters(
    latest: &QuarterRecord,
    previous: &QuarterRecord,
) -> StageResult<DeltaResult> {
    if previous.revenue == 0.0 {
        return Err(Unavailable::new(Stage::Delta, "previous quarter revenue is zero"));
    }
    if previous.profit == 0.0 {
        return Err(Unavailable::new(Stage::Delta, "previous quarter profit is zero"));
    }

    let revenue_change = change_pct(latest.revenue, previous.revenue);
    let profit_change = change_pct(latest.profit, previous.profit);
    if !revenue_change.is_finite() || !profit_change.is_finite() {
        return Err(Unavailable::new(
            Stage::Delta,
            "quarterly values are not finite numbers",
        ));
    }

    // Classify before rounding; a change that rounds to 0.00 still has a sign
    let anomaly_kind = AnomalyKind::classify(revenue_change, profit_change);
    let revenue_change_pct = round2(revenue_change);
    let profit_change_pct = round2(profit_change);
    tracing::debug!(
        latest = %latest.period_end,
        previous = %previous.period_end,
        revenue_change_pct,
        profit_change_pct,
        anomaly = %anomaly_kind,
        "Computed quarterly delta"
    );

    Ok(DeltaResult {
        latest_period: latest.period_end,
        previous_period: previous.period_end,
        revenue_change_pct,
        profit_change_pct,
        anomaly_detected: anomaly_kind.is_anomaly(),
        anomaly_kind,
        latest_revenue: latest.revenue,
        latest_profit: latest.profit,
    })
}

fn change_pct(latest: f64, previous: f64) -> f64 {
    (latest - previous) / previous.abs() * 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quarter(month: u32, revenue: f64, profit: f64) -> QuarterRecord {
        QuarterRecord::new(date(2024, month, 28), revenue, profit)
    }

    #[test]
    fn test_revenue_up_profit_down() {
        let delta = compute_delta_from_quarters(
            &quarter(6, 120.0, 8.0),
            &quarter(3, 100.0, 10.0),
        )
        .unwrap();
        assert_eq!(delta.revenue_change_pct, 20.0);
        assert_eq!(delta.profit_change_pct, -20.0);
        assert!(delta.anomaly_detected);
        assert_eq!(delta.anomaly_kind, AnomalyKind::RevenueUpProfitDown);
        assert_eq!(delta.latest_revenue, 120.0);
        assert_eq!(delta.divergence(), 40.0);
    }

    #[test]
    fn test_revenue_down_profit_up() {
        let delta = compute_delta_from_quarters(
            &quarter(6, 90.0, 12.0),
            &quarter(3, 100.0, 10.0),
        )
        .unwrap();
        assert_eq!(delta.anomaly_kind, AnomalyKind::RevenueDownProfitUp);
        assert_eq!(delta.anomaly_kind.to_string(), "Revenue Down, Profit Up");
    }

    #[test]
    fn test_same_direction_is_normal() {
        let delta = compute_delta_from_quarters(
            &quarter(6, 110.0, 11.0),
            &quarter(3, 100.0, 10.0),
        )
        .unwrap();
        assert_eq!(delta.anomaly_kind, AnomalyKind::Normal);
        assert!(!delta.anomaly_detected);
    }

    #[test]
    fn test_zero_change_is_not_an_anomaly() {
        let delta = compute_delta_from_quarters(
            &quarter(6, 100.0, 5.0),
            &quarter(3, 100.0, 10.0),
        )
        .unwrap();
        assert_eq!(delta.revenue_change_pct, 0.0);
        assert_eq!(delta.anomaly_kind, AnomalyKind::Normal);
    }

    #[test]
    fn test_negative_previous_profit_uses_absolute_denominator() {
        // loss narrowing from -10 to -5 is a +50% improvement
        let delta = compute_delta_from_quarters(
            &quarter(6, 100.0, -5.0),
            &quarter(3, 100.0, -10.0),
        )
        .unwrap();
        assert_eq!(delta.profit_change_pct, 50.0);
    }

    #[test]
    fn test_tiny_revenue_rise_keeps_its_direction() {
        let delta = compute_delta_from_quarters(
            &quarter(6, 100.004, 8.0),
            &quarter(3, 100.0, 10.0),
        )
        .unwrap();
        assert_eq!(delta.revenue_change_pct, 0.0);
        assert_eq!(delta.profit_change_pct, -20.0);
        assert_eq!(delta.anomaly_kind, AnomalyKind::RevenueUpProfitDown);
        assert!(delta.anomaly_detected);
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        let delta = compute_delta_from_quarters(
            &quarter(6, 103.0, 10.0),
            &quarter(3, 300.0, 30.0),
        )
        .unwrap();
        assert_eq!(delta.revenue_change_pct, -65.67);
    }

    #[test]
    fn test_zero_previous_revenue_is_unavailable() {
        let err = compute_delta_from_quarters(
            &quarter(6, 100.0, 10.0),
            &quarter(3, 0.0, 10.0),
        )
        .unwrap_err();
        assert_eq!(err.stage, Stage::Delta);
    }

    #[test]
    fn test_zero_previous_profit_is_unavailable() {
        let result = compute_delta_from_quarters(&quarter(6, 100.0, 10.0), &quarter(3, 100.0, 0.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_compute_delta_from_statement() {
        let periods = vec![date(2024, 9, 30), date(2024, 6, 30), date(2024, 3, 31)];
        let table = StatementTable::new(periods)
            .with_row("Total Revenue", vec![Some(120.0), Some(100.0), Some(90.0)])
            .with_row("Net Income Common Stockholders", vec![Some(8.0), Some(10.0), Some(9.0)]);
        let delta = compute_delta(&table).unwrap();
        assert_eq!(delta.latest_period, date(2024, 9, 30));
        assert_eq!(delta.previous_period, date(2024, 6, 30));
        assert_eq!(delta.anomaly_kind, AnomalyKind::RevenueUpProfitDown);
    }

    #[test]
    fn test_single_quarter_is_unavailable() {
        let table = StatementTable::new(vec![date(2024, 9, 30)])
            .with_row("Revenue", vec![Some(120.0)])
            .with_row("Net Income", vec![Some(8.0)]);
        let err = compute_delta(&table).unwrap_err();
        assert!(err.reason.contains("not enough"));
    }

    #[test]
    fn test_missing_rows_is_unavailable() {
        let table = StatementTable::new(vec![date(2024, 9, 30), date(2024, 6, 30)])
            .with_row("Gross Profit", vec![Some(1.0), Some(2.0)]);
        assert!(compute_delta(&table).is_err());
    }
}
