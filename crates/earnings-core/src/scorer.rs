//! Data quality score derived from a validation report

use crate::validator::{Confidence, ValidationReport};
use serde::{Deserialize, Serialize};
use std::fmt;

const PRICE_PENALTY: i64 = 30;
const WARNING_PENALTY: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Grade::A,
            75..=89 => Grade::B,
            60..=74 => Grade::C,
            _ => Grade::D,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Grade::A => "A (Excellent)",
            Grade::B => "B (Good)",
            Grade::C => "C (Fair)",
            Grade::D => "D (Poor)",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScore {
    /// 0 to 100
    pub score: u8,
    pub grade: Grade,
    pub warnings: Vec<String>,
}

/// Score a validation report.
///
/// Starts at 100, loses 30 for a low-confidence price and 10 per metric
/// warning, and never drops below zero. Flags do not cost points.
pub fn score(report: &ValidationReport) -> QualityScore {
    let mut total: i64 = 100;
    let mut warnings = Vec::new();

    if report.price.confidence == Confidence::Low {
        total -= PRICE_PENALTY;
        warnings.push("Low confidence in price data".to_string());
    }

    let metric_warnings = i64::try_from(report.metrics.warnings.len()).unwrap_or(i64::MAX);
    total = total.saturating_sub(metric_warnings.saturating_mul(WARNING_PENALTY));
    warnings.extend(report.metrics.warnings.iter().cloned());

    let score = total.clamp(0, 100) as u8;
    QualityScore {
        score,
        grade: Grade::from_score(score),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FinancialSnapshot;
    use crate::validator::validate;

    fn report(price: f64, warnings: usize) -> ValidationReport {
        let mut report = validate(
            &FinancialSnapshot {
                price,
                ..Default::default()
            },
            None,
        );
        report.metrics.warnings = (0..warnings).map(|i| format!("warning {i}")).collect();
        report
    }

    #[test]
    fn test_clean_report_scores_full_marks() {
        let quality = score(&report(100.0, 0));
        assert_eq!(quality.score, 100);
        assert_eq!(quality.grade, Grade::A);
        assert!(quality.warnings.is_empty());
    }

    #[test]
    fn test_low_price_confidence_penalty() {
        let quality = score(&report(0.0, 0));
        assert_eq!(quality.score, 70);
        assert_eq!(quality.grade, Grade::C);
        assert_eq!(quality.warnings, vec!["Low confidence in price data".to_string()]);
    }

    #[test]
    fn test_warning_penalties() {
        assert_eq!(score(&report(100.0, 1)).grade, Grade::A);
        assert_eq!(score(&report(100.0, 2)).score, 80);
        assert_eq!(score(&report(100.0, 2)).grade, Grade::B);
        assert_eq!(score(&report(0.0, 2)).grade, Grade::D);
    }

    #[test]
    fn test_leverage_and_negative_roe_each_cost_ten() {
        let leveraged = FinancialSnapshot {
            price: 250.0,
            debt_to_equity: Some(2.4),
            ..Default::default()
        };
        let quality = score(&validate(&leveraged, None));
        assert_eq!(quality.score, 90);
        assert!(quality.warnings[0].contains("debt-to-equity"));

        let loss_making = FinancialSnapshot {
            roe: Some(-6.0),
            ..leveraged
        };
        let quality = score(&validate(&loss_making, None));
        assert_eq!(quality.score, 80);
        assert_eq!(quality.grade, Grade::B);
        assert!(quality.warnings[1].contains("Negative ROE"));
    }

    #[test]
    fn test_score_floors_at_zero() {
        let quality = score(&report(0.0, 12));
        assert_eq!(quality.score, 0);
        assert_eq!(quality.grade, Grade::D);
        assert_eq!(quality.warnings.len(), 13);
    }

    #[test]
    fn test_grade_labels() {
        assert_eq!(Grade::from_score(90).to_string(), "A (Excellent)");
        assert_eq!(Grade::from_score(75).to_string(), "B (Good)");
        assert_eq!(Grade::from_score(60).to_string(), "C (Fair)");
        assert_eq!(Grade::from_score(59).to_string(), "D (Poor)");
    }
}
