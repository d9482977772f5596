//! Compare a company's ratios against its sector averages

use crate::model::{FinancialSnapshot, normalize_ticker};
use crate::peers::{IndustryAverages, PeerTable};
use serde::{Deserialize, Serialize};
use std::fmt;

const VALUATION_BAND_PCT: f64 = 20.0;
const MARGIN_INSIGHT_PP: f64 = 5.0;
const ROE_BAND_PP: f64 = 5.0;

pub const NOT_COVERED_REASON: &str = "Sector comparison not available for this stock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorMetric {
    PeRatio,
    ProfitMargin,
    Roe,
    DebtToEquity,
}

impl fmt::Display for SectorMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SectorMetric::PeRatio => "P/E Ratio",
            SectorMetric::ProfitMargin => "Profit Margin",
            SectorMetric::Roe => "ROE",
            SectorMetric::DebtToEquity => "Debt/Equity",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Overvalued,
    Undervalued,
    Fair,
    AboveAverage,
    BelowAverage,
    Strong,
    Weak,
    Average,
    LowerDebt,
    HigherDebt,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Overvalued => "Overvalued",
            Verdict::Undervalued => "Undervalued",
            Verdict::Fair => "Fair",
            Verdict::AboveAverage => "Above Average",
            Verdict::BelowAverage => "Below Average",
            Verdict::Strong => "Strong",
            Verdict::Weak => "Weak",
            Verdict::Average => "Average",
            Verdict::LowerDebt => "Lower Debt",
            Verdict::HigherDebt => "Higher Debt",
        };
        f.write_str(label)
    }
}

/// One metric set against its sector average
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: SectorMetric,
    pub value: f64,
    pub sector_avg: f64,
    /// Percent for P/E, percentage points for margin and ROE, ratio units for D/E
    pub difference: f64,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorComparison {
    pub ticker: String,
    pub available: bool,
    pub reason: Option<String>,
    pub sector: Option<String>,
    pub peers: Vec<String>,
    pub industry_avg: Option<IndustryAverages>,
    /// In P/E, margin, ROE, D/E order; metrics the snapshot lacks are omitted
    pub comparisons: Vec<MetricComparison>,
}

impl SectorComparison {
    fn not_covered(ticker: String) -> Self {
        Self {
            ticker,
            available: false,
            reason: Some(NOT_COVERED_REASON.to_string()),
            sector: None,
            peers: Vec::new(),
            industry_avg: None,
            comparisons: Vec::new(),
        }
    }

    pub fn metric(&self, metric: SectorMetric) -> Option<&MetricComparison> {
        self.comparisons.iter().find(|c| c.metric == metric)
    }
}

/// Compare a snapshot with the averages of the ticker's sector
pub fn compare(ticker: &str, snapshot: &FinancialSnapshot, table: &PeerTable) -> SectorComparison {
    let bare = normalize_ticker(ticker);
    let Some(entry) = table.get(&bare) else {
        tracing::debug!(ticker = %bare, "Ticker not covered by peer table");
        return SectorComparison::not_covered(bare);
    };
    let avg = entry.industry_avg;

    let mut comparisons = Vec::with_capacity(4);

    if let Some(pe) = snapshot.pe_ratio.filter(|_| avg.pe_ratio != 0.0) {
        let difference = (pe - avg.pe_ratio) / avg.pe_ratio * 100.0;
        let verdict = if difference > VALUATION_BAND_PCT {
            Verdict::Overvalued
        } else if difference < -VALUATION_BAND_PCT {
            Verdict::Undervalued
        } else {
            Verdict::Fair
        };
        comparisons.push(MetricComparison {
            metric: SectorMetric::PeRatio,
            value: pe,
            sector_avg: avg.pe_ratio,
            difference,
            verdict,
        });
    }

    if let Some(margin) = snapshot.profit_margin {
        let difference = margin - avg.profit_margin;
        comparisons.push(MetricComparison {
            metric: SectorMetric::ProfitMargin,
            value: margin,
            sector_avg: avg.profit_margin,
            difference,
            verdict: if difference > 0.0 {
                Verdict::AboveAverage
            } else {
                Verdict::BelowAverage
            },
        });
    }

    if let Some(roe) = snapshot.roe {
        let difference = roe - avg.roe;
        let verdict = if difference > ROE_BAND_PP {
            Verdict::Strong
        } else if difference < -ROE_BAND_PP {
            Verdict::Weak
        } else {
            Verdict::Average
        };
        comparisons.push(MetricComparison {
            metric: SectorMetric::Roe,
            value: roe,
            sector_avg: avg.roe,
            difference,
            verdict,
        });
    }

    if let Some(de) = snapshot.debt_to_equity {
        let difference = de - avg.debt_to_equity;
        comparisons.push(MetricComparison {
            metric: SectorMetric::DebtToEquity,
            value: de,
            sector_avg: avg.debt_to_equity,
            difference,
            verdict: if difference < 0.0 {
                Verdict::LowerDebt
            } else {
                Verdict::HigherDebt
            },
        });
    }

    tracing::debug!(
        ticker = %bare,
        sector = %entry.sector,
        metrics = comparisons.len(),
        "Compared against sector"
    );

    SectorComparison {
        ticker: bare,
        available: true,
        reason: None,
        sector: Some(entry.sector.clone()),
        peers: entry.peers.clone(),
        industry_avg: Some(avg),
        comparisons,
    }
}

/// Plain-language takeaways from a comparison, in P/E, margin, ROE, D/E order
pub fn insights(comparison: &SectorComparison) -> Vec<String> {
    if !comparison.available {
        return Vec::new();
    }

    let mut out = Vec::new();

    if let Some(pe) = comparison.metric(SectorMetric::PeRatio) {
        match pe.verdict {
            Verdict::Overvalued => out.push(format!(
                "Stock trading at {:.1}% premium to sector - may be overvalued",
                pe.difference
            )),
            Verdict::Undervalued => out.push(format!(
                "Stock trading at {:.1}% discount to sector - potential value buy",
                pe.difference.abs()
            )),
            _ => {}
        }
    }

    if let Some(margin) = comparison.metric(SectorMetric::ProfitMargin) {
        if margin.difference > MARGIN_INSIGHT_PP {
            out.push(format!(
                "Profit margin {:.1}pp above sector - strong pricing power",
                margin.difference
            ));
        } else if margin.difference < -MARGIN_INSIGHT_PP {
            out.push(format!(
                "Profit margin {:.1}pp below sector - competitive pressure",
                margin.difference.abs()
            ));
        }
    }

    if let Some(roe) = comparison.metric(SectorMetric::Roe) {
        match roe.verdict {
            Verdict::Strong => {
                out.push("ROE above sector average - efficient capital allocation".to_string());
            }
            Verdict::Weak => {
                out.push("ROE below sector average - may struggle vs peers".to_string());
            }
            _ => {}
        }
    }

    if let Some(de) = comparison.metric(SectorMetric::DebtToEquity) {
        if de.verdict == Verdict::LowerDebt {
            out.push("Lower debt than sector - financial strength".to_string());
        } else {
            out.push("Higher debt than sector - monitor closely".to_string());
        }
    }

    out
}
