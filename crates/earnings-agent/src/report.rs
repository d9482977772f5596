//! Plain-text rendering of an [`AnalysisReport`]

use crate::analyzer::{AnalysisReport, SectorReport};
use comfy_table::{Table, presets};
use earnings_core::trend::TrendAnalysis;
use earnings_core::DocumentMetrics;

fn table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table
}

/// Characters of each document excerpt shown in the report
const EXCERPT_CHARS: usize = 1000;

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

/// Render the full report for terminal output
pub fn render_text(report: &AnalysisReport) -> String {
    let mut out = Vec::new();

    let name = report
        .company
        .as_ref()
        .and_then(|c| c.name.as_deref())
        .unwrap_or("Unknown company");
    out.push(format!("Earnings analysis: {} ({name})", report.ticker));
    out.push(format!(
        "Generated {} | run {}",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.run_id
    ));

    if let Some(snapshot) = &report.snapshot {
        out.push(String::new());
        out.push("FUNDAMENTALS".to_string());
        out.push(format!(
            "  Price {:.2} | P/E {} | P/B {} | D/E {} | ROE {}% | Margin {}%",
            snapshot.price,
            opt(snapshot.pe_ratio),
            opt(snapshot.pb_ratio),
            opt(snapshot.debt_to_equity),
            opt(snapshot.roe),
            opt(snapshot.profit_margin)
        ));
    }

    out.push(String::new());
    out.push("QUARTERLY DELTA".to_string());
    match &report.delta {
        Ok(delta) => {
            out.push(format!("  {} vs {}", delta.latest_period, delta.previous_period));
            out.push(format!("  Revenue change: {:+.2}%", delta.revenue_change_pct));
            out.push(format!("  Profit change:  {:+.2}%", delta.profit_change_pct));
            if delta.anomaly_detected {
                out.push(format!("  ANOMALY: {}", delta.anomaly_kind));
            }
        }
        Err(u) => out.push(format!("  Not available: {}", u.reason)),
    }
    if report.anomaly_detected() {
        match &report.narration {
            Ok(text) => out.push(format!("  Explanation: {text}")),
            Err(u) => out.push(format!("  Explanation: {}", u.reason)),
        }
    }

    out.push(String::new());
    out.push("DATA QUALITY".to_string());
    out.push(format!("  Score {}/100, grade {}", report.quality.score, report.quality.grade));
    if let Ok(check) = &report.validation.delta {
        out.push(format!(
            "  Divergence {:.2} pts: {}",
            check.divergence, check.severity_description
        ));
        out.extend(check.insights.iter().map(|i| format!("  - {i}")));
    }
    out.extend(report.validation.all_warnings().map(|w| format!("  ! {w}")));
    out.extend(report.validation.metrics.flags.iter().map(|f| format!("  * {f}")));
    match &report.freshness {
        Ok(freshness) => out.push(format!(
            "  Latest period {} ({} days old)",
            freshness.last_updated, freshness.age_days
        )),
        Err(u) => out.push(format!("  Freshness not available: {}", u.reason)),
    }

    out.push(String::new());
    out.push("TRENDS".to_string());
    match &report.trends {
        Ok(trends) => render_trends(trends, &mut out),
        Err(u) => out.push(format!("  Not available: {}", u.reason)),
    }

    out.push(String::new());
    out.push("SECTOR COMPARISON".to_string());
    match &report.sector {
        Ok(sector) => render_sector(sector, &mut out),
        Err(u) => out.push(format!("  {}", u.reason)),
    }

    if let Some(document) = &report.document {
        if !document.metrics.is_empty() {
            out.push(String::new());
            out.push("REPORTED IN DOCUMENT".to_string());
            out.push(render_document(&document.metrics));
        }
        if let Some(commentary) = &document.commentary {
            out.push(String::new());
            out.push("MANAGEMENT COMMENTARY".to_string());
            out.push(excerpt(commentary));
        }
    }

    if !report.warnings.is_empty() {
        out.push(String::new());
        out.push("WARNINGS".to_string());
        out.extend(report.warnings.iter().map(|w| format!("  ! {w}")));
    }

    out.join("\n")
}

fn render_trends(trends: &TrendAnalysis, out: &mut Vec<String>) {
    let mut points = table();
    points.set_header(vec!["Quarter", "Revenue", "Profit", "Margin %", "Rev Δ %", "Profit Δ %"]);
    for point in &trends.series.points {
        points.add_row(vec![
            point.period_end.to_string(),
            format!("{:.2}", point.revenue),
            format!("{:.2}", point.profit),
            format!("{:.2}", point.margin),
            opt(point.revenue_change_pct),
            opt(point.profit_change_pct),
        ]);
    }
    out.push(points.to_string());

    match &trends.patterns {
        Ok(patterns) => {
            out.push(format!("  Revenue: {}", patterns.revenue_label()));
            out.push(format!("  Profit:  {}", patterns.profit_label()));
            out.push(format!("  Margin:  {}", patterns.margin_label()));
            out.push(format!("  Consistency: {}", patterns.consistency));
            out.extend(patterns.alerts.iter().map(|a| format!("  ALERT: {a}")));
        }
        Err(u) => out.push(format!("  Patterns not available: {}", u.reason)),
    }

    match &trends.prediction {
        Ok(prediction) => {
            out.push(format!(
                "  Next quarter: revenue ~{:.2} ({:+.1}%, {} confidence), profit ~{:.2} ({:+.1}%, {} confidence)",
                prediction.revenue.value,
                prediction.revenue.growth_pct,
                prediction.revenue.confidence,
                prediction.profit.value,
                prediction.profit.growth_pct,
                prediction.profit.confidence
            ));
            out.push(format!("  {}", prediction.disclaimer));
        }
        Err(u) => out.push(format!("  Prediction not available: {}", u.reason)),
    }
}

fn render_sector(sector: &SectorReport, out: &mut Vec<String>) {
    let comparison = &sector.comparison;
    out.push(format!(
        "  Sector: {} | Peers: {}",
        comparison.sector.as_deref().unwrap_or("Unknown"),
        comparison.peers.join(", ")
    ));

    if comparison.comparisons.is_empty() {
        out.push("  No comparable metrics for this company".to_string());
    } else {
        let mut metrics = table();
        metrics.set_header(vec!["Metric", "Company", "Sector Avg", "Verdict"]);
        for row in &comparison.comparisons {
            metrics.add_row(vec![
                row.metric.to_string(),
                format!("{:.2}", row.value),
                format!("{:.2}", row.sector_avg),
                row.verdict.to_string(),
            ]);
        }
        out.push(metrics.to_string());
    }
    out.extend(sector.insights.iter().map(|i| format!("  - {i}")));

    if !sector.peers.is_empty() {
        let mut peers = table();
        peers.set_header(vec!["Peer", "Price", "P/E", "Margin %", "ROE %", "D/E"]);
        for quote in &sector.peers {
            peers.add_row(vec![
                quote.name.clone().unwrap_or_else(|| quote.ticker.clone()),
                opt(quote.price),
                opt(quote.pe_ratio),
                opt(quote.profit_margin),
                opt(quote.roe),
                opt(quote.debt_to_equity),
            ]);
        }
        out.push(peers.to_string());
    }
}

fn excerpt(text: &str) -> String {
    let mut shown: String = text.trim().chars().take(EXCERPT_CHARS).collect();
    if text.trim().chars().count() > EXCERPT_CHARS {
        shown.push_str("...");
    }
    shown
        .lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_document(metrics: &DocumentMetrics) -> String {
    let mut doc = table();
    doc.set_header(vec!["Revenue", "Profit", "EPS", "EBITDA"]);
    doc.add_row(vec![
        opt(metrics.revenue),
        opt(metrics.profit),
        opt(metrics.eps),
        opt(metrics.ebitda),
    ]);
    doc.to_string()
}
