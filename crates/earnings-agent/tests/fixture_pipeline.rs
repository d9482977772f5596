use chrono::NaiveDate;
use earnings_agent::{
    AgentConfig, CacheManager, CachedProvider, EarningsAnalyzer, FixtureProvider, report,
};
use earnings_core::{AnomalyKind, Grade, PeerTable, Verdict};
use std::io::Write;
use std::sync::Arc;

const FIXTURE: &str = r#"{
  "HDFCBANK": {
    "company": { "symbol": "HDFCBANK.NS", "name": "HDFC Bank Limited", "sector": "Financial Services" },
    "fundamentals": {
      "price": 1650.0,
      "pe_ratio": 21.0,
      "roe": 0.16,
      "profit_margin": 0.22,
      "debt_to_equity": 0.9
    },
    "statement": {
      "periods": ["2024-09-30", "2024-06-30", "2024-03-31", "2023-12-31"],
      "rows": {
        "Total Revenue": [130.0, 120.0, 110.0, 100.0],
        "Net Income": [12.0, 14.0, 15.0, 16.0]
      }
    }
  },
  "ICICIBANK": {
    "company": { "symbol": "ICICIBANK.NS", "name": "ICICI Bank" },
    "fundamentals": { "price": 1250.0, "pe_ratio": 18.5 }
  }
}"#;

fn fixture_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FIXTURE.as_bytes()).unwrap();
    file
}

fn analyzer(provider: FixtureProvider) -> (EarningsAnalyzer, Arc<CacheManager>) {
    let config = AgentConfig::builder().narration_enabled(false).build().unwrap();
    let cache = Arc::new(CacheManager::from_config(&config));
    let provider = CachedProvider::new(provider, cache.clone());
    let analyzer = EarningsAnalyzer::new(
        config,
        Arc::new(provider),
        Arc::new(PeerTable::builtin()),
        cache.clone(),
    )
    .with_today(NaiveDate::from_ymd_opt(2024, 10, 4).unwrap());
    (analyzer, cache)
}

#[tokio::test]
async fn test_declining_bank_from_fixture_file() {
    let file = fixture_file();
    let (analyzer, _) = analyzer(FixtureProvider::from_path(file.path()).unwrap());

    let report = analyzer.analyze("hdfcbank", None).await;

    let delta = report.delta.as_ref().unwrap();
    assert_eq!(delta.anomaly_kind, AnomalyKind::RevenueUpProfitDown);
    assert_eq!(delta.profit_change_pct, -14.29);
    assert_eq!(report.quality.grade, Grade::A);

    let patterns = report.trends.as_ref().unwrap().patterns.as_ref().unwrap();
    assert!(patterns
        .alerts
        .iter()
        .any(|a| a == "Revenue growing but profit declining - CRITICAL"));
    assert!(patterns
        .alerts
        .iter()
        .any(|a| a == "3 consecutive quarters of margin compression"));

    let sector = report.sector.as_ref().unwrap();
    assert_eq!(sector.comparison.sector.as_deref(), Some("Banking"));
    // Only ICICIBANK has fixture data among the peers
    assert_eq!(sector.peers.len(), 1);
    assert_eq!(sector.peers[0].ticker, "ICICIBANK");
    assert_eq!(sector.peers[0].name.as_deref(), Some("ICICI Bank"));
    assert!(sector
        .comparison
        .comparisons
        .iter()
        .any(|c| c.verdict == Verdict::Fair));

    let text = report::render_text(&report);
    assert!(text.contains("HDFC Bank Limited"));
    assert!(text.contains("ALERT: Revenue growing but profit declining - CRITICAL"));
}

#[tokio::test]
async fn test_cached_run_matches_fresh_run() {
    let file = fixture_file();
    let (analyzer, cache) = analyzer(FixtureProvider::from_path(file.path()).unwrap());

    let fresh = analyzer.analyze("HDFCBANK", None).await;
    let stats = cache.stats().await;
    assert!(stats.quotes > 0);
    assert_eq!(stats.sector, 1);

    let cached = analyzer.analyze("HDFCBANK", None).await;
    assert_ne!(fresh.run_id, cached.run_id);
    assert_eq!(fresh.delta, cached.delta);
    assert_eq!(fresh.trends, cached.trends);
    assert_eq!(fresh.sector, cached.sector);
    assert_eq!(fresh.quality, cached.quality);
}

#[test]
fn test_report_serializes_to_json() {
    let file = fixture_file();
    let (analyzer, _) = analyzer(FixtureProvider::from_path(file.path()).unwrap());

    let report = tokio_test::block_on(analyzer.analyze("RELIANCE", None));
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["ticker"], "RELIANCE");
    assert!(json["delta"]["Err"]["reason"].is_string());
    assert_eq!(json["warnings"].as_array().unwrap().len(), 3);
}
