//! Analysis pipeline orchestration
//!
//! Runs fetch, delta, validation, freshness, trend, sector and narration
//! stages for one ticker. Each stage is independent: a stage that cannot run
//! records an [`Unavailable`] with its reason and the rest carry on.

use crate::cache::{CacheKey, CacheManager, PREFIX_SECTOR};
use crate::config::AgentConfig;
use crate::document::DocumentExtract;
use crate::error::Result;
use crate::narration::{EXPLANATION_UNAVAILABLE, NarrationRequest, Narrator};
use crate::provider::{FundamentalsProvider, PeerQuote, fetch_peer_quotes};
use chrono::{DateTime, NaiveDate, Utc};
use earnings_core::delta::{self, DeltaResult};
use earnings_core::scorer::{self, QualityScore};
use earnings_core::sector::{self, SectorComparison};
use earnings_core::trend::{self, TrendAnalysis};
use earnings_core::validator::{self, DataFreshness, ValidationReport};
use earnings_core::{
    CompanyInfo, FinancialSnapshot, PeerTable, Stage, StageResult, StatementTable, Unavailable,
    normalize_ticker,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Sector comparison with its insights and display-only peer quotes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorReport {
    pub comparison: SectorComparison,
    pub insights: Vec<String>,
    pub peers: Vec<PeerQuote>,
}

/// Everything one analysis run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    /// Bare ticker, without exchange suffix
    pub ticker: String,
    pub generated_at: DateTime<Utc>,
    pub company: Option<CompanyInfo>,
    pub snapshot: Option<FinancialSnapshot>,
    pub delta: StageResult<DeltaResult>,
    pub validation: ValidationReport,
    pub quality: QualityScore,
    pub freshness: StageResult<DataFreshness>,
    pub trends: StageResult<TrendAnalysis>,
    pub sector: StageResult<SectorReport>,
    pub narration: StageResult<String>,
    pub document: Option<DocumentExtract>,
    /// Upstream failures that degraded the report
    pub warnings: Vec<String>,
}

impl AnalysisReport {
    pub fn anomaly_detected(&self) -> bool {
        self.delta.as_ref().is_ok_and(|d| d.anomaly_detected)
    }
}

/// Load the peer table named in the config, or the built-in one
pub fn load_peer_table(config: &AgentConfig) -> Result<PeerTable> {
    match &config.peer_table_path {
        Some(path) => {
            let table = PeerTable::from_path(path)?;
            info!(path = %path.display(), entries = table.len(), "Loaded peer table");
            Ok(table)
        }
        None => Ok(PeerTable::builtin()),
    }
}

/// Runs the analysis pipeline against injected collaborators
pub struct EarningsAnalyzer {
    config: AgentConfig,
    provider: Arc<dyn FundamentalsProvider>,
    peer_table: Arc<PeerTable>,
    cache: Arc<CacheManager>,
    narrator: Option<Arc<dyn Narrator>>,
    today: Option<NaiveDate>,
}

impl EarningsAnalyzer {
    pub fn new(
        config: AgentConfig,
        provider: Arc<dyn FundamentalsProvider>,
        peer_table: Arc<PeerTable>,
        cache: Arc<CacheManager>,
    ) -> Self {
        Self {
            config,
            provider,
            peer_table,
            cache,
            narrator: None,
            today: None,
        }
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    /// Pin the date used for freshness checks
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }


    /// Analyze one ticker
    #[instrument(skip(self, document), fields(provider = self.provider.name()))]
    pub async fn analyze(&self, ticker: &str, document: Option<DocumentExtract>) -> AnalysisReport {
        let symbol = self.config.exchange_symbol(ticker);
        let bare = normalize_ticker(ticker);
        let mut warnings = Vec::new();

        let (company, snapshot, statement) = tokio::join!(
            self.provider.fetch_company_info(&symbol),
            self.provider.fetch_snapshot(&symbol),
            self.provider.fetch_income_statement(&symbol),
        );
        let company = upstream(company, "company info", &mut warnings);
        let snapshot = upstream(snapshot, "fundamentals", &mut warnings)
            .map(|raw| FinancialSnapshot::from_raw(&raw));
        let statement = upstream(statement, "quarterly statement", &mut warnings);
        info!(
            symbol = %symbol,
            company = company.is_some(),
            snapshot = snapshot.is_some(),
            statement = statement.is_some(),
            "Fetch stage complete"
        );

        let delta = match &statement {
            Some(statement) => delta::compute_delta(statement),
            None => Err(Unavailable::new(Stage::Delta, "quarterly statement unavailable")),
        };
        log_stage(Stage::Delta, &delta);

        let effective = snapshot.clone().unwrap_or_default();
        let validation = validator::validate(&effective, delta.as_ref().ok());
        let quality = scorer::score(&validation);
        info!(score = quality.score, grade = %quality.grade, "Validation stage complete");

        let freshness = self.freshness(statement.as_ref());
        log_stage(Stage::Freshness, &freshness);
        if let Ok(DataFreshness {
            warning: Some(message),
            ..
        }) = &freshness
        {
            warnings.push(message.clone());
        }

        let trends = match &statement {
            Some(statement) => trend::analyze(statement, self.config.max_quarters),
            None => Err(Unavailable::new(Stage::Trend, "quarterly statement unavailable")),
        };
        log_stage(Stage::Trend, &trends);

        let sector = self.sector_stage(&bare, &effective).await;
        log_stage(Stage::Sector, &sector);

        let narration = self
            .narration_stage(
                &delta,
                company.as_ref(),
                &validation,
                &trends,
                document.as_ref(),
                &mut warnings,
            )
            .await;
        log_stage(Stage::Narration, &narration);

        AnalysisReport {
            run_id: Uuid::new_v4(),
            ticker: bare,
            generated_at: Utc::now(),
            company,
            snapshot,
            delta,
            validation,
            quality,
            freshness,
            trends,
            sector,
            narration,
            document,
            warnings,
        }
    }

    fn freshness(&self, statement: Option<&StatementTable>) -> StageResult<DataFreshness> {
        let newest = statement
            .and_then(|s| s.periods.iter().max())
            .ok_or_else(|| Unavailable::new(Stage::Freshness, "no reporting periods"))?;
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        Ok(validator::check_freshness(*newest, today))
    }

    async fn sector_stage(
        &self,
        bare: &str,
        snapshot: &FinancialSnapshot,
    ) -> StageResult<SectorReport> {
        let comparison = sector::compare(bare, snapshot, &self.peer_table);
        if !comparison.available {
            let reason = comparison
                .reason
                .unwrap_or_else(|| sector::NOT_COVERED_REASON.to_string());
            return Err(Unavailable::new(Stage::Sector, reason));
        }
        let insights = sector::insights(&comparison);
        let peers = self.peer_quotes(bare, &comparison.peers).await;
        Ok(SectorReport {
            comparison,
            insights,
            peers,
        })
    }

    async fn peer_quotes(&self, bare: &str, peers: &[String]) -> Vec<PeerQuote> {
        let key = CacheKey::new(PREFIX_SECTOR, bare);
        if let Some(cached) = self.cache.sector.get(&key).await {
            match serde_json::from_value(cached) {
                Ok(quotes) => return quotes,
                Err(e) => warn!(error = %e, "Discarding unreadable cached peer quotes"),
            }
        }

        let symbols: Vec<String> = peers.iter().map(|p| self.config.exchange_symbol(p)).collect();
        let mut quotes =
            fetch_peer_quotes(self.provider.as_ref(), &symbols, self.config.max_peers).await;
        for quote in &mut quotes {
            quote.ticker = normalize_ticker(&quote.ticker);
        }
        if !quotes.is_empty() {
            match serde_json::to_value(&quotes) {
                Ok(value) => self.cache.sector.insert(key, value).await,
                Err(e) => warn!(error = %e, "Could not cache peer quotes"),
            }
        }
        quotes
    }

    async fn narration_stage(
        &self,
        delta: &StageResult<DeltaResult>,
        company: Option<&CompanyInfo>,
        validation: &ValidationReport,
        trends: &StageResult<TrendAnalysis>,
        document: Option<&DocumentExtract>,
        warnings: &mut Vec<String>,
    ) -> StageResult<String> {
        let delta = delta
            .as_ref()
            .map_err(|_| Unavailable::new(Stage::Narration, "no delta to explain"))?;
        if !delta.anomaly_detected {
            return Err(Unavailable::new(Stage::Narration, "no anomaly detected"));
        }
        let narrator = match &self.narrator {
            Some(narrator) if self.config.narration_enabled => narrator,
            _ => return Err(Unavailable::new(Stage::Narration, "narration disabled")),
        };

        let request = NarrationRequest::from_delta(
            delta,
            narration_context(company, validation, trends, document),
        );
        match narrator.explain(&request).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(narrator = narrator.name(), error = %e, "Narration failed");
                warnings.push(format!("{EXPLANATION_UNAVAILABLE}: {e}"));
                Err(Unavailable::new(
                    Stage::Narration,
                    format!("{EXPLANATION_UNAVAILABLE}: {e}"),
                ))
            }
        }
    }
}

/// Short company, severity and trend summary handed to the narrator
fn narration_context(
    company: Option<&CompanyInfo>,
    validation: &ValidationReport,
    trends: &StageResult<TrendAnalysis>,
    document: Option<&DocumentExtract>,
) -> String {
    let mut lines = Vec::new();
    if let Some(company) = company {
        if let Some(name) = &company.name {
            lines.push(format!("Company: {name}"));
        }
        if let Some(sector) = &company.sector {
            lines.push(format!("Sector: {sector}"));
        }
    }
    if let Ok(check) = &validation.delta {
        lines.push(format!("Severity: {}", check.severity_description));
    }
    if let Ok(TrendAnalysis {
        patterns: Ok(patterns),
        ..
    }) = trends
    {
        lines.push(format!(
            "Trend: revenue {}, profit {}, margin {}",
            patterns.revenue_label(),
            patterns.profit_label(),
            patterns.margin_label()
        ));
    }
    if let Some(notes) = document.and_then(|d| d.notes.as_deref()) {
        lines.push(format!("Notes from earnings report:\n{notes}"));
    }
    lines.join("\n")
}

/// Record an upstream failure as a warning and continue without the value
fn upstream<T>(result: Result<T>, what: &str, warnings: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            let message = if e.is_rate_limit() {
                format!("{what} unavailable: rate limited, try again later ({e})")
            } else {
                format!("{what} unavailable: {e}")
            };
            warn!(error = %e, "{what} unavailable");
            warnings.push(message);
            None
        }
    }
}

fn log_stage<T>(stage: Stage, result: &StageResult<T>) {
    match result {
        Ok(_) => info!(stage = %stage, "Stage complete"),
        Err(unavailable) => {
            info!(stage = %stage, reason = %unavailable.reason, "Stage unavailable");
        }
    }
}
