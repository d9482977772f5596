//! Earnings anomaly agent CLI
//!
//! # Usage
//!
//! ```bash
//! export ALPHA_VANTAGE_API_KEY="your-key"
//! export OPENAI_API_KEY="your-key"
//!
//! cargo run --bin earnings-agent -- analyze TCS
//! cargo run --bin earnings-agent -- analyze INFY --fixture fixtures.json --no-narration --json
//! cargo run --bin earnings-agent -- peers
//! cargo run --bin earnings-agent -- ask TCS --document q2.txt "Why did margins fall?"
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets};
use earnings_agent::logging::{DEFAULT_FILTER, LogFormat, init_tracing};
use earnings_agent::{
    AgentConfig, CacheManager, CachedProvider, EarningsAnalyzer, FixtureProvider,
    FundamentalsProvider, MarketDataProvider, OpenAiNarrator, answer_question, load_document,
    load_peer_table, report,
};
use earnings_core::{PeerEntry, PeerTable, normalize_ticker};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "earnings-agent")]
#[command(about = "Quarterly earnings anomaly detection and analysis", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Peer table JSON file replacing the built-in table
    #[arg(long, global = true, value_name = "PATH")]
    peer_table: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one company's latest quarters
    Analyze {
        ticker: String,

        /// Read data from a JSON fixture instead of live providers
        #[arg(long, value_name = "PATH")]
        fixture: Option<PathBuf>,

        /// Earnings document (extracted text, or a JSON metrics record)
        #[arg(long, value_name = "PATH")]
        document: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Skip the language-model explanation
        #[arg(long)]
        no_narration: bool,
    },
    /// Show the peer table, or one company's entry
    Peers { ticker: Option<String> },
    /// Ask a question about a company's earnings document
    Ask {
        ticker: String,

        /// Earnings document text
        #[arg(long, value_name = "PATH")]
        document: PathBuf,

        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(DEFAULT_FILTER, format);

    let mut config = AgentConfig::default().with_env();
    if let Some(path) = cli.peer_table {
        config.peer_table_path = Some(path);
    }

    match cli.command {
        Command::Analyze {
            ticker,
            fixture,
            document,
            json,
            no_narration,
        } => {
            if no_narration {
                config.narration_enabled = false;
            }
            analyze(config, &ticker, fixture, document, json).await
        }
        Command::Peers { ticker } => {
            let table = load_peer_table(&config)?;
            print_peers(&table, ticker.as_deref())
        }
        Command::Ask {
            ticker,
            document,
            question,
        } => ask(&config, &ticker, &document, &question).await,
    }
}

async fn ask(
    config: &AgentConfig,
    ticker: &str,
    path: &Path,
    question: &str,
) -> anyhow::Result<()> {
    config.validate()?;
    anyhow::ensure!(
        config.narration_enabled,
        "answering questions needs a language model; narration is disabled"
    );
    let cache = CacheManager::from_config(config);
    let document = load_document(path, &cache)
        .await
        .with_context(|| format!("failed to read document {}", path.display()))?;

    let narrator = OpenAiNarrator::from_config(config)?;
    info!(ticker, "Answering question about earnings document");
    let answer = answer_question(&narrator, &document, question).await?;
    println!("{} | {question}\n\n{answer}", normalize_ticker(ticker));
    Ok(())
}

async fn analyze(
    config: AgentConfig,
    ticker: &str,
    fixture: Option<PathBuf>,
    document: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    config.validate()?;
    let cache = Arc::new(CacheManager::from_config(&config));
    let peer_table = Arc::new(load_peer_table(&config)?);

    let provider: Arc<dyn FundamentalsProvider> = match fixture {
        Some(path) => {
            let fixture = FixtureProvider::from_path(&path)
                .with_context(|| format!("failed to load fixture {}", path.display()))?;
            Arc::new(CachedProvider::new(fixture, cache.clone()))
        }
        None => Arc::new(CachedProvider::new(
            MarketDataProvider::new(config.clone())?,
            cache.clone(),
        )),
    };
    info!(provider = provider.name(), ticker, "Starting analysis");

    let document = match document {
        Some(path) => Some(
            load_document(&path, &cache)
                .await
                .with_context(|| format!("failed to read document {}", path.display()))?,
        ),
        None => None,
    };

    let narrator = if config.narration_enabled {
        Some(Arc::new(OpenAiNarrator::from_config(&config)?))
    } else {
        None
    };

    let mut analyzer = EarningsAnalyzer::new(config, provider, peer_table, cache.clone());
    if let Some(narrator) = narrator {
        analyzer = analyzer.with_narrator(narrator);
    }

    let report = analyzer.analyze(ticker, document).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report::render_text(&report));
    }

    let stats = cache.stats().await;
    info!(cached_items = stats.total_items, "Analysis complete");
    Ok(())
}

fn print_peers(table: &PeerTable, ticker: Option<&str>) -> anyhow::Result<()> {
    let entries = peer_rows(table, ticker)?;

    let mut out = Table::new();
    out.load_preset(presets::UTF8_FULL);
    out.set_header(vec!["Ticker", "Sector", "Peers", "P/E", "Margin %", "ROE %", "D/E"]);
    for (ticker, entry) in entries {
        let avg = entry.industry_avg;
        out.add_row(vec![
            ticker,
            entry.sector.clone(),
            entry.peers.join(", "),
            format!("{:.1}", avg.pe_ratio),
            format!("{:.1}", avg.profit_margin),
            format!("{:.1}", avg.roe),
            format!("{:.2}", avg.debt_to_equity),
        ]);
    }
    println!("{out}");
    Ok(())
}

/// Table rows for one ticker (looked up by its bare symbol) or for all of them
fn peer_rows<'a>(
    table: &'a PeerTable,
    ticker: Option<&str>,
) -> anyhow::Result<Vec<(String, &'a PeerEntry)>> {
    match ticker {
        Some(ticker) => {
            let bare = normalize_ticker(ticker);
            let entry = table
                .get(&bare)
                .with_context(|| format!("{ticker} is not in the peer table"))?;
            Ok(vec![(bare, entry)])
        }
        None => Ok(table
            .iter()
            .map(|(ticker, entry)| (ticker.to_string(), entry))
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_rows_accept_any_ticker_spelling() {
        let table = PeerTable::builtin();
        for spelling in ["TCS", "tcs", "TCS.NS", " tcs.bo "] {
            let rows = peer_rows(&table, Some(spelling)).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].0, "TCS");
            assert_eq!(rows[0].1.sector, "Information Technology");
        }
        assert!(print_peers(&table, Some("infy.ns")).is_ok());
    }

    #[test]
    fn test_ask_command_parses() {
        let cli = Cli::try_parse_from([
            "earnings-agent",
            "ask",
            "tcs",
            "--document",
            "q2.txt",
            "What were the main challenges?",
        ])
        .unwrap();
        match cli.command {
            Command::Ask {
                ticker,
                document,
                question,
            } => {
                assert_eq!(ticker, "tcs");
                assert_eq!(document, PathBuf::from("q2.txt"));
                assert_eq!(question, "What were the main challenges?");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["earnings-agent", "ask", "TCS", "Why?"]).is_err());
    }

    #[tokio::test]
    async fn test_ask_refuses_without_narration() {
        let config = AgentConfig::builder().narration_enabled(false).build().unwrap();
        let err = ask(&config, "TCS", Path::new("q2.txt"), "Why?").await.unwrap_err();
        assert!(err.to_string().contains("narration is disabled"));
    }

    #[test]
    fn test_peer_rows_unknown_and_all() {
        let table = PeerTable::builtin();
        let err = peer_rows(&table, Some("zomato")).unwrap_err();
        assert_eq!(err.to_string(), "zomato is not in the peer table");
        assert_eq!(peer_rows(&table, None).unwrap().len(), table.len());
    }
}
