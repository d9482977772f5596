//! Static sector peer table
//!
//! Maps a ticker to its sector, its listed peers and the sector's average
//! valuation ratios. The built-in table covers a handful of NSE large caps;
//! a JSON file with the same shape can replace it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerTableError {
    #[error("failed to read peer table: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse peer table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid peer table entry for {ticker}: {reason}")]
    InvalidEntry { ticker: String, reason: String },
}

/// Sector averages, margin and ROE in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndustryAverages {
    pub pe_ratio: f64,
    pub profit_margin: f64,
    pub roe: f64,
    pub debt_to_equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub sector: String,
    pub peers: Vec<String>,
    pub industry_avg: IndustryAverages,
}

/// Ticker to peer entry, keyed by the bare (suffix-free) ticker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerTable {
    entries: BTreeMap<String, PeerEntry>,
}

impl PeerTable {
    /// The bundled NSE peer table
    pub fn builtin() -> Self {
        let energy = IndustryAverages {
            pe_ratio: 18.5,
            profit_margin: 8.5,
            roe: 12.0,
            debt_to_equity: 1.2,
        };
        let it = IndustryAverages {
            pe_ratio: 28.0,
            profit_margin: 22.0,
            roe: 35.0,
            debt_to_equity: 0.1,
        };
        let banking = IndustryAverages {
            pe_ratio: 18.0,
            profit_margin: 25.0,
            roe: 15.0,
            debt_to_equity: 5.0,
        };
        let fmcg = IndustryAverages {
            pe_ratio: 45.0,
            profit_margin: 18.0,
            roe: 28.0,
            debt_to_equity: 0.3,
        };
        let auto = IndustryAverages {
            pe_ratio: 22.0,
            profit_margin: 6.5,
            roe: 12.0,
            debt_to_equity: 0.8,
        };

        let rows = [
            ("RELIANCE", "Energy & Petrochemicals", ["ONGC", "BPCL", "IOC", "HINDPETRO"], energy),
            ("TCS", "Information Technology", ["INFY", "WIPRO", "HCLTECH", "TECHM"], it),
            ("INFY", "Information Technology", ["TCS", "WIPRO", "HCLTECH", "TECHM"], it),
            ("HDFCBANK", "Banking", ["ICICIBANK", "SBIN", "KOTAKBANK", "AXISBANK"], banking),
            ("ICICIBANK", "Banking", ["HDFCBANK", "SBIN", "KOTAKBANK", "AXISBANK"], banking),
            ("ITC", "FMCG", ["HINDUNILVR", "NESTLEIND", "BRITANNIA", "DABUR"], fmcg),
            ("HINDUNILVR", "FMCG", ["ITC", "NESTLEIND", "BRITANNIA", "DABUR"], fmcg),
            ("MARUTI", "Automobile", ["TATAMOTORS", "M&M", "BAJAJ-AUTO", "HEROMOTOCO"], auto),
        ];

        let entries = rows
            .into_iter()
            .map(|(ticker, sector, peers, industry_avg)| {
                (
                    ticker.to_string(),
                    PeerEntry {
                        sector: sector.to_string(),
                        peers: peers.iter().map(|p| (*p).to_string()).collect(),
                        industry_avg,
                    },
                )
            })
            .collect();

        Self { entries }
    }

    pub fn from_json_str(json: &str) -> Result<Self, PeerTableError> {
        let table: Self = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PeerTableError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Averages are used as divisors and must be finite; the P/E average must be non-zero
    fn validate(&self) -> Result<(), PeerTableError> {
        for (ticker, entry) in &self.entries {
            let avg = entry.industry_avg;
            let finite = [avg.pe_ratio, avg.profit_margin, avg.roe, avg.debt_to_equity]
                .iter()
                .all(|v| v.is_finite());
            if !finite {
                return Err(PeerTableError::InvalidEntry {
                    ticker: ticker.clone(),
                    reason: "industry averages must be finite".to_string(),
                });
            }
            if avg.pe_ratio == 0.0 {
                return Err(PeerTableError::InvalidEntry {
                    ticker: ticker.clone(),
                    reason: "industry P/E average must be non-zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Look up a bare ticker
    pub fn get(&self, ticker: &str) -> Option<&PeerEntry> {
        self.entries.get(ticker)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PeerEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_table() {
        let table = PeerTable::builtin();
        assert_eq!(table.len(), 8);
        let tcs = table.get("TCS").unwrap();
        assert_eq!(tcs.sector, "Information Technology");
        assert_eq!(tcs.peers[0], "INFY");
        assert_eq!(tcs.industry_avg.pe_ratio, 28.0);
        assert_eq!(table.get("MARUTI").unwrap().peers[1], "M&M");
        assert!(table.get("UNKNOWNCO").is_none());
    }

    #[test]
    fn test_from_json_str() {
        let json = r#"{
            "WIPRO": {
                "sector": "Information Technology",
                "peers": ["TCS", "INFY"],
                "industry_avg": { "pe_ratio": 25.0, "profit_margin": 15.0, "roe": 18.0, "debt_to_equity": 0.2 }
            }
        }"#;
        let table = PeerTable::from_json_str(json).unwrap();
        assert_eq!(table.tickers().collect::<Vec<_>>(), vec!["WIPRO"]);
    }

    #[test]
    fn test_zero_pe_average_rejected() {
        let json = r#"{
            "X": {
                "sector": "Test",
                "peers": [],
                "industry_avg": { "pe_ratio": 0.0, "profit_margin": 1.0, "roe": 1.0, "debt_to_equity": 1.0 }
            }
        }"#;
        assert!(matches!(
            PeerTable::from_json_str(json),
            Err(PeerTableError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn test_from_path_roundtrips_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&PeerTable::builtin()).unwrap();
        file.write_all(json.as_bytes()).unwrap();
        let loaded = PeerTable::from_path(file.path()).unwrap();
        assert_eq!(loaded, PeerTable::builtin());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = PeerTable::from_path("/nonexistent/peers.json").unwrap_err();
        assert!(matches!(err, PeerTableError::Io(_)));
    }
}
