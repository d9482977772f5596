//! Auxiliary metrics from an earnings document
//!
//! Accepts either a JSON metrics record or the plain text already extracted
//! from a results PDF. Text is scanned with label patterns for revenue,
//! profit, EPS and EBITDA, and the notes-to-accounts section is kept as
//! context for narration. Management commentary is kept for display and the
//! opening of the document for [`answer_question`]. These figures are shown
//! next to the analysis and never feed the calculations.

use crate::cache::{CacheKey, CacheManager, PREFIX_DOCUMENT};
use crate::error::{EarningsError, Result};
use crate::narration::{Narrator, QuestionRequest};
use earnings_core::DocumentMetrics;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

const AMOUNT: &str = r"[:\s]+(?:Rs\.?|INR|₹)?\s*([0-9][0-9,]*\.?[0-9]*)";

static REVENUE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    label_pattern("Total Revenue|Net Sales|Total Income|Revenue from Operations")
});
static PROFIT: LazyLock<Option<Regex>> =
    LazyLock::new(|| label_pattern("Net Profit|PAT|Profit After Tax|Profit for the period"));
static EPS: LazyLock<Option<Regex>> =
    LazyLock::new(|| label_pattern("EPS|Earnings Per Share|Basic EPS"));
static EBITDA: LazyLock<Option<Regex>> = LazyLock::new(|| label_pattern("EBITDA"));

fn label_pattern(labels: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?i)\b(?:{labels}){AMOUNT}")).ok()
}

const NOTES_KEYWORDS: &[&str] = &[
    "notes to accounts",
    "notes to financial statements",
    "explanatory notes",
    "significant accounting policies",
];

const COMMENTARY_KEYWORDS: &[&str] = &[
    "management discussion",
    "directors' report",
    "management commentary",
    "operational highlights",
];

/// Characters of leading text used as context when no notes section is found
const FALLBACK_CONTEXT_CHARS: usize = 3000;

/// Characters of leading text questions are answered from
pub const QUESTION_CONTEXT_CHARS: usize = 2000;

/// Metrics plus narration context pulled from one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentExtract {
    pub metrics: DocumentMetrics,
    /// Notes-to-accounts text, or the start of the document
    pub notes: Option<String>,
    /// Management discussion pages
    #[serde(default)]
    pub commentary: Option<String>,
    /// Opening of the document text
    #[serde(default)]
    pub excerpt: Option<String>,
}

fn first_amount(pattern: &LazyLock<Option<Regex>>, text: &str) -> Option<f64> {
    let regex = pattern.as_ref()?;
    let captures = regex.captures(text)?;
    captures.get(1)?.as_str().replace(',', "").parse().ok()
}

/// Scan document text for headline figures; the first match per label wins
pub fn extract_metrics(text: &str) -> DocumentMetrics {
    DocumentMetrics {
        revenue: first_amount(&REVENUE, text),
        profit: first_amount(&PROFIT, text),
        eps: first_amount(&EPS, text),
        ebitda: first_amount(&EBITDA, text),
    }
}

/// Pages (form-feed separated) mentioning any of `keywords`, joined
fn pages_mentioning(text: &str, keywords: &[&str]) -> Option<String> {
    let pages: Vec<&str> = text
        .split('\u{c}')
        .filter(|page| {
            let lower = page.to_lowercase();
            keywords.iter().any(|k| lower.contains(k))
        })
        .collect();
    (!pages.is_empty()).then(|| pages.join("\n\n"))
}

fn head(text: &str, chars: usize) -> Option<String> {
    let head: String = text.chars().take(chars).collect();
    let head = head.trim();
    (!head.is_empty()).then(|| head.to_string())
}

/// Pages mentioning a notes heading, or the start of the document
pub fn find_notes(text: &str) -> Option<String> {
    pages_mentioning(text, NOTES_KEYWORDS).or_else(|| head(text, FALLBACK_CONTEXT_CHARS))
}

/// Pages from the management discussion or directors' report
pub fn find_commentary(text: &str) -> Option<String> {
    pages_mentioning(text, COMMENTARY_KEYWORDS)
}

pub fn extract_from_text(text: &str) -> DocumentExtract {
    DocumentExtract {
        metrics: extract_metrics(text),
        notes: find_notes(text),
        commentary: find_commentary(text),
        excerpt: head(text, QUESTION_CONTEXT_CHARS),
    }
}

/// Answer a free-form question from the opening of the document.
///
/// JSON metrics records carry no text and cannot be questioned.
pub async fn answer_question(
    narrator: &dyn Narrator,
    document: &DocumentExtract,
    question: &str,
) -> Result<String> {
    let question = question.trim();
    if question.is_empty() {
        return Err(EarningsError::Other("question is empty".to_string()));
    }
    let excerpt = document.excerpt.as_deref().ok_or_else(|| {
        EarningsError::Other("document has no text to answer questions from".to_string())
    })?;

    let request = QuestionRequest::new(question, excerpt);
    tracing::info!(narrator = narrator.name(), "Answering question about document");
    narrator.answer(&request).await
}

/// Load a document, serving repeat loads of the same path from the cache.
///
/// `.json` files are read as a metrics record; anything else as text.
pub async fn load_document(path: &Path, cache: &CacheManager) -> Result<DocumentExtract> {
    let key = CacheKey::new(PREFIX_DOCUMENT, &path.to_string_lossy());
    let value = cache
        .documents
        .get_or_fetch(key, || async {
            let contents = tokio::fs::read_to_string(path).await?;
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            let extract = if is_json {
                DocumentExtract {
                    metrics: serde_json::from_str(&contents)?,
                    ..Default::default()
                }
            } else {
                extract_from_text(&contents)
            };
            tracing::info!(path = %path.display(), json = is_json, "Loaded earnings document");
            Ok::<_, EarningsError>(serde_json::to_value(extract)?)
        })
        .await?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::narration::MockNarrator;
    use std::io::Write;

    const REPORT: &str = "Quarterly results\n\
        Revenue from Operations: Rs. 2,31,535.00 crore\n\
        EBITDA ₹ 42,748\n\
        Net Profit 17,394.5\n\
        Basic EPS: 25.71\n\
        \u{c}Notes to Accounts\nExceptional item of 1,200 crore recognised.";

    #[test]
    fn test_extract_metrics() {
        let metrics = extract_metrics(REPORT);
        assert_eq!(metrics.revenue, Some(231_535.0));
        assert_eq!(metrics.ebitda, Some(42_748.0));
        assert_eq!(metrics.profit, Some(17_394.5));
        assert_eq!(metrics.eps, Some(25.71));
    }

    #[test]
    fn test_extract_metrics_nothing_found() {
        let metrics = extract_metrics("Chairman's letter to shareholders");
        assert!(metrics.is_empty());
    }

    #[test]
    fn test_find_notes_section() {
        let notes = find_notes(REPORT).unwrap();
        assert!(notes.starts_with("Notes to Accounts"));
        assert!(!notes.contains("EBITDA"));
    }

    #[test]
    fn test_find_notes_falls_back_to_head() {
        assert_eq!(find_notes("Short text").as_deref(), Some("Short text"));
        assert_eq!(find_notes("   "), None);
    }

    #[test]
    fn test_find_commentary() {
        let text = "Results summary\u{c}Management Discussion and Analysis\nDemand stayed soft.\
            \u{c}Balance sheet\u{c}Directors' Report\nDividend of 5 per share.";
        let commentary = find_commentary(text).unwrap();
        assert!(commentary.starts_with("Management Discussion"));
        assert!(commentary.contains("Dividend of 5 per share."));
        assert!(!commentary.contains("Balance sheet"));

        // no fallback to the document head, unlike notes
        assert_eq!(find_commentary(REPORT), None);
    }

    #[test]
    fn test_extract_keeps_question_excerpt() {
        let long = format!("{REPORT}\n{}", "y".repeat(5000));
        let extract = extract_from_text(&long);
        let excerpt = extract.excerpt.unwrap();
        assert_eq!(excerpt.chars().count(), QUESTION_CONTEXT_CHARS);
        assert!(excerpt.starts_with("Quarterly results"));
    }

    #[tokio::test]
    async fn test_answer_question_uses_excerpt() {
        let mut narrator = MockNarrator::new();
        narrator.expect_name().return_const("mock");
        narrator
            .expect_answer()
            .withf(|req| {
                req.question == "What drove the exceptional item?"
                    && req.excerpt.contains("Basic EPS: 25.71")
            })
            .times(1)
            .returning(|_| Ok("A one-time impairment.".to_string()));

        let extract = extract_from_text(REPORT);
        let answer = answer_question(&narrator, &extract, "  What drove the exceptional item? ")
            .await
            .unwrap();
        assert_eq!(answer, "A one-time impairment.");
    }

    #[tokio::test]
    async fn test_answer_question_needs_text_and_question() {
        let mut narrator = MockNarrator::new();
        narrator.expect_name().return_const("mock");
        narrator.expect_answer().never();

        let metrics_only = DocumentExtract::default();
        let err = answer_question(&narrator, &metrics_only, "Why?").await.unwrap_err();
        assert!(err.to_string().contains("no text"));

        let extract = extract_from_text(REPORT);
        assert!(answer_question(&narrator, &extract, "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_load_text_document_is_cached() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(REPORT.as_bytes()).unwrap();
        let cache = CacheManager::from_config(&AgentConfig::default());

        let first = load_document(file.path(), &cache).await.unwrap();
        assert_eq!(first.metrics.eps, Some(25.71));
        assert_eq!(cache.documents.len().await, 1);

        let second = load_document(file.path(), &cache).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_load_json_metrics() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"revenue": 1000.0, "eps": 4.2}"#).unwrap();
        let cache = CacheManager::from_config(&AgentConfig::default());

        let extract = load_document(file.path(), &cache).await.unwrap();
        assert_eq!(extract.metrics.revenue, Some(1000.0));
        assert_eq!(extract.metrics.profit, None);
        assert_eq!(extract.notes, None);
        assert_eq!(extract.excerpt, None);
    }

    #[tokio::test]
    async fn test_load_missing_document() {
        let cache = CacheManager::from_config(&AgentConfig::default());
        let err = load_document(Path::new("/nonexistent/report.txt"), &cache).await;
        assert!(matches!(err, Err(EarningsError::Io(_))));
    }
}
