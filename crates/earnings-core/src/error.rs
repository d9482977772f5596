//! "Not computable" outcomes for analysis stages
//!
//! No analysis function in this crate panics or returns a fault for bad
//! input. Insufficient data, a missing peer-table entry or a zero
//! denominator all come back as an [`Unavailable`] carrying the stage that
//! gave up and a human-readable reason.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline stage that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Delta,
    Validation,
    Freshness,
    Trend,
    Prediction,
    Sector,
    Narration,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Delta => "delta",
            Stage::Validation => "validation",
            Stage::Freshness => "freshness",
            Stage::Trend => "trend",
            Stage::Prediction => "prediction",
            Stage::Sector => "sector",
            Stage::Narration => "narration",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage could not produce a result from the inputs it was given
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{stage} unavailable: {reason}")]
pub struct Unavailable {
    pub stage: Stage,
    pub reason: String,
}

impl Unavailable {
    pub fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

/// Outcome of one pipeline stage
pub type StageResult<T> = std::result::Result<T, Unavailable>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display() {
        let err = Unavailable::new(Stage::Delta, "previous quarter revenue is zero");
        assert_eq!(
            err.to_string(),
            "delta unavailable: previous quarter revenue is zero"
        );
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let json = serde_json::to_string(&Stage::Prediction).unwrap();
        assert_eq!(json, "\"prediction\"");
    }
}
