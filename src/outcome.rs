//! Match results handed back to callers
//!
//! Expected failures (bad input, missing reference data, no match, unusable
//! factor) are values, not errors, so batch callers can tally them directly.

use crate::entry::ValidationError;
use crate::factor::{EmissionFactor, FactorId};
use crate::index::Candidate;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Success,
    ValidationFailure,
    IndexUnavailable,
    NoMatchFound,
    IneligibleMatch,
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchOutcome::Success => "success",
            MatchOutcome::ValidationFailure => "validation failure",
            MatchOutcome::IndexUnavailable => "index unavailable",
            MatchOutcome::NoMatchFound => "no match found",
            MatchOutcome::IneligibleMatch => "ineligible match",
        };
        f.write_str(label)
    }
}

/// A reference row that came close when nothing matched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub id: FactorId,
    pub category: String,
    pub unit: String,
    pub scope: String,
    pub score: f64,
}

impl From<&Candidate<'_>> for Diagnostic {
    fn from(candidate: &Candidate<'_>) -> Self {
        let factor = &candidate.indexed.factor;
        Self {
            id: factor.id,
            category: candidate.indexed.full_category.clone(),
            unit: factor.unit().to_string(),
            scope: factor.scope_text(),
            score: candidate.score,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} '{}' [unit: '{}', scope: '{}'] score {:.3}",
            self.id, self.category, self.unit, self.scope, self.score
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub outcome: MatchOutcome,
    pub matched_factor: Option<EmissionFactor>,
    pub calculated_emissions: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl MatchResult {
    fn failure(outcome: MatchOutcome, log: String) -> Self {
        Self {
            outcome,
            matched_factor: None,
            calculated_emissions: None,
            log: Some(log),
            diagnostics: Vec::new(),
        }
    }

    /// Only constructor that sets `calculated_emissions`, which keeps a
    /// computed value always paired with the factor it came from.
    pub fn success(factor: EmissionFactor, emissions: f64, log: String) -> Self {
        Self {
            outcome: MatchOutcome::Success,
            matched_factor: Some(factor),
            calculated_emissions: Some(emissions),
            log: Some(log),
            diagnostics: Vec::new(),
        }
    }

    pub fn validation_failure(error: &ValidationError) -> Self {
        Self::failure(
            MatchOutcome::ValidationFailure,
            format!("Validation failed: {}", error.problems.join("; ")),
        )
    }

    pub fn index_unavailable(reason: &str) -> Self {
        Self::failure(
            MatchOutcome::IndexUnavailable,
            format!("Emission factor index could not be loaded: {}", reason),
        )
    }

    pub fn no_match(log: String, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            diagnostics,
            ..Self::failure(MatchOutcome::NoMatchFound, log)
        }
    }

    pub fn ineligible(log: String) -> Self {
        Self::failure(MatchOutcome::IneligibleMatch, log)
    }

    pub fn is_success(&self) -> bool {
        self.outcome == MatchOutcome::Success
    }
}

/// One batch result, echoing the raw entry it was computed from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    #[serde(flatten)]
    pub result: MatchResult,
    pub entry: Value,
}

/// Outcome counts over a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub matched: usize,
    pub validation_failures: usize,
    pub index_unavailable: usize,
    pub no_match: usize,
    pub ineligible: usize,
    /// Sum of calculated emissions over matched entries
    pub total_emissions: f64,
}

impl BatchSummary {
    pub fn from_items(items: &[BatchItem]) -> Self {
        let mut summary = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in items {
            match item.result.outcome {
                MatchOutcome::Success => summary.matched += 1,
                MatchOutcome::ValidationFailure => summary.validation_failures += 1,
                MatchOutcome::IndexUnavailable => summary.index_unavailable += 1,
                MatchOutcome::NoMatchFound => summary.no_match += 1,
                MatchOutcome::IneligibleMatch => summary.ineligible += 1,
            }
            summary.total_emissions += item.result.calculated_emissions.unwrap_or(0.0);
        }
        summary
    }

    pub fn unmatched(&self) -> usize {
        self.total - self.matched
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries: {} matched, {} unmatched ({} invalid, {} index unavailable, {} no match, {} ineligible), {:.3} kg CO2e",
            self.total,
            self.matched,
            self.unmatched(),
            self.validation_failures,
            self.index_unavailable,
            self.no_match,
            self.ineligible,
            self.total_emissions
        )
    }
}
