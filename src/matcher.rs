//! Factor matching and emissions calculation
//!
//! Resolution order for one validated entry:
//! 1. fuzzy search on the composite `category unit scope` key, restricted to
//!    rows whose category alone resembles the entry's
//! 2. if that finds nothing, fuzzy search of category against category
//! 3. if that finds nothing, a very loose category search whose best hits are
//!    reported as diagnostics (never used as a match)
//!
//! Candidates from 1 or 2 are re-ranked with a fixed bonus for exact unit and
//! scope agreement before the winner is chosen.

use crate::config::MatcherConfig;
use crate::entry::EmissionEntry;
use crate::index::{Candidate, FactorIndex, IndexedFactor};
use crate::normalize::{normalize, normalize_scope, search_key};
use crate::outcome::{Diagnostic, MatchResult};
use itertools::Itertools;
use std::cmp::Ordering;
use tracing::debug;

/// Which search produced the winning candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTier {
    Composite,
    CategoryOnly,
}

/// Entry fields after normalization, exactly as compared against the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    pub category: String,
    pub unit: String,
    pub scope: String,
}

impl NormalizedQuery {
    pub fn from_entry(entry: &EmissionEntry) -> Self {
        Self {
            category: normalize(&entry.category),
            unit: normalize(&entry.unit),
            scope: normalize_scope(&entry.scope),
        }
    }

    pub fn composite(&self) -> String {
        search_key(&self.category, &self.unit, &self.scope)
    }
}

/// A candidate after unit/scope boosting
#[derive(Debug, Clone, Copy)]
pub struct RankedCandidate<'a> {
    pub indexed: &'a IndexedFactor,
    pub raw_score: f64,
    pub boosted_score: f64,
}

/// Applies the exact-agreement bonuses and sorts best first.
///
/// Lower scores are better. Ties after boosting go to the newest vintage,
/// then to the lowest id.
pub fn rank_candidates<'a>(
    candidates: Vec<Candidate<'a>>,
    query: &NormalizedQuery,
    unit_boost: f64,
    scope_boost: f64,
) -> Vec<RankedCandidate<'a>> {
    candidates
        .into_iter()
        .map(|candidate| {
            let mut boosted = candidate.score;
            if candidate.indexed.unit == query.unit {
                boosted -= unit_boost;
            }
            if candidate.indexed.scope == query.scope {
                boosted -= scope_boost;
            }
            RankedCandidate {
                indexed: candidate.indexed,
                raw_score: candidate.score,
                boosted_score: boosted,
            }
        })
        .sorted_by(compare_ranked)
        .collect()
}

fn compare_ranked(a: &RankedCandidate<'_>, b: &RankedCandidate<'_>) -> Ordering {
    a.boosted_score
        .total_cmp(&b.boosted_score)
        // None sorts below Some, so reversing puts the newest year first
        .then_with(|| b.indexed.factor.year.cmp(&a.indexed.factor.year))
        .then_with(|| a.indexed.factor.id.cmp(&b.indexed.factor.id))
}

/// Resolves validated entries against a built index
#[derive(Debug, Clone, Default)]
pub struct FactorMatcher {
    config: MatcherConfig,
}

impl FactorMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Matches one entry that has already passed validation.
    pub fn resolve(&self, index: &FactorIndex, entry: &EmissionEntry) -> MatchResult {
        let query = NormalizedQuery::from_entry(entry);
        let options = self.config.search_options();

        let mut tier = SearchTier::Composite;
        let mut candidates = index.search(&query.composite(), &query.category, options);
        if candidates.is_empty() {
            debug!(
                "No candidates for '{}', retrying on category '{}' alone",
                query.composite(),
                query.category
            );
            tier = SearchTier::CategoryOnly;
            candidates = index.search_categories(&query.category, options);
        }
        if candidates.is_empty() {
            return self.no_match(index, entry, &query);
        }

        let ranked = rank_candidates(
            candidates,
            &query,
            self.config.unit_boost,
            self.config.scope_boost,
        );
        let best = ranked[0];
        let factor = &best.indexed.factor;

        let conversion = match factor.conversion_factor.filter(|v| v.is_finite()) {
            Some(value) => value,
            None => {
                debug!(
                    "Factor #{} matched '{}' but has no conversion factor",
                    factor.id, entry.category
                );
                return MatchResult::ineligible(format!(
                    "Emission factor #{} ('{}') matched category '{}' but is missing its conversion factor value",
                    factor.id, best.indexed.full_category, entry.category
                ));
            }
        };

        let emissions = entry.quantity * conversion;
        let tier_note = match tier {
            SearchTier::Composite => "",
            SearchTier::CategoryOnly => " via category-only fallback",
        };
        let log = format!(
            "Matched '{}' ({} {}, scope {}) to factor #{} '{}' [{}, scope {}] from {}{}: score {:.3} (boosted {:.3}), {} x {} = {} kg CO2e",
            entry.category,
            entry.quantity,
            entry.unit,
            entry.scope,
            factor.id,
            best.indexed.full_category,
            factor.unit(),
            factor.scope_text(),
            factor.source,
            tier_note,
            best.raw_score,
            best.boosted_score,
            entry.quantity,
            conversion,
            emissions
        );
        debug!("{}", log);

        MatchResult::success(factor.clone(), emissions, log)
    }

    fn no_match(&self, index: &FactorIndex, entry: &EmissionEntry, query: &NormalizedQuery) -> MatchResult {
        let diagnostics: Vec<Diagnostic> = index
            .search_categories(&query.category, self.config.diagnostic_options())
            .iter()
            .take(self.config.diagnostic_limit)
            .map(Diagnostic::from)
            .collect();

        let mut log = format!(
            "No emission factor matched category '{}' (unit '{}', scope '{}') among {} {} factors.",
            entry.category,
            entry.unit,
            entry.scope,
            index.len(),
            index.source()
        );
        if diagnostics.is_empty() {
            log.push_str(" No similar reference categories were found.");
        } else {
            log.push_str(" Closest reference rows:");
            for diagnostic in &diagnostics {
                log.push_str("\n  ");
                log.push_str(&diagnostic.to_string());
            }
        }
        debug!("{}", log);

        MatchResult::no_match(log, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::{EmissionFactor, ScopeValue, SourceStandard};
    use crate::outcome::MatchOutcome;

    fn row(id: i64, category: &str, uom: &str, scope: i64, factor: Option<f64>) -> EmissionFactor {
        EmissionFactor {
            id,
            category_1: Some(category.to_string()),
            category_2: None,
            category_3: None,
            category_4: None,
            uom: Some(uom.to_string()),
            source: SourceStandard::Defra,
            scope: Some(ScopeValue::Number(scope)),
            conversion_factor: factor,
            year: None,
        }
    }

    fn query(unit: &str, scope: &str) -> NormalizedQuery {
        NormalizedQuery {
            category: "natural gasoline heating".to_string(),
            unit: unit.to_string(),
            scope: scope.to_string(),
        }
    }

    #[test]
    fn test_exact_unit_and_scope_win_equal_scores() {
        let neither = IndexedFactor::new(row(1, "Natural Gas Heating", "therms", 2, Some(1.0)));
        let scope_only = IndexedFactor::new(row(2, "Natural Gas Heating", "therms", 1, Some(1.0)));
        let unit_only = IndexedFactor::new(row(3, "Natural Gas Heating", "kWh", 2, Some(1.0)));
        let both = IndexedFactor::new(row(4, "Natural Gas Heating", "kWh", 1, Some(1.0)));

        let candidates = [&neither, &scope_only, &unit_only, &both]
            .into_iter()
            .map(|indexed| Candidate { indexed, score: 0.2 })
            .collect();
        let ranked = rank_candidates(candidates, &query("kwh", "1"), 0.1, 0.1);

        assert_eq!(ranked[0].indexed.factor.id, 4);
        assert!((ranked[0].boosted_score - 0.0).abs() < 1e-9);
        // unit-only and scope-only tie on score; lowest id breaks the tie
        assert_eq!(ranked[1].indexed.factor.id, 2);
        assert_eq!(ranked[2].indexed.factor.id, 3);
        assert_eq!(ranked[3].indexed.factor.id, 1);
        assert_eq!(ranked[3].boosted_score, 0.2);
    }

    #[test]
    fn test_boost_overrides_slightly_better_raw_score() {
        let a = IndexedFactor::new(row(1, "Natural Gas Heating", "kWh", 1, Some(0.18)));
        let b = IndexedFactor::new(row(2, "Natural Gas Heating", "therms", 2, Some(5.3)));
        let candidates = vec![
            Candidate { indexed: &b, score: 0.10 },
            Candidate { indexed: &a, score: 0.15 },
        ];
        let ranked = rank_candidates(candidates, &query("kwh", "1"), 0.1, 0.1);
        assert_eq!(ranked[0].indexed.factor.id, 1);
        assert_eq!(ranked[0].raw_score, 0.15);
    }

    #[test]
    fn test_newest_vintage_breaks_ties() {
        let mut old = row(1, "Diesel", "litres", 1, Some(2.6));
        old.year = Some(2021);
        let mut new = row(2, "Diesel", "litres", 1, Some(2.5));
        new.year = Some(2024);
        let undated = row(3, "Diesel", "litres", 1, Some(2.4));

        let index = FactorIndex::build(SourceStandard::Defra, vec![old, new, undated]).unwrap();
        let result = FactorMatcher::default().resolve(&index, &EmissionEntry::new("Diesel", "litres", 1, 10.0));
        assert_eq!(result.matched_factor.unwrap().id, 2);
        assert_eq!(result.calculated_emissions, Some(25.0));
    }

    #[test]
    fn test_null_factor_is_ineligible() {
        let index = FactorIndex::build(
            SourceStandard::Defra,
            vec![row(1, "Diesel", "litres", 1, None)],
        )
        .unwrap();
        let result = FactorMatcher::default().resolve(&index, &EmissionEntry::new("Diesel", "liters", 1, 5.0));
        assert_eq!(result.outcome, MatchOutcome::IneligibleMatch);
        assert!(result.matched_factor.is_none());
        assert!(result.calculated_emissions.is_none());
        assert!(result.log.unwrap().contains("Diesel"));
    }

    #[test]
    fn test_category_only_fallback() {
        let index = FactorIndex::build(
            SourceStandard::Defra,
            vec![
                row(1, "Diesel", "litres", 1, Some(2.5)),
                row(2, "Electricity", "kWh", 2, Some(0.2)),
            ],
        )
        .unwrap();
        let entry = EmissionEntry::new("Diesel", "thousand imperial gallons", "Scope 3", 2.0);
        let result = FactorMatcher::default().resolve(&index, &entry);
        assert_eq!(result.outcome, MatchOutcome::Success);
        assert_eq!(result.matched_factor.unwrap().id, 1);
        assert_eq!(result.calculated_emissions, Some(5.0));
        assert!(result.log.unwrap().contains("category-only fallback"));
    }

    #[test]
    fn test_shared_unit_and_scope_do_not_admit_other_categories() {
        let index = FactorIndex::build(
            SourceStandard::Defra,
            vec![
                row(1, "Electricity Grid", "kWh", 2, Some(0.2)),
                row(2, "Water Supply", "m3", 3, Some(0.15)),
                row(3, "Hotel Stay", "room nights", 3, Some(10.4)),
                row(4, "Natural Gas Heating", "kWh", 1, Some(0.18)),
                row(5, "Business Travel Rail", "km", 3, Some(0.035)),
            ],
        )
        .unwrap();
        let matcher = FactorMatcher::default();

        for (category, unit, scope) in [
            ("Mystery Fuel", "m3", 3),
            ("Coal", "kWh", 1),
            ("Flights", "km", 3),
            ("Steam", "kWh", 2),
        ] {
            let result = matcher.resolve(&index, &EmissionEntry::new(category, unit, scope, 10.0));
            assert_eq!(result.outcome, MatchOutcome::NoMatchFound, "{} / {} / {}", category, unit, scope);
            assert!(result.calculated_emissions.is_none());
            assert!(!result.diagnostics.is_empty());
        }
    }

    #[test]
    fn test_no_match_reports_at_most_three_near_misses() {
        let index = FactorIndex::build(
            SourceStandard::Defra,
            vec![
                row(1, "Electricity Grid", "kWh", 2, Some(0.2)),
                row(2, "Water Supply", "m3", 3, Some(0.15)),
                row(3, "Hotel Stay", "room nights", 3, Some(10.0)),
                row(4, "Waste Landfill", "tonnes", 3, Some(450.0)),
                row(5, "Business Travel Rail", "km", 3, Some(0.035)),
            ],
        )
        .unwrap();
        let entry = EmissionEntry::new("Zzyzx Qwop", "kg", 1, 10.0);
        let result = FactorMatcher::default().resolve(&index, &entry);

        assert_eq!(result.outcome, MatchOutcome::NoMatchFound);
        assert!(result.matched_factor.is_none());
        assert!(result.calculated_emissions.is_none());
        assert_eq!(result.diagnostics.len(), 3);
        for diagnostic in &result.diagnostics {
            assert!((0.0..=1.0).contains(&diagnostic.score));
            assert!(!diagnostic.category.is_empty());
            assert!(!diagnostic.unit.is_empty());
            assert!(!diagnostic.scope.is_empty());
        }
        let log = result.log.unwrap();
        assert!(log.contains("Zzyzx Qwop"));
        assert_eq!(log.matches("score").count(), 3);
    }
}
