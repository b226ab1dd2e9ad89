//! Reference factor index
//!
//! Holds every factor of one source standard together with its normalized
//! text and pre-split search tokens. Once built the index is never mutated, so
//! one instance can be shared by any number of concurrent matchers.

use crate::error::{MatchError, Result};
use crate::factor::{EmissionFactor, SourceStandard};
use crate::fuzzy::{FuzzyMatcher, SearchOptions};
use crate::normalize::{normalize, normalize_scope, search_key};
use crate::store::FactorStore;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// A factor with the normalized fields the matcher compares against
#[derive(Debug, Clone)]
pub struct IndexedFactor {
    pub factor: EmissionFactor,
    /// Category levels joined, as written in the reference table
    pub full_category: String,
    pub category: String,
    pub unit: String,
    pub scope: String,
    pub search_key: String,
    key_tokens: Vec<String>,
    category_tokens: Vec<String>,
}

impl IndexedFactor {
    pub fn new(factor: EmissionFactor) -> Self {
        let full_category = factor.full_category();
        let category = normalize(&full_category);
        let unit = normalize(factor.unit());
        let scope = factor
            .scope
            .as_ref()
            .map(normalize_scope)
            .unwrap_or_default();
        let search_key = search_key(&category, &unit, &scope);
        let key_tokens = search_key.split_whitespace().map(str::to_string).collect();
        let category_tokens = category.split_whitespace().map(str::to_string).collect();

        Self {
            factor,
            full_category,
            category,
            unit,
            scope,
            search_key,
            key_tokens,
            category_tokens,
        }
    }
}

/// A search hit borrowed from the index
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub indexed: &'a IndexedFactor,
    pub score: f64,
}

pub struct FactorIndex {
    source: SourceStandard,
    entries: Vec<IndexedFactor>,
    built_at: DateTime<Utc>,
}

impl FactorIndex {
    /// Builds the index from rows of `source`. Rows published by another
    /// standard are skipped. Fails with [`MatchError::EmptyReference`] when no
    /// row is left, so callers can tell "nothing to search" apart from
    /// "searched and found nothing".
    pub fn build(source: SourceStandard, factors: Vec<EmissionFactor>) -> Result<Self> {
        let total = factors.len();
        let entries: Vec<IndexedFactor> = factors
            .into_iter()
            .filter(|f| f.source.same_standard(&source))
            .map(IndexedFactor::new)
            .collect();

        if entries.len() < total {
            debug!(
                "Skipped {} factor rows not published by {}",
                total - entries.len(),
                source
            );
        }
        if entries.is_empty() {
            return Err(MatchError::EmptyReference(source.to_string()));
        }

        let ineligible = entries.iter().filter(|e| !e.factor.is_eligible()).count();
        info!(
            "Built factor index for {}: {} factors ({} without conversion factor)",
            source,
            entries.len(),
            ineligible
        );

        Ok(Self {
            source,
            entries,
            built_at: Utc::now(),
        })
    }

    /// Reads the rows for `source` from the store and builds the index.
    pub async fn load(store: &dyn FactorStore, source: &SourceStandard) -> Result<Self> {
        let factors = store.load_factors(source).await?;
        Self::build(source.clone(), factors)
    }

    pub fn source(&self) -> &SourceStandard {
        &self.source
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexedFactor] {
        &self.entries
    }

    /// Fuzzy search over the composite category + unit + scope keys.
    ///
    /// A row is only considered when its category on its own is within the
    /// threshold of `category_query`. Agreeing unit and scope tokens rank rows
    /// of a matching category; they never admit an unrelated one.
    pub fn search(&self, key_query: &str, category_query: &str, options: SearchOptions) -> Vec<Candidate<'_>> {
        let matcher = FuzzyMatcher::new(options);
        let category: Vec<&str> = category_query.split_whitespace().collect();

        let admitted: Vec<&IndexedFactor> = self
            .entries
            .iter()
            .filter(|e| {
                let tokens: Vec<&str> = e.category_tokens.iter().map(String::as_str).collect();
                matcher.score_tokens(&category, &tokens) <= options.threshold
            })
            .collect();

        matcher
            .search(key_query, admitted.iter().map(|e| e.key_tokens.as_slice()))
            .into_iter()
            .map(|hit| Candidate {
                indexed: admitted[hit.position],
                score: hit.score,
            })
            .collect()
    }

    /// Fuzzy search over category text only, ignoring unit and scope.
    pub fn search_categories(&self, query: &str, options: SearchOptions) -> Vec<Candidate<'_>> {
        FuzzyMatcher::new(options)
            .search(query, self.entries.iter().map(|e| e.category_tokens.as_slice()))
            .into_iter()
            .map(|hit| Candidate {
                indexed: &self.entries[hit.position],
                score: hit.score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::ScopeValue;

    fn factor(id: i64, category: &str, uom: &str, scope: i64, source: SourceStandard) -> EmissionFactor {
        EmissionFactor {
            id,
            category_1: Some(category.to_string()),
            category_2: None,
            category_3: None,
            category_4: None,
            uom: Some(uom.to_string()),
            source,
            scope: Some(ScopeValue::Number(scope)),
            conversion_factor: Some(1.0),
            year: None,
        }
    }

    #[test]
    fn test_indexed_factor_normalizes_fields() {
        let mut row = factor(1, "Fuels", "Litres", 1, SourceStandard::Defra);
        row.category_2 = Some("Liquid".to_string());
        row.category_4 = Some("Diesel".to_string());
        let indexed = IndexedFactor::new(row);
        assert_eq!(indexed.full_category, "Fuels Liquid Diesel");
        assert_eq!(indexed.category, "fuels liquid diesel");
        assert_eq!(indexed.unit, "liters");
        assert_eq!(indexed.scope, "1");
        assert_eq!(indexed.search_key, "fuels liquid diesel liters 1");
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let mut row = factor(1, "Diesel", "", 1, SourceStandard::Defra);
        row.uom = None;
        row.scope = None;
        let indexed = IndexedFactor::new(row);
        assert_eq!(indexed.unit, "");
        assert_eq!(indexed.scope, "");
        assert_eq!(indexed.search_key, "diesel");
    }

    #[test]
    fn test_build_keeps_only_requested_source() {
        let index = FactorIndex::build(
            SourceStandard::Defra,
            vec![
                factor(1, "Diesel", "litres", 1, SourceStandard::Defra),
                factor(2, "Diesel", "gallons", 1, SourceStandard::Epa),
            ],
        )
        .unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.entries()[0].factor.id, 1);
        assert_eq!(index.source(), &SourceStandard::Defra);
    }

    #[test]
    fn test_custom_source_ignores_case() {
        let index = FactorIndex::build(
            SourceStandard::Custom("Acme Corp".to_string()),
            vec![factor(1, "Diesel", "litres", 1, SourceStandard::from("ACME CORP"))],
        )
        .unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_composite_search_requires_category_resemblance() {
        let index = FactorIndex::build(
            SourceStandard::Defra,
            vec![
                factor(1, "Water Supply", "m3", 3, SourceStandard::Defra),
                factor(2, "Water Treatment", "m3", 3, SourceStandard::Defra),
            ],
        )
        .unwrap();

        assert!(index
            .search("mystery fuel m3 3", "mystery fuel", SearchOptions::default())
            .is_empty());

        let hits = index.search("water supply m3 3", "water supply", SearchOptions::default());
        assert_eq!(hits[0].indexed.factor.id, 1);
        assert_eq!(hits[0].score, 0.0);
    }

    #[test]
    fn test_build_without_rows_is_empty_reference() {
        let err = FactorIndex::build(
            SourceStandard::Ademe,
            vec![factor(1, "Diesel", "litres", 1, SourceStandard::Defra)],
        )
        .err()
        .unwrap();
        assert!(matches!(err, MatchError::EmptyReference(ref s) if s == "ADEME"));
    }

    #[test]
    fn test_search_and_category_search() {
        let index = FactorIndex::build(
            SourceStandard::Defra,
            vec![
                factor(1, "Diesel", "litres", 1, SourceStandard::Defra),
                factor(2, "Electricity", "kWh", 2, SourceStandard::Defra),
            ],
        )
        .unwrap();

        let hits = index.search("diesel liters 1", "diesel", SearchOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].indexed.factor.id, 1);
        assert_eq!(hits[0].score, 0.0);

        let hits = index.search_categories("electricity", SearchOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].indexed.factor.id, 2);
        assert_eq!(hits[0].score, 0.0);
    }
}
