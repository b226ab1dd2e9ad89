//! Company-facing entry points
//!
//! `EmissionCalculator` owns the factor store, the shared index cache and the
//! matcher. It is cheap to share behind an `Arc` and safe to call from many
//! tasks at once.

use crate::cache::{IndexCache, IndexState};
use crate::config::MatcherConfig;
use crate::entry::EmissionEntry;
use crate::error::Result;
use crate::factor::SourceStandard;
use crate::matcher::FactorMatcher;
use crate::outcome::{BatchItem, BatchSummary, MatchResult};
use crate::store::FactorStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct EmissionCalculator {
    store: Arc<dyn FactorStore>,
    cache: Arc<IndexCache>,
    matcher: FactorMatcher,
}

impl EmissionCalculator {
    pub fn new(store: Arc<dyn FactorStore>, config: MatcherConfig) -> Self {
        Self::with_cache(store, Arc::new(IndexCache::new()), config)
    }

    /// Shares an existing cache, e.g. one cache across several calculators
    /// reading the same store.
    pub fn with_cache(store: Arc<dyn FactorStore>, cache: Arc<IndexCache>, config: MatcherConfig) -> Self {
        Self {
            store,
            cache,
            matcher: FactorMatcher::new(config),
        }
    }

    pub fn cache(&self) -> &Arc<IndexCache> {
        &self.cache
    }

    pub fn config(&self) -> &MatcherConfig {
        self.matcher.config()
    }

    /// The company's chosen standard, or the configured default.
    pub async fn preferred_source(&self, company_id: Uuid) -> Result<SourceStandard> {
        let source = self
            .store
            .preferred_source(company_id)
            .await?
            .unwrap_or_else(|| self.config().default_source.clone());
        Ok(source)
    }

    /// Matches one entry against the factors of `source`.
    ///
    /// Invalid entries are rejected before the store or index is touched.
    /// Only a failing store surfaces as `Err`.
    pub async fn match_with_source(
        &self,
        source: &SourceStandard,
        entry: &EmissionEntry,
    ) -> Result<MatchResult> {
        if let Err(e) = entry.validate() {
            return Ok(MatchResult::validation_failure(&e));
        }

        match self.cache.get_or_build(self.store.as_ref(), source).await? {
            IndexState::Ready(index) => Ok(self.matcher.resolve(&index, entry)),
            IndexState::Unavailable(reason) => Ok(MatchResult::index_unavailable(&reason)),
        }
    }

    /// Matches one entry against the company's preferred standard.
    pub async fn match_entry(&self, company_id: Uuid, entry: &EmissionEntry) -> Result<MatchResult> {
        if let Err(e) = entry.validate() {
            return Ok(MatchResult::validation_failure(&e));
        }
        let source = self.preferred_source(company_id).await?;
        self.match_with_source(&source, entry).await
    }

    /// Matches raw entries for a company, in input order.
    ///
    /// If the company's preference cannot be read, valid entries come back as
    /// index-unavailable items; malformed ones still report their problems.
    pub async fn match_batch(&self, company_id: Uuid, entries: &[Value]) -> Vec<BatchItem> {
        match self.preferred_source(company_id).await {
            Ok(source) => self.match_batch_with_source(&source, entries).await,
            Err(e) => {
                warn!("Preferred source for company {} could not be read: {}", company_id, e);
                let reason = e.to_string();
                entries
                    .iter()
                    .map(|raw| BatchItem {
                        result: match EmissionEntry::from_value(raw) {
                            Err(problems) => MatchResult::validation_failure(&problems),
                            Ok(_) => MatchResult::index_unavailable(&reason),
                        },
                        entry: raw.clone(),
                    })
                    .collect()
            }
        }
    }

    /// Matches raw entries against `source`.
    ///
    /// Every input yields exactly one item, in the same position, echoing the
    /// input. Entries that fail to parse become validation failures; a store
    /// error for one entry becomes an index-unavailable item rather than
    /// aborting the rest.
    pub async fn match_batch_with_source(&self, source: &SourceStandard, entries: &[Value]) -> Vec<BatchItem> {
        let mut items = Vec::with_capacity(entries.len());

        for (position, raw) in entries.iter().enumerate() {
            let result = match EmissionEntry::from_value(raw) {
                Err(e) => MatchResult::validation_failure(&e),
                Ok(entry) => match self.match_with_source(source, &entry).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("Entry {} could not be matched: {}", position, e);
                        MatchResult::index_unavailable(&e.to_string())
                    }
                },
            };
            items.push(BatchItem {
                result,
                entry: raw.clone(),
            });
        }

        info!("Batch against {}: {}", source, BatchSummary::from_items(&items));
        items
    }
}
