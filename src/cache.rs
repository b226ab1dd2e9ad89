//! Per-source cache of built factor indexes
//!
//! Each source standard gets one slot. The first caller for a source loads and
//! builds the index; callers arriving while that build is in flight wait for it
//! instead of starting their own. Failed builds leave the slot empty so the next
//! call retries.

use crate::error::{MatchError, Result};
use crate::factor::SourceStandard;
use crate::index::FactorIndex;
use crate::store::FactorStore;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Result of asking the cache for an index
#[derive(Clone)]
pub enum IndexState {
    Ready(Arc<FactorIndex>),
    /// The store answered but there is nothing to index for this source
    Unavailable(String),
}

#[derive(Default)]
pub struct IndexCache {
    slots: DashMap<SourceStandard, Arc<OnceCell<Arc<FactorIndex>>>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index for `source`, building it from `store` on first use.
    ///
    /// Store failures are returned as errors; an empty reference table is
    /// reported as [`IndexState::Unavailable`].
    pub async fn get_or_build(
        &self,
        store: &dyn FactorStore,
        source: &SourceStandard,
    ) -> Result<IndexState> {
        let slot = Arc::clone(
            self.slots
                .entry(source.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        if let Some(index) = slot.get() {
            debug!("Factor index cache hit for {} (built {})", source, index.built_at());
            return Ok(IndexState::Ready(Arc::clone(index)));
        }

        debug!("Factor index cache miss for {}, building", source);
        let built = slot
            .get_or_try_init(|| async {
                FactorIndex::load(store, source).await.map(Arc::new)
            })
            .await;

        match built {
            Ok(index) => Ok(IndexState::Ready(Arc::clone(index))),
            Err(MatchError::EmptyReference(name)) => {
                warn!("Factor index for {} unavailable: reference table is empty", name);
                Ok(IndexState::Unavailable(format!(
                    "no emission factors are loaded for source '{}'",
                    name
                )))
            }
            Err(e) => {
                warn!("Failed to load emission factors for {}: {}", source, e);
                Err(e)
            }
        }
    }

    /// The already-built index for `source`, without triggering a build.
    pub fn cached(&self, source: &SourceStandard) -> Option<Arc<FactorIndex>> {
        self.slots
            .get(source)
            .and_then(|slot| slot.value().get().cloned())
    }

    /// Drops the index for `source` so the next request rebuilds it.
    pub fn invalidate(&self, source: &SourceStandard) -> bool {
        self.slots.remove(source).is_some()
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Number of sources with a built index.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
