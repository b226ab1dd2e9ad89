#![allow(dead_code)]

use async_trait::async_trait;
use carbon_match::{
    EmissionFactor, FactorStore, InMemoryFactorStore, MatchError, Result, ScopeValue, SourceStandard,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

pub fn factor(
    id: i64,
    category: &str,
    uom: &str,
    scope: i64,
    conversion_factor: Option<f64>,
    source: SourceStandard,
) -> EmissionFactor {
    EmissionFactor {
        id,
        category_1: Some(category.to_string()),
        category_2: None,
        category_3: None,
        category_4: None,
        uom: Some(uom.to_string()),
        source,
        scope: Some(ScopeValue::Number(scope)),
        conversion_factor,
        year: Some(2024),
    }
}

/// A small DEFRA table plus one EPA row
pub fn reference_factors() -> Vec<EmissionFactor> {
    use SourceStandard::{Defra, Epa};
    vec![
        factor(1, "Diesel", "litres", 1, Some(2.5), Defra),
        factor(2, "Petrol", "litres", 1, Some(2.3), Defra),
        factor(3, "Electricity Grid", "kWh", 2, Some(0.207), Defra),
        factor(4, "Natural Gas Heating", "kWh", 1, Some(0.183), Defra),
        factor(5, "Natural Gas Heating", "therms", 2, Some(5.3), Defra),
        factor(6, "Water Supply", "m3", 3, Some(0.149), Defra),
        factor(7, "Hotel Stay", "room nights", 3, Some(10.4), Defra),
        factor(20, "Diesel", "gallons", 1, Some(10.21), Epa),
    ]
}

/// Reference rows with nothing resembling a fuel
pub fn non_fuel_factors() -> Vec<EmissionFactor> {
    use SourceStandard::Defra;
    vec![
        factor(11, "Electricity Grid", "kWh", 2, Some(0.207), Defra),
        factor(12, "Water Supply", "m3", 3, Some(0.149), Defra),
        factor(13, "Hotel Stay", "room nights", 3, Some(10.4), Defra),
        factor(14, "Waste Landfill", "tonnes", 3, Some(458.2), Defra),
        factor(15, "Business Travel Rail", "km", 3, Some(0.035), Defra),
    ]
}

/// Wraps a store and counts every read made through it
pub struct SpyStore {
    inner: InMemoryFactorStore,
    delay: Option<Duration>,
    pub loads: AtomicUsize,
    pub preference_reads: AtomicUsize,
}

impl SpyStore {
    pub fn new(inner: InMemoryFactorStore) -> Self {
        Self {
            inner,
            delay: None,
            loads: AtomicUsize::new(0),
            preference_reads: AtomicUsize::new(0),
        }
    }

    /// Slows every factor load down, widening the window for racing builds.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.loads() + self.preference_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactorStore for SpyStore {
    async fn load_factors(&self, source: &SourceStandard) -> Result<Vec<EmissionFactor>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.load_factors(source).await
    }

    async fn preferred_source(&self, company_id: Uuid) -> Result<Option<SourceStandard>> {
        self.preference_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.preferred_source(company_id).await
    }
}

/// A store whose backing database is unreachable
pub struct UnreachableStore;

#[async_trait]
impl FactorStore for UnreachableStore {
    async fn load_factors(&self, _source: &SourceStandard) -> Result<Vec<EmissionFactor>> {
        Err(MatchError::Database("connection refused".to_string()))
    }

    async fn preferred_source(&self, _company_id: Uuid) -> Result<Option<SourceStandard>> {
        Err(MatchError::Database("connection refused".to_string()))
    }
}
