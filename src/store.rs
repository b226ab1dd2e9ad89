//! Factor store contract and the in-memory implementation
//!
//! The matcher only ever reads two things from storage: the factor rows of one
//! source standard, and a company's preferred standard. PostgreSQL lives in
//! [`crate::db`]; the in-memory store backs CSV-driven runs and tests.

use crate::error::{MatchError, Result};
use crate::factor::{EmissionFactor, ScopeValue, SourceStandard};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Read access to emission-factor reference data
#[async_trait]
pub trait FactorStore: Send + Sync {
    /// All rows whose `source` equals `source`, in a stable order.
    async fn load_factors(&self, source: &SourceStandard) -> Result<Vec<EmissionFactor>>;

    /// The standard a company has chosen, if it has chosen one.
    async fn preferred_source(&self, company_id: Uuid) -> Result<Option<SourceStandard>>;
}

/// Column layout of a factor CSV file
#[derive(Debug, Deserialize)]
struct FactorRecord {
    id: i64,
    category_1: Option<String>,
    category_2: Option<String>,
    category_3: Option<String>,
    category_4: Option<String>,
    uom: Option<String>,
    source: String,
    scope: Option<String>,
    conversion_factor: Option<f64>,
    year: Option<i32>,
}

impl From<FactorRecord> for EmissionFactor {
    fn from(record: FactorRecord) -> Self {
        EmissionFactor {
            id: record.id,
            category_1: record.category_1,
            category_2: record.category_2,
            category_3: record.category_3,
            category_4: record.category_4,
            uom: record.uom,
            source: SourceStandard::from(record.source),
            scope: record
                .scope
                .filter(|s| !s.trim().is_empty())
                .map(|s| ScopeValue::parse(&s)),
            conversion_factor: record.conversion_factor,
            year: record.year,
        }
    }
}

/// Parses factor rows from CSV with a header line naming the columns
/// `id, category_1..category_4, uom, source, scope, conversion_factor, year`.
pub fn read_factors_csv<R: Read>(reader: R) -> Result<Vec<EmissionFactor>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut factors = Vec::new();
    for (line, record) in csv_reader.deserialize::<FactorRecord>().enumerate() {
        let record = record.map_err(|e| MatchError::Csv(format!("row {}: {}", line + 1, e)))?;
        factors.push(EmissionFactor::from(record));
    }
    Ok(factors)
}

pub fn read_factors_csv_path(path: &Path) -> Result<Vec<EmissionFactor>> {
    let file = std::fs::File::open(path)?;
    let factors = read_factors_csv(file)?;
    info!("Read {} emission factors from {}", factors.len(), path.display());
    Ok(factors)
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryFactorStore {
    factors: Vec<EmissionFactor>,
    preferences: HashMap<Uuid, SourceStandard>,
}

impl InMemoryFactorStore {
    pub fn new(factors: Vec<EmissionFactor>) -> Self {
        Self {
            factors,
            preferences: HashMap::new(),
        }
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        Ok(Self::new(read_factors_csv_path(path)?))
    }

    pub fn with_preference(mut self, company_id: Uuid, source: SourceStandard) -> Self {
        self.preferences.insert(company_id, source);
        self
    }
}

#[async_trait]
impl FactorStore for InMemoryFactorStore {
    async fn load_factors(&self, source: &SourceStandard) -> Result<Vec<EmissionFactor>> {
        let mut rows: Vec<EmissionFactor> = self
            .factors
            .iter()
            .filter(|f| f.source.same_standard(source))
            .cloned()
            .collect();
        rows.sort_by_key(|f| f.id);
        Ok(rows)
    }

    async fn preferred_source(&self, company_id: Uuid) -> Result<Option<SourceStandard>> {
        Ok(self.preferences.get(&company_id).cloned())
    }
}
