pub mod cache;
pub mod calculator;
pub mod config;
pub mod entry;
pub mod error;
pub mod factor;
pub mod fuzzy;
pub mod index;
pub mod matcher;
pub mod normalize;
pub mod outcome;
pub mod store;

// Database module for PostgreSQL
pub mod db;

pub use calculator::EmissionCalculator;
pub use config::MatcherConfig;
pub use entry::{EmissionEntry, ValidationError};
pub use error::{MatchError, Result};
pub use factor::{EmissionFactor, FactorId, ScopeValue, SourceStandard};
pub use outcome::{BatchItem, BatchSummary, Diagnostic, MatchOutcome, MatchResult};
pub use store::{FactorStore, InMemoryFactorStore};
