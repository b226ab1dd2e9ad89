//! Database module for PostgreSQL connection and factor storage
//!
//! This module provides the PostgreSQL-backed `FactorStore` and the schema the
//! matcher reads from.

pub mod connection;
pub mod factor_repo;

pub use connection::{init_pool, DbPool};
pub use factor_repo::PgFactorStore;
