//! Emission-factor repository for PostgreSQL operations

use crate::error::{MatchError, Result};
use crate::factor::{EmissionFactor, ScopeValue, SourceStandard};
use crate::store::FactorStore;
use async_trait::async_trait;
use super::connection::DbPool;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS emission_factors (
        id BIGINT PRIMARY KEY,
        category_1 TEXT,
        category_2 TEXT,
        category_3 TEXT,
        category_4 TEXT,
        uom TEXT,
        source TEXT NOT NULL,
        scope TEXT,
        conversion_factor DOUBLE PRECISION,
        year INTEGER
    )
    "#,
    "CREATE INDEX IF NOT EXISTS emission_factors_lower_source_idx ON emission_factors (lower(source))",
    r#"
    CREATE TABLE IF NOT EXISTS company_settings (
        company_id UUID PRIMARY KEY,
        preferred_source TEXT NOT NULL DEFAULT 'DEFRA',
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

/// Source names compare case-insensitively, so "Defra" rows load for DEFRA.
const LOAD_FACTORS: &str = r#"
    SELECT id::BIGINT AS id, category_1, category_2, category_3, category_4, uom, source,
           scope::TEXT AS scope,
           conversion_factor::DOUBLE PRECISION AS conversion_factor,
           year::INTEGER AS year
    FROM emission_factors
    WHERE lower(source) = lower($1)
    ORDER BY id
"#;

pub struct PgFactorStore {
    pool: DbPool,
}

impl PgFactorStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Creates the factor and company settings tables if they are missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| MatchError::Database(format!("Failed to create schema: {}", e)))?;
        }
        Ok(())
    }

    /// Upserts factor rows by id inside one transaction.
    pub async fn insert_factors(&self, factors: &[EmissionFactor]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for factor in factors {
            let result = sqlx::query(
                r#"
                INSERT INTO emission_factors
                    (id, category_1, category_2, category_3, category_4, uom, source, scope, conversion_factor, year)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO UPDATE SET
                    category_1 = EXCLUDED.category_1,
                    category_2 = EXCLUDED.category_2,
                    category_3 = EXCLUDED.category_3,
                    category_4 = EXCLUDED.category_4,
                    uom = EXCLUDED.uom,
                    source = EXCLUDED.source,
                    scope = EXCLUDED.scope,
                    conversion_factor = EXCLUDED.conversion_factor,
                    year = EXCLUDED.year
                "#,
            )
            .bind(factor.id)
            .bind(&factor.category_1)
            .bind(&factor.category_2)
            .bind(&factor.category_3)
            .bind(&factor.category_4)
            .bind(&factor.uom)
            .bind(factor.source.as_str())
            .bind(factor.scope.as_ref().map(|s| s.to_string()))
            .bind(factor.conversion_factor)
            .bind(factor.year)
            .execute(&mut *tx)
            .await
            .map_err(|e| MatchError::Database(format!("Failed to insert factor {}: {}", factor.id, e)))?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        info!("Upserted {} emission factors", written);
        Ok(written)
    }

    pub async fn set_preferred_source(&self, company_id: Uuid, source: &SourceStandard) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO company_settings (company_id, preferred_source)
            VALUES ($1, $2)
            ON CONFLICT (company_id) DO UPDATE SET
                preferred_source = EXCLUDED.preferred_source,
                updated_at = NOW()
            "#,
        )
        .bind(company_id)
        .bind(source.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| MatchError::Database(format!("Failed to store preferred source: {}", e)))?;
        Ok(())
    }
}

fn factor_from_row(row: &PgRow) -> Result<EmissionFactor> {
    let source: String = row.try_get("source")?;
    let scope: Option<String> = row.try_get("scope")?;

    Ok(EmissionFactor {
        id: row.try_get("id")?,
        category_1: row.try_get("category_1")?,
        category_2: row.try_get("category_2")?,
        category_3: row.try_get("category_3")?,
        category_4: row.try_get("category_4")?,
        uom: row.try_get("uom")?,
        source: SourceStandard::from(source),
        scope: scope
            .filter(|s| !s.trim().is_empty())
            .map(|s| ScopeValue::parse(&s)),
        conversion_factor: row.try_get("conversion_factor")?,
        year: row.try_get("year")?,
    })
}

#[async_trait]
impl FactorStore for PgFactorStore {
    async fn load_factors(&self, source: &SourceStandard) -> Result<Vec<EmissionFactor>> {
        let rows = sqlx::query(LOAD_FACTORS)
            .bind(source.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MatchError::Database(format!("Failed to load emission factors: {}", e)))?;

        debug!("Loaded {} emission factor rows for {}", rows.len(), source);
        rows.iter().map(factor_from_row).collect()
    }

    async fn preferred_source(&self, company_id: Uuid) -> Result<Option<SourceStandard>> {
        let row = sqlx::query("SELECT preferred_source FROM company_settings WHERE company_id = $1")
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MatchError::Database(format!("Failed to load company settings: {}", e)))?;

        match row {
            Some(row) => {
                let source: Option<String> = row.try_get("preferred_source")?;
                Ok(source
                    .filter(|s| !s.trim().is_empty())
                    .map(SourceStandard::from))
            }
            None => Ok(None),
        }
    }
}
