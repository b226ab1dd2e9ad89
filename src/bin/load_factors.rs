//! Load an emission-factor CSV into PostgreSQL
//!
//! Run with: cargo run --bin load_factors -- --file factors.csv

use anyhow::{Context, Result};
use carbon_match::config;
use carbon_match::db::{init_pool, PgFactorStore};
use carbon_match::store::read_factors_csv_path;
use carbon_match::{FactorStore, SourceStandard};
use clap::Parser;
use itertools::Itertools;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "load_factors")]
#[command(about = "Import emission factors from CSV into PostgreSQL")]
struct Args {
    /// CSV with columns id, category_1..category_4, uom, source, scope, conversion_factor, year
    #[arg(short, long)]
    file: PathBuf,

    /// Also record this company's preferred source standard
    #[arg(long, requires = "source")]
    company: Option<Uuid>,

    /// Preferred source standard for --company
    #[arg(long)]
    source: Option<SourceStandard>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let factors = read_factors_csv_path(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    let by_source = factors.iter().counts_by(|f| f.source.to_string());
    for (source, count) in by_source.iter().sorted() {
        info!("  {}: {} factors", source, count);
    }
    let ineligible = factors.iter().filter(|f| !f.is_eligible()).count();
    if ineligible > 0 {
        warn!("{} factors have no conversion factor and can never be used for calculation", ineligible);
    }

    let url = config::database_url()?;
    let pool = init_pool(&url).await?;
    let store = PgFactorStore::new(pool);
    store.ensure_schema().await?;

    let written = store.insert_factors(&factors).await?;
    info!("Imported {} of {} factors from {}", written, factors.len(), args.file.display());

    if let (Some(company), Some(source)) = (args.company, &args.source) {
        store.set_preferred_source(company, source).await?;
        let stored = store.preferred_source(company).await?;
        info!("Preferred source for {} is now {:?}", company, stored.map(|s| s.to_string()));
    }

    Ok(())
}
