use anyhow::{Context, Result};
use carbon_match::config::{self, MatcherConfig};
use carbon_match::db::{init_pool, PgFactorStore};
use carbon_match::{
    EmissionCalculator, EmissionEntry, FactorStore, InMemoryFactorStore, ScopeValue,
    SourceStandard,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "carbon-match")]
#[command(about = "Match activity data to emission factors and compute CO2e")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Match a single activity entry
    Match {
        #[command(flatten)]
        reference: ReferenceArgs,

        /// Activity category, e.g. "Diesel"
        #[arg(long)]
        category: String,

        /// Unit of measure, e.g. "litres"
        #[arg(long)]
        unit: String,

        /// GHG Protocol scope (1, 2, 3 or "Scope 2")
        #[arg(long)]
        scope: String,

        /// Quantity consumed, in `unit`
        #[arg(long)]
        quantity: f64,

        /// Activity date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Match a JSON array of activity entries
    Batch {
        #[command(flatten)]
        reference: ReferenceArgs,

        /// JSON file holding an array of entries
        #[arg(short, long)]
        entries: PathBuf,
    },
}

#[derive(Args)]
struct ReferenceArgs {
    /// Emission-factor CSV file (default: read from DATABASE_URL)
    #[arg(short, long)]
    factors: Option<PathBuf>,

    /// Source standard to match against (DEFRA, EPA, IPCC, ADEME, ...)
    #[arg(short, long)]
    source: Option<SourceStandard>,

    /// Company whose preferred source standard should be used
    #[arg(long)]
    company: Option<Uuid>,
}

async fn open_store(reference: &ReferenceArgs) -> Result<Arc<dyn FactorStore>> {
    match &reference.factors {
        Some(path) => {
            let store = InMemoryFactorStore::from_csv_path(path)
                .with_context(|| format!("reading factors from {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => {
            let url = config::database_url()?;
            let pool = init_pool(&url).await?;
            Ok(Arc::new(PgFactorStore::new(pool)))
        }
    }
}

async fn resolve_source(calculator: &EmissionCalculator, reference: &ReferenceArgs) -> Result<SourceStandard> {
    if let Some(source) = &reference.source {
        return Ok(source.clone());
    }
    match reference.company {
        Some(company) => Ok(calculator.preferred_source(company).await?),
        None => Ok(calculator.config().default_source.clone()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let matcher_config = MatcherConfig::from_env()?;

    match cli.command {
        Command::Match {
            reference,
            category,
            unit,
            scope,
            quantity,
            date,
        } => {
            let store = open_store(&reference).await?;
            let calculator = EmissionCalculator::new(store, matcher_config);
            let source = resolve_source(&calculator, &reference).await?;

            let mut entry = EmissionEntry::new(category, unit, ScopeValue::parse(&scope), quantity);
            if let Some(date) = date {
                entry = entry.with_date(date);
            }
            info!("Matching '{}' against {}", entry.category, source);
            let result = calculator.match_with_source(&source, &entry).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Batch {
            reference,
            entries: entries_path,
        } => {
            let raw = std::fs::read_to_string(&entries_path)
                .with_context(|| format!("reading entries from {}", entries_path.display()))?;
            let entries: Vec<Value> = serde_json::from_str(&raw).with_context(|| {
                format!("{} must hold a JSON array of entries", entries_path.display())
            })?;

            let store = open_store(&reference).await?;
            let calculator = EmissionCalculator::new(store, matcher_config);
            let source = resolve_source(&calculator, &reference).await?;

            info!("Matching {} entries against {}", entries.len(), source);
            let items = calculator.match_batch_with_source(&source, &entries).await;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }

    Ok(())
}
