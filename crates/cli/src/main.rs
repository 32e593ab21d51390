mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use clinport_bigquery::client::DATASET_PLACEHOLDER;
use clinport_bigquery::{OmopConfig, QueryExecutor};
use clinport_cohort::CohortTemplateRegistry;
use clinport_core::template::{self, Params};
use tracing::info;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    clinport_core::load_dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let registry = CohortTemplateRegistry::omop();

    match args.command {
        Command::List => {
            for (id, query) in registry.iter() {
                let summary = query.description().lines().next().unwrap_or_default();
                println!("{id:<22} {summary}");
            }
        }
        Command::Show {
            cohort,
            params,
            resolved,
        } => {
            let query = registry.lookup(&cohort)?;
            let mut sql = query.bind(&cli::to_params(&params))?;
            if resolved {
                let config = load_config()?;
                let mut dataset = Params::new();
                dataset.insert(DATASET_PLACEHOLDER.to_string(), config.dataset_ref());
                sql = template::render(&sql, &dataset)?;
            }
            let summary = query.description().lines().next().unwrap_or_default();
            println!("-- {}: {summary}", query.name());
            println!("{}", sql.trim());
        }
        Command::Run {
            cohort,
            params,
            dry_run,
            format,
        } => {
            let query = registry.lookup(&cohort)?;
            let executor = connect().await?;
            let result = query
                .run(&executor, &cli::to_params(&params), dry_run)
                .await
                .with_context(|| format!("cohort '{cohort}' failed"))?;
            println!("{}", output::render(&result, format)?);
        }
        Command::PersonCount => {
            let executor = connect().await?;
            let n = executor.person_count().await?;
            println!("{n}");
        }
        Command::TableInfo { table, format } => {
            let executor = connect().await?;
            let result = executor
                .table_info(&table)
                .await
                .with_context(|| format!("schema lookup for '{table}' failed"))?;
            println!("{}", output::render(&result, format)?);
        }
    }

    Ok(())
}

fn load_config() -> Result<OmopConfig> {
    let profile = clinport_core::active_profile();
    OmopConfig::from_env_profiled(&profile).with_context(|| {
        format!(
            "failed to load {} configuration",
            clinport_core::profile_label(&profile)
        )
    })
}

async fn connect() -> Result<QueryExecutor> {
    let config = load_config()?;
    info!(project = %config.project_id, dataset = %config.dataset_id, "Connecting to BigQuery");
    QueryExecutor::connect(config)
        .await
        .context("failed to connect to BigQuery")
}
