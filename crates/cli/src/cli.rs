use clap::{Parser, Subcommand, ValueEnum};
use clinport_core::template::Params;

/// Run OMOP CDM cohort queries on BigQuery.
///
/// Connection settings come from the environment (`GCP_PROJECT_ID`,
/// `OMOP_DATASET_ID`, `BQ_LOCATION`, `BQ_MAX_BYTES_BILLED`,
/// `GOOGLE_APPLICATION_CREDENTIALS`), optionally prefixed by
/// `CLINPORT_PROFILE`. A `.env` file in the working directory is loaded first.
#[derive(Parser, Debug)]
#[command(name = "clinport", about = "Run OMOP CDM cohort queries on BigQuery")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered cohorts
    List,
    /// Print a cohort's SQL with parameters bound
    Show {
        /// Cohort identifier (see `list`)
        cohort: String,
        /// Parameter override, repeatable: --param min_age=65
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        /// Also resolve `{dataset}` from the environment
        #[arg(long)]
        resolved: bool,
    },
    /// Execute a cohort query
    Run {
        /// Cohort identifier (see `list`)
        cohort: String,
        /// Parameter override, repeatable: --param min_age=65
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        /// Estimate bytes processed without running the query
        #[arg(long)]
        dry_run: bool,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Count patients in the person table
    PersonCount,
    /// Show column names and types of an OMOP table
    TableInfo {
        /// Table name inside the configured dataset, e.g. `person`
        table: String,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table with a job summary
    #[default]
    Table,
    /// One JSON object per row, as an array
    Json,
}

/// Parse a `key=value` parameter. The value may itself contain `=`.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Collect parsed `--param` pairs. Later occurrences of a key win.
pub fn to_params(pairs: &[(String, String)]) -> Params {
    pairs.iter().cloned().collect()
}
