//! Rendering of query results for the terminal.

use anyhow::Result;
use clinport_bigquery::QueryResult;
use serde_json::json;

use crate::cli::OutputFormat;

pub fn render(result: &QueryResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(result.to_string()),
        OutputFormat::Json if result.metadata.dry_run => Ok(serde_json::to_string_pretty(&json!({
            "dry_run": true,
            "total_bytes_processed": result.metadata.total_bytes_processed,
            "gib_processed": result.gib_processed(),
            "cost_estimate_usd": result.cost_estimate_usd(),
        }))?),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&result.to_records())?),
    }
}
