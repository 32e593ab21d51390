use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// BigQuery on-demand pricing: $6.25 per TiB processed.
const DOLLARS_PER_BYTE: f64 = 6.25 / (1024.0 * 1024.0 * 1024.0 * 1024.0);

/// Column definition returned by a BigQuery query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as declared in the result schema.
    pub name: String,
    /// BigQuery type name (e.g. "STRING", "INTEGER", "DATE", "RECORD").
    pub data_type: String,
    /// Field mode ("NULLABLE", "REQUIRED", "REPEATED"), when reported.
    #[serde(default)]
    pub mode: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            mode: None,
        }
    }
}

/// Bytes a dry run reports it would process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunEstimate {
    pub total_bytes_processed: u64,
}

impl DryRunEstimate {
    pub fn gib(&self) -> f64 {
        self.total_bytes_processed as f64 / BYTES_PER_GIB
    }
}

/// Execution metadata for a completed (or dry-run) query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    /// BigQuery job id, when the service created a job.
    pub job_id: Option<String>,
    /// Location the job ran in.
    pub location: Option<String>,
    /// Bytes processed, or the estimate for a dry run.
    pub total_bytes_processed: u64,
    /// Whether the result came from the query cache.
    pub cache_hit: bool,
    /// `true` when the query was only estimated, never executed.
    pub dry_run: bool,
}

/// Structured result set from a query execution.
///
/// Rows are stored as `Vec<Option<String>>` where `None` represents SQL NULL.
/// Scalars keep BigQuery's string encoding; RECORD and REPEATED cells hold
/// their JSON text. Column ordering in each row matches the `columns` vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column definitions in result-set order.
    pub columns: Vec<Column>,
    /// Row data in the order the warehouse returned it.
    pub rows: Vec<Vec<Option<String>>>,
    /// Query execution metadata.
    pub metadata: QueryMetadata,
}

impl QueryResult {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            columns,
            rows,
            metadata: QueryMetadata::default(),
        }
    }

    /// The empty result returned for a dry run.
    pub fn from_estimate(estimate: DryRunEstimate) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            metadata: QueryMetadata {
                total_bytes_processed: estimate.total_bytes_processed,
                dry_run: true,
                ..QueryMetadata::default()
            },
        }
    }

    pub fn with_metadata(mut self, metadata: QueryMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the number of data rows in the result set.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of columns in the result set.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the result set contains no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The dry-run estimate, if this result came from a dry run.
    pub fn estimate(&self) -> Option<DryRunEstimate> {
        self.metadata.dry_run.then_some(DryRunEstimate {
            total_bytes_processed: self.metadata.total_bytes_processed,
        })
    }

    /// Finds the zero-based index of a column by name (case-sensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Retrieves the value at the given row index and column name.
    ///
    /// Returns `None` if the row index is out of bounds, the column name
    /// does not exist, or the cell value is SQL NULL.
    pub fn get_value(&self, row: usize, col: &str) -> Option<&str> {
        let col_idx = self.column_index(col)?;
        let row_data = self.rows.get(row)?;
        row_data.get(col_idx)?.as_deref()
    }

    /// Rows as column-name keyed records, preserving column order.
    pub fn to_records(&self) -> Vec<IndexMap<&str, Option<&str>>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, cell)| (col.name.as_str(), cell.as_deref()))
                    .collect()
            })
            .collect()
    }

    /// Bytes processed in GiB.
    pub fn gib_processed(&self) -> f64 {
        self.metadata.total_bytes_processed as f64 / BYTES_PER_GIB
    }

    /// Estimates the query cost in USD based on BigQuery on-demand pricing.
    pub fn cost_estimate_usd(&self) -> f64 {
        self.metadata.total_bytes_processed as f64 * DOLLARS_PER_BYTE
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.metadata.dry_run {
            return write!(
                f,
                "Dry run: {:.2} GiB would be processed (~${:.4})",
                self.gib_processed(),
                self.cost_estimate_usd(),
            );
        }
        if self.columns.is_empty() {
            return write!(f, "(empty result set)");
        }

        // Compute column widths (minimum = header length).
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.name.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    let cell_len = cell.as_deref().unwrap_or("NULL").len();
                    if cell_len > widths[i] {
                        widths[i] = cell_len;
                    }
                }
            }
        }

        // Header row.
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{:<width$}", col.name, width = widths[i])?;
        }
        writeln!(f)?;

        // Separator.
        for (i, w) in widths.iter().enumerate() {
            if i > 0 {
                write!(f, "-+-")?;
            }
            write!(f, "{}", "-".repeat(*w))?;
        }
        writeln!(f)?;

        // Data rows.
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate().take(widths.len()) {
                if i > 0 {
                    write!(f, " | ")?;
                }
                let value = cell.as_deref().unwrap_or("NULL");
                write!(f, "{:<width$}", value, width = widths[i])?;
            }
            writeln!(f)?;
        }

        // Metadata summary.
        writeln!(f)?;
        write!(
            f,
            "Job {} | {} rows | {:.3} GiB processed{} | ${:.6}",
            self.metadata.job_id.as_deref().unwrap_or("-"),
            self.rows.len(),
            self.gib_processed(),
            if self.metadata.cache_hit { " (cached)" } else { "" },
            self.cost_estimate_usd(),
        )
    }
}
