//! OMOP CDM query execution against BigQuery.
//!
//! Provides [`QueryExecutor`] for running SQL against the configured OMOP
//! dataset, with `{dataset}` placeholder resolution, a bytes-billed safety
//! cap, dry-run cost estimation, and retry with bounded exponential backoff.

use std::sync::Arc;

use clinport_core::template::{self, Params, TemplateError};
use tracing::{debug, info};

use crate::config::{ConfigError, OmopConfig};
use crate::rest::BigQueryWarehouse;
use crate::result::{DryRunEstimate, QueryResult};
use crate::retry::RetryPolicy;
use crate::warehouse::{QueryOutcome, QueryRequest, Warehouse, WarehouseError};

/// Placeholder the executor resolves to `project.dataset`.
pub const DATASET_PLACEHOLDER: &str = "dataset";

const PERSON_COUNT_SQL: &str = "SELECT COUNT(*) AS n FROM `{dataset}.person`";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors that can occur while executing OMOP queries.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The executor could not be constructed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The SQL still had unresolved or malformed placeholders. Never retried.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// The warehouse failed; for `execute` this is the last failure after retries.
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    /// A query expected to return a row returned none.
    #[error("Query returned no rows: {0}")]
    EmptyResult(String),

    /// A returned value did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs SQL against the OMOP CDM dataset.
///
/// Wraps a [`Warehouse`] and adds:
/// - `{dataset}` resolution to the fully-qualified dataset reference
/// - The configured maximum-bytes-billed cap and query caching on every `execute`
/// - Retry of warehouse failures per [`RetryPolicy`]
///
/// Calls are sequential: each `execute` completes, retries included, before
/// returning. Use one executor per concurrent caller.
pub struct QueryExecutor {
    config: OmopConfig,
    dataset_ref: String,
    warehouse: Arc<dyn Warehouse>,
    retry: RetryPolicy,
}

impl QueryExecutor {
    /// Connect to BigQuery using the credentials named in `config`.
    ///
    /// Uses the service-account key file when `credentials_path` is set,
    /// otherwise application default credentials. Any failure is returned
    /// and no executor is built.
    pub async fn connect(config: OmopConfig) -> Result<Self, QueryError> {
        config.validate()?;
        let warehouse = BigQueryWarehouse::connect(&config).await?;
        Self::with_warehouse(config, Arc::new(warehouse))
    }

    /// Build an executor over any [`Warehouse`] implementation.
    pub fn with_warehouse(
        config: OmopConfig,
        warehouse: Arc<dyn Warehouse>,
    ) -> Result<Self, QueryError> {
        config.validate()?;
        let dataset_ref = config.dataset_ref();

        info!(
            dataset = %dataset_ref,
            location = %config.location,
            max_gib_billed = config.max_bytes_billed_gib(),
            warehouse = warehouse.name(),
            "QueryExecutor initialised"
        );

        Ok(Self {
            config,
            dataset_ref,
            warehouse,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the default retry policy (3 attempts, 2s..10s backoff).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &OmopConfig {
        &self.config
    }

    /// `project.dataset`, the value substituted for `{dataset}`.
    pub fn dataset_ref(&self) -> &str {
        &self.dataset_ref
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Substitute the dataset reference into `sql`.
    ///
    /// Any other placeholder left in `sql` is an error.
    pub fn resolve(&self, sql: &str) -> Result<String, TemplateError> {
        let mut params = Params::new();
        params.insert(DATASET_PLACEHOLDER.to_string(), self.dataset_ref.clone());
        template::render(sql, &params)
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Execute `sql` against the OMOP dataset.
    ///
    /// `{dataset}` is resolved first; a template failure returns immediately.
    /// The submission then runs under the retry policy with the bytes-billed
    /// cap and query caching enabled. With `dry_run` the query is only
    /// estimated and an empty result carrying the estimate is returned.
    pub async fn execute(&self, sql: &str, dry_run: bool) -> Result<QueryResult, QueryError> {
        let resolved = self.resolve(sql)?;

        let request = QueryRequest {
            sql: resolved,
            max_bytes_billed: Some(self.config.max_bytes_billed),
            dry_run,
            use_query_cache: true,
            location: Some(self.config.location.clone()),
        };

        debug!(dry_run, "Running OMOP query");

        let outcome = self
            .retry
            .run("execute", |attempt| {
                debug!(attempt, "Submitting query");
                self.warehouse.submit(&request)
            })
            .await?;

        let result = match outcome {
            QueryOutcome::Estimate(estimate) => {
                info!(
                    bytes = estimate.total_bytes_processed,
                    "Dry run: {:.2} GiB will be processed",
                    estimate.gib()
                );
                QueryResult::from_estimate(estimate)
            }
            QueryOutcome::Rows(result) if dry_run => {
                // Some warehouses answer a dry run with an empty result set.
                QueryResult::from_estimate(DryRunEstimate {
                    total_bytes_processed: result.metadata.total_bytes_processed,
                })
            }
            QueryOutcome::Rows(result) => {
                info!(
                    rows = result.row_count(),
                    job_id = result.metadata.job_id.as_deref().unwrap_or("-"),
                    cache_hit = result.metadata.cache_hit,
                    "Query returned {} rows",
                    result.row_count()
                );
                result
            }
        };

        Ok(result)
    }

    /// Total patient count in the OMOP `person` table.
    pub async fn person_count(&self) -> Result<i64, QueryError> {
        let result = self.execute(PERSON_COUNT_SQL, false).await?;
        if result.is_empty() {
            return Err(QueryError::EmptyResult("person count".into()));
        }
        let raw = result
            .get_value(0, "n")
            .ok_or_else(|| QueryError::Parse("person count: column 'n' missing or NULL".into()))?;
        raw.parse::<i64>()
            .map_err(|_| QueryError::Parse(format!("person count: '{raw}' is not an integer")))
    }

    /// Column name, data type and nullability of `table_name`, in column order.
    ///
    /// Submitted once, without the retry policy, byte cap, or `{dataset}`
    /// resolution. `table_name` is interpolated verbatim into the SQL, so
    /// callers must only pass trusted, internal table names.
    pub async fn table_info(&self, table_name: &str) -> Result<QueryResult, QueryError> {
        let sql = format!(
            "SELECT\n    column_name,\n    data_type,\n    is_nullable\n\
             FROM `{}.{}.INFORMATION_SCHEMA.COLUMNS`\n\
             WHERE table_name = '{}'\n\
             ORDER BY ordinal_position",
            self.config.project_id, self.config.dataset_id, table_name
        );

        let mut request = QueryRequest::new(sql);
        request.location = Some(self.config.location.clone());

        debug!(table = table_name, "Fetching table schema");

        match self.warehouse.submit(&request).await? {
            QueryOutcome::Rows(result) => Ok(result),
            QueryOutcome::Estimate(_) => Err(QueryError::Parse(
                "schema lookup returned an estimate instead of rows".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests — mock warehouse, no network
// ---------------------------------------------------------------------------
