//! The boundary between the executor and a remote query service.
//!
//! [`Warehouse`] is the only seam the executor talks through. The
//! production implementation is [`crate::rest::BigQueryWarehouse`]; tests
//! use [`crate::mock::MockWarehouse`].

use async_trait::async_trait;
use serde::Serialize;

use crate::result::{DryRunEstimate, QueryResult};

/// Errors reported by a warehouse while submitting or fetching a query.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// The service could not be reached or the connection failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the request (bad SQL, billing cap, quota, 5xx).
    #[error("BigQuery API error {status}: {message}")]
    Api { status: u16, message: String },

    /// An access token could not be obtained.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The service answered with something we could not interpret.
    #[error("Invalid warehouse response: {0}")]
    InvalidResponse(String),
}

/// One query submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    /// Fully resolved SQL (standard dialect).
    pub sql: String,
    /// Abort the query if it would bill more bytes than this.
    pub max_bytes_billed: Option<u64>,
    /// Estimate only; never execute.
    pub dry_run: bool,
    /// Allow answers from the service's query cache.
    pub use_query_cache: bool,
    /// Execution location.
    pub location: Option<String>,
}

impl QueryRequest {
    /// A request with service defaults: no byte cap, caching on, no location.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            max_bytes_billed: None,
            dry_run: false,
            use_query_cache: true,
            location: None,
        }
    }
}

/// What a submission produced.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Dry run: the bytes the query would process.
    Estimate(DryRunEstimate),
    /// Full execution: every row, materialized.
    Rows(QueryResult),
}

/// A remote analytic query service.
///
/// Implementations are used sequentially by one executor; they need not
/// support overlapping submissions beyond what `Send + Sync` implies.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Submit a query and wait for its estimate or its complete result.
    async fn submit(&self, request: &QueryRequest) -> Result<QueryOutcome, WarehouseError>;

    /// Warehouse name for logging/debugging (e.g., "bigquery", "mock").
    fn name(&self) -> &str;
}
