//! Tests for QueryExecutor over a caller-supplied Warehouse implementation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clinport_bigquery::*;

/// Answers the demographics query with a fixed table, estimates dry runs,
/// and rejects anything else the way BigQuery rejects unknown tables.
struct FixtureWarehouse {
    seen: Mutex<Vec<QueryRequest>>,
}

impl FixtureWarehouse {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
        })
    }

    fn demographics() -> QueryResult {
        QueryResult::new(
            vec![
                Column::new("person_id", "INTEGER"),
                Column::new("gender", "STRING"),
            ],
            vec![
                vec![Some("1001".into()), Some("FEMALE".into())],
                vec![Some("1002".into()), Some("MALE".into())],
                vec![Some("1003".into()), None],
            ],
        )
    }
}

#[async_trait]
impl Warehouse for FixtureWarehouse {
    async fn submit(&self, request: &QueryRequest) -> Result<QueryOutcome, WarehouseError> {
        self.seen.lock().unwrap().push(request.clone());

        if request.dry_run {
            return Ok(QueryOutcome::Estimate(DryRunEstimate {
                total_bytes_processed: 512 * 1024 * 1024,
            }));
        }
        if request.sql == "SELECT * FROM `proj.omop_cdm.person`" {
            return Ok(QueryOutcome::Rows(Self::demographics()));
        }
        Err(WarehouseError::Api {
            status: 404,
            message: format!("Not found: {}", request.sql),
        })
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

/// Always fails, counting attempts.
struct FlakyWarehouse {
    attempts: AtomicUsize,
}

#[async_trait]
impl Warehouse for FlakyWarehouse {
    async fn submit(&self, _request: &QueryRequest) -> Result<QueryOutcome, WarehouseError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        Err(WarehouseError::Api {
            status: 503,
            message: format!("attempt {n}: backendError"),
        })
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[tokio::test]
async fn test_round_trip_preserves_rows_and_columns() {
    let warehouse = FixtureWarehouse::new();
    let exec = QueryExecutor::with_warehouse(OmopConfig::new("proj"), warehouse.clone()).unwrap();

    let result = exec
        .execute("SELECT * FROM `{dataset}.person`", false)
        .await
        .unwrap();

    assert_eq!(result, FixtureWarehouse::demographics());
    assert_eq!(result.row_count(), 3);
    assert_eq!(result.columns[0].name, "person_id");
    assert_eq!(result.columns[0].data_type, "INTEGER");
    assert_eq!(result.columns[1].name, "gender");
    assert_eq!(result.columns[1].data_type, "STRING");
    assert_eq!(result.get_value(2, "person_id"), Some("1003"));
    assert_eq!(result.get_value(2, "gender"), None);

    let seen = warehouse.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].max_bytes_billed, Some(10_737_418_240));
}

#[tokio::test]
async fn test_dry_run_reports_estimate() {
    let warehouse = FixtureWarehouse::new();
    let exec = QueryExecutor::with_warehouse(OmopConfig::new("proj"), warehouse.clone()).unwrap();

    let result = exec
        .execute("SELECT * FROM `{dataset}.person`", true)
        .await
        .unwrap();

    assert!(result.is_empty());
    assert!((result.estimate().unwrap().gib() - 0.5).abs() < 1e-9);
    assert!(result.to_string().starts_with("Dry run: 0.50 GiB"));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_last_error() {
    let warehouse = Arc::new(FlakyWarehouse {
        attempts: AtomicUsize::new(0),
    });
    let exec = QueryExecutor::with_warehouse(OmopConfig::new("proj"), warehouse.clone()).unwrap();

    let err = exec.execute("SELECT 1", false).await.unwrap_err();

    assert_eq!(warehouse.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(err.to_string(), "BigQuery API error 503: attempt 3: backendError");
}

#[tokio::test(start_paused = true)]
async fn test_custom_retry_policy() {
    let warehouse = Arc::new(FlakyWarehouse {
        attempts: AtomicUsize::new(0),
    });
    let exec = QueryExecutor::with_warehouse(OmopConfig::new("proj"), warehouse.clone())
        .unwrap()
        .with_retry_policy(RetryPolicy::default().with_max_attempts(5));
    assert_eq!(exec.retry_policy().max_attempts, 5);

    assert!(exec.execute("SELECT 1", false).await.is_err());
    assert_eq!(warehouse.attempts.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_custom_dataset_in_table_info() {
    let warehouse = FixtureWarehouse::new();
    let config = OmopConfig::new("analytics").with_dataset("cdm_v54");
    let exec = QueryExecutor::with_warehouse(config, warehouse.clone()).unwrap();

    // The fixture rejects it, and the 404 comes straight back.
    let err = exec.table_info("drug_exposure").await.unwrap_err();
    assert!(matches!(
        err,
        QueryError::Warehouse(WarehouseError::Api { status: 404, .. })
    ));

    let seen = warehouse.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0]
        .sql
        .contains("`analytics.cdm_v54.INFORMATION_SCHEMA.COLUMNS`"));
    assert!(seen[0].sql.contains("'drug_exposure'"));
}
