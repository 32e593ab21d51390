//! Running registry cohorts through a QueryExecutor backed by the mock warehouse.

use std::sync::Arc;

use clinport_bigquery::mock::MockWarehouse;
use clinport_bigquery::{
    Column, OmopConfig, QueryError, QueryExecutor, QueryResult, RetryPolicy, WarehouseError,
};
use clinport_cohort::CohortTemplateRegistry;
use clinport_core::template::{Params, TemplateError};

fn setup() -> (Arc<MockWarehouse>, QueryExecutor) {
    let mock = Arc::new(MockWarehouse::new());
    let exec = QueryExecutor::with_warehouse(OmopConfig::new("proj"), mock.clone()).unwrap();
    (mock, exec)
}

#[tokio::test]
async fn test_cohort_runs_with_defaults() {
    let (mock, exec) = setup();
    mock.queue_rows(QueryResult::new(
        vec![
            Column::new("person_id", "INTEGER"),
            Column::new("days_to_metformin", "INTEGER"),
        ],
        vec![vec![Some("7".into()), Some("12".into())]],
    ));

    let registry = CohortTemplateRegistry::omop();
    let cohort = registry.lookup("t2dm_on_metformin").unwrap();
    let result = cohort.run(&exec, &Params::new(), false).await.unwrap();

    assert_eq!(result.row_count(), 1);
    assert_eq!(result.get_value(0, "days_to_metformin"), Some("12"));

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].sql.contains("`proj.omop_cdm.condition_occurrence`"));
    assert!(requests[0].sql.contains("BETWEEN -(30) AND 90"));
    assert!(!requests[0].dry_run);
}

#[tokio::test]
async fn test_cohort_dry_run_returns_estimate() {
    let (mock, exec) = setup();
    mock.queue_estimate(3 * 1024 * 1024 * 1024);

    let registry = CohortTemplateRegistry::omop();
    let result = registry
        .lookup("heart_failure")
        .unwrap()
        .run(&exec, &Params::new(), true)
        .await
        .unwrap();

    assert!(result.is_empty());
    assert!((result.estimate().unwrap().gib() - 3.0).abs() < 1e-9);
    assert!(mock.requests()[0].dry_run);
}

#[tokio::test]
async fn test_parameter_override_reaches_warehouse() {
    let (mock, exec) = setup();
    mock.queue_rows(QueryResult::new(vec![Column::new("person_id", "INTEGER")], vec![]));

    let mut params = Params::new();
    params.insert("min_age".into(), "65".into());
    CohortTemplateRegistry::omop()
        .lookup("t2dm_on_metformin")
        .unwrap()
        .run(&exec, &params, false)
        .await
        .unwrap();

    assert!(mock.requests()[0].sql.contains("d.age >= 65"));
}

#[tokio::test]
async fn test_template_error_never_reaches_warehouse() {
    let (mock, exec) = setup();

    // Bound values are inserted verbatim; the stray brace fails resolution.
    let mut params = Params::new();
    params.insert("days_before".into(), "{".into());
    let sql = CohortTemplateRegistry::omop()
        .lookup("t2dm_on_metformin")
        .unwrap()
        .bind(&params)
        .unwrap();
    let err = exec.execute(&sql, false).await.unwrap_err();

    assert!(matches!(err, QueryError::Template(TemplateError::Malformed { .. })));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried() {
    let (mock, exec) = setup();
    mock.queue_error(WarehouseError::Api {
        status: 503,
        message: "backendError: try again".into(),
    });
    mock.queue_rows(QueryResult::new(
        vec![Column::new("person_id", "INTEGER")],
        vec![vec![Some("1".into())]],
    ));

    let result = CohortTemplateRegistry::omop()
        .lookup("metformin_patients")
        .unwrap()
        .run(&exec, &Params::new(), false)
        .await
        .unwrap();

    assert_eq!(result.row_count(), 1);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn test_failure_without_retry_surfaces_immediately() {
    let (mock, exec) = setup();
    let exec = exec.with_retry_policy(RetryPolicy::no_retry());
    mock.queue_error(WarehouseError::Api {
        status: 400,
        message: "bytesBilledLimitExceeded: Query exceeded limit".into(),
    });

    let err = CohortTemplateRegistry::omop()
        .lookup("patient_demographics")
        .unwrap()
        .run(&exec, &Params::new(), false)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("bytesBilledLimitExceeded"));
    assert_eq!(mock.call_count(), 1);
}
