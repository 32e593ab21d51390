//! The OMOP registry as a whole: every cohort must bind and resolve cleanly.

use clinport_bigquery::{OmopConfig, QueryExecutor};
use clinport_bigquery::mock::MockWarehouse;
use clinport_cohort::{CohortError, CohortTemplateRegistry};
use clinport_core::template::{self, Params};
use std::sync::Arc;

fn executor() -> QueryExecutor {
    QueryExecutor::with_warehouse(
        OmopConfig::new("proj").with_dataset("omop_cdm"),
        Arc::new(MockWarehouse::new()),
    )
    .unwrap()
}

#[test]
fn test_every_cohort_resolves_to_runnable_sql() {
    let registry = CohortTemplateRegistry::omop();
    let exec = executor();

    for (id, query) in registry.iter() {
        let bound = query.bind(&Params::new()).unwrap();
        assert!(bound.contains("{dataset}"), "{id} lost its dataset placeholder");

        let sql = exec.resolve(&bound).unwrap();
        assert!(
            template::placeholders(&sql).unwrap().is_empty(),
            "{id} still has placeholders"
        );
        assert!(sql.contains("`proj.omop_cdm."), "{id}: {sql}");
    }
}

#[test]
fn test_format_matches_bind_then_resolve() {
    let registry = CohortTemplateRegistry::omop();
    let exec = executor();
    let mut params = Params::new();
    params.insert("dataset".into(), "proj.omop_cdm".into());

    for (id, query) in registry.iter() {
        let direct = query.format(&params).unwrap();
        let staged = exec.resolve(&query.bind(&Params::new()).unwrap()).unwrap();
        assert_eq!(direct, staged, "{id}");
    }
}

#[test]
fn test_every_cohort_is_documented() {
    for (id, query) in CohortTemplateRegistry::omop().iter() {
        assert!(!query.name().is_empty(), "{id}");
        assert!(!query.description().trim().is_empty(), "{id}");
    }
}

#[test]
fn test_unknown_cohort_error_is_actionable() {
    let err = CohortTemplateRegistry::omop()
        .lookup("copd")
        .unwrap_err();
    assert!(matches!(err, CohortError::UnknownCohort { .. }));
    assert!(err.to_string().contains("t2dm_on_metformin"));
}
