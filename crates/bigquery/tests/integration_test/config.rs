//! Tests for OmopConfig loading and executor construction failures.

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use clinport_bigquery::*;

// Env-based tests must run serially to avoid interfering with each other.
static ENV_LOCK: Mutex<()> = Mutex::new(());

// Helper: clear all env vars the config reads.
fn clear_env() {
    let keys = [
        "CLINPORT_PROFILE",
        "GCP_PROJECT_ID",
        "OMOP_DATASET_ID",
        "GOOGLE_APPLICATION_CREDENTIALS",
        "BQ_LOCATION",
        "BQ_MAX_BYTES_BILLED",
        "PROD_GCP_PROJECT_ID",
        "PROD_OMOP_DATASET_ID",
        "PROD_BQ_LOCATION",
    ];
    for k in keys {
        env::remove_var(k);
    }
}

#[test]
fn test_config_from_env() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();

    env::set_var("GCP_PROJECT_ID", "rwe-warehouse");
    env::set_var("OMOP_DATASET_ID", "cdm_54");
    env::set_var("BQ_LOCATION", "EU");
    env::set_var("BQ_MAX_BYTES_BILLED", "1073741824"); // 1 GiB

    let cfg = OmopConfig::from_env().unwrap();

    assert_eq!(cfg.project_id, "rwe-warehouse");
    assert_eq!(cfg.dataset_ref(), "rwe-warehouse.cdm_54");
    assert_eq!(cfg.location, "EU");
    assert_eq!(cfg.credentials_path, None);
    assert!((cfg.max_bytes_billed_gib() - 1.0).abs() < 0.001);

    clear_env();
}

#[test]
fn test_config_profile() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();

    env::set_var("GCP_PROJECT_ID", "dev-project");
    env::set_var("CLINPORT_PROFILE", "prod");
    env::set_var("PROD_GCP_PROJECT_ID", "prod-project");
    env::set_var("PROD_BQ_LOCATION", "us-central1");

    let cfg = OmopConfig::from_env().unwrap();
    assert_eq!(cfg.project_id, "prod-project");
    assert_eq!(cfg.location, "us-central1");
    assert_eq!(cfg.dataset_id, "omop_cdm");

    clear_env();
}

#[test]
fn test_config_requires_project() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();

    env::set_var("OMOP_DATASET_ID", "cdm_54");
    let err = OmopConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("GCP_PROJECT_ID"));

    clear_env();
}

#[test]
fn test_config_serde_roundtrip() {
    let cfg = OmopConfig::new("p").with_credentials_path("/keys/sa.json");
    let json = serde_json::to_string(&cfg).expect("serialize");
    let back: OmopConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, cfg);
}

#[tokio::test]
async fn test_connect_rejects_blank_project() {
    let result = QueryExecutor::connect(OmopConfig::new("")).await;
    assert!(matches!(
        result,
        Err(QueryError::Config(ConfigError::Invalid { field: "project_id", .. }))
    ));
}

#[tokio::test]
async fn test_connect_fails_on_missing_key_file() {
    let config = OmopConfig::new("p")
        .with_credentials_path(PathBuf::from("/nonexistent/clinport/sa-key.json"));

    let result = QueryExecutor::connect(config).await;
    match result {
        Err(QueryError::Config(ConfigError::Credentials(msg))) => {
            assert!(msg.contains("sa-key.json"), "message was: {msg}");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("connect must fail without a readable key file"),
    }
}

#[tokio::test]
async fn test_connect_fails_on_garbage_key_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{{\"type\": \"not_a_service_account\"}}").unwrap();

    let config = OmopConfig::new("p").with_credentials_path(file.path());
    let result = QueryExecutor::connect(config).await;
    assert!(matches!(
        result,
        Err(QueryError::Config(ConfigError::Credentials(_)))
    ));
}
