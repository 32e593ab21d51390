use std::path::PathBuf;

use clinport_core::config::{env_opt, profiled_env_opt, profiled_env_or, profiled_env_u64};
use serde::{Deserialize, Serialize};

/// Default OMOP CDM dataset inside the project.
pub const DEFAULT_DATASET_ID: &str = "omop_cdm";

/// Default BigQuery execution location.
pub const DEFAULT_LOCATION: &str = "US";

/// 10 GiB in bytes (10 * 1024^3).
pub const DEFAULT_MAX_BYTES_BILLED: u64 = 10_737_418_240;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Errors raised while building a connection. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("Missing required environment variable {0}")]
    MissingVar(String),

    /// A config field holds an unusable value.
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Credentials could not be loaded.
    #[error("Failed to load credentials: {0}")]
    Credentials(String),
}

// ── OmopConfig ───────────────────────────────────────────────────

/// Connection settings for the OMOP CDM dataset in BigQuery.
///
/// Reads from environment variables with optional profile prefix.
/// When `CLINPORT_PROFILE=PROD`, checks `PROD_GCP_PROJECT_ID` before `GCP_PROJECT_ID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmopConfig {
    /// GCP project that owns the dataset and is billed for queries.
    pub project_id: String,
    /// OMOP CDM dataset id.
    pub dataset_id: String,
    /// Service-account key file. `None` uses application default credentials.
    pub credentials_path: Option<PathBuf>,
    /// BigQuery execution location (e.g. "US", "EU").
    pub location: String,
    /// Queries that would bill more than this many bytes are rejected.
    pub max_bytes_billed: u64,
}

impl OmopConfig {
    /// Config for `project_id` with every other field at its default.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: DEFAULT_DATASET_ID.to_string(),
            credentials_path: None,
            location: DEFAULT_LOCATION.to_string(),
            max_bytes_billed: DEFAULT_MAX_BYTES_BILLED,
        }
    }

    pub fn with_dataset(mut self, dataset_id: impl Into<String>) -> Self {
        self.dataset_id = dataset_id.into();
        self
    }

    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_max_bytes_billed(mut self, bytes: u64) -> Self {
        self.max_bytes_billed = bytes;
        self
    }

    /// Build config from environment variables.
    ///
    /// Reads `CLINPORT_PROFILE` to determine profile prefix.
    /// `GCP_PROJECT_ID` is required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_profiled(&clinport_core::active_profile())
    }

    /// Build config for a specific named profile.
    pub fn from_env_profiled(profile: &str) -> Result<Self, ConfigError> {
        let project_id = profiled_env_opt(profile, "GCP_PROJECT_ID")
            .ok_or_else(|| ConfigError::MissingVar("GCP_PROJECT_ID".into()))?;

        // The credentials var is the standard Google one, so it is never profiled.
        let credentials_path = env_opt("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from);

        Ok(Self {
            project_id,
            dataset_id: profiled_env_or(profile, "OMOP_DATASET_ID", DEFAULT_DATASET_ID),
            credentials_path,
            location: profiled_env_or(profile, "BQ_LOCATION", DEFAULT_LOCATION),
            max_bytes_billed: profiled_env_u64(
                profile,
                "BQ_MAX_BYTES_BILLED",
                DEFAULT_MAX_BYTES_BILLED,
            ),
        })
    }

    /// Reject configs that cannot address a dataset.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "project_id",
                reason: "must not be empty".into(),
            });
        }
        if self.dataset_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "dataset_id",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Fully-qualified dataset reference, `project.dataset`.
    pub fn dataset_ref(&self) -> String {
        format!("{}.{}", self.project_id, self.dataset_id)
    }

    /// Convenience: billing cap expressed in GiB.
    pub fn max_bytes_billed_gib(&self) -> f64 {
        self.max_bytes_billed as f64 / BYTES_PER_GIB
    }
}

// ── Tests ────────────────────────────────────────────────────────
