//! BigQuery REST v2 implementation of [`Warehouse`].
//!
//! Submits through `jobs.query`, long-polls `jobs.getQueryResults` until the
//! job completes, then follows page tokens until every row is materialized.
//! Access tokens come from `gcp_auth`: a service-account key file when the
//! config names one, application default credentials otherwise.

mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use tracing::{debug, info};

use crate::config::{ConfigError, OmopConfig};
use crate::warehouse::{QueryOutcome, QueryRequest, Warehouse, WarehouseError};

use self::wire::{JobReference, QueryRequestBody, QueryResponse, ResultAccumulator};

const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// Server-side long-poll window for each `jobs.query` / `getQueryResults` call.
const POLL_TIMEOUT_MS: u64 = 30_000;

/// [`Warehouse`] backed by the BigQuery REST API.
pub struct BigQueryWarehouse {
    http: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
    project_id: String,
}

impl BigQueryWarehouse {
    /// Resolve credentials and build the HTTP client.
    ///
    /// Fails when the key file cannot be read or parsed, or when no
    /// application default credentials are available.
    pub async fn connect(config: &OmopConfig) -> Result<Self, ConfigError> {
        let auth: Arc<dyn TokenProvider> = match &config.credentials_path {
            Some(path) => {
                let account = CustomServiceAccount::from_file(path).map_err(|e| {
                    ConfigError::Credentials(format!("{}: {e}", path.display()))
                })?;
                info!(path = %path.display(), "Using service account credentials");
                Arc::new(account) as Arc<dyn TokenProvider>
            }
            None => {
                let provider = gcp_auth::provider().await.map_err(|e| {
                    ConfigError::Credentials(format!("application default credentials: {e}"))
                })?;
                info!("Using application default credentials");
                provider
            }
        };

        let http = reqwest::Client::builder()
            .user_agent(concat!("clinport/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "http_client",
                reason: e.to_string(),
            })?;

        Ok(Self::with_parts(http, auth, config.project_id.clone()))
    }

    /// Assemble from an existing HTTP client and token provider.
    pub fn with_parts(
        http: reqwest::Client,
        auth: Arc<dyn TokenProvider>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            auth,
            project_id: project_id.into(),
        }
    }

    async fn bearer_token(&self) -> Result<String, WarehouseError> {
        let token = self
            .auth
            .token(&[BIGQUERY_SCOPE])
            .await
            .map_err(|e| WarehouseError::Auth(e.to_string()))?;
        Ok(token.as_str().to_string())
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<QueryResponse, WarehouseError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(wire::api_error(status.as_u16(), &body));
        }
        resp.json::<QueryResponse>()
            .await
            .map_err(|e| WarehouseError::InvalidResponse(e.to_string()))
    }

    /// `GET /projects/{project}/queries/{jobId}`, optionally at a page token.
    async fn fetch_results(
        &self,
        token: &str,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, WarehouseError> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            DEFAULT_BASE_URL, self.project_id, job.job_id
        );
        let timeout = POLL_TIMEOUT_MS.to_string();
        let mut query: Vec<(&str, &str)> = vec![("timeoutMs", timeout.as_str())];
        if let Some(location) = job.location.as_deref() {
            query.push(("location", location));
        }
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token));
        }
        self.send(self.http.get(&url).bearer_auth(token).query(&query))
            .await
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn submit(&self, request: &QueryRequest) -> Result<QueryOutcome, WarehouseError> {
        let token = self.bearer_token().await?;
        let url = format!("{}/projects/{}/queries", DEFAULT_BASE_URL, self.project_id);
        let body = QueryRequestBody::new(request, POLL_TIMEOUT_MS);

        let mut page = self
            .send(self.http.post(&url).bearer_auth(&token).json(&body))
            .await?;

        if request.dry_run {
            return Ok(QueryOutcome::Estimate(page.estimate()?));
        }

        let job = page.job_reference.clone();
        let mut acc = ResultAccumulator::default();

        loop {
            let job = job.as_ref().ok_or_else(|| {
                WarehouseError::InvalidResponse("response without jobReference".into())
            });

            if !page.is_complete() {
                let job = job?;
                debug!(job_id = %job.job_id, "Job still running, polling");
                page = self.fetch_results(&token, job, None).await?;
                continue;
            }

            let next = page.page_token.take();
            acc.absorb(page)?;
            match next {
                Some(page_token) => {
                    let job = job?;
                    debug!(job_id = %job.job_id, "Fetching next result page");
                    page = self.fetch_results(&token, job, Some(&page_token)).await?;
                }
                None => break,
            }
        }

        Ok(QueryOutcome::Rows(acc.finish()))
    }

    fn name(&self) -> &str {
        "bigquery"
    }
}
