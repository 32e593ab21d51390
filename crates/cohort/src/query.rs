use clinport_bigquery::client::DATASET_PLACEHOLDER;
use clinport_bigquery::{QueryError, QueryExecutor, QueryResult};
use clinport_core::template::{self, Params, TemplateError};
use serde::Serialize;
use tracing::info;

/// A named, documented OMOP cohort query.
///
/// The SQL is a template: `{dataset}` is left for the executor, every other
/// placeholder comes from the query's default parameters or the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortQuery {
    name: String,
    description: String,
    sql: String,
    parameters: Params,
}

impl CohortQuery {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            sql: sql.into(),
            parameters: Params::new(),
        }
    }

    /// Add a default parameter value. Callers may override it per call.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The raw SQL template.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Default parameter values.
    pub fn parameters(&self) -> &Params {
        &self.parameters
    }

    /// Placeholder names used by the template, `dataset` included.
    pub fn placeholders(&self) -> Result<Vec<String>, TemplateError> {
        template::placeholders(&self.sql)
    }

    fn merged(&self, substitutions: &Params) -> Params {
        let mut merged = self.parameters.clone();
        merged.extend(
            substitutions
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged
    }

    /// Inject parameters into the SQL template.
    ///
    /// Defaults are overlaid with `substitutions` (caller wins). Every
    /// placeholder, `{dataset}` included, must end up with a value.
    pub fn format(&self, substitutions: &Params) -> Result<String, TemplateError> {
        template::render(&self.sql, &self.merged(substitutions))
    }

    /// Like [`format`](Self::format), but leaves `{dataset}` in place for
    /// [`QueryExecutor::execute`] to resolve.
    pub fn bind(&self, substitutions: &Params) -> Result<String, TemplateError> {
        template::render_partial(&self.sql, &self.merged(substitutions), &[DATASET_PLACEHOLDER])
    }

    /// Bind `substitutions` and execute through `executor`.
    pub async fn run(
        &self,
        executor: &QueryExecutor,
        substitutions: &Params,
        dry_run: bool,
    ) -> Result<QueryResult, QueryError> {
        let sql = self.bind(substitutions)?;
        info!(cohort = %self.name, dry_run, "Running cohort query");
        executor.execute(&sql, dry_run).await
    }
}
