use indexmap::IndexMap;

use crate::query::CohortQuery;
use crate::templates;

/// Errors raised by registry lookups and registration.
#[derive(Debug, thiserror::Error)]
pub enum CohortError {
    #[error("Unknown cohort '{name}'. Available: {available:?}")]
    UnknownCohort { name: String, available: Vec<String> },

    #[error("Cohort '{0}' is already registered")]
    DuplicateName(String),
}

/// Named cohort queries, looked up by exact identifier.
///
/// Built once and then only read; iteration follows registration order.
#[derive(Debug, Clone, Default)]
pub struct CohortTemplateRegistry {
    queries: IndexMap<String, CohortQuery>,
}

impl CohortTemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard OMOP phenotype library.
    pub fn omop() -> Self {
        let entries = [
            ("patient_demographics", templates::patient_demographics()),
            ("type2_diabetes", templates::type2_diabetes_cohort()),
            ("heart_failure", templates::heart_failure_cohort()),
            ("metformin_patients", templates::metformin_patients()),
            ("t2dm_on_metformin", templates::t2dm_on_metformin()),
        ];
        Self {
            queries: entries
                .into_iter()
                .map(|(id, query)| (id.to_string(), query))
                .collect(),
        }
    }

    /// Register a query under `id`. Returns error if `id` is taken.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        query: CohortQuery,
    ) -> Result<(), CohortError> {
        let id = id.into();
        if self.queries.contains_key(&id) {
            return Err(CohortError::DuplicateName(id));
        }
        self.queries.insert(id, query);
        Ok(())
    }

    /// Retrieve a registered cohort query by name (case-sensitive, exact).
    pub fn lookup(&self, name: &str) -> Result<&CohortQuery, CohortError> {
        self.queries
            .get(name)
            .ok_or_else(|| CohortError::UnknownCohort {
                name: name.to_string(),
                available: self.names().map(str::to_string).collect(),
            })
    }

    /// Registered identifiers in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.queries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CohortQuery)> {
        self.queries.iter().map(|(id, q)| (id.as_str(), q))
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
