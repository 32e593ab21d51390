pub mod query;
pub mod registry;
pub mod templates;

pub use query::CohortQuery;
pub use registry::{CohortError, CohortTemplateRegistry};
