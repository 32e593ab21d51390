pub mod config;
pub mod client;
pub mod result;
pub mod retry;
pub mod warehouse;
pub mod rest;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::{ConfigError, OmopConfig};
pub use client::{QueryError, QueryExecutor};
pub use result::{Column, DryRunEstimate, QueryMetadata, QueryResult};
pub use retry::RetryPolicy;
pub use warehouse::{QueryOutcome, QueryRequest, Warehouse, WarehouseError};
pub use rest::BigQueryWarehouse;
