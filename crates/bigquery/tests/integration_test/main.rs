//! Integration tests for clinport-bigquery.
//!
//! These tests exercise the public API without Google Cloud credentials:
//! config loading, construction failures, and the executor over an
//! in-process warehouse.

mod config;
mod executor;
