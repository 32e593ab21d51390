//! Scripted in-memory warehouse for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::result::{DryRunEstimate, QueryResult};
use crate::warehouse::{QueryOutcome, QueryRequest, Warehouse, WarehouseError};

/// A warehouse that records every request and replays queued outcomes in
/// FIFO order. An empty queue answers with [`WarehouseError::InvalidResponse`].
#[derive(Default)]
pub struct MockWarehouse {
    outcomes: Mutex<VecDeque<Result<QueryOutcome, WarehouseError>>>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a full result for the next submission.
    pub fn queue_rows(&self, result: QueryResult) {
        self.queue(Ok(QueryOutcome::Rows(result)));
    }

    /// Queue a dry-run estimate for the next submission.
    pub fn queue_estimate(&self, total_bytes_processed: u64) {
        self.queue(Ok(QueryOutcome::Estimate(DryRunEstimate {
            total_bytes_processed,
        })));
    }

    /// Queue a failure for the next submission.
    pub fn queue_error(&self, error: WarehouseError) {
        self.queue(Err(error));
    }

    pub fn queue(&self, outcome: Result<QueryOutcome, WarehouseError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Every request submitted so far, in order.
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn submit(&self, request: &QueryRequest) -> Result<QueryOutcome, WarehouseError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(WarehouseError::InvalidResponse(
                    "mock warehouse has no queued outcome".into(),
                ))
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
