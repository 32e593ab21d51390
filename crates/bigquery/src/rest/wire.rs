//! JSON shapes of the BigQuery v2 `jobs.query` / `jobs.getQueryResults`
//! endpoints and their conversion into [`QueryResult`].

use serde::{Deserialize, Serialize};

use crate::result::{Column, DryRunEstimate, QueryMetadata, QueryResult};
use crate::warehouse::{QueryRequest, WarehouseError};

/// Body of `POST /projects/{project}/queries`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryRequestBody<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    dry_run: bool,
    use_query_cache: bool,
    // int64 fields travel as JSON strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    maximum_bytes_billed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    timeout_ms: u64,
}

impl<'a> QueryRequestBody<'a> {
    pub(crate) fn new(request: &'a QueryRequest, timeout_ms: u64) -> Self {
        Self {
            query: &request.sql,
            use_legacy_sql: false,
            dry_run: request.dry_run,
            use_query_cache: request.use_query_cache,
            maximum_bytes_billed: request.max_bytes_billed.map(|b| b.to_string()),
            location: request.location.as_deref(),
            timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobReference {
    pub job_id: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TableSchema {
    #[serde(default)]
    fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TableFieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TableCell {
    #[serde(default)]
    v: serde_json::Value,
}

impl TableCell {
    fn into_value(self) -> Option<String> {
        match self.v {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            // RECORD / REPEATED cells: keep the raw JSON.
            other => Some(other.to_string()),
        }
    }
}

/// Shared shape of `QueryResponse` and `GetQueryResultsResponse`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryResponse {
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    pub job_reference: Option<JobReference>,
    #[serde(default)]
    pub page_token: Option<String>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    total_bytes_processed: Option<String>,
    #[serde(default)]
    job_complete: Option<bool>,
    #[serde(default)]
    cache_hit: Option<bool>,
}

impl QueryResponse {
    /// `jobComplete` is only omitted for responses that have no job to wait on.
    pub(crate) fn is_complete(&self) -> bool {
        self.job_complete.unwrap_or(true)
    }

    fn bytes_processed(&self) -> Result<Option<u64>, WarehouseError> {
        self.total_bytes_processed
            .as_deref()
            .map(|s| {
                s.parse::<u64>().map_err(|_| {
                    WarehouseError::InvalidResponse(format!("totalBytesProcessed '{s}'"))
                })
            })
            .transpose()
    }

    pub(crate) fn estimate(&self) -> Result<DryRunEstimate, WarehouseError> {
        let total_bytes_processed = self.bytes_processed()?.ok_or_else(|| {
            WarehouseError::InvalidResponse("dry run response without totalBytesProcessed".into())
        })?;
        Ok(DryRunEstimate {
            total_bytes_processed,
        })
    }
}

/// Collects the pages of one completed job into a single [`QueryResult`].
#[derive(Debug, Default)]
pub(crate) struct ResultAccumulator {
    columns: Option<Vec<Column>>,
    rows: Vec<Vec<Option<String>>>,
    metadata: QueryMetadata,
}

impl ResultAccumulator {
    pub(crate) fn absorb(&mut self, page: QueryResponse) -> Result<(), WarehouseError> {
        if self.columns.is_none() {
            if let Some(schema) = page.schema.as_ref() {
                self.columns = Some(
                    schema
                        .fields
                        .iter()
                        .map(|field| Column {
                            name: field.name.clone(),
                            data_type: field.field_type.clone(),
                            mode: field.mode.clone(),
                        })
                        .collect(),
                );
            }
        }
        if let Some(bytes) = page.bytes_processed()? {
            self.metadata.total_bytes_processed = bytes;
        }
        if let Some(hit) = page.cache_hit {
            self.metadata.cache_hit = hit;
        }
        if let Some(job) = page.job_reference.as_ref() {
            self.metadata.job_id.get_or_insert_with(|| job.job_id.clone());
            if self.metadata.location.is_none() {
                self.metadata.location = job.location.clone();
            }
        }

        let width = self.columns.as_ref().map_or(0, Vec::len);
        for row in page.rows {
            if row.f.len() != width {
                return Err(WarehouseError::InvalidResponse(format!(
                    "row has {} cells, schema has {} columns",
                    row.f.len(),
                    width
                )));
            }
            self.rows
                .push(row.f.into_iter().map(TableCell::into_value).collect());
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> QueryResult {
        QueryResult::new(self.columns.unwrap_or_default(), self.rows).with_metadata(self.metadata)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
}

/// Build an [`WarehouseError::Api`] from a non-2xx response body.
pub(crate) fn api_error(status: u16, body: &str) -> WarehouseError {
    let message = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(resp) => match resp.error.errors.iter().find_map(|e| e.reason.as_deref()) {
            Some(reason) => format!("{reason}: {}", resp.error.message),
            None => resp.error.message,
        },
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    };
    WarehouseError::Api { status, message }
}
