//! Query execution tool.
//!
//! This module implements the `query` MCP tool. Statements run as given;
//! nothing is rejected for being a write.

use crate::db::ConnectionRegistry;
use crate::error::DbResult;
use crate::models::{ColumnMetadata, MAX_ROW_LIMIT, QueryParam, QueryRequest, QueryResult};
use crate::tools::format::{OutputFormat, format_as_markdown, format_as_table};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Input for the query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// Database identifier from list, create or connect
    pub id: String,
    /// SQL statement to execute. Use ? placeholders for params.
    pub sql: String,
    /// Positional parameters bound to ? placeholders
    #[serde(default)]
    pub params: Vec<QueryParam>,
    /// Maximum rows to return. Default: 1000, max: 10000
    #[serde(default)]
    pub limit: Option<u32>,
    /// Output format: "json" returns structured rows, "table" an ASCII table, "markdown" a markdown table
    #[serde(default)]
    pub format: OutputFormat,
    /// If true, decode binary columns as UTF-8 text when valid (fallback to base64). Default: false
    #[serde(default)]
    pub decode_binary: bool,
}

/// Output from the query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// Column names and types. Empty if format is table/markdown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnMetadata>,
    /// Result rows keyed by column name. Empty if format is table/markdown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// Pre-formatted output when format is table or markdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    /// True if more rows were available than the limit
    pub truncated: bool,
    /// Number of rows returned
    pub row_count: usize,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
    /// Warning message if the request was adjusted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl QueryOutput {
    pub fn from_result(result: QueryResult, format: OutputFormat, warning: Option<String>) -> Self {
        let row_count = result.row_count();
        let truncated = result.truncated;
        let execution_time_ms = result.execution_time_ms;

        let formatted = match format {
            OutputFormat::Json => None,
            OutputFormat::Table => Some(format_as_table(
                &result.columns,
                &result.rows,
                truncated,
                execution_time_ms,
            )),
            OutputFormat::Markdown => Some(format_as_markdown(
                &result.columns,
                &result.rows,
                truncated,
            )),
        };

        let (columns, rows) = if formatted.is_some() {
            (Vec::new(), Vec::new())
        } else {
            (result.columns, result.rows)
        };

        Self {
            columns,
            rows,
            formatted,
            truncated,
            row_count,
            execution_time_ms,
            warning,
        }
    }
}

pub struct QueryToolHandler {
    registry: Arc<ConnectionRegistry>,
}

impl QueryToolHandler {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub async fn query(&self, input: QueryInput) -> DbResult<QueryOutput> {
        let warning = input
            .limit
            .filter(|limit| *limit > MAX_ROW_LIMIT)
            .map(|limit| {
                format!(
                    "Requested limit {} exceeds maximum allowed ({}). Results capped to {} rows.",
                    limit, MAX_ROW_LIMIT, MAX_ROW_LIMIT
                )
            });

        let handle = self.registry.resolve(&input.id).await?;
        let mut request = QueryRequest::new(input.sql).with_params(input.params);
        request.limit = input.limit;
        request.decode_binary = input.decode_binary;
        let result = handle.execute_query(&request).await?;

        info!(
            id = %input.id,
            rows = result.row_count(),
            truncated = result.truncated,
            execution_time_ms = result.execution_time_ms,
            "Query executed"
        );

        Ok(QueryOutput::from_result(result, input.format, warning))
    }
}
