//! Statement parameters and query results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Rows returned by a query when the caller gives no limit.
pub const DEFAULT_ROW_LIMIT: u32 = 1000;

/// Upper bound on a caller-supplied limit.
pub const MAX_ROW_LIMIT: u32 = 10000;

/// Value bound to a `?` placeholder.
///
/// Deserialized from plain JSON scalars: `null`, `true`, `7`, `2.5`, `"x"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    /// Stored by SQLite as 0 or 1
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// A statement to run through `DatabaseHandle::execute_query`.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub sql: String,
    pub params: Vec<QueryParam>,
    /// Row limit; `None` means `DEFAULT_ROW_LIMIT`
    pub limit: Option<u32>,
    /// Return blobs as UTF-8 text where valid instead of base64
    pub decode_binary: bool,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            limit: None,
            decode_binary: false,
        }
    }

    pub fn with_params(mut self, params: Vec<QueryParam>) -> Self {
        self.params = params;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Limit actually applied: at least 1, at most `MAX_ROW_LIMIT`.
    pub fn effective_limit(&self) -> u32 {
        match self.limit {
            Some(limit) => limit.clamp(1, MAX_ROW_LIMIT),
            None => DEFAULT_ROW_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMetadata {
    pub name: String,
    /// Declared column type, or the storage class for computed columns
    pub type_name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Rows of one statement, each keyed by column name in select order.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// More rows existed beyond the limit
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// A result with no columns, as produced by statements returning nothing.
    pub fn empty(execution_time_ms: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            truncated: false,
            execution_time_ms,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
