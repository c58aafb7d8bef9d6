//! Error types for the Tabular MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each variant carries the offending identifier, path, or column so that an AI
//! assistant can act on the failure without guessing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{resource} '{name}' already exists")]
    AlreadyExists { resource: String, name: String },

    #[error("{resource} '{name}' not found")]
    NotFound { resource: String, name: String },

    #[error(
        "Schema mismatch importing into '{table}' at column position {position}: expected '{expected}', found '{found}'"
    )]
    SchemaMismatch {
        table: String,
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// SQLite extended result code, e.g. "1" or "2067"
        code: Option<String>,
        suggestion: String,
    },

    #[error("Not supported: {operation} - {reason}")]
    NotSupported { operation: String, reason: String },

    #[error("Not implemented: {operation} - {reason}")]
    NotImplemented { operation: String, reason: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },

    #[error("CSV error in '{path}': {message}")]
    Csv { path: String, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create an already-exists error for any kind of resource.
    pub fn already_exists(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
            name: name.into(),
        }
    }

    /// Create a not-found error for any kind of resource.
    pub fn not_found(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            name: name.into(),
        }
    }

    /// Unknown or already disconnected database identifier.
    pub fn database_not_found(id: impl Into<String>) -> Self {
        Self::not_found("Database", id)
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::not_found("File", path)
    }

    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::not_found("Table", table)
    }

    /// Create a schema mismatch error for an import into an existing table.
    pub fn schema_mismatch(
        table: impl Into<String>,
        position: usize,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::SchemaMismatch {
            table: table.into(),
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a query error with optional SQLite result code.
    pub fn query(
        message: impl Into<String>,
        code: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Query {
            message: message.into(),
            code,
            suggestion: suggestion.into(),
        }
    }

    pub fn not_supported(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn not_implemented(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Wrap an I/O failure on a specific path.
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    /// Wrap a CSV decoding or encoding failure on a specific path.
    pub fn csv(path: impl AsRef<std::path::Path>, err: csv::Error) -> Self {
        Self::Csv {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => "already_exists",
            Self::NotFound { .. } => "not_found",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::Query { .. } => "query_error",
            Self::NotSupported { .. } => "not_supported",
            Self::NotImplemented { .. } => "not_implemented",
            Self::Connection { .. } => "connection",
            Self::Io { .. } => "io",
            Self::Csv { .. } => "csv",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Internal { .. } => "internal",
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Query { suggestion, .. } => Some(suggestion),
            Self::NotFound { resource, .. } if resource == "Database" => {
                Some("Call `list` to see open databases, or `connect` first")
            }
            Self::AlreadyExists { resource, .. } if resource == "Database" => {
                Some("Disconnect first or choose a different identifier")
            }
            Self::SchemaMismatch { .. } => Some(
                "Reorder the file columns to match the table, or import into a new table",
            ),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the database file path and that it is a SQLite database",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::query(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced tables and columns",
                )
            }
            sqlx::Error::RowNotFound => DbError::query(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out waiting for the database connection",
                "Another long-running operation may hold the connection; retry when it completes",
            ),
            sqlx::Error::PoolClosed => DbError::connection(
                "Database handle is closed",
                "Connect to the database again",
            ),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check that the database file is accessible and not locked",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check that the file is a valid SQLite database",
            ),
            sqlx::Error::ColumnNotFound(col) => DbError::query(
                format!("Column not found: {}", col),
                None,
                "Check the column names of the table",
            ),
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Build the structured `data` payload attached to MCP errors.
fn error_data(err: &DbError) -> Option<serde_json::Value> {
    let mut data = serde_json::json!({ "kind": err.kind() });
    if let Some(suggestion) = err.suggestion() {
        data["suggestion"] = serde_json::Value::String(suggestion.to_string());
    }
    if let DbError::SchemaMismatch { position, .. } = err {
        data["position"] = serde_json::json!(position);
    }
    Some(data)
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = error_data(&err);
        match &err {
            DbError::NotFound { .. } => rmcp::ErrorData::resource_not_found(err.to_string(), data),

            DbError::AlreadyExists { .. }
            | DbError::SchemaMismatch { .. }
            | DbError::NotSupported { .. }
            | DbError::Csv { .. }
            | DbError::InvalidInput { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), data)
            }

            DbError::Query { message, code, .. } => {
                let msg = match code {
                    Some(code) => format!("Query failed: {} (SQLite code: {})", message, code),
                    None => err.to_string(),
                };
                rmcp::ErrorData::invalid_params(msg, data)
            }

            DbError::NotImplemented { .. }
            | DbError::Connection { .. }
            | DbError::Io { .. }
            | DbError::Internal { .. } => rmcp::ErrorData::internal_error(err.to_string(), data),
        }
    }
}
