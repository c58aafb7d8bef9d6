//! Data models shared by the registry, transfer engine and tools.

pub mod connection;
pub mod query;
pub mod schema;

pub use connection::{Backing, BackingKind, DatabaseSummary};
pub use query::{
    ColumnMetadata, DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, QueryParam, QueryRequest, QueryResult,
};
pub use schema::{ColumnDefinition, ColumnType, TableSchema};
