//! MCP tool implementations.
//!
//! This module contains all tool handlers:
//! - `connection`: list, create, connect, disconnect
//! - `query`: Execute statements returning rows
//! - `write`: Execute INSERT/UPDATE/DELETE/DDL
//! - `transfer`: CSV and Excel import/export
//! - `notes`: Read and write sidecar notes
//! - `format`: Table and markdown rendering of query results

pub mod connection;
pub mod format;
pub mod notes;
pub mod query;
pub mod transfer;
pub mod write;

pub use connection::{
    ConnectInput, ConnectOutput, ConnectionToolHandler, CreateInput, DisconnectInput,
    DisconnectOutput, ListOutput,
};
pub use format::OutputFormat;
pub use notes::{NotesToolHandler, ReadNotesInput, ReadNotesOutput, WriteNotesInput};
pub use query::{QueryInput, QueryOutput, QueryToolHandler};
pub use transfer::{CsvExportInput, CsvImportInput, ExcelTransferInput, TransferToolHandler};
pub use write::{UpdateInput, UpdateOutput, UpdateToolHandler};
