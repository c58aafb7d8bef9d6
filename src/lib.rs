//! Tabular MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to manage SQLite databases, move tables to and from CSV files, and keep
//! free-text notes next to files.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod notes;
pub mod tools;
pub mod transfer;
pub mod transport;

pub use config::Config;
pub use db::{ConnectionRegistry, DatabaseHandle};
pub use error::{DbError, DbResult};
pub use mcp::TabularService;
pub use notes::NotesStore;
pub use transfer::TransferEngine;
