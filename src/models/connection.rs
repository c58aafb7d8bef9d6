//! Connection-related data models.
//!
//! This module defines how a registered database is backed and the summary
//! reported to callers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Storage backing a database handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backing {
    /// SQLite file on disk
    File(PathBuf),
    /// Transient database discarded on disconnect
    InMemory,
}

impl Backing {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::InMemory => None,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self, Self::InMemory)
    }

    pub fn kind(&self) -> BackingKind {
        match self {
            Self::File(_) => BackingKind::File,
            Self::InMemory => BackingKind::Memory,
        }
    }
}

impl std::fmt::Display for Backing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::InMemory => write!(f, ":memory:"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackingKind {
    File,
    Memory,
}

/// Database information returned by list/connect/create.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseSummary {
    /// Identifier to pass as `id` in all other tool calls.
    pub id: String,
    /// "file" for databases on disk, "memory" for transient in-memory databases.
    pub backing: BackingKind,
    /// Database file path. Absent for in-memory databases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Time the handle was opened (RFC 3339, UTC).
    pub connected_at: String,
    /// Human-readable size of the database file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
}
