//! Database lifecycle tools: list, create, connect, disconnect.

use crate::db::ConnectionRegistry;
use crate::error::DbResult;
use crate::models::DatabaseSummary;
use crate::notes::NotesStore;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Output for the list tool.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ListOutput {
    /// Open databases, sorted by identifier
    pub databases: Vec<DatabaseSummary>,
    /// Number of open databases
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateInput {
    /// Identifier for the new database. Must not already be in use.
    pub id: String,
    /// Path of the database file to create. Must not exist yet.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConnectInput {
    /// Identifier for the database. Must not already be in use.
    pub id: String,
    /// Path of an existing database file. Omit for a fresh in-memory database.
    #[serde(default)]
    pub path: Option<String>,
    /// If true, include the sidecar notes of the database file in the result
    #[serde(default)]
    pub read_notes: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ConnectOutput {
    #[serde(flatten)]
    pub database: DatabaseSummary,
    /// Sidecar notes keyed by note path, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<BTreeMap<String, String>>,
    /// Why notes could not be read, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DisconnectInput {
    /// Identifier of the database to close
    pub id: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DisconnectOutput {
    pub id: String,
    pub disconnected: bool,
}

pub struct ConnectionToolHandler {
    registry: Arc<ConnectionRegistry>,
    notes: NotesStore,
}

impl ConnectionToolHandler {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            notes: NotesStore::new(registry.clone()),
            registry,
        }
    }

    pub async fn list(&self) -> ListOutput {
        let databases = self.registry.list_detail().await;
        let count = databases.len();
        ListOutput { databases, count }
    }

    pub async fn create(&self, input: CreateInput) -> DbResult<DatabaseSummary> {
        self.registry.create(&input.id, Path::new(&input.path)).await
    }

    pub async fn connect(&self, input: ConnectInput) -> DbResult<ConnectOutput> {
        let path = input.path.as_deref().map(Path::new);
        let database = self.registry.connect(&input.id, path).await?;

        let (notes, notes_error) = match (input.read_notes, path) {
            (true, Some(path)) => match self.notes.notes_for_database(path).await {
                Ok(notes) => (Some(notes), None),
                Err(e) => {
                    warn!(id = %input.id, error = %e, "Failed to read database notes");
                    (None, Some(e.to_string()))
                }
            },
            (true, None) => (
                None,
                Some("In-memory databases have no file to attach notes to".to_string()),
            ),
            (false, _) => (None, None),
        };

        Ok(ConnectOutput {
            database,
            notes,
            notes_error,
        })
    }

    pub async fn disconnect(&self, input: DisconnectInput) -> DbResult<DisconnectOutput> {
        self.registry.disconnect(&input.id).await?;
        Ok(DisconnectOutput {
            id: input.id,
            disconnected: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_input_defaults() {
        let input: ConnectInput = serde_json::from_str(r#"{"id": "scratch"}"#).unwrap();
        assert!(input.path.is_none());
        assert!(!input.read_notes);
    }

    #[test]
    fn test_connect_output_flattens_summary() {
        let output = ConnectOutput {
            database: DatabaseSummary {
                id: "a".to_string(),
                backing: crate::models::BackingKind::File,
                path: Some("/tmp/a.db".to_string()),
                connected_at: "2024-01-01T00:00:00Z".to_string(),
                file_size: None,
            },
            notes: Some(BTreeMap::new()),
            notes_error: None,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["path"], "/tmp/a.db");
        assert!(json["notes"].is_object());
    }

    #[tokio::test]
    async fn test_connect_with_notes_in_memory() {
        let handler = ConnectionToolHandler::new(Arc::new(ConnectionRegistry::new()));
        let output = handler
            .connect(ConnectInput {
                id: "mem".to_string(),
                path: None,
                read_notes: true,
            })
            .await
            .unwrap();
        assert!(output.notes.is_none());
        assert!(output.notes_error.is_some());

        let listed = handler.list().await;
        assert_eq!(listed.count, 1);

        let out = handler
            .disconnect(DisconnectInput {
                id: "mem".to_string(),
            })
            .await
            .unwrap();
        assert!(out.disconnected);
    }
}
