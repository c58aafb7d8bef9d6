//! Update tool.
//!
//! This module implements the `update` MCP tool for INSERT, UPDATE, DELETE
//! and DDL statements.

use crate::db::ConnectionRegistry;
use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Input for the update tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateInput {
    /// Database identifier from list, create or connect
    pub id: String,
    /// SQL statement to execute (INSERT, UPDATE, DELETE, or DDL like CREATE/DROP/ALTER)
    pub sql: String,
    /// Positional parameters bound to ? placeholders. Without params the SQL may contain several statements.
    #[serde(default)]
    pub params: Vec<QueryParam>,
    /// Several parameter lists; the statement runs once per list in one transaction, and a failure rolls back all of them. Use instead of params.
    #[serde(default)]
    pub param_sets: Vec<Vec<QueryParam>>,
}

/// Output from the update tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct UpdateOutput {
    /// Number of rows affected, summed over all parameter sets
    pub rows_affected: u64,
    /// Times the statement was executed
    pub executions: usize,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

pub struct UpdateToolHandler {
    registry: Arc<ConnectionRegistry>,
}

impl UpdateToolHandler {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub async fn update(&self, input: UpdateInput) -> DbResult<UpdateOutput> {
        if !input.params.is_empty() && !input.param_sets.is_empty() {
            return Err(DbError::invalid_input(
                "Give either params or param_sets, not both",
            ));
        }

        let handle = self.registry.resolve(&input.id).await?;

        let start = Instant::now();
        let (rows_affected, executions) = if input.param_sets.is_empty() {
            (handle.execute_update(&input.sql, &input.params).await?, 1)
        } else {
            let affected = handle.execute_batch(&input.sql, &input.param_sets).await?;
            (affected, input.param_sets.len())
        };
        let execution_time_ms = start.elapsed().as_millis() as u64;

        info!(
            id = %input.id,
            rows_affected = rows_affected,
            executions = executions,
            execution_time_ms = execution_time_ms,
            "Update executed"
        );

        Ok(UpdateOutput {
            rows_affected,
            executions,
            execution_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_input_defaults() {
        let input: UpdateInput =
            serde_json::from_str(r#"{"id": "db", "sql": "DELETE FROM t"}"#).unwrap();
        assert_eq!(input.id, "db");
        assert!(input.params.is_empty());
        assert!(input.param_sets.is_empty());
    }

    #[test]
    fn test_update_input_param_sets() {
        let input: UpdateInput = serde_json::from_str(
            r#"{"id": "db", "sql": "INSERT INTO t VALUES (?, ?)", "param_sets": [[1, "a"], [2, null]]}"#,
        )
        .unwrap();
        assert_eq!(input.param_sets.len(), 2);
        assert_eq!(input.param_sets[1], vec![QueryParam::Int(2), QueryParam::Null]);
    }

    #[tokio::test]
    async fn test_update_rejects_params_with_param_sets() {
        let handler = UpdateToolHandler::new(Arc::new(ConnectionRegistry::new()));
        let err = handler
            .update(UpdateInput {
                id: "ghost".to_string(),
                sql: "INSERT INTO t VALUES (?)".to_string(),
                params: vec![QueryParam::Int(1)],
                param_sets: vec![vec![QueryParam::Int(2)]],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_update_unknown_database() {
        let handler = UpdateToolHandler::new(Arc::new(ConnectionRegistry::new()));
        let err = handler
            .update(UpdateInput {
                id: "ghost".to_string(),
                sql: "CREATE TABLE t (x)".to_string(),
                params: Vec::new(),
                param_sets: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_reports_affected_rows() {
        let registry = Arc::new(ConnectionRegistry::new());
        registry.connect("mem", None).await.unwrap();
        let handler = UpdateToolHandler::new(registry.clone());

        handler
            .update(UpdateInput {
                id: "mem".to_string(),
                sql: "CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2);".to_string(),
                params: Vec::new(),
                param_sets: Vec::new(),
            })
            .await
            .unwrap();

        let output = handler
            .update(UpdateInput {
                id: "mem".to_string(),
                sql: "UPDATE t SET x = x + ?".to_string(),
                params: vec![QueryParam::Int(10)],
                param_sets: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(output.rows_affected, 2);

        registry.close_all().await;
    }
}
