//! Open database handles.
//!
//! A `DatabaseHandle` wraps one SQLite pool, either backed by a file or by a
//! transient in-memory database, and exposes SQL execution and table
//! introspection. Handles are owned by the `ConnectionRegistry`; other
//! components receive a clone for the duration of a single operation.

use crate::db::params::{bind_all, quote_ident};
use crate::db::types::{column_metadata, row_to_json};
use crate::error::{DbError, DbResult};
use crate::models::{
    Backing, ColumnDefinition, DatabaseSummary, QueryParam, QueryRequest, QueryResult,
    TableSchema,
};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const LIST_TABLES: &str = r#"
    SELECT name FROM sqlite_master
    WHERE type = 'table'
    AND name NOT LIKE 'sqlite_%'
    ORDER BY name
"#;

const TABLE_EXISTS: &str = r#"
    SELECT COUNT(*) FROM sqlite_master
    WHERE type IN ('table', 'view')
    AND name = ?1 COLLATE NOCASE
"#;

#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    id: String,
    backing: Backing,
    pool: SqlitePool,
    connected_at: DateTime<Utc>,
}

impl DatabaseHandle {
    /// Open an existing SQLite file.
    ///
    /// The file header is read once so that a path pointing at something other
    /// than a SQLite database fails here rather than on the first query.
    pub async fn open_file(
        id: impl Into<String>,
        path: &Path,
        acquire_timeout: Duration,
    ) -> DbResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| {
                DbError::connection(
                    format!("Failed to open '{}': {}", path.display(), e),
                    connection_suggestion(&e),
                )
            })?;

        if let Err(e) = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sqlite_master")
            .fetch_one(&pool)
            .await
        {
            pool.close().await;
            return Err(DbError::connection(
                format!("Failed to read '{}': {}", path.display(), e),
                connection_suggestion(&e),
            ));
        }

        let handle = Self {
            id: id.into(),
            backing: Backing::File(path.to_path_buf()),
            pool,
            connected_at: Utc::now(),
        };
        handle.log_engine_version().await;
        Ok(handle)
    }

    /// Open a fresh in-memory database.
    ///
    /// The pool is pinned to a single connection that is never recycled, so
    /// the database lives exactly as long as the handle.
    pub async fn open_in_memory(
        id: impl Into<String>,
        acquire_timeout: Duration,
    ) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| {
                DbError::connection(
                    format!("Failed to open in-memory database: {}", e),
                    connection_suggestion(&e),
                )
            })?;

        let handle = Self {
            id: id.into(),
            backing: Backing::InMemory,
            pool,
            connected_at: Utc::now(),
        };
        handle.log_engine_version().await;
        Ok(handle)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Caller-facing summary of this handle.
    pub fn summary(&self) -> DatabaseSummary {
        let path = self.backing.path();
        let file_size = path
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| humansize::format_size(m.len(), humansize::BINARY));

        DatabaseSummary {
            id: self.id.clone(),
            backing: self.backing.kind(),
            path: path.map(|p| p.display().to_string()),
            connected_at: self.connected_at.to_rfc3339(),
            file_size,
        }
    }

    /// Run a statement expected to return rows.
    ///
    /// Read-only intent is not enforced; whatever SQLite accepts is executed.
    pub async fn execute_query(&self, request: &QueryRequest) -> DbResult<QueryResult> {
        let start = Instant::now();
        let row_limit = request.effective_limit();
        let fetch_limit = row_limit as usize + 1;

        debug!(
            id = %self.id,
            sql = %request.sql,
            params = request.params.len(),
            limit = row_limit,
            "Executing query"
        );

        // Without params, run as a raw batch so multi-statement SQL works
        let results = if request.params.is_empty() {
            use sqlx::Executor;
            self.pool
                .fetch(request.sql.as_str())
                .take(fetch_limit)
                .collect::<Vec<_>>()
                .await
        } else {
            bind_all(&request.sql, &request.params)
                .fetch(&self.pool)
                .take(fetch_limit)
                .collect::<Vec<_>>()
                .await
        };

        let rows = collect_rows(results)?;
        Ok(process_rows(rows, row_limit, start, request.decode_binary))
    }

    /// Run a statement and return the number of affected rows.
    pub async fn execute_update(&self, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        debug!(id = %self.id, sql = %sql, params = params.len(), "Executing update");

        let result = if params.is_empty() {
            use sqlx::Executor;
            self.pool.execute(sql).await
        } else {
            bind_all(sql, params).execute(&self.pool).await
        };

        Ok(result?.rows_affected())
    }

    /// Run one statement once per parameter set inside a single transaction.
    ///
    /// Returns the affected rows summed over all executions. If any execution
    /// fails the transaction is rolled back and nothing is kept.
    pub async fn execute_batch(&self, sql: &str, param_sets: &[Vec<QueryParam>]) -> DbResult<u64> {
        debug!(id = %self.id, sql = %sql, sets = param_sets.len(), "Executing batch update");

        let mut tx = self.pool.begin().await?;
        let mut rows_affected = 0u64;
        for (set, params) in param_sets.iter().enumerate() {
            match bind_all(sql, params).execute(&mut *tx).await {
                Ok(result) => rows_affected += result.rows_affected(),
                Err(e) => {
                    warn!(id = %self.id, set = set, error = %e, "Batch update failed, rolling back");
                    tx.rollback().await?;
                    return Err(e.into());
                }
            }
        }
        tx.commit().await?;

        Ok(rows_affected)
    }

    /// Ordered column list of a table or view.
    pub async fn table_schema(&self, table: &str) -> DbResult<TableSchema> {
        let pragma = format!("PRAGMA table_info({})", quote_ident(table));
        let rows = sqlx::query(&pragma).fetch_all(&self.pool).await?;

        if rows.is_empty() {
            return Err(DbError::table_not_found(table));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("name")?;
            let declared: String = row.try_get::<Option<String>, _>("type")?.unwrap_or_default();
            let notnull: i64 = row.try_get("notnull")?;
            let pk: i64 = row.try_get("pk")?;

            columns.push(
                ColumnDefinition::new(name, declared)
                    .with_nullable(notnull == 0)
                    .with_primary_key(pk > 0),
            );
        }

        Ok(TableSchema {
            table_name: table.to_string(),
            columns,
        })
    }

    pub async fn table_exists(&self, table: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(TABLE_EXISTS)
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn list_tables(&self) -> DbResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(LIST_TABLES)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    /// Stream every row of a table without buffering the whole result.
    ///
    /// `select` is the statement built by [`select_all_sql`] for the table.
    pub fn stream_table<'a>(
        &'a self,
        select: &'a str,
    ) -> BoxStream<'a, Result<SqliteRow, sqlx::Error>> {
        sqlx::query(select).fetch(&self.pool)
    }

    /// Close the underlying pool. In-memory data is gone after this returns.
    pub(crate) async fn close(&self) {
        self.pool.close().await;
    }

    async fn log_engine_version(&self) {
        match sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await
        {
            Ok(version) => debug!(id = %self.id, version = %version, "Got SQLite version"),
            Err(e) => warn!(id = %self.id, error = %e, "Failed to get SQLite version"),
        }
    }
}

/// Full-table select listing the schema's columns in order.
pub fn select_all_sql(schema: &TableSchema) -> String {
    let columns = schema
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} FROM {}", columns, quote_ident(&schema.table_name))
}

fn collect_rows(results: Vec<Result<SqliteRow, sqlx::Error>>) -> DbResult<Vec<SqliteRow>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(DbError::from)?);
    }
    Ok(rows)
}

/// Turn fetched rows into a QueryResult, dropping the sentinel row past the limit.
fn process_rows(
    rows: Vec<SqliteRow>,
    row_limit: u32,
    start: Instant,
    decode_binary: bool,
) -> QueryResult {
    let execution_time_ms = start.elapsed().as_millis() as u64;

    let Some(first) = rows.first() else {
        return QueryResult::empty(execution_time_ms);
    };

    let columns = column_metadata(first);
    let truncated = rows.len() > row_limit as usize;
    let json_rows = rows
        .iter()
        .take(row_limit as usize)
        .map(|r| row_to_json(r, decode_binary))
        .collect();

    if truncated {
        warn!(limit = row_limit, "Query result truncated");
    }

    QueryResult {
        columns,
        rows: json_rows,
        truncated,
        execution_time_ms,
    }
}

/// Generate a helpful suggestion for open failures.
fn connection_suggestion(error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("not a database") {
        return "The file exists but is not a SQLite database".to_string();
    }
    if error_str.contains("locked") || error_str.contains("busy") {
        return "The database is locked by another process; close it and retry".to_string();
    }
    if error_str.contains("unable to open") || error_str.contains("permission") {
        return "Check that the file path exists and is readable and writable".to_string();
    }
    "Verify the file path points to an accessible SQLite database".to_string()
}
