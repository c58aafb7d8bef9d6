//! Import and export of whole tables.
//!
//! The engine reconciles a table schema with a tabular file, preserving
//! column order in both directions. CSV is the only implemented format;
//! Excel requests are rejected before any file or database is touched.

pub mod codec;
pub mod infer;

use crate::db::handle::select_all_sql;
use crate::db::{ConnectionRegistry, DatabaseHandle, quote_ident};
use crate::db::types::decode_column;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnType, QueryParam, TableSchema};
use codec::DecodedTable;
use encoding_rs::Encoding;
use futures_util::TryStreamExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

/// Placeholder used in schema mismatches when one side has no column.
pub const MISSING_COLUMN: &str = "<none>";

/// Rows buffered between the table stream and the file writer.
const EXPORT_BUFFER_ROWS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    Excel,
}

impl TableFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Excel => "excel",
        }
    }
}

impl std::fmt::Display for TableFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file column picked for import, by 0-based position or by header name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ColumnSelector {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Field delimiter. Sniffed on import and `,` on export when absent.
    pub delimiter: Option<u8>,
    /// Text encoding of an imported file. Detected when absent.
    pub encoding: Option<&'static Encoding>,
    /// File columns to import. They keep their file order.
    pub columns: Option<Vec<ColumnSelector>>,
    /// Names replacing the header of the imported columns, one per column.
    pub column_names: Option<Vec<String>>,
    /// Column types forced instead of the inferred or declared ones, keyed
    /// by the final column name.
    pub dtype: BTreeMap<String, ColumnType>,
}

impl TransferOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnSelector>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_column_names(mut self, names: Vec<String>) -> Self {
        self.column_names = Some(names);
        self
    }

    pub fn with_dtype(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.dtype.insert(column.into(), column_type);
        self
    }

    fn type_override(&self, column: &str) -> Option<ColumnType> {
        self.dtype
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, column_type)| *column_type)
    }
}

/// A column of an imported table with the type used to bind its values.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ImportedColumn {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ImportSummary {
    pub id: String,
    pub table_name: String,
    pub file_path: String,
    pub rows_imported: u64,
    pub columns: Vec<ImportedColumn>,
    /// True when the table did not exist and was created from the file header.
    pub created_table: bool,
    pub delimiter: String,
    /// Encoding the file was decoded with
    pub encoding: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExportSummary {
    pub id: String,
    pub table_name: String,
    pub file_path: String,
    pub rows_exported: u64,
    pub columns: Vec<String>,
    pub delimiter: String,
}

#[derive(Debug, Clone)]
pub struct TransferEngine {
    registry: Arc<ConnectionRegistry>,
}

impl TransferEngine {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Load a file into `table`, creating the table when it does not exist.
    ///
    /// Rows are inserted one statement at a time without a surrounding
    /// transaction; on failure, rows inserted before the failing one remain.
    pub async fn import_table(
        &self,
        id: &str,
        table: &str,
        file_path: &Path,
        format: TableFormat,
        options: &TransferOptions,
    ) -> DbResult<ImportSummary> {
        ensure_implemented(format, "import")?;
        validate_table_name(table)?;

        let handle = self.registry.resolve(id).await?;
        let mut decoded = read_file(file_path, options).await?;
        shape_columns(&mut decoded, options)?;

        let (columns, created_table) = if handle.table_exists(table).await? {
            let schema = handle.table_schema(table).await?;
            reconcile(&schema, &decoded.headers)?;
            let columns = schema
                .columns
                .iter()
                .map(|c| ImportedColumn {
                    name: c.name.clone(),
                    column_type: options.type_override(&c.name).unwrap_or(c.column_type),
                })
                .collect::<Vec<_>>();
            (columns, false)
        } else {
            let columns = infer::infer_schema(&decoded.headers, &decoded.rows)
                .into_iter()
                .map(|(name, inferred)| ImportedColumn {
                    column_type: options.type_override(&name).unwrap_or(inferred),
                    name,
                })
                .collect::<Vec<_>>();
            handle
                .execute_update(&create_table_sql(table, &columns), &[])
                .await?;
            info!(id = %id, table = %table, columns = columns.len(), "Created table");
            (columns, true)
        };

        let rows_imported = insert_rows(&handle, table, &columns, &decoded.rows).await?;

        info!(
            id = %id,
            table = %table,
            file = %file_path.display(),
            rows = rows_imported,
            "Imported table"
        );

        Ok(ImportSummary {
            id: id.to_string(),
            table_name: table.to_string(),
            file_path: file_path.display().to_string(),
            rows_imported,
            columns,
            created_table,
            delimiter: codec::delimiter_name(decoded.delimiter),
            encoding: decoded.encoding.name().to_string(),
        })
    }

    /// Write every row of `table` to a file, replacing any existing file.
    pub async fn export_table(
        &self,
        id: &str,
        table: &str,
        file_path: &Path,
        format: TableFormat,
        options: &TransferOptions,
    ) -> DbResult<ExportSummary> {
        ensure_implemented(format, "export")?;
        validate_table_name(table)?;

        let handle = self.registry.resolve(id).await?;
        let schema = handle.table_schema(table).await?;
        let delimiter = options.delimiter.unwrap_or(codec::DEFAULT_DELIMITER);

        let columns: Vec<String> = schema.column_names().into_iter().map(String::from).collect();

        let (tx, rx) = mpsc::channel(EXPORT_BUFFER_ROWS);
        let writer = tokio::task::spawn_blocking({
            let path = file_path.to_path_buf();
            let header = columns.clone();
            move || codec::write_csv(&path, delimiter, &header, rx)
        });

        let streamed = feed_rows(&handle, &select_all_sql(&schema), schema.len(), tx).await;
        let written = writer.await.map_err(worker_failed)?;
        streamed?;
        let rows_exported = written?;

        info!(
            id = %id,
            table = %table,
            file = %file_path.display(),
            rows = rows_exported,
            "Exported table"
        );

        Ok(ExportSummary {
            id: id.to_string(),
            table_name: table.to_string(),
            file_path: file_path.display().to_string(),
            rows_exported,
            columns,
            delimiter: codec::delimiter_name(delimiter),
        })
    }
}

/// Decode a CSV file on the blocking pool.
async fn read_file(file_path: &Path, options: &TransferOptions) -> DbResult<DecodedTable> {
    let path = file_path.to_path_buf();
    let delimiter = options.delimiter;
    let encoding = options.encoding;
    tokio::task::spawn_blocking(move || codec::read_csv(&path, delimiter, encoding))
        .await
        .map_err(worker_failed)?
}

/// Send every row of the table to the file writer.
///
/// Stops early when the writer has gone away; its error is reported by the
/// caller.
async fn feed_rows(
    handle: &DatabaseHandle,
    select: &str,
    width: usize,
    tx: mpsc::Sender<Vec<String>>,
) -> DbResult<()> {
    let mut rows = handle.stream_table(select);
    while let Some(row) = rows.try_next().await? {
        let fields = (0..width)
            .map(|idx| codec::field_from_value(&decode_column(&row, idx, false)))
            .collect();
        if tx.send(fields).await.is_err() {
            debug!(id = %handle.id(), "CSV writer stopped early");
            break;
        }
    }
    Ok(())
}

fn worker_failed(err: JoinError) -> DbError {
    DbError::internal(format!("CSV worker task failed: {}", err))
}

/// Apply column selection, renames and type overrides to a decoded file.
pub fn shape_columns(decoded: &mut DecodedTable, options: &TransferOptions) -> DbResult<()> {
    if let Some(selectors) = &options.columns {
        let indices = select_columns(&decoded.headers, selectors)?;
        decoded.headers = indices.iter().map(|&idx| decoded.headers[idx].clone()).collect();
        for row in &mut decoded.rows {
            let mut cells = std::mem::take(row);
            *row = indices
                .iter()
                .map(|&idx| cells.get_mut(idx).map(std::mem::take).unwrap_or_default())
                .collect();
        }
    }

    if let Some(names) = &options.column_names {
        if names.len() != decoded.headers.len() {
            return Err(DbError::invalid_input(format!(
                "column_names has {} names for {} imported columns",
                names.len(),
                decoded.headers.len()
            )));
        }
        let mut seen = HashSet::new();
        for name in names {
            if name.trim().is_empty() {
                return Err(DbError::invalid_input("column_names cannot contain an empty name"));
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(DbError::invalid_input(format!(
                    "column_names has duplicate name '{}'",
                    name
                )));
            }
        }
        decoded.headers = names.clone();
    }

    if let Some(unknown) = options
        .dtype
        .keys()
        .find(|key| !decoded.headers.iter().any(|h| h.eq_ignore_ascii_case(key)))
    {
        return Err(DbError::invalid_input(format!(
            "dtype names column '{}', which is not imported",
            unknown
        )));
    }
    Ok(())
}

/// Resolve selectors to header positions, in file order.
fn select_columns(headers: &[String], selectors: &[ColumnSelector]) -> DbResult<Vec<usize>> {
    if selectors.is_empty() {
        return Err(DbError::invalid_input("columns must select at least one column"));
    }

    let mut indices = Vec::with_capacity(selectors.len());
    for selector in selectors {
        let idx = match selector {
            ColumnSelector::Index(idx) if *idx < headers.len() => *idx,
            ColumnSelector::Index(idx) => {
                return Err(DbError::invalid_input(format!(
                    "Column index {} is out of range; the file has {} columns",
                    idx,
                    headers.len()
                )));
            }
            ColumnSelector::Name(name) => headers
                .iter()
                .position(|h| h == name)
                .or_else(|| headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
                .ok_or_else(|| {
                    DbError::invalid_input(format!("Column '{}' is not in the file header", name))
                })?,
        };
        if indices.contains(&idx) {
            return Err(DbError::invalid_input(format!(
                "Column '{}' is selected more than once",
                headers[idx]
            )));
        }
        indices.push(idx);
    }

    indices.sort_unstable();
    Ok(indices)
}

fn ensure_implemented(format: TableFormat, direction: &str) -> DbResult<()> {
    match format {
        TableFormat::Csv => Ok(()),
        TableFormat::Excel => Err(DbError::not_implemented(
            format!("{}_excel", direction),
            "Excel files are not supported yet; use CSV instead",
        )),
    }
}

fn validate_table_name(table: &str) -> DbResult<()> {
    if table.trim().is_empty() {
        return Err(DbError::invalid_input("Table name cannot be empty"));
    }
    Ok(())
}

/// Check that file headers line up with the table's columns.
///
/// Names are compared position by position, ignoring ASCII case. The first
/// differing position is reported; when one side is shorter its missing name
/// is reported as `<none>`.
pub fn reconcile(schema: &TableSchema, headers: &[String]) -> DbResult<()> {
    let width = schema.len().max(headers.len());
    for position in 0..width {
        let expected = schema.columns.get(position).map(|c| c.name.as_str());
        let found = headers.get(position).map(String::as_str);
        match (expected, found) {
            (Some(e), Some(f)) if e.eq_ignore_ascii_case(f) => {}
            _ => {
                return Err(DbError::schema_mismatch(
                    &schema.table_name,
                    position,
                    expected.unwrap_or(MISSING_COLUMN),
                    found.unwrap_or(MISSING_COLUMN),
                ));
            }
        }
    }
    Ok(())
}

/// `CREATE TABLE` for columns in file order.
pub fn create_table_sql(table: &str, columns: &[ImportedColumn]) -> String {
    let definitions = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", quote_ident(table), definitions)
}

fn insert_sql(table: &str, columns: &[ImportedColumn]) -> String {
    let names = columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names,
        placeholders
    )
}

async fn insert_rows(
    handle: &DatabaseHandle,
    table: &str,
    columns: &[ImportedColumn],
    rows: &[Vec<String>],
) -> DbResult<u64> {
    let sql = insert_sql(table, columns);
    let mut inserted = 0u64;

    for row in rows {
        let params: Vec<QueryParam> = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let cell = row.get(idx).map(String::as_str).unwrap_or("");
                infer::coerce_cell(cell, column.column_type)
            })
            .collect();

        if let Err(e) = handle.execute_update(&sql, &params).await {
            warn!(
                id = %handle.id(),
                table = %table,
                rows_inserted = inserted,
                error = %e,
                "Import stopped partway"
            );
            return Err(e);
        }
        inserted += 1;
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnDefinition;

    fn schema(names: &[&str]) -> TableSchema {
        TableSchema {
            table_name: "people".to_string(),
            columns: names
                .iter()
                .map(|n| ColumnDefinition::new(*n, "TEXT"))
                .collect(),
        }
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_reconcile_accepts_case_difference() {
        assert!(reconcile(&schema(&["id", "Name"]), &headers(&["ID", "name"])).is_ok());
    }

    #[test]
    fn test_reconcile_reports_first_conflict() {
        let err = reconcile(&schema(&["id", "name"]), &headers(&["name", "id"])).unwrap_err();
        match err {
            DbError::SchemaMismatch {
                position,
                expected,
                found,
                ..
            } => {
                assert_eq!(position, 0);
                assert_eq!(expected, "id");
                assert_eq!(found, "name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reconcile_count_mismatch() {
        let err = reconcile(&schema(&["id", "name"]), &headers(&["id"])).unwrap_err();
        match err {
            DbError::SchemaMismatch {
                position, found, ..
            } => {
                assert_eq!(position, 1);
                assert_eq!(found, MISSING_COLUMN);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_create_table_sql() {
        let columns = vec![
            ImportedColumn {
                name: "id".to_string(),
                column_type: ColumnType::Integer,
            },
            ImportedColumn {
                name: "full name".to_string(),
                column_type: ColumnType::Text,
            },
        ];
        assert_eq!(
            create_table_sql("people", &columns),
            "CREATE TABLE \"people\" (\"id\" INTEGER, \"full name\" TEXT)"
        );
        assert_eq!(
            insert_sql("people", &columns),
            "INSERT INTO \"people\" (\"id\", \"full name\") VALUES (?, ?)"
        );
    }

    fn decoded() -> DecodedTable {
        DecodedTable {
            headers: headers(&["id", "name", "code"]),
            rows: vec![
                headers(&["1", "Ann", "007"]),
                headers(&["2", "Bob", "042"]),
            ],
            delimiter: b',',
            encoding: encoding_rs::UTF_8,
        }
    }

    #[test]
    fn test_shape_selects_in_file_order() {
        let mut table = decoded();
        let options = TransferOptions::default().with_columns(vec![
            ColumnSelector::Name("CODE".to_string()),
            ColumnSelector::Index(0),
        ]);
        shape_columns(&mut table, &options).unwrap();
        assert_eq!(table.headers, headers(&["id", "code"]));
        assert_eq!(table.rows[1], headers(&["2", "042"]));
    }

    #[test]
    fn test_shape_renames_selected_columns() {
        let mut table = decoded();
        let options = TransferOptions::default()
            .with_columns(vec![ColumnSelector::Index(1)])
            .with_column_names(vec!["full name".to_string()])
            .with_dtype("Full Name", ColumnType::Text);
        shape_columns(&mut table, &options).unwrap();
        assert_eq!(table.headers, headers(&["full name"]));
        assert_eq!(table.rows[0], headers(&["Ann"]));
        assert_eq!(options.type_override("full name"), Some(ColumnType::Text));
    }

    #[test]
    fn test_shape_rejects_bad_options() {
        let cases = [
            TransferOptions::default().with_columns(vec![ColumnSelector::Index(3)]),
            TransferOptions::default().with_columns(vec![ColumnSelector::Name("age".to_string())]),
            TransferOptions::default()
                .with_columns(vec![ColumnSelector::Index(0), ColumnSelector::Name("id".to_string())]),
            TransferOptions::default().with_columns(Vec::new()),
            TransferOptions::default().with_column_names(vec!["a".to_string()]),
            TransferOptions::default().with_column_names(
                ["a", "A", "b"].iter().map(|n| n.to_string()).collect(),
            ),
            TransferOptions::default().with_dtype("missing", ColumnType::Integer),
        ];
        for options in cases {
            let err = shape_columns(&mut decoded(), &options).unwrap_err();
            assert!(matches!(err, DbError::InvalidInput { .. }), "{options:?}");
        }
    }

    #[tokio::test]
    async fn test_excel_not_implemented_without_touching_anything() {
        let engine = TransferEngine::new(Arc::new(ConnectionRegistry::new()));
        let err = engine
            .import_table(
                "missing",
                "t",
                Path::new("/nonexistent.xlsx"),
                TableFormat::Excel,
                &TransferOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotImplemented { .. }));
    }
}
