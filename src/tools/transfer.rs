//! Table import and export tools.

use crate::error::DbResult;
use crate::models::ColumnType;
use crate::transfer::codec::{parse_delimiter, parse_encoding};
use crate::transfer::{
    ColumnSelector, ExportSummary, ImportSummary, TableFormat, TransferEngine, TransferOptions,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Input for import_csv.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CsvImportInput {
    /// Database identifier from list, create or connect
    pub id: String,
    /// Table to import into; created from the file header when missing
    pub table_name: String,
    /// Path of the CSV file
    pub file_path: String,
    /// Field delimiter, a single character or "\t". Sniffed from the header when omitted.
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Text encoding such as "utf-8", "latin1" or "utf-16". Detected when omitted.
    #[serde(default)]
    pub encoding: Option<String>,
    /// Columns to import, as header names or 0-based positions. They keep their file order. All columns when omitted.
    #[serde(default)]
    pub columns: Option<Vec<ColumnSelector>>,
    /// Table column names replacing the file header, one per imported column
    #[serde(default)]
    pub column_names: Option<Vec<String>>,
    /// Types forcing how columns are created and bound, keyed by table column name: integer, float, date, boolean or text
    #[serde(default)]
    pub dtype: BTreeMap<String, ColumnType>,
}

/// Input for export_csv.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CsvExportInput {
    /// Database identifier from list, create or connect
    pub id: String,
    /// Table to export
    pub table_name: String,
    /// Path of the CSV file, overwritten if it exists
    pub file_path: String,
    /// Field delimiter, a single character or "\t". Defaults to ",".
    #[serde(default)]
    pub delimiter: Option<String>,
}

/// Input for import_excel and export_excel.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExcelTransferInput {
    /// Database identifier from list, create or connect
    pub id: String,
    /// Table to import into or export from
    pub table_name: String,
    /// Path of the Excel workbook
    pub file_path: String,
}

pub struct TransferToolHandler {
    engine: TransferEngine,
}

impl TransferToolHandler {
    pub fn new(engine: TransferEngine) -> Self {
        Self { engine }
    }

    pub async fn import_csv(&self, input: CsvImportInput) -> DbResult<ImportSummary> {
        let mut options = csv_options(input.delimiter.as_deref())?;
        if let Some(label) = input.encoding.as_deref().filter(|l| !l.trim().is_empty()) {
            options = options.with_encoding(parse_encoding(label)?);
        }
        if let Some(columns) = input.columns {
            options = options.with_columns(columns);
        }
        if let Some(names) = input.column_names {
            options = options.with_column_names(names);
        }
        options.dtype = input.dtype;

        self.engine
            .import_table(
                &input.id,
                &input.table_name,
                Path::new(&input.file_path),
                TableFormat::Csv,
                &options,
            )
            .await
    }

    pub async fn export_csv(&self, input: CsvExportInput) -> DbResult<ExportSummary> {
        let options = csv_options(input.delimiter.as_deref())?;
        self.engine
            .export_table(
                &input.id,
                &input.table_name,
                Path::new(&input.file_path),
                TableFormat::Csv,
                &options,
            )
            .await
    }

    pub async fn import_excel(&self, input: ExcelTransferInput) -> DbResult<ImportSummary> {
        self.engine
            .import_table(
                &input.id,
                &input.table_name,
                Path::new(&input.file_path),
                TableFormat::Excel,
                &TransferOptions::default(),
            )
            .await
    }

    pub async fn export_excel(&self, input: ExcelTransferInput) -> DbResult<ExportSummary> {
        self.engine
            .export_table(
                &input.id,
                &input.table_name,
                Path::new(&input.file_path),
                TableFormat::Excel,
                &TransferOptions::default(),
            )
            .await
    }
}

fn csv_options(delimiter: Option<&str>) -> DbResult<TransferOptions> {
    let mut options = TransferOptions::default();
    if let Some(delimiter) = delimiter {
        options = options.with_delimiter(parse_delimiter(delimiter)?);
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConnectionRegistry;
    use crate::error::DbError;
    use std::sync::Arc;

    #[test]
    fn test_csv_options() {
        assert_eq!(csv_options(None).unwrap().delimiter, None);
        assert_eq!(csv_options(Some(";")).unwrap().delimiter, Some(b';'));
        assert!(csv_options(Some("ab")).is_err());
    }

    #[test]
    fn test_csv_import_input_defaults() {
        let input: CsvImportInput = serde_json::from_str(
            r#"{"id": "db", "table_name": "t", "file_path": "/tmp/t.csv"}"#,
        )
        .unwrap();
        assert!(input.delimiter.is_none());
        assert!(input.encoding.is_none());
        assert!(input.columns.is_none());
        assert!(input.dtype.is_empty());
    }

    #[test]
    fn test_csv_import_input_options() {
        let input: CsvImportInput = serde_json::from_str(
            r#"{"id": "db", "table_name": "t", "file_path": "/tmp/t.csv",
                "encoding": "latin1", "columns": [2, "name"],
                "column_names": ["code", "label"], "dtype": {"code": "text"}}"#,
        )
        .unwrap();
        assert_eq!(
            input.columns.unwrap(),
            vec![ColumnSelector::Index(2), ColumnSelector::Name("name".to_string())]
        );
        assert_eq!(input.column_names.unwrap(), vec!["code", "label"]);
        assert_eq!(input.dtype["code"], ColumnType::Text);
    }

    #[tokio::test]
    async fn test_import_rejects_unknown_encoding() {
        let handler =
            TransferToolHandler::new(TransferEngine::new(Arc::new(ConnectionRegistry::new())));
        let err = handler
            .import_csv(CsvImportInput {
                id: "db".to_string(),
                table_name: "t".to_string(),
                file_path: "/tmp/t.csv".to_string(),
                delimiter: None,
                encoding: Some("no-such-charset".to_string()),
                columns: None,
                column_names: None,
                dtype: BTreeMap::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }
}
