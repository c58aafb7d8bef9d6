//! SQLite value decoding.
//!
//! SQLite is dynamically typed: a column declared `INTEGER` may still hold
//! text. Values are therefore decoded by their runtime storage class rather
//! than the declared column type.

use crate::models::ColumnMetadata;
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Runtime storage class of a single SQLite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

impl StorageClass {
    /// Map a sqlx SQLite type name to a storage class.
    pub fn from_type_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "NULL" => Self::Null,
            "INTEGER" | "BOOLEAN" => Self::Integer,
            "REAL" | "NUMERIC" => Self::Real,
            "BLOB" => Self::Blob,
            _ => Self::Text,
        }
    }
}

/// Determine the storage class of the value at `idx`.
pub fn storage_class(row: &SqliteRow, idx: usize) -> StorageClass {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => StorageClass::Null,
        Ok(raw) => StorageClass::from_type_name(raw.type_info().name()),
        Err(e) => {
            tracing::warn!(index = idx, error = %e, "Failed to read raw SQLite value");
            StorageClass::Null
        }
    }
}

/// Decode binary data to JSON value.
///
/// If `decode_binary` is true, attempts to decode as UTF-8 text first.
/// Falls back to base64 encoding if not valid UTF-8 or if `decode_binary` is false.
pub fn decode_binary_value(bytes: &[u8], decode_binary: bool) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    if decode_binary {
        if let Ok(s) = std::str::from_utf8(bytes) {
            return JsonValue::String(s.to_string());
        }
    }
    JsonValue::String(STANDARD.encode(bytes))
}

/// Decode one column of a row into JSON.
pub fn decode_column(row: &SqliteRow, idx: usize, decode_binary: bool) -> JsonValue {
    match storage_class(row, idx) {
        StorageClass::Null => JsonValue::Null,
        StorageClass::Integer => row
            .try_get::<i64, _>(idx)
            .map(|v| JsonValue::Number(v.into()))
            .unwrap_or(JsonValue::Null),
        StorageClass::Real => match row.try_get::<f64, _>(idx) {
            Ok(v) => serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(v.to_string())),
            Err(_) => JsonValue::Null,
        },
        StorageClass::Text => row
            .try_get::<String, _>(idx)
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null),
        StorageClass::Blob => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|v| decode_binary_value(&v, decode_binary))
            .unwrap_or(JsonValue::Null),
    }
}

/// Convert a row into an ordered JSON object keyed by column name.
pub fn row_to_json(row: &SqliteRow, decode_binary: bool) -> serde_json::Map<String, JsonValue> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.name().to_string(), decode_column(row, idx, decode_binary)))
        .collect()
}

/// Column names and declared types of a result row.
pub fn column_metadata(row: &SqliteRow) -> Vec<ColumnMetadata> {
    row.columns()
        .iter()
        .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_class_from_type_name() {
        assert_eq!(StorageClass::from_type_name("INTEGER"), StorageClass::Integer);
        assert_eq!(StorageClass::from_type_name("real"), StorageClass::Real);
        assert_eq!(StorageClass::from_type_name("TEXT"), StorageClass::Text);
        assert_eq!(StorageClass::from_type_name("BLOB"), StorageClass::Blob);
        assert_eq!(StorageClass::from_type_name("NULL"), StorageClass::Null);
        assert_eq!(StorageClass::from_type_name("DATETIME"), StorageClass::Text);
    }

    #[test]
    fn test_decode_binary_value_with_valid_utf8() {
        let bytes = b"hello world";
        let result = decode_binary_value(bytes, true);
        assert_eq!(result, JsonValue::String("hello world".to_string()));

        let result = decode_binary_value(bytes, false);
        assert_eq!(result, JsonValue::String("aGVsbG8gd29ybGQ=".to_string()));
    }

    #[test]
    fn test_decode_binary_value_with_invalid_utf8() {
        let bytes: &[u8] = &[0xFF, 0xFE, 0x00, 0x01];
        assert_eq!(
            decode_binary_value(bytes, true),
            JsonValue::String("//4AAQ==".to_string())
        );
    }
}
