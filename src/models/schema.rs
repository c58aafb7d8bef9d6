//! Schema-related data models.
//!
//! This module defines the closed set of column types used when moving data
//! between tables and flat files, and the ordered table schema read from SQLite.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Logical column type.
///
/// Inferred CSV columns only ever produce `Integer`, `Float`, `Date` or `Text`;
/// `Boolean` is recognised from existing table declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Date,
    Boolean,
    Text,
}

impl ColumnType {
    /// SQL type used when creating a table from an inferred schema.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Float => "REAL",
            Self::Date => "DATE",
            Self::Boolean => "BOOLEAN",
            Self::Text => "TEXT",
        }
    }

    /// Classify a declared SQLite column type.
    ///
    /// Follows SQLite's affinity rules, with BOOL and DATE/TIME recognised
    /// before the generic numeric fallback.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();

        if upper.contains("BOOL") {
            return Self::Boolean;
        }
        if upper.contains("INT") {
            return Self::Integer;
        }
        if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            return Self::Text;
        }
        if upper.contains("DATE") || upper.contains("TIME") {
            return Self::Date;
        }
        // Untyped columns (BLOB affinity) take values as given
        if upper.is_empty() || upper.contains("BLOB") {
            return Self::Text;
        }
        // REAL, FLOAT, DOUBLE, NUMERIC, DECIMAL
        Self::Float
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Text => "text",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDefinition {
    pub name: String,
    /// Type as declared in the table definition (may be empty in SQLite)
    pub declared_type: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnDefinition {
    /// Create a column definition from its declared SQL type.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        Self {
            name: name.into(),
            column_type: ColumnType::from_declared(&declared_type),
            declared_type,
            nullable: true,
            primary_key: false,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }
}

/// Ordered column list of one table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_declared_affinity() {
        assert_eq!(ColumnType::from_declared("INTEGER"), ColumnType::Integer);
        assert_eq!(ColumnType::from_declared("bigint"), ColumnType::Integer);
        assert_eq!(ColumnType::from_declared("VARCHAR(255)"), ColumnType::Text);
        assert_eq!(ColumnType::from_declared("REAL"), ColumnType::Float);
        assert_eq!(ColumnType::from_declared("DECIMAL(10,2)"), ColumnType::Float);
        assert_eq!(ColumnType::from_declared("DATE"), ColumnType::Date);
        assert_eq!(ColumnType::from_declared("DATETIME"), ColumnType::Date);
        assert_eq!(ColumnType::from_declared("BOOLEAN"), ColumnType::Boolean);
        assert_eq!(ColumnType::from_declared(""), ColumnType::Text);
    }

    #[test]
    fn test_sql_type_round_trips_through_declaration() {
        for ty in [
            ColumnType::Integer,
            ColumnType::Float,
            ColumnType::Date,
            ColumnType::Boolean,
            ColumnType::Text,
        ] {
            assert_eq!(ColumnType::from_declared(ty.sql_type()), ty);
        }
    }

    #[test]
    fn test_column_definition_builder() {
        let col = ColumnDefinition::new("id", "INTEGER")
            .with_primary_key(true)
            .with_nullable(false);
        assert_eq!(col.column_type, ColumnType::Integer);
        assert!(col.primary_key);
        assert!(!col.nullable);
    }
}
