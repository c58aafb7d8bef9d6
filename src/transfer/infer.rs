//! Column type inference for imported tables.
//!
//! Every non-empty cell of a column is tested against integer, float and
//! date in that order; the column gets the first type all of its values
//! satisfy, otherwise text. Empty cells are NULL and do not take part.
//! Boolean is never inferred, only honoured when the target column already
//! declares it.

use crate::models::{ColumnType, QueryParam};
use chrono::{NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Integer literal without sign noise or leading zeros, fitting in i64.
///
/// Leading zeros are rejected so identifiers like "007" stay text.
pub fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return false;
    }
    value.parse::<i64>().is_ok()
}

/// Finite decimal or scientific literal.
///
/// Plain digit strings count only when they are valid integers, so
/// zero-padded codes and numbers beyond i64 stay text instead of losing
/// digits. A leading zero is allowed only directly before the point.
pub fn is_float(value: &str) -> bool {
    let unsigned = value
        .strip_prefix('-')
        .or_else(|| value.strip_prefix('+'))
        .unwrap_or(value);
    if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return is_integer(value);
    }
    if !unsigned.bytes().any(|b| b.is_ascii_digit()) {
        return false;
    }
    if !unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
    {
        return false;
    }

    let whole = unsigned
        .split(|c| matches!(c, '.' | 'e' | 'E'))
        .next()
        .unwrap_or("");
    if whole.len() > 1 && whole.starts_with('0') {
        return false;
    }
    value.parse::<f64>().is_ok_and(f64::is_finite)
}

/// ISO-8601 date or date-time.
pub fn is_date(value: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
        || DATETIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
}

/// Interpret a cell as a boolean.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Infer the type of one column from its cells.
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = false;
    let mut integer = true;
    let mut float = true;
    let mut date = true;

    for value in values.into_iter().filter(|v| !v.is_empty()) {
        seen = true;
        integer = integer && is_integer(value);
        float = float && is_float(value);
        date = date && is_date(value);
        if !integer && !float && !date {
            return ColumnType::Text;
        }
    }

    if !seen {
        ColumnType::Text
    } else if integer {
        ColumnType::Integer
    } else if float {
        ColumnType::Float
    } else if date {
        ColumnType::Date
    } else {
        ColumnType::Text
    }
}

/// Infer a type for every column of a decoded table.
pub fn infer_schema(headers: &[String], rows: &[Vec<String>]) -> Vec<(String, ColumnType)> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let column = rows
                .iter()
                .map(move |row| row.get(idx).map(String::as_str).unwrap_or(""));
            (name.clone(), infer_column_type(column))
        })
        .collect()
}

/// Convert a cell into a bound parameter for a column of the given type.
///
/// Cells that do not parse as the column type are bound as text and left
/// to SQLite's type affinity.
pub fn coerce_cell(value: &str, column_type: ColumnType) -> QueryParam {
    if value.is_empty() {
        return QueryParam::Null;
    }

    let text = || QueryParam::String(value.to_string());
    match column_type {
        ColumnType::Integer => value.parse::<i64>().map(QueryParam::Int).unwrap_or_else(|_| text()),
        ColumnType::Float if is_float(value) => value
            .parse::<f64>()
            .map(QueryParam::Float)
            .unwrap_or_else(|_| text()),
        ColumnType::Boolean => parse_bool(value).map(QueryParam::Bool).unwrap_or_else(text),
        ColumnType::Float | ColumnType::Date | ColumnType::Text => text(),
    }
}
