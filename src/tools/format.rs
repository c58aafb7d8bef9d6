//! Text rendering of query results.

use crate::models::ColumnMetadata;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// ASCII table format
    Table,
    /// Markdown table format
    Markdown,
}

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn format_as_table(
    columns: &[ColumnMetadata],
    rows: &[serde_json::Map<String, JsonValue>],
    truncated: bool,
    execution_time_ms: u64,
) -> String {
    if columns.is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.name.width()).collect();
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            if let Some(value) = row.get(&col.name) {
                widths[i] = widths[i].max(format_value(value).width());
            }
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = String::new();
    output.push_str(&separator);
    for (col, w) in columns.iter().zip(&widths) {
        output.push_str(&format!("| {} ", pad(&col.name, *w, Align::Center)));
    }
    output.push_str("|\n");
    output.push_str(&separator);

    for row in rows {
        for (col, w) in columns.iter().zip(&widths) {
            let value = row.get(&col.name).unwrap_or(&JsonValue::Null);
            let align = if value.is_number() {
                Align::Right
            } else {
                Align::Left
            };
            output.push_str(&format!("| {} ", pad(&format_value(value), *w, align)));
        }
        output.push_str("|\n");
    }
    output.push_str(&separator);

    let row_text = if rows.len() == 1 { "row" } else { "rows" };
    output.push_str(&format!(
        "{} {} in set ({:.2} sec)",
        rows.len(),
        row_text,
        execution_time_ms as f64 / 1000.0
    ));
    if truncated {
        output.push_str(", truncated");
    }
    output.push('\n');

    output
}

pub fn format_as_markdown(
    columns: &[ColumnMetadata],
    rows: &[serde_json::Map<String, JsonValue>],
    truncated: bool,
) -> String {
    if columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let mut output = String::new();
    for col in columns {
        output.push_str(&format!("| {} ", escape_markdown(&col.name)));
    }
    output.push_str("|\n");
    output.push_str(&"|---".repeat(columns.len()));
    output.push_str("|\n");

    for row in rows {
        for col in columns {
            let value = row.get(&col.name).unwrap_or(&JsonValue::Null);
            output.push_str(&format!("| {} ", escape_markdown(&format_value(value))));
        }
        output.push_str("|\n");
    }

    output.push_str(&format!("\n*{} rows*", rows.len()));
    if truncated {
        output.push_str(" *(truncated)*");
    }

    output
}

enum Align {
    Left,
    Right,
    Center,
}

/// Pad by display width; `format!` width counts chars, which misaligns CJK text.
fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = width.saturating_sub(text.width());
    match align {
        Align::Left => format!("{}{}", text, " ".repeat(fill)),
        Align::Right => format!("{}{}", " ".repeat(fill), text),
        Align::Center => {
            let left = fill / 2;
            format!("{}{}{}", " ".repeat(left), text, " ".repeat(fill - left))
        }
    }
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> (Vec<ColumnMetadata>, Vec<serde_json::Map<String, JsonValue>>) {
        let columns = vec![
            ColumnMetadata::new("id", "INTEGER"),
            ColumnMetadata::new("name", "TEXT"),
        ];
        let mut row = serde_json::Map::new();
        row.insert("id".to_string(), json!(1));
        row.insert("name".to_string(), json!("Alice"));
        (columns, vec![row])
    }

    #[test]
    fn test_format_as_table() {
        let (columns, rows) = sample();
        let table = format_as_table(&columns, &rows, false, 5);
        assert!(table.contains("| id | name  |"));
        assert!(table.contains("|  1 | Alice |"));
        assert!(table.contains("1 row in set"));
    }

    #[test]
    fn test_format_as_table_cjk_alignment() {
        let columns = vec![ColumnMetadata::new("名前", "TEXT")];
        let mut row = serde_json::Map::new();
        row.insert("名前".to_string(), json!("a"));
        let table = format_as_table(&columns, &[row], false, 0);
        assert!(table.contains("| 名前 |"));
        assert!(table.contains("| a    |"));
    }

    #[test]
    fn test_format_as_markdown() {
        let (columns, rows) = sample();
        let md = format_as_markdown(&columns, &rows, true);
        assert!(md.starts_with("| id | name |\n|---|---|\n| 1 | Alice |"));
        assert!(md.contains("(truncated)"));
    }

    #[test]
    fn test_empty_set() {
        assert_eq!(format_as_table(&[], &[], false, 0), "Empty set");
        assert_eq!(format_as_markdown(&[], &[], false), "*Empty set*");
    }

    #[test]
    fn test_format_value_null() {
        assert_eq!(format_value(&JsonValue::Null), "NULL");
    }
}
