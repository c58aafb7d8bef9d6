use std::sync::Arc;
use tabular_mcp_server::db::ConnectionRegistry;
use tabular_mcp_server::error::DbError;
use tabular_mcp_server::models::QueryParam;
use tabular_mcp_server::tools::OutputFormat;
use tabular_mcp_server::tools::query::{QueryInput, QueryToolHandler};
use tabular_mcp_server::tools::write::{UpdateInput, UpdateToolHandler};

fn query_input(id: &str, sql: &str) -> QueryInput {
    QueryInput {
        id: id.to_string(),
        sql: sql.to_string(),
        params: vec![],
        limit: None,
        format: OutputFormat::Json,
        decode_binary: false,
    }
}

async fn setup() -> (Arc<ConnectionRegistry>, QueryToolHandler, UpdateToolHandler) {
    let registry = Arc::new(ConnectionRegistry::new());
    registry.connect("mem", None).await.unwrap();
    let query = QueryToolHandler::new(registry.clone());
    let update = UpdateToolHandler::new(registry.clone());
    (registry, query, update)
}

#[tokio::test]
async fn test_utf8_text_survives_update_and_query() {
    let (registry, query, update) = setup().await;

    update
        .update(UpdateInput {
            id: "mem".to_string(),
            sql: "CREATE TABLE cities (id INTEGER PRIMARY KEY, name TEXT)".to_string(),
            params: vec![],
            param_sets: vec![],
        })
        .await
        .unwrap();

    let inserted = update
        .update(UpdateInput {
            id: "mem".to_string(),
            sql: "INSERT INTO cities (id, name) VALUES (?, ?)".to_string(),
            params: vec![QueryParam::Int(1), QueryParam::String("北京".to_string())],
            param_sets: vec![],
        })
        .await
        .unwrap();
    assert_eq!(inserted.rows_affected, 1);

    let mut input = query_input("mem", "SELECT name FROM cities WHERE name = ?");
    input.params = vec![QueryParam::String("北京".to_string())];
    let output = query.query(input).await.unwrap();
    assert_eq!(output.row_count, 1);
    assert_eq!(output.rows[0]["name"], "北京");

    let mut input = query_input("mem", "SELECT id, name FROM cities");
    input.format = OutputFormat::Markdown;
    let output = query.query(input).await.unwrap();
    let formatted = output.formatted.unwrap();
    assert!(formatted.contains("| id | name |"));
    assert!(formatted.contains("北京"));
    assert!(output.rows.is_empty());

    registry.close_all().await;
}

#[tokio::test]
async fn test_query_limit_reports_truncation() {
    let (registry, query, update) = setup().await;

    update
        .update(UpdateInput {
            id: "mem".to_string(),
            sql: "CREATE TABLE n (v INTEGER);
                  INSERT INTO n VALUES (1), (2), (3), (4), (5);"
                .to_string(),
            params: vec![],
            param_sets: vec![],
        })
        .await
        .unwrap();

    let mut input = query_input("mem", "SELECT v FROM n ORDER BY v");
    input.limit = Some(3);
    let output = query.query(input).await.unwrap();
    assert_eq!(output.row_count, 3);
    assert!(output.truncated);
    assert!(output.warning.is_none());

    let mut input = query_input("mem", "SELECT v FROM n ORDER BY v");
    input.limit = Some(5);
    let output = query.query(input).await.unwrap();
    assert_eq!(output.row_count, 5);
    assert!(!output.truncated);

    let mut input = query_input("mem", "SELECT v FROM n");
    input.limit = Some(50_000);
    let output = query.query(input).await.unwrap();
    assert!(output.warning.is_some());

    registry.close_all().await;
}

#[tokio::test]
async fn test_table_format_output() {
    let (registry, query, update) = setup().await;

    update
        .update(UpdateInput {
            id: "mem".to_string(),
            sql: "CREATE TABLE t (a TEXT, b REAL); INSERT INTO t VALUES ('x', 1.5), (NULL, 2);"
                .to_string(),
            params: vec![],
            param_sets: vec![],
        })
        .await
        .unwrap();

    let mut input = query_input("mem", "SELECT a, b FROM t");
    input.format = OutputFormat::Table;
    let output = query.query(input).await.unwrap();
    let formatted = output.formatted.unwrap();
    assert!(formatted.contains("NULL"));
    assert!(formatted.contains("1.5"));
    assert!(formatted.contains("2 rows in set"));

    registry.close_all().await;
}

#[tokio::test]
async fn test_sql_errors_and_unknown_ids() {
    let (registry, query, update) = setup().await;

    let err = query
        .query(query_input("mem", "SELECT * FROM missing_table"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Query { .. }));

    let err = query
        .query(query_input("elsewhere", "SELECT 1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));

    let err = update
        .update(UpdateInput {
            id: "mem".to_string(),
            sql: "INSERT INTO nowhere VALUES (1)".to_string(),
            params: vec![],
            param_sets: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Query { .. }));

    registry.close_all().await;
}

#[tokio::test]
async fn test_param_sets_run_in_one_transaction() {
    let (registry, query, update) = setup().await;

    update
        .update(UpdateInput {
            id: "mem".to_string(),
            sql: "CREATE TABLE tags (name TEXT UNIQUE, weight REAL)".to_string(),
            params: vec![],
            param_sets: vec![],
        })
        .await
        .unwrap();

    let output = update
        .update(UpdateInput {
            id: "mem".to_string(),
            sql: "INSERT INTO tags (name, weight) VALUES (?, ?)".to_string(),
            params: vec![],
            param_sets: vec![
                vec![QueryParam::String("red".to_string()), QueryParam::Float(0.5)],
                vec![QueryParam::String("blue".to_string()), QueryParam::Null],
                vec![QueryParam::String("green".to_string()), QueryParam::Int(2)],
            ],
        })
        .await
        .unwrap();
    assert_eq!(output.rows_affected, 3);
    assert_eq!(output.executions, 3);

    // The duplicate in the last set undoes the first one too
    let err = update
        .update(UpdateInput {
            id: "mem".to_string(),
            sql: "INSERT INTO tags (name, weight) VALUES (?, ?)".to_string(),
            params: vec![],
            param_sets: vec![
                vec![QueryParam::String("black".to_string()), QueryParam::Null],
                vec![QueryParam::String("red".to_string()), QueryParam::Null],
            ],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Query { .. }));

    let output = query
        .query(query_input("mem", "SELECT name FROM tags ORDER BY name"))
        .await
        .unwrap();
    let names: Vec<&str> = output
        .rows
        .iter()
        .map(|row| row["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["blue", "green", "red"]);

    registry.close_all().await;
}
