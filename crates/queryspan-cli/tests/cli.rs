use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

const SCHEMA: &str = "
CREATE TABLE orders (id INT, customer_id INT, total INT);
CREATE TABLE customers (id INT, name TEXT);
CREATE VIEW order_names AS SELECT o.id, c.name FROM orders o JOIN customers c ON o.customer_id = c.id;
";

const CATALOG: &str = r#"{
  "databases": [{
    "name": "shop",
    "schemas": [{
      "name": "",
      "tables": [{
        "name": "customers",
        "columns": [
          {"name": "id"},
          {"name": "name", "maskingLevel": "partial"},
          {"name": "email", "maskingLevel": "full"}
        ]
      }]
    }]
  }]
}"#;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_queryspan"))
        .args(args)
        .output()
        .expect("run CLI")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn span_json_traces_view_columns() {
    let dir = tempdir().expect("temp dir");
    let schema_path = dir.path().join("schema.sql");
    let sql_path = dir.path().join("query.sql");
    std::fs::write(&schema_path, SCHEMA).expect("write schema");
    std::fs::write(&sql_path, "SELECT name FROM order_names").expect("write sql");

    let output = run(&[
        "-d",
        "postgres",
        "-f",
        "json",
        "--database",
        "shop",
        "-s",
        path_str(&schema_path),
        path_str(&sql_path),
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "unexpected failure: {stdout}");
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let outcome = &json[0]["outcome"];
    assert_eq!(outcome["status"], "span");
    assert_eq!(outcome["results"][0]["name"], "name");
    let provenance = &outcome["results"][0]["provenance"][0];
    assert_eq!(provenance["database"], "shop");
    assert_eq!(provenance["schema"], "public");
    assert_eq!(provenance["table"], "customers");
    assert_eq!(provenance["column"], "name");
}

#[test]
fn masking_table_output() {
    let dir = tempdir().expect("temp dir");
    let catalog_path = dir.path().join("catalog.json");
    let sql_path = dir.path().join("query.sql");
    std::fs::write(&catalog_path, CATALOG).expect("write catalog");
    std::fs::write(&sql_path, "SELECT id, concat(name, email) AS contact FROM customers")
        .expect("write sql");

    let output = run(&[
        "-m",
        "masking",
        "--database",
        "shop",
        "--catalog",
        path_str(&catalog_path),
        path_str(&sql_path),
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "unexpected failure: {stdout}");
    assert!(stdout.contains("QuerySpan Analysis"));
    assert!(stdout.contains("contact"));
    assert!(stdout.contains("full"));
}

#[test]
fn analysis_errors_exit_with_failure() {
    let dir = tempdir().expect("temp dir");
    let sql_path = dir.path().join("query.sql");
    std::fs::write(&sql_path, "SELECT id FROM nowhere").expect("write sql");

    let output = run(&["-f", "json", path_str(&sql_path)]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("resource not found"), "stderr: {stderr}");
}

#[test]
fn missing_catalog_is_a_config_error() {
    let dir = tempdir().expect("temp dir");
    let sql_path = dir.path().join("query.sql");
    std::fs::write(&sql_path, "SELECT 1").expect("write sql");
    let missing = dir.path().join("missing.json");

    let output = run(&["--catalog", path_str(&missing), path_str(&sql_path)]);

    assert_eq!(output.status.code(), Some(66));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("queryspan: error:"), "stderr: {stderr}");
}

#[test]
fn blank_input_is_a_config_error() {
    let dir = tempdir().expect("temp dir");
    let sql_path = dir.path().join("empty.sql");
    std::fs::write(&sql_path, "\n\n").expect("write sql");

    let output = run(&[path_str(&sql_path)]);

    assert_eq!(output.status.code(), Some(66));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no SQL to analyze"), "stderr: {stderr}");
}

#[test]
fn non_queries_are_skipped_without_failing() {
    let dir = tempdir().expect("temp dir");
    let sql_path = dir.path().join("script.sql");
    let output_path = dir.path().join("out.json");
    std::fs::write(&sql_path, "CREATE TABLE t (a INT); SELECT 1 AS one").expect("write sql");

    let output = run(&[
        "-f",
        "json",
        "--compact",
        "-o",
        path_str(&output_path),
        path_str(&sql_path),
    ]);

    assert!(output.status.success());
    let written = std::fs::read_to_string(&output_path).expect("output exists");
    let json: serde_json::Value = serde_json::from_str(&written).expect("valid JSON");
    assert_eq!(json[0]["outcome"]["status"], "skipped");
    assert_eq!(json[1]["outcome"]["status"], "span");
    assert_eq!(json[1]["outcome"]["results"][0]["name"], "one");
}
