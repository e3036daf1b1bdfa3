#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

/// Temp dir plus a config path that does not exist, so the user's own
/// config never leaks into a run.
fn isolated() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("absent.toml");
    (dir, config)
}

fn compile_json(config: &PathBuf, text: &str) -> Vec<u8> {
    cargo_bin_cmd!("segc")
        .arg("--config")
        .arg(config)
        .args(["--format", "json", "--year", "2025", "compile", text])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone()
}

#[test]
fn compile_emits_storage_tree_json() {
    let (_dir, config) = isolated();
    let output = compile_json(&config, "female customers in Los Angeles aged 25 to 35");
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["size"], 3);
    assert_eq!(json["rootOperator"], "AND");
    assert_eq!(json["conditions"][0]["columnKey"], "gender");
    assert_eq!(json["conditions"][1]["value"], "Los Angeles");
    assert_eq!(json["conditions"][2]["value"], "1990-01-01");
    assert_eq!(json["conditions"][2]["value2"], "2000-12-31");
}

#[test]
fn extract_lists_entities_as_text() {
    let (_dir, config) = isolated();
    let output = cargo_bin_cmd!("segc")
        .arg("--config")
        .arg(&config)
        .args(["extract", "male customers who purchased 3 times in the last 2 weeks"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("Entities"));
    assert!(text.contains("\"gender\""));
    assert!(text.contains("\"purchase\""));
}

#[test]
fn sql_compiles_stored_tree_file() {
    let (dir, config) = isolated();
    let tree_path = dir.path().join("segment.json");
    fs::write(
        &tree_path,
        compile_json(&config, "customers in Ha Noi who purchased at least 2 times in the last 3 months"),
    )
    .expect("write tree");

    let output = cargo_bin_cmd!("segc")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "--dialect", "sqlite", "sql", "--select"])
        .arg(&tree_path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["dialect"], "sqlite");
    let sql = json["sql"].as_str().expect("sql string");
    assert!(sql.starts_with("SELECT c.* FROM customers c WHERE "));
    assert!(sql.contains("c.city = ?1"));
    assert!(sql.contains("date('now', ?"));
    assert_eq!(json["params"][0], "Ha Noi");
    assert!(json["inline"].as_str().expect("inline").contains("HAVING COUNT(*) >= 2"));
}

#[test]
fn sql_text_output_summarizes_dialect() {
    let (_dir, config) = isolated();
    let tree = compile_json(&config, "female customers in Los Angeles");
    let output = cargo_bin_cmd!("segc")
        .arg("--config")
        .arg(&config)
        .args(["--dialect", "sqlite", "sql"])
        .write_stdin(tree)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("▸ SQL  dialect=sqlite"));
    assert_eq!(lines.next(), Some("▸ Predicate"));
    assert!(lines.next().is_some_and(|line| line.starts_with("  ") && line.contains("?1")));
    assert!(text.contains("▸ Parameters\n  1. \"F\"\n  2. \"Los Angeles\"\n"));
}

#[test]
fn explain_reads_stdin() {
    let (_dir, config) = isolated();
    let tree = compile_json(&config, "female customers in Los Angeles");
    let output = cargo_bin_cmd!("segc")
        .arg("--config")
        .arg(&config)
        .arg("explain")
        .write_stdin(tree)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.starts_with("gender "));
    assert!(text.contains(" AND city "));
    assert!(text.contains("Los Angeles"));
}

#[test]
fn config_file_seeds_mappings() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("segc.toml");
    fs::write(
        &config,
        r#"
[compiler]
current_year = 2025

[[mappings.records]]
mapping_type = "city"
input_value = "big apple"
standard_value = "New York"
"#,
    )
    .expect("write config");
    let output = compile_json(&config, "customers living in big apple");
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["conditions"][0]["value"], "New York");
}

#[test]
fn invalid_tree_fails_with_exit_code() {
    let (dir, config) = isolated();
    let bad = dir.path().join("bad.json");
    fs::write(&bad, "{ not json").expect("write");
    cargo_bin_cmd!("segc")
        .arg("--config")
        .arg(&config)
        .arg("sql")
        .arg(&bad)
        .assert()
        .failure()
        .code(1);
}

#[test]
fn unknown_column_is_reported() {
    let (dir, config) = isolated();
    let tree = dir.path().join("tree.json");
    fs::write(
        &tree,
        r#"{"size":1,"rootOperator":"AND","conditions":[{"type":"attribute","id":1,"datasetKey":"customers","columnKey":"shoe_size","operator":"equals","value":"42"}],"conditionGroups":[]}"#,
    )
    .expect("write");
    let output = cargo_bin_cmd!("segc")
        .arg("--config")
        .arg(&config)
        .arg("sql")
        .arg(&tree)
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("shoe_size"));
}
