//! CLI Integration Tests for codescape
//!
//! These tests execute the binary and verify correct behavior for:
//! - Text and JSON output
//! - Data directory discovery and explicit data files
//! - Scoped application
//! - Error handling

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a project and a sibling data directory
///
/// ```text
/// tmp/
///   project/src/core/Engine.java
///   project/src/core/Range.java
///   project/src/ui/View.java
///   data/regions_metrics.json
///   data/mappings_default.json
/// ```
fn create_test_project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let project = temp_dir.path().join("project");
    fs::create_dir_all(project.join("src/core")).unwrap();
    fs::create_dir_all(project.join("src/ui")).unwrap();
    fs::write(project.join("src/core/Engine.java"), "class Engine {}").unwrap();
    fs::write(project.join("src/core/Range.java"), "class Range {}").unwrap();
    fs::write(project.join("src/ui/View.java"), "class View {}").unwrap();

    let data = temp_dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(
        data.join("regions_metrics.json"),
        r#"{"regions": [
            {"id": "engine-1", "location": "src/core/Engine.java", "start": 1, "end": 30,
             "properties": [{"type": "NFP", "name": "complexity", "value": 2},
                            {"type": "NFP", "name": "loc", "value": 30}]},
            {"id": "range-1", "location": "src/core/Range.java", "start": 1, "end": 12,
             "properties": [{"type": "NFP", "name": "complexity", "value": 8}]},
            {"id": "view-1", "location": "src/ui/View.java", "start": 3, "end": 9,
             "properties": [{"type": "NFP", "name": "complexity", "value": 20},
                            {"type": "Feature", "name": "Rendering", "value": true}]}
        ]}"#,
    )
    .unwrap();
    fs::write(
        data.join("mappings_default.json"),
        r#"{"mappings": [
            {"propertyType": "NFP", "propertyName": "complexity", "methodName": "Size_Scale",
             "config": {"from": 0, "to": 10}}
        ]}"#,
    )
    .unwrap();

    temp_dir
}

fn codescape() -> Command {
    Command::cargo_bin("codescape").unwrap()
}

fn json_output(args: &[&str], root: &Path) -> Value {
    let output = codescape()
        .arg(root.join("project"))
        .arg("--data-dir")
        .arg(root.join("data"))
        .args(args)
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

fn assignment_of<'a>(doc: &'a Value, region_id: &str) -> Option<&'a Value> {
    doc["assignments"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["region_id"] == region_id)
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_cli_help() {
    codescape()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--data-dir"))
        .stdout(predicate::str::contains("EXAMPLES"));
}

#[test]
fn test_cli_version() {
    codescape()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_text_output_summary() {
    let tmp = create_test_project();
    codescape()
        .arg(tmp.path().join("project"))
        .arg("--data-dir")
        .arg(tmp.path().join("data"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Structure: 3 files, 3 folders, 3 regions"))
        .stdout(predicate::str::contains("Totals: applied="))
        .stdout(predicate::str::contains("engine-1"));
}

#[test]
fn test_json_output_structure() {
    let tmp = create_test_project();
    let doc = json_output(&[], tmp.path());

    // complexity is mapped explicitly, loc and Rendering get defaults
    let entries = doc["report"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);

    // view-1 holds the largest complexity in the project
    let size = doc["assignments"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["region_id"] == "view-1" && a["value"]["kind"] == "size")
        .map(|a| a["value"]["value"].as_f64().unwrap());
    assert_eq!(size, Some(10.0));
    assert_eq!(
        doc["report"]["entries"][0]["key"]["name"],
        Value::String("complexity".to_string())
    );
}

#[test]
fn test_scope_limits_application() {
    let tmp = create_test_project();
    let doc = json_output(&["--scope", "src/core"], tmp.path());

    assert!(assignment_of(&doc, "view-1").is_none());
    let complexity = &doc["report"]["entries"][0];
    assert_eq!(complexity["outcome"], "applied");
    assert_eq!(complexity["range"]["min"], 2.0);
    assert_eq!(complexity["range"]["max"], 8.0);
}

#[test]
fn test_list_properties() {
    let tmp = create_test_project();
    codescape()
        .arg(tmp.path().join("project"))
        .arg("--data-dir")
        .arg(tmp.path().join("data"))
        .arg("--list-properties")
        .assert()
        .success()
        .stdout(predicate::str::contains("NFP:complexity"))
        .stdout(predicate::str::contains("NFP:loc"))
        .stdout(predicate::str::contains("Feature:rendering"))
        .stdout(predicate::str::contains("Totals").not());
}

#[test]
fn test_explicit_data_files() {
    let tmp = create_test_project();
    let mappings = tmp.path().join("custom.json");
    fs::write(
        &mappings,
        r#"{"mappings": [{"propertyType": "NFP", "propertyName": "complexity", "methodName": "Sparkle"}]}"#,
    )
    .unwrap();

    codescape()
        .arg(tmp.path().join("project"))
        .arg("--regions")
        .arg(tmp.path().join("data/regions_metrics.json"))
        .arg("--mappings")
        .arg(&mappings)
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown mapping method"))
        .stdout(predicate::str::contains("unknown_method=1"));
}

#[test]
fn test_system_config_root() {
    let tmp = create_test_project();
    let config = tmp.path().join("system.json");
    fs::write(
        &config,
        serde_json::json!({
            "path": tmp.path(),
            "root_folder": "project",
            "ignore_files": ["ui"]
        })
        .to_string(),
    )
    .unwrap();

    codescape()
        .arg("--system-config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Structure: 2 files, 2 folders, 0 regions"));
}

// ============================================================================
// Error Handling
// ============================================================================

#[test]
fn test_missing_root_fails() {
    let tmp = TempDir::new().unwrap();
    codescape()
        .arg(tmp.path().join("does-not-exist"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_no_root_given_fails() {
    codescape()
        .assert()
        .failure()
        .stderr(predicate::str::contains("no project root"));
}

#[test]
fn test_unknown_scope_fails() {
    let tmp = create_test_project();
    codescape()
        .arg(tmp.path().join("project"))
        .args(["--scope", "src/nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --scope"));
}

#[test]
fn test_malformed_mapping_file_fails() {
    let tmp = create_test_project();
    let broken = tmp.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();

    codescape()
        .arg(tmp.path().join("project"))
        .arg("--mappings")
        .arg(&broken)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load mapping files"));
}
