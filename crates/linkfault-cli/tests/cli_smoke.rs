//! CLI binary smoke tests using assert_cmd.
//!
//! These tests run the compiled `linkfault` binary to check argument
//! parsing, help text, error exits and one full snapshot run.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("linkfault").unwrap()
}

/// 60 rows whose label agrees with the rule-based model.
fn write_link_csv(dir: &Path, name: &str) -> PathBuf {
    let mut content = String::from(",ts,rsrq,rtt,load,is_fault\n");
    for i in 0..60 {
        let fault = i % 2 == 0;
        let rtt = if fault { 80.0 } else { 20.0 };
        writeln!(content, "{},{},-5.0,{},{},{}", i, 1000 + i, rtt, i % 7, fault).unwrap();
    }
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("snapshot"))
        .stdout(predicate::str::contains("granularity"))
        .stdout(predicate::str::contains("compare"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("linkfault"));
}

// ---------------------------------------------------------------------------
// Argument errors
// ---------------------------------------------------------------------------

#[test]
fn snapshot_requires_data() {
    cmd()
        .arg("snapshot")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<data>"));
}

#[test]
fn unknown_model_type_is_rejected() {
    cmd()
        .args(["validate", "data.csv", "-m", "forest"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("forest"));
}

#[test]
fn missing_data_file_fails() {
    cmd()
        .args(["validate", "/nonexistent/links.csv", "-m", "rule"])
        .assert()
        .failure();
}

#[test]
fn nonexistent_config_fails() {
    cmd()
        .args(["benchmark", "links.csv", "-c", "/nonexistent/config.json"])
        .assert()
        .failure();
}

#[test]
fn predict_requires_snapshot() {
    cmd()
        .args(["predict", "links.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--snapshot"));
}

// ---------------------------------------------------------------------------
// End-to-end
// ---------------------------------------------------------------------------

#[test]
fn rule_snapshot_then_compare_and_predict() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_link_csv(dir.path(), "links.csv");
    let root = dir.path().join("snapshots");

    cmd()
        .arg("snapshot")
        .arg(&data)
        .args(["-m", "rule", "--undersample", "none", "--runs", "2"])
        .arg("--snapshot-root")
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("RuleBasedModel on links"));

    let dataset_dir = root.join("links");
    let files: Vec<PathBuf> = std::fs::read_dir(&dataset_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    let predictor = files
        .iter()
        .find(|p| p.extension().map_or(false, |e| e == "json"))
        .expect("predictor file written")
        .clone();
    assert!(files
        .iter()
        .any(|p| p.extension().map_or(false, |e| e == "csv")));

    cmd()
        .arg("compare")
        .arg(&dataset_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("RuleBasedModel"));

    let output = dir.path().join("predictions.csv");
    cmd()
        .arg("predict")
        .arg(&data)
        .arg("--snapshot")
        .arg(&predictor)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let written = std::fs::read_to_string(&output).unwrap();
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("row,is_fault"));
    assert_eq!(lines.next(), Some("0,true"));
    assert_eq!(lines.next(), Some("1,false"));
    assert_eq!(written.lines().count(), 61);
}

#[test]
fn predict_rejects_reordered_columns() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_link_csv(dir.path(), "links.csv");
    let root = dir.path().join("snapshots");

    cmd()
        .arg("snapshot")
        .arg(&data)
        .args(["-m", "rule", "--undersample", "none", "--runs", "1"])
        .arg("--snapshot-root")
        .arg(&root)
        .assert()
        .success();

    let predictor = std::fs::read_dir(root.join("links"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().map_or(false, |e| e == "json"))
        .unwrap();

    let reordered = dir.path().join("reordered.csv");
    let mut content = String::from("rtt,rsrq,load,is_fault\n");
    for i in 0..10 {
        writeln!(content, "20.0,-5.0,{},false", i).unwrap();
    }
    std::fs::write(&reordered, content).unwrap();

    cmd()
        .arg("predict")
        .arg(&reordered)
        .arg("--snapshot")
        .arg(&predictor)
        .assert()
        .failure()
        .stderr(predicate::str::contains("do not match the trained columns"));
}

#[test]
fn importance_with_shap_reports_each_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_link_csv(dir.path(), "links.csv");

    cmd()
        .arg("importance")
        .arg(&data)
        .args(["-m", "rule", "--undersample", "none", "--repeats", "1"])
        .args(["--shap", "--shap-rows", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Permutation importance (1 repeats)"))
        .stdout(predicate::str::contains("SHAP mean |phi|, global (10 rows)"))
        .stdout(predicate::str::contains("SHAP mean |phi|, false-negative (0 rows)"));
}

#[test]
fn shap_options_need_the_shap_flag() {
    cmd()
        .args(["importance", "links.csv", "--shap-rows", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--shap"));
}

#[test]
fn tree_importance_is_built_in() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_link_csv(dir.path(), "links.csv");

    cmd()
        .arg("importance")
        .arg(&data)
        .args(["-m", "tree", "--repeats", "1", "--top", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Built-in importance (DecisionTreeClassifier)"))
        .stdout(predicate::str::contains("rtt"));
}

#[test]
fn granularity_needs_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .arg("granularity")
        .arg(dir.path())
        .args(["-m", "rule"])
        .assert()
        .failure();
}
