use std::path::{Path, PathBuf};

use clap::Command;

use linkfault_cli::commands::{csv_files, stem_of};
use linkfault_cli::config::{load_run_config, run_args, RunConfig};
use linkfault_models::resampling::UndersampleMethod;

fn parse(args: &[&str]) -> RunConfig {
    let matches = Command::new("test")
        .args(run_args())
        .get_matches_from(std::iter::once("test").chain(args.iter().copied()));
    RunConfig::from_arguments(&matches).unwrap()
}

#[test]
fn test_defaults() {
    let config = RunConfig::default();
    assert_eq!(config.label_column, "is_fault");
    assert_eq!(config.snapshot_root, PathBuf::from("model-snapshots"));
    assert_eq!(config.benchmark_samples, 10_000);
    assert_eq!(config.benchmark_runs, 10);
    assert!(config.plot_dir.is_none());
    assert!(config.drop_columns.iter().any(|c| c == "ts"));
}

#[test]
fn test_partial_json_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(
        &path,
        r#"{"benchmark_runs": 3, "model": {"undersample": "nearmiss"}}"#,
    )
    .unwrap();

    let config = load_run_config(&path).unwrap();
    assert_eq!(config.benchmark_runs, 3);
    assert_eq!(config.benchmark_samples, 10_000);
    assert_eq!(config.model.undersample, UndersampleMethod::NearMiss);
    assert_eq!(config.model.test_fraction, 0.2);
}

#[test]
fn test_load_errors_name_the_file() {
    let err = load_run_config("/nonexistent/run.json").unwrap_err();
    assert!(format!("{:#}", err).contains("/nonexistent/run.json"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = load_run_config(&path).unwrap_err();
    assert!(format!("{}", err).starts_with("Failed to parse config"));
}

#[test]
fn test_overrides_without_config_file() {
    let config = parse(&[
        "-m",
        "rule",
        "--undersample",
        "none",
        "--samples",
        "50",
        "--runs",
        "4",
        "--snapshot-root",
        "/tmp/snaps",
        "--label-column",
        "fault",
    ]);
    assert_eq!(config.model.model_type.short_name(), "rule");
    assert_eq!(config.model.undersample, UndersampleMethod::None);
    assert_eq!(config.benchmark_samples, 50);
    assert_eq!(config.benchmark_runs, 4);
    assert_eq!(config.snapshot_root, PathBuf::from("/tmp/snaps"));
    assert_eq!(config.label_column, "fault");
}

#[test]
fn test_overrides_apply_over_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(&path, r#"{"benchmark_runs": 3, "label_column": "broken"}"#).unwrap();

    let config = parse(&["-c", path.to_str().unwrap(), "--runs", "7"]);
    assert_eq!(config.benchmark_runs, 7);
    assert_eq!(config.label_column, "broken");
}

#[test]
fn test_stem_of() {
    assert_eq!(stem_of(Path::new("data/links-15min.csv")).unwrap(), "links-15min");
    assert!(stem_of(Path::new("/")).is_err());
}

#[test]
fn test_csv_files_sorted_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.csv", "a.csv", "notes.txt"] {
        std::fs::write(dir.path().join(name), "").unwrap();
    }
    let files = csv_files(dir.path()).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["a.csv", "b.csv"]);

    assert!(csv_files(&dir.path().join("missing")).is_err());
}
