//! Snapshot runs: a single dataset, a granularity sweep over a directory of
//! datasets, and a sweep over undersampling methods.
use std::path::Path;

use anyhow::{anyhow, Result};

use linkfault_models::resampling::UndersampleMethod;
use linkfault_models::snapshot::SnapshotRecord;

use crate::commands::{build_driver, csv_files, load_dataset, stem_of};
use crate::config::RunConfig;

/// Snapshot one dataset. `model_name` defaults to the predictor name and
/// `dataset_name` to the file stem of `data`.
pub fn run_snapshot(
    data: &Path,
    config: &RunConfig,
    best: bool,
    model_name: Option<&str>,
    dataset_name: Option<&str>,
) -> Result<SnapshotRecord> {
    let dataset_name = match dataset_name {
        Some(name) => name.to_string(),
        None => stem_of(data)?,
    };
    let mut driver = build_driver(load_dataset(data, config)?, config, &config.model)?;

    let record = if best {
        driver.best_snapshot(&dataset_name)?
    } else {
        let model_name = model_name.unwrap_or(driver.model().name()).to_string();
        driver.take_snapshot(&model_name, &dataset_name)?
    };
    print_record(&record);
    Ok(record)
}

/// Snapshot every CSV in `dir` under one dataset directory named after
/// `dir`, using each file stem as the model name.
pub fn run_granularity(dir: &Path, config: &RunConfig) -> Result<Vec<SnapshotRecord>> {
    let dataset_name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Cannot derive a dataset name from {}", dir.display()))?;

    let files = csv_files(dir)?;
    if files.is_empty() {
        return Err(anyhow!("No CSV files found in {}", dir.display()));
    }

    let mut records = Vec::with_capacity(files.len());
    for file in files {
        log::info!("Processing file: {}", file.display());
        let mut driver = build_driver(load_dataset(&file, config)?, config, &config.model)?;
        let record = driver.take_snapshot(&stem_of(&file)?, &dataset_name)?;
        print_record(&record);
        records.push(record);
    }
    Ok(records)
}

/// Snapshot `data` once per undersampling method, named after the method,
/// under the `resampling` dataset directory.
pub fn run_resampling(data: &Path, config: &RunConfig) -> Result<Vec<SnapshotRecord>> {
    let dataset = load_dataset(data, config)?;
    let mut records = Vec::with_capacity(UndersampleMethod::ALL.len());
    for method in UndersampleMethod::ALL {
        println!("Method: {}", method);
        let mut model = config.model.clone();
        model.undersample = method;
        let mut driver = build_driver(dataset.clone(), config, &model)?;
        let record = driver.take_snapshot(method.as_str(), "resampling")?;
        print_record(&record);
        records.push(record);
    }
    Ok(records)
}

fn print_record(record: &SnapshotRecord) {
    println!(
        "{} on {}: F1 {:.4}, AUC {:.4}, AUPRC {:.4} -> {}",
        record.model_name,
        record.dataset_name,
        record.f1,
        record.auc,
        record.auprc,
        record.metrics_path.display()
    );
}
