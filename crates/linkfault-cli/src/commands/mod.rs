pub mod compare;
pub mod evaluate;
pub mod importance;
pub mod predict;
pub mod snapshot;

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use linkfault_models::config::ModelConfig;
use linkfault_models::data_handling::Dataset;
use linkfault_models::io::read_feature_csv_with_config;
use linkfault_models::models::base::BaseModel;
use linkfault_models::models::driver::ModelDriver;
use linkfault_models::models::factory::build_model;

use crate::config::RunConfig;

pub fn load_dataset(data: &Path, config: &RunConfig) -> Result<Dataset> {
    let dataset = read_feature_csv_with_config(data, &config.csv_config())?;
    dataset.log_summary();
    Ok(dataset)
}

/// Driver over `dataset` with the model, snapshot and benchmark settings of
/// `config`, using `model` in place of `config.model`.
pub fn build_driver(dataset: Dataset, config: &RunConfig, model: &ModelConfig) -> Result<ModelDriver> {
    let predictor = build_model(model, &dataset.feature_names)?;
    let mut base = BaseModel::with_config(dataset, predictor, model)?;
    if let Some(dir) = &config.plot_dir {
        base = base.with_plot_dir(dir);
    }

    let test_rows = base.x_test()?.nrows();
    let samples = if config.benchmark_samples > test_rows {
        log::warn!(
            "Benchmark samples reduced from {} to the {} rows of the test split",
            config.benchmark_samples,
            test_rows
        );
        test_rows
    } else {
        config.benchmark_samples
    };

    Ok(ModelDriver::from_model(base)
        .with_snapshot_root(&config.snapshot_root)
        .with_benchmark(samples, config.benchmark_runs))
}

/// File stem of `path`, used as a dataset or model name.
pub fn stem_of(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Cannot derive a name from {}", path.display()))
}

/// Every `.csv` file in `dir`, sorted by name.
pub fn csv_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
