use std::path::Path;

use anyhow::Result;

use linkfault_models::models::base::Validation;
use linkfault_models::models::driver::BenchmarkSummary;

use crate::commands::{build_driver, load_dataset};
use crate::config::RunConfig;

/// Train on `data` and print the full report on the test split, or on the
/// train split when `on_train` is set.
pub fn run_validate(data: &Path, config: &RunConfig, on_train: bool) -> Result<Validation> {
    let mut driver = build_driver(load_dataset(data, config)?, config, &config.model)?;
    let validation = if on_train {
        driver.training_error(true)?
    } else {
        driver.test_error(true)?
    };
    Ok(validation)
}

pub fn run_benchmark(data: &Path, config: &RunConfig) -> Result<BenchmarkSummary> {
    let mut driver = build_driver(load_dataset(data, config)?, config, &config.model)?;
    let samples = config
        .benchmark_samples
        .min(driver.model().x_test()?.nrows());
    let summary = driver.std_benchmark(samples, config.benchmark_runs, true)?;
    Ok(summary)
}
