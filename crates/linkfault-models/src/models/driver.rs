use std::path::{Path, PathBuf};

use ndarray::ArrayView2;
use serde::Serialize;

use crate::error::{EvalError, Result};
use crate::models::base::{BaseModel, Validation};
use crate::models::grid_search::format_params;
use crate::models::persist::load_predictor_with_names;
use crate::snapshot::{prepare_snapshot_paths, SnapshotRecord, DEFAULT_SNAPSHOT_ROOT};

pub const DEFAULT_BENCHMARK_SAMPLES: usize = 10_000;
pub const DEFAULT_BENCHMARK_RUNS: usize = 10;

/// Output of [`ModelDriver::std_benchmark`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkSummary {
    /// `samples * runs`
    pub total_samples: usize,
    pub compute_per_analysis: f64,
    pub disk_bytes: u64,
    pub ram_bytes: i64,
}

/// Drives one [`BaseModel`] through lazy training, error reports,
/// benchmarks and snapshots.
///
/// Not meant for concurrent use; callers serialize access to a driver.
pub struct ModelDriver {
    model: BaseModel,
    snapshot_root: PathBuf,
    benchmark_samples: usize,
    benchmark_runs: usize,
}

impl ModelDriver {
    /// Wrap `model`, or load a predictor from `filename` when `model` is
    /// `None`. Exactly one of the two must be given.
    pub fn new(model: Option<BaseModel>, filename: &str) -> Result<Self> {
        match (model, filename.is_empty()) {
            (Some(model), true) => Ok(Self::from_model(model)),
            (None, false) => Ok(Self::from_model(Self::load(Path::new(filename))?)),
            (None, true) => Err(EvalError::MissingSnapshotPath),
            (Some(_), false) => Err(EvalError::UnsupportedOption(
                "a model and a snapshot file are mutually exclusive".to_string(),
            )),
        }
    }

    pub fn from_model(model: BaseModel) -> Self {
        ModelDriver {
            model,
            snapshot_root: PathBuf::from(DEFAULT_SNAPSHOT_ROOT),
            benchmark_samples: DEFAULT_BENCHMARK_SAMPLES,
            benchmark_runs: DEFAULT_BENCHMARK_RUNS,
        }
    }

    /// Restore a trained model from a saved predictor. It has no dataset.
    pub fn load(path: &Path) -> Result<BaseModel> {
        let (predictor, feature_names) = load_predictor_with_names(path)?;
        log::info!("Loaded {} from {}", predictor.name(), path.display());
        Ok(BaseModel::from_predictor(predictor).with_feature_names(feature_names))
    }

    pub fn with_snapshot_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.snapshot_root = root.into();
        self
    }

    /// Sample count and repetitions used by the benchmark inside
    /// [`take_snapshot`](Self::take_snapshot).
    pub fn with_benchmark(mut self, samples: usize, runs: usize) -> Self {
        self.benchmark_samples = samples;
        self.benchmark_runs = runs;
        self
    }

    pub fn model(&self) -> &BaseModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut BaseModel {
        &mut self.model
    }

    pub fn into_model(self) -> BaseModel {
        self.model
    }

    pub fn snapshot_root(&self) -> &Path {
        &self.snapshot_root
    }

    fn ensure_trained(&mut self) -> Result<()> {
        if !self.model.has_trained() {
            self.model.train(false)?;
        }
        Ok(())
    }

    /// Force a re-fit, then validate on the test split with the full report.
    pub fn retrain(&mut self) -> Result<Validation> {
        self.model.mark_untrained();
        self.ensure_trained()?;
        self.model.validate(true, None, None)
    }

    pub fn pred(&mut self, x: ArrayView2<'_, f32>) -> Result<Vec<bool>> {
        self.ensure_trained()?;
        self.model.test(x)
    }

    /// Validate on the (resampled) train split.
    pub fn training_error(&mut self, print_metrics: bool) -> Result<Validation> {
        self.ensure_trained()?;
        let x = self.model.x_train()?.view();
        let y = self.model.y_train()?.to_vec();
        self.model.validate(print_metrics, Some(x), Some(&y))
    }

    pub fn test_error(&mut self, print_metrics: bool) -> Result<Validation> {
        self.ensure_trained()?;
        self.model.validate(print_metrics, None, None)
    }

    /// Benchmark with compute time normalised by `samples * runs`.
    pub fn std_benchmark(
        &mut self,
        samples: usize,
        runs: usize,
        print_metrics: bool,
    ) -> Result<BenchmarkSummary> {
        let total_samples = samples.checked_mul(runs).ok_or_else(|| {
            EvalError::UnsupportedOption(format!(
                "benchmark of {} samples x {} runs overflows the sample count",
                samples, runs
            ))
        })?;
        self.ensure_trained()?;

        let result = self.model.benchmark(samples, runs)?;
        let compute_per_analysis = if total_samples == 0 {
            0.0
        } else {
            result.compute_time / total_samples as f64
        };

        if print_metrics {
            const MB: f64 = 1024.0 * 1024.0;
            println!(
                "Compute time: {} s. Compute time per analysis: {} s",
                result.compute_time, compute_per_analysis
            );
            println!("Disk footprint: {} MB", result.disk_bytes as f64 / MB);
            println!("RAM footprint: {} MB", result.ram_bytes as f64 / MB);
        }

        Ok(BenchmarkSummary {
            total_samples,
            compute_per_analysis,
            disk_bytes: result.disk_bytes,
            ram_bytes: result.ram_bytes,
        })
    }

    /// Grid-search the model, keep the winner for good, then snapshot it
    /// under the original predictor's name.
    pub fn best_snapshot(&mut self, dataset_name: &str) -> Result<SnapshotRecord> {
        let model_name = self.model.name().to_string();
        let outcome = self.model.grid_search()?;
        if let Some(params) = &outcome.params {
            println!("Best Parameters: {}", format_params(params));
        }
        self.model.replace_predictor(outcome.predictor);
        self.take_snapshot(&model_name, dataset_name)
    }

    /// Retrain (timed), save the predictor, validate, benchmark and write
    /// the metrics table next to the predictor file.
    ///
    /// A snapshot of the same model on the same day overwrites the earlier one.
    pub fn take_snapshot(&mut self, model_name: &str, dataset_name: &str) -> Result<SnapshotRecord> {
        let train_time = self.model.train(true)?.unwrap_or_default();

        let (model_path, metrics_path) =
            prepare_snapshot_paths(&self.snapshot_root, dataset_name, model_name)?;
        self.model.save(&model_path)?;

        let validation = self.model.validate(false, None, None)?;
        let rates = validation.rates()?;
        let bench = self.std_benchmark(self.benchmark_samples, self.benchmark_runs, false)?;

        let record = SnapshotRecord {
            model_name: model_name.to_string(),
            dataset_name: dataset_name.to_string(),
            accuracy: validation.accuracy,
            precision: validation.precision,
            recall: validation.recall,
            specificity: validation.specificity,
            f1: validation.f1,
            auc: validation.auc,
            rates,
            auprc: validation.auprc,
            total_samples: bench.total_samples,
            compute_per_analysis: bench.compute_per_analysis,
            disk_bytes: bench.disk_bytes,
            ram_bytes: bench.ram_bytes,
            train_time,
            model_path,
            metrics_path,
        };
        record.write_csv(&record.metrics_path)?;
        log::info!(
            "Snapshot of {} on {} written to {}",
            model_name,
            dataset_name,
            record.metrics_path.display()
        );
        Ok(record)
    }
}
