//! Split, resampling, validation and benchmark lifecycle shared by every
//! predictor backend.
use std::path::{Path, PathBuf};
use std::time::Instant;

use ndarray::{Array1, Array2, ArrayView2};
use serde::Serialize;

use crate::benchmark::{self, BenchmarkResult};
use crate::config::ModelConfig;
use crate::confusion::{ConfusionMatrix, ConfusionRates};
use crate::data_handling::{class_counts, train_test_split, Dataset, TrainTestSplit};
use crate::error::{EvalError, Result};
use crate::metrics;
use crate::models::classifier_trait::{GridSearchOutcome, Predictor};
use crate::models::grid_search::{self, ParamGrid, ParamSet};
use crate::models::persist;
use crate::report::plots;
use crate::resampling::{self, UndersampleMethod};

/// Confusion matrix and derived metrics of one `validate` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Validation {
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub specificity: f64,
    pub f1: f64,
    pub auc: f64,
    pub auprc: f64,
}

impl Validation {
    pub fn rates(&self) -> Result<ConfusionRates> {
        self.confusion.as_rates()
    }

    /// Geometric mean of recall and specificity.
    pub fn g_mean(&self) -> f64 {
        (self.recall * self.specificity).sqrt()
    }
}

/// A predictor together with the data it is trained and judged on.
///
/// The test split is set aside before the train split is undersampled, and
/// is never resampled itself. A model restored from a saved predictor has no
/// split; dataset-dependent operations then fail with [`EvalError::NoDataset`].
pub struct BaseModel {
    predictor: Box<dyn Predictor>,
    split: Option<TrainTestSplit>,
    feature_names: Vec<String>,
    x_pre_len: usize,
    undersample_method: UndersampleMethod,
    has_trained: bool,
    plot_dir: Option<PathBuf>,
}

impl BaseModel {
    /// Split with the default fraction and seed, then randomly undersample
    /// the train side.
    pub fn new(dataset: Dataset, predictor: Box<dyn Predictor>) -> Result<Self> {
        Self::with_config(dataset, predictor, &ModelConfig::default())
    }

    /// Split and undersample as `config` describes. The predictor is not
    /// taken from `config`; use [`build_model`](crate::models::factory::build_model).
    pub fn with_config(
        dataset: Dataset,
        predictor: Box<dyn Predictor>,
        config: &ModelConfig,
    ) -> Result<Self> {
        let x_pre_len = dataset.len();
        let split = train_test_split(&dataset.x, &dataset.y, config.test_fraction, config.split_seed)?;

        let (neg_before, pos_before) = class_counts(&split.y_train);
        let (x_train, y_train) =
            Self::undersample(&split.x_train, &split.y_train, config.undersample)?;
        let (neg_after, pos_after) = class_counts(&y_train);
        log::info!(
            "{}: {} train rows ({} faults / {} non-faults) after {} undersampling, was {} / {}; {} test rows",
            predictor.name(),
            y_train.len(),
            pos_after,
            neg_after,
            config.undersample,
            pos_before,
            neg_before,
            split.y_test.len()
        );

        Ok(BaseModel {
            predictor,
            split: Some(TrainTestSplit {
                x_train,
                y_train,
                ..split
            }),
            feature_names: dataset.feature_names,
            x_pre_len,
            undersample_method: config.undersample,
            has_trained: false,
            plot_dir: None,
        })
    }

    /// Wrap an already fitted predictor that carries no dataset.
    pub fn from_predictor(predictor: Box<dyn Predictor>) -> Self {
        BaseModel {
            predictor,
            split: None,
            feature_names: Vec::new(),
            x_pre_len: 0,
            undersample_method: UndersampleMethod::None,
            has_trained: true,
            plot_dir: None,
        }
    }

    /// Training columns of a restored predictor.
    pub fn with_feature_names(mut self, feature_names: Vec<String>) -> Self {
        self.feature_names = feature_names;
        self
    }

    /// Write ROC and confusion plots into `dir` when validating with
    /// `print_metrics`.
    pub fn with_plot_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.plot_dir = Some(dir.into());
        self
    }

    pub fn name(&self) -> &str {
        self.predictor.name()
    }

    pub fn predictor(&self) -> &dyn Predictor {
        self.predictor.as_ref()
    }

    /// Swap in another predictor, e.g. a grid-search winner. The model is
    /// marked untrained so the next use re-fits on the current train split.
    pub fn replace_predictor(&mut self, predictor: Box<dyn Predictor>) {
        self.predictor = predictor;
        self.has_trained = false;
    }

    pub fn has_trained(&self) -> bool {
        self.has_trained
    }

    pub fn mark_untrained(&mut self) {
        self.has_trained = false;
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Row count of the dataset before splitting and resampling.
    pub fn x_pre_len(&self) -> usize {
        self.x_pre_len
    }

    pub fn undersample_method(&self) -> UndersampleMethod {
        self.undersample_method
    }

    fn split(&self) -> Result<&TrainTestSplit> {
        self.split.as_ref().ok_or(EvalError::NoDataset)
    }

    pub fn x_train(&self) -> Result<&Array2<f32>> {
        Ok(&self.split()?.x_train)
    }

    pub fn y_train(&self) -> Result<&Array1<bool>> {
        Ok(&self.split()?.y_train)
    }

    pub fn x_test(&self) -> Result<&Array2<f32>> {
        Ok(&self.split()?.x_test)
    }

    pub fn y_test(&self) -> Result<&Array1<bool>> {
        Ok(&self.split()?.y_test)
    }

    /// Fit on the train split. Returns elapsed seconds when `measure_time`.
    pub fn train(&mut self, measure_time: bool) -> Result<Option<f64>> {
        let split = self.split.as_ref().ok_or(EvalError::NoDataset)?;
        let start = Instant::now();
        self.predictor.train_impl(&split.x_train, &split.y_train)?;
        self.has_trained = true;
        let elapsed = start.elapsed().as_secs_f64();
        log::debug!("Trained {} in {:.3}s", self.predictor.name(), elapsed);
        Ok(if measure_time { Some(elapsed) } else { None })
    }

    pub fn test(&self, x: ArrayView2<'_, f32>) -> Result<Vec<bool>> {
        self.predictor.test(x)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.predictor.save(path)?;
        if !self.feature_names.is_empty() {
            persist::attach_feature_names(path, &self.feature_names)?;
        }
        Ok(())
    }

    /// Fail when `names` differ from the training columns. A model that does
    /// not know its training columns accepts any names.
    pub fn check_feature_names(&self, names: &[String]) -> Result<()> {
        if self.feature_names.is_empty() || self.feature_names == names {
            return Ok(());
        }
        Err(EvalError::FeatureMismatch {
            expected: self.feature_names.clone(),
            found: names.to_vec(),
        })
    }

    /// Backend-specific hyper-parameter search over the train split.
    pub fn grid_search(&self) -> Result<GridSearchOutcome> {
        let split = self.split()?;
        self.predictor.grid_search(&split.x_train, &split.y_train)
    }

    /// Stratified k-fold grid search over the train split, scored by F1.
    pub fn default_stratified_grid_search<P, F>(
        &self,
        grid: &ParamGrid,
        n_folds: usize,
        build: F,
    ) -> Result<(P, ParamSet)>
    where
        P: Predictor,
        F: Fn(&ParamSet) -> Result<P>,
    {
        let split = self.split()?;
        grid_search::default_stratified_grid_search(
            &split.x_train,
            &split.y_train,
            grid,
            n_folds,
            build,
        )
    }

    /// Predict the first `n_samples` test rows `n_runs` times, then measure
    /// the saved size and the memory cost of loading it back.
    ///
    /// `compute_time` is cumulative over the runs.
    pub fn benchmark(&self, n_samples: usize, n_runs: usize) -> Result<BenchmarkResult> {
        let x_test = self.x_test()?;
        if n_samples > x_test.nrows() {
            return Err(EvalError::InsufficientSamples {
                requested: n_samples,
                available: x_test.nrows(),
            });
        }
        let rows = x_test.slice(ndarray::s![..n_samples, ..]);

        Ok(BenchmarkResult {
            compute_time: benchmark::compute_time(self.predictor.as_ref(), rows, n_runs)?,
            disk_bytes: benchmark::disk_footprint(self.predictor.as_ref())?,
            ram_bytes: benchmark::ram_footprint(self.predictor.as_ref())?,
        })
    }

    /// `len(X_test) / (len(X_train) + len(X_test))`
    pub fn effective_split_ratio(&self) -> Result<f64> {
        Ok(self.split()?.effective_ratio())
    }

    pub fn undersample(
        x: &Array2<f32>,
        y: &Array1<bool>,
        method: UndersampleMethod,
    ) -> Result<(Array2<f32>, Array1<bool>)> {
        resampling::undersample(x, y, method)
    }

    /// Score predictions on `(x, y)`, or on the test split when both are
    /// `None`. Giving only one of them is an error.
    pub fn validate<'a>(
        &'a self,
        print_metrics: bool,
        x: Option<ArrayView2<'a, f32>>,
        y: Option<&[bool]>,
    ) -> Result<Validation> {
        let (x, actual) = match (x, y) {
            (Some(x), Some(y)) => (x, y.to_vec()),
            (None, None) => {
                let split = self.split()?;
                (split.x_test.view(), split.y_test.to_vec())
            }
            _ => return Err(EvalError::PartialOverride),
        };

        let predicted = self.test(x)?;
        let confusion = ConfusionMatrix::new(&actual, &predicted)?;
        let scores = metrics::labels_as_scores(&predicted);

        let validation = Validation {
            confusion,
            accuracy: metrics::accuracy(&confusion)?,
            precision: metrics::precision(&confusion)?,
            recall: metrics::recall(&confusion)?,
            specificity: metrics::specificity(&confusion)?,
            f1: metrics::f1_score(&confusion),
            auc: metrics::roc_auc(&actual, &scores)?,
            auprc: metrics::average_precision(&actual, &scores)?,
        };

        if print_metrics {
            self.print_report(&validation, x.nrows())?;
            if let Some(dir) = &self.plot_dir {
                self.write_plots(&validation, dir)?;
            }
        }
        Ok(validation)
    }

    fn print_report(&self, v: &Validation, n_validated: usize) -> Result<()> {
        if let Ok(ratio) = self.effective_split_ratio() {
            println!("Actual split ratio: {}", ratio);
        }
        println!("Total data points pre-sample: {}", self.x_pre_len);
        if let Ok(x_train) = self.x_train() {
            println!("Total data post-sample: {}", x_train.nrows() + n_validated);
        }
        println!("{}", v.confusion);
        let rates = v.rates()?;
        println!("False Positive Rate: {:.4}", rates.fp_rate);
        println!("False Negative Rate: {:.4}", rates.fn_rate);

        println!("Accuracy: {:.4}", v.accuracy);
        println!("Recall or True Positive Rate: {:.4}", v.recall);
        println!("Specificity or True Negative Rate: {:.4}", v.specificity);
        println!("G-Mean: {:.4}", v.g_mean());

        println!("Precision: {:.4}", v.precision);
        println!("F1 Score: {:.4}", v.f1);
        println!("AUC: {:.4}", v.auc);
        println!("AUPRC or Average Precision Score: {:.4}", v.auprc);
        Ok(())
    }

    fn write_plots(&self, v: &Validation, dir: &Path) -> Result<()> {
        let rates = v.rates()?;
        let roc = plots::plot_roc_point(
            rates.fp_rate,
            rates.tp_rate,
            v.auc,
            "Receiver Operating Characteristic (ROC) Curve",
        );
        plots::write_plot(&roc, &dir.join(format!("{}-roc.html", self.name())))?;
        v.confusion
            .display(dir.join(format!("{}-confusion.html", self.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rule_based::{RuleBasedModel, RuleParams};
    use approx::assert_relative_eq;

    fn dataset(n: usize) -> Dataset {
        // One fault in four; faults have a slow round trip
        let rows: Vec<Vec<f32>> = (0..n)
            .map(|i| {
                let rtt = if i % 4 == 0 { 90.0 } else { 20.0 + (i % 7) as f32 };
                vec![rtt, -5.0 - (i % 3) as f32]
            })
            .collect();
        let y = (0..n).map(|i| i % 4 == 0).collect();
        Dataset::from_rows(vec!["rtt".to_string(), "rsrq".to_string()], rows, y).unwrap()
    }

    fn rule(names: &[String]) -> Box<dyn Predictor> {
        Box::new(RuleBasedModel::new(names, RuleParams::default()).unwrap())
    }

    #[test]
    fn test_construction_splits_then_undersamples() {
        let ds = dataset(200);
        let names = ds.feature_names.clone();
        let model = BaseModel::new(ds, rule(&names)).unwrap();

        assert!(!model.has_trained());
        assert_eq!(model.x_pre_len(), 200);
        assert_eq!(model.x_test().unwrap().nrows(), 40);
        // The train side is balanced and smaller than the 160 raw train rows
        let (neg, pos) = class_counts(model.y_train().unwrap());
        assert_eq!(neg, pos);
        assert!(model.x_train().unwrap().nrows() < 160);

        let ratio = model.effective_split_ratio().unwrap();
        assert!(ratio > 0.2 && ratio < 1.0);
    }

    #[test]
    fn test_train_and_validate() {
        let ds = dataset(200);
        let names = ds.feature_names.clone();
        let mut model = BaseModel::new(ds, rule(&names)).unwrap();

        assert!(model.train(false).unwrap().is_none());
        assert!(model.train(true).unwrap().is_some());
        assert!(model.has_trained());

        let v = model.validate(false, None, None).unwrap();
        assert_relative_eq!(v.accuracy, 1.0);
        assert_relative_eq!(v.f1, 1.0);
        assert_eq!(v.confusion.total(), 40);
    }

    #[test]
    fn test_partial_override_rejected() {
        let ds = dataset(40);
        let names = ds.feature_names.clone();
        let x = ds.x.clone();
        let model = BaseModel::new(ds, rule(&names)).unwrap();
        assert!(matches!(
            model.validate(false, Some(x.view()), None),
            Err(EvalError::PartialOverride)
        ));
        assert!(matches!(
            model.validate(false, None, Some(&[true])),
            Err(EvalError::PartialOverride)
        ));
    }

    #[test]
    fn test_validate_on_explicit_rows_and_test_split() {
        let ds = dataset(40);
        let names = ds.feature_names.clone();
        let model = BaseModel::new(ds, rule(&names)).unwrap();

        let x = Array2::from_shape_vec((2, 2), vec![90.0, -5.0, 20.0, -5.0]).unwrap();
        let y = [true, false];
        let explicit = model.validate(false, Some(x.view()), Some(&y)).unwrap();
        assert_eq!(explicit.confusion.total(), 2);
        assert_relative_eq!(explicit.accuracy, 1.0);

        let split = model.validate(false, None, None).unwrap();
        assert_eq!(split.confusion.total(), 8);
    }

    #[test]
    fn test_saved_model_remembers_feature_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rule.json");
        let ds = dataset(40);
        let names = ds.feature_names.clone();
        let model = BaseModel::new(ds, rule(&names)).unwrap();
        model.save(&path).unwrap();

        let (predictor, stored) = persist::load_predictor_with_names(&path).unwrap();
        assert_eq!(stored, names);
        let restored = BaseModel::from_predictor(predictor).with_feature_names(stored);
        assert!(restored.check_feature_names(&names).is_ok());

        let swapped = vec!["rsrq".to_string(), "rtt".to_string()];
        assert!(matches!(
            restored.check_feature_names(&swapped),
            Err(EvalError::FeatureMismatch { .. })
        ));
        assert!(BaseModel::from_predictor(rule(&names))
            .check_feature_names(&swapped)
            .is_ok());
    }

    #[test]
    fn test_benchmark_requires_enough_test_rows() {
        let ds = dataset(40);
        let names = ds.feature_names.clone();
        let model = BaseModel::new(ds, rule(&names)).unwrap();
        assert!(matches!(
            model.benchmark(9, 1),
            Err(EvalError::InsufficientSamples { requested: 9, available: 8 })
        ));
        let result = model.benchmark(8, 2).unwrap();
        assert!(result.disk_bytes > 0);
        assert!(result.compute_time >= 0.0);
    }

    #[test]
    fn test_predictor_only_model_has_no_split() {
        let names = vec!["rtt".to_string(), "rsrq".to_string()];
        let mut model = BaseModel::from_predictor(rule(&names));
        assert!(model.has_trained());
        assert!(matches!(model.effective_split_ratio(), Err(EvalError::NoDataset)));
        assert!(matches!(model.train(false), Err(EvalError::NoDataset)));
        assert!(matches!(model.validate(false, None, None), Err(EvalError::NoDataset)));
    }

    #[test]
    fn test_plots_written_when_printing() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dataset(200);
        let names = ds.feature_names.clone();
        let model = BaseModel::new(ds, rule(&names))
            .unwrap()
            .with_plot_dir(dir.path());
        model.validate(true, None, None).unwrap();
        assert!(dir.path().join("RuleBasedModel-roc.html").exists());
        assert!(dir.path().join("RuleBasedModel-confusion.html").exists());
    }
}
