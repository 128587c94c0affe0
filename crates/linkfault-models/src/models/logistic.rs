use std::path::Path;

use linfa::traits::Fit;
use linfa::Dataset;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::metrics::f1_from_labels;
use crate::models::classifier_trait::{GridSearchOutcome, Predictor};
use crate::models::grid_search::{
    default_stratified_grid_search, param_f64, stratified_k_fold, ParamGrid, ParamSet,
    ParamValue, DEFAULT_FOLDS, FOLD_SEED,
};
use crate::models::persist::{PredictorEnvelope, PredictorKind};

/// Number of evenly spaced cutoffs tried by `tune_threshold`.
const THRESHOLD_STEPS: usize = 100;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LogisticParams {
    /// Inverse regularisation strength.
    pub c: f64,
    pub max_iterations: u64,
    /// Fault probability above which a row is predicted as a fault.
    pub threshold: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        LogisticParams {
            c: 1.0,
            max_iterations: 10_000,
            threshold: 0.07,
        }
    }
}

/// Coefficients oriented so that the sigmoid yields P(fault).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
struct LogisticWeights {
    coefficients: Vec<f64>,
    intercept: f64,
}

/// L2-regularised logistic regression with a tunable probability cutoff.
#[derive(Debug, Clone)]
pub struct LogisticRegressionClassifier {
    weights: Option<LogisticWeights>,
    params: LogisticParams,
}

impl LogisticRegressionClassifier {
    pub fn new(params: LogisticParams) -> Self {
        LogisticRegressionClassifier {
            weights: None,
            params,
        }
    }

    pub fn params(&self) -> &LogisticParams {
        &self.params
    }

    pub(crate) fn from_envelope(envelope: &PredictorEnvelope) -> Result<Self> {
        Ok(LogisticRegressionClassifier {
            weights: envelope.weights()?,
            params: envelope.params()?,
        })
    }

    fn fit_weights(&self, x: &Array2<f32>, y: &Array1<bool>) -> Result<LogisticWeights> {
        if x.nrows() != y.len() {
            return Err(EvalError::LengthMismatch {
                left: x.nrows(),
                right: y.len(),
            });
        }
        if self.params.c <= 0.0 {
            return Err(EvalError::UnsupportedOption(format!(
                "regularisation C must be positive, got {}",
                self.params.c
            )));
        }

        let dataset = Dataset::new(x.mapv(|v| v as f64), y.clone());
        let fitted = LogisticRegression::default()
            .alpha(1.0 / self.params.c)
            .max_iterations(self.params.max_iterations)
            .fit(&dataset)
            .map_err(|e| EvalError::Fit(e.to_string()))?;

        let sign = if fitted.labels().pos.class { 1.0 } else { -1.0 };
        Ok(LogisticWeights {
            coefficients: fitted.params().iter().map(|w| sign * w).collect(),
            intercept: sign * fitted.intercept(),
        })
    }

    fn probabilities(weights: &LogisticWeights, x: ArrayView2<'_, f32>) -> Result<Vec<f64>> {
        if x.ncols() != weights.coefficients.len() {
            return Err(EvalError::LengthMismatch {
                left: x.ncols(),
                right: weights.coefficients.len(),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let z = weights.intercept
                    + row
                        .iter()
                        .zip(weights.coefficients.iter())
                        .map(|(&v, w)| v as f64 * w)
                        .sum::<f64>();
                1.0 / (1.0 + (-z).exp())
            })
            .collect())
    }

    /// Fault probability per row.
    pub fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Result<Vec<f64>> {
        let weights = self.weights.as_ref().ok_or_else(|| {
            EvalError::Fit("logistic regression predictor has not been trained".to_string())
        })?;
        Self::probabilities(weights, x)
    }

    /// Pick the probability cutoff with the best mean F1 over stratified
    /// folds of `(x, y)` and keep it. Can take a long time on large datasets.
    pub fn tune_threshold(&mut self, x: &Array2<f32>, y: &Array1<bool>, n_folds: usize) -> Result<f64> {
        let folds = stratified_k_fold(y, n_folds, FOLD_SEED)?;
        let thresholds: Vec<f64> = (0..THRESHOLD_STEPS)
            .map(|i| i as f64 / (THRESHOLD_STEPS - 1) as f64)
            .collect();

        let mut score_sums = vec![0.0f64; thresholds.len()];
        for (train_idx, val_idx) in &folds {
            let weights =
                self.fit_weights(&x.select(Axis(0), train_idx), &y.select(Axis(0), train_idx))?;
            let probabilities = Self::probabilities(&weights, x.select(Axis(0), val_idx).view())?;
            let actual = y.select(Axis(0), val_idx).to_vec();

            for (sum, &threshold) in score_sums.iter_mut().zip(thresholds.iter()) {
                let predicted: Vec<bool> = probabilities.iter().map(|&p| p >= threshold).collect();
                *sum += f1_from_labels(&actual, &predicted)?;
            }
        }

        let mut best = 0;
        for (i, sum) in score_sums.iter().enumerate() {
            if *sum > score_sums[best] {
                best = i;
            }
        }
        self.params.threshold = thresholds[best];
        log::info!(
            "Best Threshold: {:.4} (mean F1 {:.4})",
            self.params.threshold,
            score_sums[best] / folds.len() as f64
        );
        Ok(self.params.threshold)
    }
}

impl Predictor for LogisticRegressionClassifier {
    fn name(&self) -> &str {
        "LogisticRegressionClassifier"
    }

    fn train_impl(&mut self, x: &Array2<f32>, y: &Array1<bool>) -> Result<()> {
        self.weights = Some(self.fit_weights(x, y)?);
        Ok(())
    }

    fn test(&self, x: ArrayView2<'_, f32>) -> Result<Vec<bool>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| p > self.params.threshold)
            .collect())
    }

    fn predict_scores(&self, x: ArrayView2<'_, f32>) -> Result<Vec<f64>> {
        self.predict_proba(x)
    }

    fn save(&self, path: &Path) -> Result<()> {
        PredictorEnvelope::new(PredictorKind::LogisticRegression, &self.params, &self.weights)?
            .write(path)
    }

    fn grid_search(&self, x: &Array2<f32>, y: &Array1<bool>) -> Result<GridSearchOutcome> {
        let grid = ParamGrid::new().with(
            "C",
            [0.001, 0.01, 0.1, 1.0, 10.0, 100.0]
                .iter()
                .map(|&c| ParamValue::Float(c))
                .collect(),
        );

        let build = |params: &ParamSet| -> Result<Self> {
            Ok(LogisticRegressionClassifier::new(LogisticParams {
                c: param_f64(params, "C")?,
                ..self.params.clone()
            }))
        };
        let (best, params) = default_stratified_grid_search(x, y, &grid, DEFAULT_FOLDS, build)?;
        Ok(GridSearchOutcome {
            predictor: Box::new(best),
            params: Some(params),
        })
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.weights
            .as_ref()
            .map(|w| w.coefficients.iter().map(|c| c.abs()).collect())
    }
}
