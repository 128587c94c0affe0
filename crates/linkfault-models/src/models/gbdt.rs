use std::path::Path;

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::models::classifier_trait::{GridSearchOutcome, Predictor};
use crate::models::grid_search::{
    default_stratified_grid_search, param_f64, param_usize, ParamGrid, ParamSet, ParamValue,
    DEFAULT_FOLDS,
};
use crate::models::persist::{PredictorEnvelope, PredictorKind};

/// Probability at or above which a row is predicted as a fault.
const DECISION_THRESHOLD: f32 = 0.5;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GBDTParams {
    pub max_depth: u32,
    pub num_boost_round: usize,
    pub learning_rate: f32,
    pub min_leaf_size: usize,
    pub training_optimization_level: u8,
    pub debug: bool,
}

impl Default for GBDTParams {
    fn default() -> Self {
        GBDTParams {
            max_depth: 6,
            num_boost_round: 50,
            learning_rate: 0.1,
            min_leaf_size: 1,
            training_optimization_level: 2,
            debug: false,
        }
    }
}

/// Fitted trees and the column count they were fitted on.
#[derive(Serialize, Deserialize)]
struct FittedGbdt {
    feature_size: usize,
    model: GBDT,
}

/// Gradient Boosting Decision Tree (GBDT) classifier
pub struct GBDTClassifier {
    fitted: Option<FittedGbdt>,
    params: GBDTParams,
}

impl GBDTClassifier {
    pub fn new(params: GBDTParams) -> Self {
        GBDTClassifier {
            fitted: None,
            params,
        }
    }

    pub fn params(&self) -> &GBDTParams {
        &self.params
    }

    pub(crate) fn from_envelope(envelope: &PredictorEnvelope) -> Result<Self> {
        Ok(GBDTClassifier {
            fitted: envelope.weights()?,
            params: envelope.params()?,
        })
    }

    fn with_grid_params(&self, params: &ParamSet) -> Result<Self> {
        Ok(GBDTClassifier::new(GBDTParams {
            max_depth: param_usize(params, "max_depth")? as u32,
            num_boost_round: param_usize(params, "num_boost_round")?,
            learning_rate: param_f64(params, "learning_rate")? as f32,
            ..self.params.clone()
        }))
    }

    /// Fault probability per row.
    pub fn predict_proba(&self, x: ArrayView2<'_, f32>) -> Result<Vec<f32>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| EvalError::Fit("GBDT predictor has not been trained".to_string()))?;
        if x.ncols() != fitted.feature_size {
            return Err(EvalError::LengthMismatch {
                left: x.ncols(),
                right: fitted.feature_size,
            });
        }

        let mut test_x = DataVec::new();
        for row in x.rows() {
            test_x.push(Data::new_test_data(row.to_vec(), None));
        }
        Ok(fitted.model.predict(&test_x))
    }
}

impl Predictor for GBDTClassifier {
    fn name(&self) -> &str {
        "GBDTClassifier"
    }

    fn train_impl(&mut self, x: &Array2<f32>, y: &Array1<bool>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(EvalError::LengthMismatch {
                left: x.nrows(),
                right: y.len(),
            });
        }

        let mut config = Config::new();
        config.set_feature_size(x.ncols());
        config.set_shrinkage(self.params.learning_rate);
        config.set_max_depth(self.params.max_depth);
        config.set_iterations(self.params.num_boost_round);
        config.set_min_leaf_size(self.params.min_leaf_size);
        config.set_debug(self.params.debug);
        config.set_training_optimization_level(self.params.training_optimization_level);
        config.set_loss("LogLikelyhood");

        let mut gbdt = GBDT::new(&config);

        // LogLikelyhood expects labels in {-1, 1}
        let mut train_x = DataVec::new();
        for (row, &label) in x.rows().into_iter().zip(y.iter()) {
            let target = if label { 1.0 } else { -1.0 };
            train_x.push(Data::new_training_data(row.to_vec(), 1.0, target, None));
        }

        gbdt.fit(&mut train_x);
        self.fitted = Some(FittedGbdt {
            feature_size: x.ncols(),
            model: gbdt,
        });
        Ok(())
    }

    fn test(&self, x: ArrayView2<'_, f32>) -> Result<Vec<bool>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| p >= DECISION_THRESHOLD)
            .collect())
    }

    fn predict_scores(&self, x: ArrayView2<'_, f32>) -> Result<Vec<f64>> {
        Ok(self.predict_proba(x)?.into_iter().map(f64::from).collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        PredictorEnvelope::new(PredictorKind::Gbdt, &self.params, &self.fitted)?.write(path)
    }

    fn grid_search(&self, x: &Array2<f32>, y: &Array1<bool>) -> Result<GridSearchOutcome> {
        let grid = ParamGrid::new()
            .with("max_depth", vec![ParamValue::Int(3), ParamValue::Int(6)])
            .with(
                "num_boost_round",
                vec![
                    ParamValue::Int(20),
                    ParamValue::Int(50),
                    ParamValue::Int(100),
                ],
            )
            .with(
                "learning_rate",
                vec![
                    ParamValue::Float(0.05),
                    ParamValue::Float(0.1),
                    ParamValue::Float(0.3),
                ],
            );

        let (best, params) =
            default_stratified_grid_search(x, y, &grid, DEFAULT_FOLDS, |p| self.with_grid_params(p))?;
        Ok(GridSearchOutcome {
            predictor: Box::new(best),
            params: Some(params),
        })
    }
}
