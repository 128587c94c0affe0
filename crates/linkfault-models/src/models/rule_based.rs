use std::path::Path;

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::models::classifier_trait::{GridSearchOutcome, Predictor};
use crate::models::persist::{PredictorEnvelope, PredictorKind};

/// Thresholds of the hand-written fault rule.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RuleParams {
    pub rtt_column: String,
    pub rsrq_column: String,
    pub rtt_threshold: f32,
    pub rsrq_threshold: f32,
}

impl Default for RuleParams {
    fn default() -> Self {
        RuleParams {
            rtt_column: "rtt".to_string(),
            rsrq_column: "rsrq".to_string(),
            rtt_threshold: 50.0,
            rsrq_threshold: -10.0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
struct RuleColumns {
    rtt_index: usize,
    rsrq_index: usize,
}

/// Fixed rule: a high round-trip time predicts a fault, otherwise a poor
/// RSRQ does.
#[derive(Debug, Clone)]
pub struct RuleBasedModel {
    params: RuleParams,
    columns: RuleColumns,
}

impl RuleBasedModel {
    pub fn new(feature_names: &[String], params: RuleParams) -> Result<Self> {
        let position = |column: &str| {
            feature_names
                .iter()
                .position(|name| name == column)
                .ok_or_else(|| {
                    EvalError::UnsupportedOption(format!(
                        "feature column '{}' required by the rule-based model is missing",
                        column
                    ))
                })
        };
        let columns = RuleColumns {
            rtt_index: position(&params.rtt_column)?,
            rsrq_index: position(&params.rsrq_column)?,
        };
        Ok(RuleBasedModel { params, columns })
    }

    pub(crate) fn from_envelope(envelope: &PredictorEnvelope) -> Result<Self> {
        Ok(RuleBasedModel {
            params: envelope.params()?,
            columns: envelope.weights()?,
        })
    }

    fn predict_row(&self, rtt: f32, rsrq: f32) -> bool {
        if rtt > self.params.rtt_threshold {
            return true;
        }
        rsrq <= self.params.rsrq_threshold
    }
}

impl Predictor for RuleBasedModel {
    fn name(&self) -> &str {
        "RuleBasedModel"
    }

    fn train_impl(&mut self, _x: &Array2<f32>, _y: &Array1<bool>) -> Result<()> {
        Ok(())
    }

    fn test(&self, x: ArrayView2<'_, f32>) -> Result<Vec<bool>> {
        let width = self.columns.rtt_index.max(self.columns.rsrq_index) + 1;
        if x.ncols() < width {
            return Err(EvalError::LengthMismatch {
                left: x.ncols(),
                right: width,
            });
        }
        Ok(x
            .rows()
            .into_iter()
            .map(|row| self.predict_row(row[self.columns.rtt_index], row[self.columns.rsrq_index]))
            .collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        PredictorEnvelope::new(PredictorKind::RuleBased, &self.params, &self.columns)?.write(path)
    }

    fn grid_search(&self, _x: &Array2<f32>, _y: &Array1<bool>) -> Result<GridSearchOutcome> {
        Ok(GridSearchOutcome {
            predictor: Box::new(self.clone()),
            params: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::persist::load_predictor;

    fn names() -> Vec<String> {
        vec!["rsrq".to_string(), "rssi".to_string(), "rtt".to_string()]
    }

    #[test]
    fn test_rule_predictions() {
        let model = RuleBasedModel::new(&names(), RuleParams::default()).unwrap();
        let x = Array2::from_shape_vec(
            (4, 3),
            vec![
                -5.0, -70.0, 80.0, // slow link
                -12.0, -70.0, 20.0, // poor rsrq
                -10.0, -70.0, 50.0, // rsrq at the threshold
                -4.0, -60.0, 30.0, // healthy
            ],
        )
        .unwrap();
        assert_eq!(
            model.test(x.view()).unwrap(),
            vec![true, true, true, false]
        );
    }

    #[test]
    fn test_missing_column() {
        let err = RuleBasedModel::new(&["rtt".to_string()], RuleParams::default()).unwrap_err();
        assert!(matches!(err, EvalError::UnsupportedOption(_)));
    }

    #[test]
    fn test_grid_search_has_no_params() {
        let model = RuleBasedModel::new(&names(), RuleParams::default()).unwrap();
        let x = Array2::<f32>::zeros((2, 3));
        let y = Array1::from_vec(vec![true, false]);
        let outcome = model.grid_search(&x, &y).unwrap();
        assert!(outcome.params.is_none());
        assert_eq!(outcome.predictor.name(), "RuleBasedModel");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rule.json");
        let model = RuleBasedModel::new(&names(), RuleParams::default()).unwrap();
        model.save(&path).unwrap();

        let loaded = load_predictor(&path).unwrap();
        let x = Array2::from_shape_vec((2, 3), vec![-12.0, 0.0, 10.0, -3.0, 0.0, 10.0]).unwrap();
        assert_eq!(loaded.test(x.view()).unwrap(), vec![true, false]);
    }
}
