use std::path::Path;

use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::models::classifier_trait::{GridSearchOutcome, Predictor};
use crate::models::grid_search::{
    default_stratified_grid_search, param_f64, param_usize, ParamGrid, ParamSet, ParamValue,
    DEFAULT_FOLDS,
};
use crate::models::persist::{PredictorEnvelope, PredictorKind};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Gini,
    Entropy,
}

impl From<Criterion> for SplitQuality {
    fn from(criterion: Criterion) -> Self {
        match criterion {
            Criterion::Gini => SplitQuality::Gini,
            Criterion::Entropy => SplitQuality::Entropy,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TreeParams {
    pub criterion: Criterion,
    /// `None` grows the tree until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_weight_split: f32,
    pub min_weight_leaf: f32,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            criterion: Criterion::Gini,
            max_depth: None,
            min_weight_split: 2.0,
            min_weight_leaf: 1.0,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FittedTree {
    feature_size: usize,
    model: DecisionTree<f64, bool>,
}

/// Single CART tree. Exposes impurity-decrease feature importances.
pub struct DecisionTreeClassifier {
    fitted: Option<FittedTree>,
    params: TreeParams,
}

impl DecisionTreeClassifier {
    pub fn new(params: TreeParams) -> Self {
        DecisionTreeClassifier {
            fitted: None,
            params,
        }
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub(crate) fn from_envelope(envelope: &PredictorEnvelope) -> Result<Self> {
        Ok(DecisionTreeClassifier {
            fitted: envelope.weights()?,
            params: envelope.params()?,
        })
    }

    fn with_grid_params(&self, params: &ParamSet) -> Result<Self> {
        let criterion = match params.get("criterion") {
            Some(ParamValue::Text(name)) if name == "entropy" => Criterion::Entropy,
            Some(ParamValue::Text(name)) if name == "gini" => Criterion::Gini,
            other => {
                return Err(EvalError::UnsupportedOption(format!(
                    "unknown split criterion {:?}",
                    other
                )))
            }
        };
        // 0 stands for an unbounded depth
        let max_depth = match param_usize(params, "max_depth")? {
            0 => None,
            depth => Some(depth),
        };
        Ok(DecisionTreeClassifier::new(TreeParams {
            criterion,
            max_depth,
            min_weight_split: param_f64(params, "min_weight_split")? as f32,
            min_weight_leaf: param_f64(params, "min_weight_leaf")? as f32,
        }))
    }
}

impl Predictor for DecisionTreeClassifier {
    fn name(&self) -> &str {
        "DecisionTreeClassifier"
    }

    fn train_impl(&mut self, x: &Array2<f32>, y: &Array1<bool>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(EvalError::LengthMismatch {
                left: x.nrows(),
                right: y.len(),
            });
        }

        let dataset = Dataset::new(x.mapv(|v| v as f64), y.clone());
        let model = DecisionTree::<f64, bool>::params()
            .split_quality(self.params.criterion.into())
            .max_depth(self.params.max_depth)
            .min_weight_split(self.params.min_weight_split)
            .min_weight_leaf(self.params.min_weight_leaf)
            .fit(&dataset)
            .map_err(|e| EvalError::Fit(e.to_string()))?;

        self.fitted = Some(FittedTree {
            feature_size: x.ncols(),
            model,
        });
        Ok(())
    }

    fn test(&self, x: ArrayView2<'_, f32>) -> Result<Vec<bool>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| {
            EvalError::Fit("decision tree predictor has not been trained".to_string())
        })?;
        if x.ncols() != fitted.feature_size {
            return Err(EvalError::LengthMismatch {
                left: x.ncols(),
                right: fitted.feature_size,
            });
        }
        let records = x.mapv(|v| v as f64);
        Ok(fitted.model.predict(&records).to_vec())
    }

    fn save(&self, path: &Path) -> Result<()> {
        PredictorEnvelope::new(PredictorKind::DecisionTree, &self.params, &self.fitted)?.write(path)
    }

    fn grid_search(&self, x: &Array2<f32>, y: &Array1<bool>) -> Result<GridSearchOutcome> {
        let grid = ParamGrid::new()
            .with(
                "criterion",
                vec![
                    ParamValue::Text("gini".to_string()),
                    ParamValue::Text("entropy".to_string()),
                ],
            )
            .with(
                "max_depth",
                [0, 5, 10, 15].iter().map(|&d| ParamValue::Int(d)).collect(),
            )
            .with(
                "min_weight_split",
                [2.0, 5.0, 10.0].iter().map(|&w| ParamValue::Float(w)).collect(),
            )
            .with(
                "min_weight_leaf",
                [1.0, 2.0, 4.0].iter().map(|&w| ParamValue::Float(w)).collect(),
            );

        let (best, params) =
            default_stratified_grid_search(x, y, &grid, DEFAULT_FOLDS, |p| self.with_grid_params(p))?;
        Ok(GridSearchOutcome {
            predictor: Box::new(best),
            params: Some(params),
        })
    }

    /// Total impurity decrease contributed by each feature.
    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.fitted
            .as_ref()
            .map(|fitted| fitted.model.feature_importance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::persist::load_predictor;

    fn split_on_rtt() -> (Array2<f32>, Array1<bool>) {
        // Column 0 is noise, column 1 decides the label
        let n = 40;
        let x = Array2::from_shape_fn((n, 2), |(r, c)| {
            if c == 0 {
                ((r * 3) % 7) as f32
            } else if r % 2 == 0 {
                70.0 + r as f32
            } else {
                15.0 + (r % 4) as f32
            }
        });
        let y = Array1::from_iter((0..n).map(|r| r % 2 == 0));
        (x, y)
    }

    #[test]
    fn test_tree_learns_split_and_ranks_it() {
        let (x, y) = split_on_rtt();
        let mut tree = DecisionTreeClassifier::new(TreeParams::default());
        assert!(tree.feature_importances().is_none());
        tree.train_impl(&x, &y).unwrap();

        assert_eq!(tree.test(x.view()).unwrap(), y.to_vec());
        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances.iter().all(|&v| v >= 0.0));
        assert!(importances[1] > importances[0]);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (x, y) = split_on_rtt();
        let mut tree = DecisionTreeClassifier::new(TreeParams {
            max_depth: Some(3),
            ..TreeParams::default()
        });
        tree.train_impl(&x, &y).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        tree.save(&path).unwrap();

        let loaded = load_predictor(&path).unwrap();
        assert_eq!(loaded.name(), "DecisionTreeClassifier");
        assert_eq!(loaded.test(x.view()).unwrap(), tree.test(x.view()).unwrap());
        assert_eq!(loaded.feature_importances(), tree.feature_importances());
    }

    #[test]
    fn test_rejects_wrong_column_count() {
        let (x, y) = split_on_rtt();
        let mut tree = DecisionTreeClassifier::new(TreeParams::default());
        assert!(matches!(tree.test(x.view()), Err(EvalError::Fit(_))));
        tree.train_impl(&x, &y).unwrap();

        let wide = Array2::<f32>::zeros((3, 5));
        assert!(matches!(
            tree.test(wide.view()),
            Err(EvalError::LengthMismatch { left: 5, right: 2 })
        ));
    }

    #[test]
    fn test_grid_params() {
        let tree = DecisionTreeClassifier::new(TreeParams::default());
        let mut params = ParamSet::new();
        params.insert("criterion".to_string(), ParamValue::Text("entropy".to_string()));
        params.insert("max_depth".to_string(), ParamValue::Int(0));
        params.insert("min_weight_split".to_string(), ParamValue::Float(5.0));
        params.insert("min_weight_leaf".to_string(), ParamValue::Float(2.0));

        let built = tree.with_grid_params(&params).unwrap();
        assert_eq!(built.params().criterion, Criterion::Entropy);
        assert_eq!(built.params().max_depth, None);
        assert_eq!(built.params().min_weight_split, 5.0);

        params.insert("criterion".to_string(), ParamValue::Text("log_loss".to_string()));
        assert!(tree.with_grid_params(&params).is_err());
    }
}
