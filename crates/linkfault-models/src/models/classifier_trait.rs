use std::path::Path;

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::Result;
use crate::models::grid_search::ParamSet;

/// Contract of a concrete fault predictor.
///
/// The shared split, resampling, validation and benchmark logic lives in
/// [`BaseModel`](crate::models::base::BaseModel); implementations only wrap one
/// classification algorithm.
pub trait Predictor: Send + Sync {
    /// Name used for snapshot files, e.g. `GBDTClassifier`.
    fn name(&self) -> &str;

    /// Fit on the current training split. Calling it again re-fits.
    fn train_impl(&mut self, x: &Array2<f32>, y: &Array1<bool>) -> Result<()>;

    /// One prediction per row, in row order. Must not mutate the predictor.
    fn test(&self, x: ArrayView2<'_, f32>) -> Result<Vec<bool>>;

    /// Fault score per row in `[0, 1]`, used by model-agnostic explainers.
    /// Backends without probabilities score their labels as 0 or 1.
    fn predict_scores(&self, x: ArrayView2<'_, f32>) -> Result<Vec<f64>> {
        Ok(self
            .test(x)?
            .into_iter()
            .map(|fault| if fault { 1.0 } else { 0.0 })
            .collect())
    }

    /// Serialize the fitted predictor (not the dataset), overwriting `path`.
    fn save(&self, path: &Path) -> Result<()>;

    /// Hyper-parameter search over the training split. `params` is `None`
    /// when there is nothing to tune.
    fn grid_search(&self, x: &Array2<f32>, y: &Array1<bool>) -> Result<GridSearchOutcome>;

    /// Per-feature importance scores, when the algorithm exposes them.
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }
}

/// Best predictor of a grid search and the parameters that selected it.
pub struct GridSearchOutcome {
    pub predictor: Box<dyn Predictor>,
    pub params: Option<ParamSet>,
}
