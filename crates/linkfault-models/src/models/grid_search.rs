//! Cross-validated hyper-parameter search shared by the predictor backends.
use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::metrics::f1_from_labels;
use crate::models::classifier_trait::Predictor;

/// Seed of the stratified fold shuffle.
pub const FOLD_SEED: u64 = 42;
pub const DEFAULT_FOLDS: usize = 5;

/// A single hyper-parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Some(*v as usize),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// One point of a parameter grid.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Look up a numeric parameter, failing with the parameter name.
pub fn param_f64(params: &ParamSet, name: &str) -> Result<f64> {
    params
        .get(name)
        .and_then(ParamValue::as_f64)
        .ok_or_else(|| EvalError::UnsupportedOption(format!("missing numeric parameter '{}'", name)))
}

pub fn param_usize(params: &ParamSet, name: &str) -> Result<usize> {
    params
        .get(name)
        .and_then(ParamValue::as_usize)
        .ok_or_else(|| EvalError::UnsupportedOption(format!("missing integer parameter '{}'", name)))
}

/// Candidate values per parameter name.
#[derive(Debug, Clone, Default)]
pub struct ParamGrid {
    entries: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.entries.insert(name.to_string(), values);
        self
    }

    /// Cartesian product of all candidate values, in key order.
    pub fn candidates(&self) -> Vec<ParamSet> {
        let mut out = vec![ParamSet::new()];
        for (name, values) in &self.entries {
            let mut next = Vec::with_capacity(out.len() * values.len());
            for partial in &out {
                for value in values {
                    let mut set = partial.clone();
                    set.insert(name.clone(), value.clone());
                    next.push(set);
                }
            }
            out = next;
        }
        out
    }
}

/// Row indices of `(train, validation)` for each fold.
pub type Fold = (Vec<usize>, Vec<usize>);

/// Stratified k-fold: rows of each class are shuffled and dealt round-robin,
/// so every fold sees roughly the overall class ratio.
pub fn stratified_k_fold(y: &Array1<bool>, n_folds: usize, seed: u64) -> Result<Vec<Fold>> {
    if n_folds < 2 || n_folds > y.len() {
        return Err(EvalError::InvalidSplit(format!(
            "cannot build {} folds from {} samples",
            n_folds,
            y.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; y.len()];
    let mut slot = 0usize;
    for class in [false, true] {
        let mut members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        if !members.is_empty() && members.len() < n_folds {
            log::warn!(
                "The least populated class has {} members, fewer than {} folds",
                members.len(),
                n_folds
            );
        }
        members.shuffle(&mut rng);
        for idx in members {
            assignment[idx] = slot % n_folds;
            slot += 1;
        }
    }

    Ok((0..n_folds)
        .map(|fold| {
            let (val, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| assignment[i] == fold);
            (train, val)
        })
        .collect())
}

/// Stratified k-fold grid search scored by F1.
///
/// `build` turns a parameter set into an unfitted predictor. The winner is
/// refit on the whole of `(x, y)` before being returned.
pub fn default_stratified_grid_search<P, F>(
    x: &Array2<f32>,
    y: &Array1<bool>,
    grid: &ParamGrid,
    n_folds: usize,
    build: F,
) -> Result<(P, ParamSet)>
where
    P: Predictor,
    F: Fn(&ParamSet) -> Result<P>,
{
    let candidates = grid.candidates();
    if grid.entries.is_empty() || candidates.is_empty() {
        return Err(EvalError::EmptyParamGrid);
    }
    let folds = stratified_k_fold(y, n_folds, FOLD_SEED)?;

    let mut best: Option<(ParamSet, f64)> = None;
    for params in candidates {
        let mut fold_scores = Vec::with_capacity(folds.len());
        for (train_idx, val_idx) in &folds {
            let mut candidate = build(&params)?;
            candidate.train_impl(&x.select(Axis(0), train_idx), &y.select(Axis(0), train_idx))?;
            let predictions = candidate.test(x.select(Axis(0), val_idx).view())?;
            let actual = y.select(Axis(0), val_idx).to_vec();
            fold_scores.push(f1_from_labels(&actual, &predictions)?);
        }
        let mean = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        log::debug!("Grid candidate {:?}: mean F1 {:.4}", params, mean);

        let improves = match &best {
            Some((_, best_score)) => mean > *best_score,
            None => true,
        };
        if improves {
            best = Some((params, mean));
        }
    }

    let (best_params, best_score) = best.ok_or(EvalError::EmptyParamGrid)?;
    log::info!("Best Hyperparameters: {}", format_params(&best_params));
    log::info!("Best score: {:.4}", best_score);

    let mut best_estimator = build(&best_params)?;
    best_estimator.train_impl(x, y)?;
    Ok((best_estimator, best_params))
}

pub fn format_params(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_cartesian_product() {
        let grid = ParamGrid::new()
            .with("depth", vec![ParamValue::Int(2), ParamValue::Int(4)])
            .with(
                "rate",
                vec![
                    ParamValue::Float(0.1),
                    ParamValue::Float(0.2),
                    ParamValue::Float(0.3),
                ],
            );
        let candidates = grid.candidates();
        assert_eq!(candidates.len(), 6);
        assert_eq!(candidates[0]["depth"], ParamValue::Int(2));
        assert_eq!(candidates[5]["rate"], ParamValue::Float(0.3));
    }

    #[test]
    fn test_stratified_folds_partition_rows() {
        let y = Array1::from_iter((0..23).map(|i| i % 4 == 0));
        let folds = stratified_k_fold(&y, 5, FOLD_SEED).unwrap();
        assert_eq!(folds.len(), 5);

        let mut all_val: Vec<usize> = folds.iter().flat_map(|(_, v)| v.clone()).collect();
        all_val.sort_unstable();
        assert_eq!(all_val, (0..23).collect::<Vec<_>>());

        for (train, val) in &folds {
            assert_eq!(train.len() + val.len(), 23);
            // 6 positives over 5 folds: each fold gets one or two
            let pos = val.iter().filter(|&&i| y[i]).count();
            assert!((1..=2).contains(&pos));
        }
    }

    #[test]
    fn test_stratified_folds_reject_bad_count() {
        let y = Array1::from_vec(vec![true, false, true]);
        assert!(stratified_k_fold(&y, 1, FOLD_SEED).is_err());
        assert!(stratified_k_fold(&y, 4, FOLD_SEED).is_err());
    }

    #[test]
    fn test_param_lookup() {
        let mut params = ParamSet::new();
        params.insert("max_depth".to_string(), ParamValue::Int(6));
        params.insert("rate".to_string(), ParamValue::Float(0.5));
        assert_eq!(param_usize(&params, "max_depth").unwrap(), 6);
        assert_eq!(param_f64(&params, "max_depth").unwrap(), 6.0);
        assert!(param_usize(&params, "rate").is_err());
        assert_eq!(format_params(&params), "max_depth=6, rate=0.5");
    }
}
