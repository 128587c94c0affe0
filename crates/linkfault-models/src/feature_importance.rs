//! Ranked feature importance: scores exposed by a predictor, or
//! model-agnostic permutation importance measured on held-out rows.
use std::cmp::Ordering;
use std::path::Path;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::confusion::ConfusionMatrix;
use crate::error::{EvalError, Result};
use crate::metrics::accuracy;
use crate::models::classifier_trait::Predictor;
use crate::report::plots;

/// Pair scores with feature names, highest first, keeping at most `top`.
pub fn rank_importances(
    feature_names: &[String],
    scores: &[f64],
    top: Option<usize>,
) -> Result<Vec<(String, f64)>> {
    if feature_names.len() != scores.len() {
        return Err(EvalError::LengthMismatch {
            left: feature_names.len(),
            right: scores.len(),
        });
    }
    let mut ranked: Vec<(String, f64)> = feature_names
        .iter()
        .cloned()
        .zip(scores.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    if let Some(top) = top {
        ranked.truncate(top);
    }
    Ok(ranked)
}

/// Accuracy drop caused by shuffling one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermutationImportance {
    pub feature: String,
    pub mean: f64,
    pub std: f64,
}

fn accuracy_of(predictor: &dyn Predictor, x: &Array2<f32>, y: &[bool]) -> Result<f64> {
    let predicted = predictor.test(x.view())?;
    accuracy(&ConfusionMatrix::new(y, &predicted)?)
}

/// Permutation importance of every column of `x`, highest mean first.
///
/// Each column is scored on its own copy of `x`, so columns run in parallel.
/// Repeat `r` of column `c` shuffles with seed `seed + c`.
pub fn permutation_importance(
    predictor: &dyn Predictor,
    x: &Array2<f32>,
    y: &Array1<bool>,
    feature_names: &[String],
    n_repeats: usize,
    seed: u64,
) -> Result<Vec<PermutationImportance>> {
    if x.nrows() != y.len() {
        return Err(EvalError::LengthMismatch {
            left: x.nrows(),
            right: y.len(),
        });
    }
    if feature_names.len() != x.ncols() {
        return Err(EvalError::LengthMismatch {
            left: feature_names.len(),
            right: x.ncols(),
        });
    }
    if n_repeats == 0 {
        return Err(EvalError::UnsupportedOption(
            "permutation importance needs at least one repeat".to_string(),
        ));
    }

    let actual = y.to_vec();
    let baseline = accuracy_of(predictor, x, &actual)?;
    log::debug!("Permutation baseline accuracy {:.4}", baseline);

    let mut importances = (0..x.ncols())
        .into_par_iter()
        .map(|col| -> Result<PermutationImportance> {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(col as u64));
            let mut shuffled = x.clone();
            let mut drops = Vec::with_capacity(n_repeats);
            for _ in 0..n_repeats {
                let mut column = x.column(col).to_vec();
                column.shuffle(&mut rng);
                shuffled
                    .column_mut(col)
                    .assign(&Array1::from_vec(column));
                drops.push(baseline - accuracy_of(predictor, &shuffled, &actual)?);
            }
            Ok(PermutationImportance {
                feature: feature_names[col].clone(),
                mean: drops.iter().mean(),
                std: drops.iter().population_std_dev(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    importances.sort_by(|a, b| b.mean.partial_cmp(&a.mean).unwrap_or(Ordering::Equal));
    Ok(importances)
}

/// Write a horizontal bar chart of `ranked` to `path`.
pub fn plot_ranked(ranked: &[(String, f64)], title: &str, path: &Path) -> Result<()> {
    plots::write_plot(&plots::plot_importances(ranked, title), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rule_based::{RuleBasedModel, RuleParams};
    use approx::assert_relative_eq;

    #[test]
    fn test_rank_orders_descending() {
        let names = vec!["rssi".to_string(), "rtt".to_string(), "hour".to_string()];
        let ranked = rank_importances(&names, &[0.1, 0.7, 0.2], Some(2)).unwrap();
        assert_eq!(
            ranked,
            vec![("rtt".to_string(), 0.7), ("hour".to_string(), 0.2)]
        );
        assert!(rank_importances(&names, &[0.1], None).is_err());
    }

    #[test]
    fn test_permutation_ignores_unused_column() {
        // The rule reads only rtt (col 0) and rsrq (col 1); col 2 is never used
        let names = vec!["rtt".to_string(), "rsrq".to_string(), "population".to_string()];
        let model = RuleBasedModel::new(&names, RuleParams::default()).unwrap();
        let n = 40;
        let x = Array2::from_shape_fn((n, 3), |(r, c)| match c {
            0 => if r % 2 == 0 { 90.0 } else { 10.0 },
            1 => -5.0,
            _ => r as f32,
        });
        let y = Array1::from_iter((0..n).map(|r| r % 2 == 0));

        let result = permutation_importance(&model, &x, &y, &names, 5, 0).unwrap();
        assert_eq!(result[0].feature, "rtt");
        assert!(result[0].mean > 0.2);
        let unused = result.iter().find(|p| p.feature == "population").unwrap();
        assert_relative_eq!(unused.mean, 0.0);
        assert_relative_eq!(unused.std, 0.0);
    }
}
