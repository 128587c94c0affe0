//! Kernel SHAP attributions for any [`Predictor`].
//!
//! A row's attribution `phi` splits `f(x) - E[f(background)]` across the
//! features, where `f` is [`Predictor::predict_scores`]. Absent features are
//! filled from background rows. Coalitions are enumerated exhaustively when
//! `2^m - 2 <= n_samples` (exact Shapley values), otherwise drawn from the
//! Shapley kernel with a seeded RNG. The weighted least-squares fit is
//! constrained so that `sum(phi) == f(x) - E` holds for every row.
//!
//! Global importance is the mean `|phi|` per feature. The same matrix is also
//! summarised per prediction outcome (correct, false negative, ...) of the
//! explained rows.
use std::cmp::Ordering;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::feature_importance::rank_importances;
use crate::models::classifier_trait::Predictor;

/// Largest feature count for which every coalition is enumerated.
const MAX_EXACT_FEATURES: usize = 20;
const SINGULAR_EPS: f64 = 1e-12;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct KernelShapConfig {
    /// Coalitions evaluated per explained row.
    pub n_samples: usize,
    /// Background rows kept to fill absent features.
    pub background_size: usize,
    /// Rows explained by [`shap_importance_by_outcome`].
    pub max_rows: usize,
    pub seed: u64,
}

impl Default for KernelShapConfig {
    fn default() -> Self {
        KernelShapConfig {
            n_samples: 1024,
            background_size: 25,
            max_rows: 200,
            seed: 42,
        }
    }
}

struct Coalition {
    mask: Vec<bool>,
    weight: f64,
}

/// C(n, k) as a float.
fn n_choose_k(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Shapley kernel weight of one coalition of `size` out of `m` features.
/// Only defined for `0 < size < m`.
fn kernel_weight(m: usize, size: usize) -> f64 {
    (m - 1) as f64 / (n_choose_k(m, size) * size as f64 * (m - size) as f64)
}

fn exhaustive_coalitions(m: usize) -> Vec<Coalition> {
    (1..(1usize << m) - 1)
        .map(|bits| {
            let mask: Vec<bool> = (0..m).map(|j| (bits >> j) & 1 == 1).collect();
            let size = mask.iter().filter(|&&b| b).count();
            Coalition {
                mask,
                weight: kernel_weight(m, size),
            }
        })
        .collect()
}

/// Coalition sizes are drawn proportionally to their total kernel mass, so
/// every draw carries the same weight.
fn sampled_coalitions(m: usize, n_samples: usize, seed: u64) -> Result<Vec<Coalition>> {
    let sizes: Vec<usize> = (1..m).collect();
    let size_mass: Vec<f64> = sizes
        .iter()
        .map(|&k| 1.0 / (k as f64 * (m - k) as f64))
        .collect();
    let size_dist =
        WeightedIndex::new(&size_mass).map_err(|e| EvalError::Explain(e.to_string()))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let weight = 1.0 / n_samples as f64;
    Ok((0..n_samples)
        .map(|_| {
            let size = sizes[size_dist.sample(&mut rng)];
            let mut mask = vec![false; m];
            for j in index::sample(&mut rng, m, size) {
                mask[j] = true;
            }
            Coalition { mask, weight }
        })
        .collect())
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                a[[i, col]]
                    .abs()
                    .partial_cmp(&a[[j, col]].abs())
                    .unwrap_or(Ordering::Equal)
            })
            .unwrap_or(col);
        if a[[pivot, col]].abs() < SINGULAR_EPS {
            return Err(EvalError::Explain(
                "coalition system is singular, raise n_samples".to_string(),
            ));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                let delta = factor * a[[col, k]];
                a[[row, k]] -= delta;
            }
            let delta = factor * b[col];
            b[row] -= delta;
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

/// Seeded, sorted choice of at most `max_rows` of `n_rows` row indices.
fn sample_rows(n_rows: usize, max_rows: usize, seed: u64) -> Vec<usize> {
    if n_rows <= max_rows {
        return (0..n_rows).collect();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = index::sample(&mut rng, n_rows, max_rows).into_vec();
    rows.sort_unstable();
    rows
}

pub struct KernelExplainer<'a> {
    predictor: &'a dyn Predictor,
    background: Array2<f32>,
    expected_value: f64,
    coalitions: Vec<Coalition>,
}

impl<'a> KernelExplainer<'a> {
    /// Explainer over `background`, reduced to `config.background_size`
    /// seeded rows when larger.
    pub fn new(
        predictor: &'a dyn Predictor,
        background: ArrayView2<'_, f32>,
        config: &KernelShapConfig,
    ) -> Result<Self> {
        if config.n_samples == 0 || config.background_size == 0 {
            return Err(EvalError::UnsupportedOption(
                "kernel SHAP needs at least one coalition and one background row".to_string(),
            ));
        }
        if background.nrows() == 0 {
            return Err(EvalError::Explain("background data is empty".to_string()));
        }
        let m = background.ncols();
        if m == 0 {
            return Err(EvalError::Explain("there are no features to explain".to_string()));
        }

        let kept = sample_rows(background.nrows(), config.background_size, config.seed);
        let background = background.select(Axis(0), &kept);
        let scores = predictor.predict_scores(background.view())?;
        let expected_value = scores.iter().sum::<f64>() / scores.len() as f64;

        let coalitions = if m == 1 {
            Vec::new()
        } else if m <= MAX_EXACT_FEATURES && (1usize << m) - 2 <= config.n_samples {
            exhaustive_coalitions(m)
        } else {
            sampled_coalitions(m, config.n_samples, config.seed)?
        };
        log::debug!(
            "Kernel SHAP over {} features: {} coalitions x {} background rows, E[f] = {:.4}",
            m,
            coalitions.len(),
            background.nrows(),
            expected_value
        );

        Ok(KernelExplainer {
            predictor,
            background,
            expected_value,
            coalitions,
        })
    }

    /// Mean score over the background rows.
    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    pub fn n_features(&self) -> usize {
        self.background.ncols()
    }

    fn explain_row(&self, row: ArrayView1<'_, f32>) -> Result<Array1<f64>> {
        let m = self.n_features();
        let single = row.to_owned().insert_axis(Axis(0));
        let full = self.predictor.predict_scores(single.view())?[0];
        let delta = full - self.expected_value;
        if m == 1 {
            return Ok(Array1::from_elem(1, delta));
        }

        let n_background = self.background.nrows();
        let mut masked = Array2::<f32>::zeros((self.coalitions.len() * n_background, m));
        for (c, coalition) in self.coalitions.iter().enumerate() {
            for b in 0..n_background {
                let mut out = masked.row_mut(c * n_background + b);
                for j in 0..m {
                    out[j] = if coalition.mask[j] {
                        row[j]
                    } else {
                        self.background[[b, j]]
                    };
                }
            }
        }
        let scores = self.predictor.predict_scores(masked.view())?;
        if scores.len() != masked.nrows() {
            return Err(EvalError::LengthMismatch {
                left: scores.len(),
                right: masked.nrows(),
            });
        }

        // phi[last] = delta - sum(phi[..last]) is substituted into the fit
        let last = m - 1;
        let mut normal = Array2::<f64>::zeros((last, last));
        let mut rhs = Array1::<f64>::zeros(last);
        let mut design = vec![0.0f64; last];
        for (c, coalition) in self.coalitions.iter().enumerate() {
            let value = scores[c * n_background..(c + 1) * n_background]
                .iter()
                .sum::<f64>()
                / n_background as f64;
            let z_last = if coalition.mask[last] { 1.0 } else { 0.0 };
            let target = value - self.expected_value - z_last * delta;
            for (j, d) in design.iter_mut().enumerate() {
                *d = if coalition.mask[j] { 1.0 } else { 0.0 } - z_last;
            }
            for i in 0..last {
                if design[i] == 0.0 {
                    continue;
                }
                let wi = coalition.weight * design[i];
                rhs[i] += wi * target;
                for k in 0..last {
                    normal[[i, k]] += wi * design[k];
                }
            }
        }

        let head = solve_linear(normal, rhs)?;
        let mut phi = Array1::zeros(m);
        phi.slice_mut(s![..last]).assign(&head);
        phi[last] = delta - head.sum();
        Ok(phi)
    }

    /// One row of attributions per row of `x`. Rows are explained in
    /// parallel.
    pub fn shap_values(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(EvalError::LengthMismatch {
                left: x.ncols(),
                right: self.n_features(),
            });
        }
        let rows = (0..x.nrows())
            .into_par_iter()
            .map(|r| self.explain_row(x.row(r)))
            .collect::<Result<Vec<_>>>()?;

        let mut values = Array2::zeros((x.nrows(), self.n_features()));
        for (mut out, phi) in values.rows_mut().into_iter().zip(rows.iter()) {
            out.assign(phi);
        }
        Ok(values)
    }
}

/// Mean absolute attribution per feature, zero when `values` has no rows.
pub fn mean_abs_shap(values: ArrayView2<'_, f64>) -> Vec<f64> {
    values
        .mapv(f64::abs)
        .mean_axis(Axis(0))
        .map(|m| m.to_vec())
        .unwrap_or_else(|| vec![0.0; values.ncols()])
}

/// Subset of explained rows, by how the prediction compares with the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    All,
    Correct,
    Mispredicted,
    TruePositive,
    TrueNegative,
    FalsePositive,
    FalseNegative,
}

impl Outcome {
    pub const EVERY: [Outcome; 7] = [
        Outcome::All,
        Outcome::Correct,
        Outcome::Mispredicted,
        Outcome::TruePositive,
        Outcome::TrueNegative,
        Outcome::FalsePositive,
        Outcome::FalseNegative,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Outcome::All => "global",
            Outcome::Correct => "correct",
            Outcome::Mispredicted => "mispredicted",
            Outcome::TruePositive => "true-positive",
            Outcome::TrueNegative => "true-negative",
            Outcome::FalsePositive => "false-positive",
            Outcome::FalseNegative => "false-negative",
        }
    }

    pub fn matches(self, actual: bool, predicted: bool) -> bool {
        match self {
            Outcome::All => true,
            Outcome::Correct => actual == predicted,
            Outcome::Mispredicted => actual != predicted,
            Outcome::TruePositive => actual && predicted,
            Outcome::TrueNegative => !actual && !predicted,
            Outcome::FalsePositive => !actual && predicted,
            Outcome::FalseNegative => actual && !predicted,
        }
    }
}

/// Indices of the rows whose (actual, predicted) pair falls in `outcome`.
pub fn outcome_rows(actual: &[bool], predicted: &[bool], outcome: Outcome) -> Result<Vec<usize>> {
    if actual.len() != predicted.len() {
        return Err(EvalError::LengthMismatch {
            left: actual.len(),
            right: predicted.len(),
        });
    }
    Ok(actual
        .iter()
        .zip(predicted.iter())
        .enumerate()
        .filter(|(_, (&a, &p))| outcome.matches(a, p))
        .map(|(i, _)| i)
        .collect())
}

/// Mean |phi| ranking of one outcome subset.
#[derive(Debug, Clone, Serialize)]
pub struct ShapImportance {
    pub outcome: Outcome,
    pub rows: usize,
    pub ranked: Vec<(String, f64)>,
}

/// Explain at most `config.max_rows` seeded rows of `(x, y)` against
/// `background`, then rank features by mean |phi| globally and within each
/// [`Outcome`]. Empty subsets have an empty ranking.
pub fn shap_importance_by_outcome(
    predictor: &dyn Predictor,
    background: ArrayView2<'_, f32>,
    x: ArrayView2<'_, f32>,
    y: &[bool],
    feature_names: &[String],
    config: &KernelShapConfig,
    top: Option<usize>,
) -> Result<Vec<ShapImportance>> {
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

    let rows = sample_rows(x.nrows(), config.max_rows, config.seed);
    let explained = x.select(Axis(0), &rows);
    let actual: Vec<bool> = rows.iter().map(|&r| y[r]).collect();
    let predicted = predictor.test(explained.view())?;

    let explainer = KernelExplainer::new(predictor, background, config)?;
    let values = explainer.shap_values(explained.view())?;
    log::info!(
        "Explained {} rows, expected score {:.4}",
        rows.len(),
        explainer.expected_value()
    );

    Outcome::EVERY
        .iter()
        .map(|&outcome| {
            let subset = outcome_rows(&actual, &predicted, outcome)?;
            if subset.is_empty() {
                log::warn!("No {} rows to explain", outcome.label());
                return Ok(ShapImportance {
                    outcome,
                    rows: 0,
                    ranked: Vec::new(),
                });
            }
            let means = mean_abs_shap(values.select(Axis(0), &subset).view());
            Ok(ShapImportance {
                outcome,
                rows: subset.len(),
                ranked: rank_importances(feature_names, &means, top)?,
            })
        })
        .collect()
}
