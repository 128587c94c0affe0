//! Class balancing by undersampling the majority class.
//!
//! Only the training split is ever resampled; undersampling never adds rows.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// Seed of the random undersampler.
const RANDOM_UNDERSAMPLE_SEED: u64 = 0;
/// Minority neighbours averaged by NearMiss-1.
const NEARMISS_NEIGHBOURS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndersampleMethod {
    /// Keep the training split as is.
    None,
    #[default]
    Random,
    #[serde(rename = "nearmiss")]
    NearMiss,
}

impl UndersampleMethod {
    pub const ALL: [UndersampleMethod; 3] = [
        UndersampleMethod::None,
        UndersampleMethod::Random,
        UndersampleMethod::NearMiss,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UndersampleMethod::None => "none",
            UndersampleMethod::Random => "random",
            UndersampleMethod::NearMiss => "nearmiss",
        }
    }
}

impl fmt::Display for UndersampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UndersampleMethod {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(UndersampleMethod::None),
            "random" => Ok(UndersampleMethod::Random),
            "nearmiss" | "near_miss" => Ok(UndersampleMethod::NearMiss),
            other => Err(EvalError::UnsupportedOption(format!(
                "undersampling method '{}'. Valid options are: none, random, nearmiss",
                other
            ))),
        }
    }
}

/// Apply `method` to `(x, y)` and return the retained rows in original order.
pub fn undersample(
    x: &Array2<f32>,
    y: &Array1<bool>,
    method: UndersampleMethod,
) -> Result<(Array2<f32>, Array1<bool>)> {
    if x.nrows() != y.len() {
        return Err(EvalError::LengthMismatch {
            left: x.nrows(),
            right: y.len(),
        });
    }

    let positives: Vec<usize> = (0..y.len()).filter(|&i| y[i]).collect();
    let negatives: Vec<usize> = (0..y.len()).filter(|&i| !y[i]).collect();

    if method == UndersampleMethod::None || positives.is_empty() || negatives.is_empty() {
        return Ok((x.clone(), y.clone()));
    }

    let (minority, majority) = if positives.len() <= negatives.len() {
        (positives, negatives)
    } else {
        (negatives, positives)
    };

    let kept_majority = match method {
        UndersampleMethod::Random => random_subset(&majority, minority.len()),
        UndersampleMethod::NearMiss => nearmiss_subset(x, &majority, &minority),
        UndersampleMethod::None => majority.clone(),
    };

    let mut keep: Vec<usize> = minority.iter().chain(kept_majority.iter()).copied().collect();
    keep.sort_unstable();

    log::info!(
        "Undersampled ({}) {} rows down to {} ({} per class)",
        method,
        y.len(),
        keep.len(),
        minority.len()
    );

    Ok((x.select(Axis(0), &keep), y.select(Axis(0), &keep)))
}

fn random_subset(majority: &[usize], amount: usize) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(RANDOM_UNDERSAMPLE_SEED);
    sample(&mut rng, majority.len(), amount)
        .into_iter()
        .map(|i| majority[i])
        .collect()
}

fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&l, &r)| {
            let d = (l - r) as f64;
            d * d
        })
        .sum()
}

/// NearMiss-1: keep the majority rows closest on average to their nearest
/// minority rows.
fn nearmiss_subset(x: &Array2<f32>, majority: &[usize], minority: &[usize]) -> Vec<usize> {
    let k = NEARMISS_NEIGHBOURS.min(minority.len());

    let mut scored: Vec<(usize, f64)> = majority
        .iter()
        .map(|&m| {
            let mut distances: Vec<f64> = minority
                .iter()
                .map(|&n| squared_distance(x.row(m), x.row(n)).sqrt())
                .collect();
            distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            let mean = distances[..k].iter().sum::<f64>() / k as f64;
            (m, mean)
        })
        .collect();

    // Stable sort so equal distances keep the lower row index
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    scored
        .into_iter()
        .take(minority.len())
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::class_counts;

    fn imbalanced() -> (Array2<f32>, Array1<bool>) {
        // Rows 0..3 are faults near 10.0; the rest are spread from 0.0 to 15.0
        let values = vec![
            10.0, 10.5, 9.5, 0.0, 1.0, 2.0, 3.0, 9.0, 11.0, 12.0, 13.0, 14.0, 15.0,
        ];
        let n = values.len();
        let x = Array2::from_shape_vec((n, 1), values).unwrap();
        let y = Array1::from_iter((0..n).map(|i| i < 3));
        (x, y)
    }

    #[test]
    fn test_random_balances_classes() {
        let (x, y) = imbalanced();
        let (xs, ys) = undersample(&x, &y, UndersampleMethod::Random).unwrap();
        assert_eq!(class_counts(&ys), (3, 3));
        assert_eq!(xs.nrows(), 6);
        // Every minority row survives
        assert_eq!(&xs.column(0).to_vec()[..3], &[10.0, 10.5, 9.5]);
    }

    #[test]
    fn test_random_is_deterministic() {
        let (x, y) = imbalanced();
        let a = undersample(&x, &y, UndersampleMethod::Random).unwrap();
        let b = undersample(&x, &y, UndersampleMethod::Random).unwrap();
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn test_nearmiss_keeps_closest_majority() {
        let (x, y) = imbalanced();
        let (xs, ys) = undersample(&x, &y, UndersampleMethod::NearMiss).unwrap();
        assert_eq!(class_counts(&ys), (3, 3));
        let kept: Vec<f32> = xs
            .column(0)
            .iter()
            .zip(ys.iter())
            .filter(|(_, &label)| !label)
            .map(|(&v, _)| v)
            .collect();
        assert_eq!(kept, vec![9.0, 11.0, 12.0]);
    }

    #[test]
    fn test_none_and_single_class_untouched() {
        let (x, y) = imbalanced();
        let (xs, _) = undersample(&x, &y, UndersampleMethod::None).unwrap();
        assert_eq!(xs, x);

        let y_single = Array1::from_elem(x.nrows(), false);
        let (xs, ys) = undersample(&x, &y_single, UndersampleMethod::Random).unwrap();
        assert_eq!(xs.nrows(), x.nrows());
        assert_eq!(ys.len(), x.nrows());
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(matches!(
            "smote".parse::<UndersampleMethod>(),
            Err(EvalError::UnsupportedOption(_))
        ));
        assert_eq!(
            "NearMiss".parse::<UndersampleMethod>().unwrap(),
            UndersampleMethod::NearMiss
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn labelled_rows() -> impl Strategy<Value = (Array2<f32>, Array1<bool>)> {
            prop::collection::vec((-50.0_f32..50.0, -50.0_f32..50.0, any::<bool>()), 0..120).prop_map(
                |rows| {
                    let n = rows.len();
                    let values: Vec<f32> = rows.iter().flat_map(|&(a, b, _)| [a, b]).collect();
                    let x = Array2::from_shape_vec((n, 2), values).unwrap();
                    let y = Array1::from_iter(rows.iter().map(|&(_, _, label)| label));
                    (x, y)
                },
            )
        }

        proptest! {
            /// Undersampling balances two-class input and never adds rows.
            #[test]
            fn prop_undersampling_balances_and_shrinks(
                (x, y) in labelled_rows(),
                nearmiss in any::<bool>()
            ) {
                let method = if nearmiss { UndersampleMethod::NearMiss } else { UndersampleMethod::Random };
                let (xs, ys) = undersample(&x, &y, method).unwrap();
                prop_assert_eq!(xs.nrows(), ys.len());
                prop_assert!(ys.len() <= y.len());

                let (neg, pos) = class_counts(&y);
                let (neg_after, pos_after) = class_counts(&ys);
                if neg > 0 && pos > 0 {
                    prop_assert!(neg_after.abs_diff(pos_after) <= 1);
                    prop_assert_eq!(neg_after.min(pos_after), neg.min(pos));
                } else {
                    prop_assert_eq!(ys.len(), y.len());
                }
            }
        }
    }
}
