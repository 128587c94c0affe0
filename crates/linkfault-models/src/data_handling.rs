//! Feature tables, label vectors and the seeded train/test partition.
//!
//! A `Dataset` holds row-aligned features and fault labels. `train_test_split`
//! shuffles row indices with a fixed seed and sets the test rows aside.
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{EvalError, Result};

/// Proportion of rows held out for testing.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
/// Seed of the train/test shuffle.
pub const DEFAULT_SPLIT_SEED: u64 = 420;

#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub x: Array2<f32>,
    pub y: Array1<bool>,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>, x: Array2<f32>, y: Array1<bool>) -> Result<Self> {
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
        Ok(Dataset {
            feature_names,
            x,
            y,
        })
    }

    /// Build from row-major vectors. Every row must have one value per feature.
    pub fn from_rows(feature_names: Vec<String>, rows: Vec<Vec<f32>>, y: Vec<bool>) -> Result<Self> {
        let n_cols = feature_names.len();
        let n_rows = rows.len();
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(EvalError::LengthMismatch {
                    left: row.len(),
                    right: n_cols,
                });
            }
            data.extend(row);
        }
        let x = Array2::from_shape_vec((n_rows, n_cols), data)
            .map_err(|e| EvalError::InvalidSplit(e.to_string()))?;
        Dataset::new(feature_names, x, Array1::from_vec(y))
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn n_positive(&self) -> usize {
        self.y.iter().filter(|&&v| v).count()
    }

    pub fn log_summary(&self) {
        log::info!(
            "{} rows ({} faults, {} non-faults), {} feature columns",
            self.len(),
            self.n_positive(),
            self.len() - self.n_positive(),
            self.x.ncols()
        );
    }
}

/// The four owned partitions produced by [`train_test_split`].
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f32>,
    pub x_test: Array2<f32>,
    pub y_train: Array1<bool>,
    pub y_test: Array1<bool>,
}

impl TrainTestSplit {
    /// `len(X_test) / (len(X_train) + len(X_test))`
    pub fn effective_ratio(&self) -> f64 {
        let n_test = self.x_test.nrows();
        n_test as f64 / (self.x_train.nrows() + n_test) as f64
    }
}

/// Shuffle rows with `seed` and hold out `ceil(test_fraction * n)` of them.
pub fn train_test_split(
    x: &Array2<f32>,
    y: &Array1<bool>,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if x.nrows() != y.len() {
        return Err(EvalError::LengthMismatch {
            left: x.nrows(),
            right: y.len(),
        });
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(EvalError::InvalidSplit(format!(
            "test fraction must lie in (0, 1), got {}",
            test_fraction
        )));
    }

    let n_samples = x.nrows();
    let n_test = (test_fraction * n_samples as f64).ceil() as usize;
    let n_train = n_samples.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(EvalError::InvalidSplit(format!(
            "{} samples with test fraction {} leaves an empty partition",
            n_samples, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let (test_idx, train_idx) = indices.split_at(n_test);

    log::debug!(
        "Split {} samples into {} train and {} test rows",
        n_samples,
        n_train,
        n_test
    );

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), train_idx),
        x_test: x.select(Axis(0), test_idx),
        y_train: y.select(Axis(0), train_idx),
        y_test: y.select(Axis(0), test_idx),
    })
}

/// Count of `(false, true)` labels.
pub fn class_counts(y: &Array1<bool>) -> (usize, usize) {
    let positives = y.iter().filter(|&&v| v).count();
    (y.len() - positives, positives)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy(n: usize) -> (Array2<f32>, Array1<bool>) {
        let x = Array2::from_shape_fn((n, 2), |(r, c)| (r * 2 + c) as f32);
        let y = Array1::from_iter((0..n).map(|i| i % 3 == 0));
        (x, y)
    }

    #[test]
    fn test_split_sizes() {
        let (x, y) = toy(101);
        let split = train_test_split(&x, &y, 0.2, DEFAULT_SPLIT_SEED).unwrap();
        assert_eq!(split.x_test.nrows(), 21);
        assert_eq!(split.x_train.nrows(), 80);
        assert_eq!(split.y_train.len(), 80);
        assert_eq!(split.y_test.len(), 21);
    }

    #[test]
    fn test_split_is_deterministic_and_disjoint() {
        let (x, y) = toy(50);
        let a = train_test_split(&x, &y, 0.2, 420).unwrap();
        let b = train_test_split(&x, &y, 0.2, 420).unwrap();
        assert_eq!(a.x_test, b.x_test);

        // First column is 2 * row index, so it identifies rows
        let mut seen: Vec<f32> = a
            .x_train
            .column(0)
            .iter()
            .chain(a.x_test.column(0).iter())
            .copied()
            .collect();
        seen.sort_by(|l, r| l.partial_cmp(r).unwrap());
        let expected: Vec<f32> = (0..50).map(|r| (r * 2) as f32).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_split_keeps_rows_aligned() {
        let (x, y) = toy(30);
        let split = train_test_split(&x, &y, 0.2, 7).unwrap();
        for (row, &label) in split.x_train.rows().into_iter().zip(split.y_train.iter()) {
            let original = (row[0] / 2.0) as usize;
            assert_eq!(label, original % 3 == 0);
        }
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let (x, y) = toy(10);
        assert!(train_test_split(&x, &y, 0.0, 1).is_err());
        assert!(train_test_split(&x, &y, 1.0, 1).is_err());
        let (x, y) = toy(1);
        assert!(train_test_split(&x, &y, 0.2, 1).is_err());
    }

    #[test]
    fn test_dataset_dimension_mismatch() {
        let x = Array2::<f32>::zeros((4, 2));
        let y = Array1::from_vec(vec![true, false]);
        let names = vec!["a".to_string(), "b".to_string()];
        assert!(Dataset::new(names.clone(), x.clone(), y).is_err());
        assert!(Dataset::new(vec!["a".to_string()], x, Array1::from_elem(4, false)).is_err());
    }

    #[test]
    fn test_from_rows() {
        let ds = Dataset::from_rows(
            vec!["rtt".to_string()],
            vec![vec![1.0], vec![2.0], vec![3.0]],
            vec![true, false, true],
        )
        .unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.n_positive(), 2);
        assert_eq!(class_counts(&ds.y), (1, 2));
    }
}
