//! Confusion matrix over boolean fault predictions.
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::report::plots;

/// Outcome counts of a binary classifier, built once from aligned
/// `(actual, predicted)` sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    true_positives: usize,
    false_positives: usize,
    true_negatives: usize,
    false_negatives: usize,
}

/// The four rates derived from a [`ConfusionMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfusionRates {
    pub tn_rate: f64,
    pub fp_rate: f64,
    pub fn_rate: f64,
    pub tp_rate: f64,
}

impl ConfusionMatrix {
    /// Count outcomes pairwise.
    ///
    /// Sequences of different length are rejected rather than truncated.
    pub fn new(actual: &[bool], predicted: &[bool]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(EvalError::LengthMismatch {
                left: actual.len(),
                right: predicted.len(),
            });
        }

        let mut cfm = ConfusionMatrix {
            true_positives: 0,
            false_positives: 0,
            true_negatives: 0,
            false_negatives: 0,
        };
        for (&pred, &act) in predicted.iter().zip(actual.iter()) {
            match (pred, act) {
                (true, true) => cfm.true_positives += 1,
                (true, false) => cfm.false_positives += 1,
                (false, false) => cfm.true_negatives += 1,
                (false, true) => cfm.false_negatives += 1,
            }
        }
        Ok(cfm)
    }

    pub fn true_positives(&self) -> usize {
        self.true_positives
    }

    pub fn false_positives(&self) -> usize {
        self.false_positives
    }

    pub fn true_negatives(&self) -> usize {
        self.true_negatives
    }

    pub fn false_negatives(&self) -> usize {
        self.false_negatives
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    /// Derive `(tn_rate, fp_rate, fn_rate, tp_rate)`.
    ///
    /// Fails when there are no actual negatives or no actual positives.
    pub fn as_rates(&self) -> Result<ConfusionRates> {
        let negatives = self.true_negatives + self.false_positives;
        if negatives == 0 {
            return Err(EvalError::ZeroDivision("true negative rate"));
        }
        let positives = self.false_negatives + self.true_positives;
        if positives == 0 {
            return Err(EvalError::ZeroDivision("false negative rate"));
        }

        let tn_rate = self.true_negatives as f64 / negatives as f64;
        let fn_rate = self.false_negatives as f64 / positives as f64;
        Ok(ConfusionRates {
            tn_rate,
            fp_rate: 1.0 - tn_rate,
            fn_rate,
            tp_rate: 1.0 - fn_rate,
        })
    }

    /// Render the rate matrix as a heat map and write it to `file_name` (HTML).
    pub fn display<P: AsRef<Path>>(&self, file_name: P) -> Result<()> {
        let rates = self.as_rates()?;
        let plot = plots::plot_confusion_rates(&rates, "Confusion Matrix");
        plots::write_plot(&plot, file_name.as_ref())
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfusionMatrix(TP={}, FP={}, TN={}, FN={})",
            self.true_positives, self.false_positives, self.true_negatives, self.false_negatives
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_counts_each_outcome() {
        let actual = [true, true, false, false, true];
        let predicted = [true, false, true, false, true];
        let cfm = ConfusionMatrix::new(&actual, &predicted).unwrap();

        assert_eq!(cfm.true_positives(), 2);
        assert_eq!(cfm.false_negatives(), 1);
        assert_eq!(cfm.false_positives(), 1);
        assert_eq!(cfm.true_negatives(), 1);
        assert_eq!(cfm.total(), actual.len());
    }

    #[test]
    fn test_rates_complement() {
        let actual = [true, true, true, false, false, false, false];
        let predicted = [true, false, false, true, false, false, false];
        let rates = ConfusionMatrix::new(&actual, &predicted)
            .unwrap()
            .as_rates()
            .unwrap();

        assert_relative_eq!(rates.tn_rate, 0.75);
        assert_relative_eq!(rates.fp_rate + rates.tn_rate, 1.0);
        assert_relative_eq!(rates.fn_rate, 2.0 / 3.0);
        assert_relative_eq!(rates.fn_rate + rates.tp_rate, 1.0);
    }

    #[test]
    fn test_rates_fail_without_negatives() {
        let cfm = ConfusionMatrix::new(&[true, true], &[true, false]).unwrap();
        assert!(matches!(cfm.as_rates(), Err(EvalError::ZeroDivision(_))));
    }

    #[test]
    fn test_rates_fail_without_positives() {
        let cfm = ConfusionMatrix::new(&[false, false], &[true, false]).unwrap();
        assert!(matches!(cfm.as_rates(), Err(EvalError::ZeroDivision(_))));
    }

    #[test]
    fn test_unequal_lengths_rejected() {
        let err = ConfusionMatrix::new(&[true, false, true], &[true]).unwrap_err();
        assert!(matches!(
            err,
            EvalError::LengthMismatch { left: 3, right: 1 }
        ));
    }

    #[test]
    fn test_display_format() {
        let cfm = ConfusionMatrix::new(&[true, false], &[true, true]).unwrap();
        assert_eq!(cfm.to_string(), "ConfusionMatrix(TP=1, FP=1, TN=0, FN=0)");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn aligned_labels() -> impl Strategy<Value = Vec<(bool, bool)>> {
            prop::collection::vec((any::<bool>(), any::<bool>()), 0..200)
        }

        proptest! {
            /// Every pair lands in exactly one cell.
            #[test]
            fn prop_counts_sum_to_length(pairs in aligned_labels()) {
                let (actual, predicted): (Vec<bool>, Vec<bool>) = pairs.into_iter().unzip();
                let cfm = ConfusionMatrix::new(&actual, &predicted).unwrap();
                prop_assert_eq!(cfm.total(), actual.len());
                prop_assert_eq!(
                    cfm.true_positives() + cfm.false_negatives(),
                    actual.iter().filter(|&&a| a).count()
                );
            }

            /// Rates are probabilities and complement per actual class.
            #[test]
            fn prop_rates_in_unit_interval(pairs in aligned_labels()) {
                let (actual, predicted): (Vec<bool>, Vec<bool>) = pairs.into_iter().unzip();
                let cfm = ConfusionMatrix::new(&actual, &predicted).unwrap();
                let has_both = actual.iter().any(|&a| a) && actual.iter().any(|&a| !a);
                match cfm.as_rates() {
                    Ok(rates) => {
                        prop_assert!(has_both);
                        for rate in [rates.tn_rate, rates.fp_rate, rates.fn_rate, rates.tp_rate] {
                            prop_assert!((0.0..=1.0).contains(&rate), "rate {} out of range", rate);
                        }
                        prop_assert!((rates.fp_rate + rates.tn_rate - 1.0).abs() < 1e-12);
                        prop_assert!((rates.fn_rate + rates.tp_rate - 1.0).abs() < 1e-12);
                    }
                    Err(e) => {
                        prop_assert!(!has_both);
                        prop_assert!(matches!(e, EvalError::ZeroDivision(_)));
                    }
                }
            }
        }
    }
}
