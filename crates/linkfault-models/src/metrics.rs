//! Classification metrics derived from a [`ConfusionMatrix`] or from
//! `(y_true, y_score)` pairs.
//!
//! Ratios whose denominator is zero surface as [`EvalError::ZeroDivision`],
//! except the F1 score which falls back to 0.
use std::cmp::Ordering;

use crate::confusion::ConfusionMatrix;
use crate::error::{EvalError, Result};

fn ratio(numerator: usize, denominator: usize, metric: &'static str) -> Result<f64> {
    if denominator == 0 {
        return Err(EvalError::ZeroDivision(metric));
    }
    Ok(numerator as f64 / denominator as f64)
}

/// Correct predictions over all predictions.
pub fn accuracy(cfm: &ConfusionMatrix) -> Result<f64> {
    ratio(
        cfm.true_positives() + cfm.true_negatives(),
        cfm.total(),
        "accuracy",
    )
}

/// Share of positive predictions that are actual positives.
pub fn precision(cfm: &ConfusionMatrix) -> Result<f64> {
    ratio(
        cfm.true_positives(),
        cfm.true_positives() + cfm.false_positives(),
        "precision",
    )
}

/// Share of actual positives that were predicted positive (true positive rate).
pub fn recall(cfm: &ConfusionMatrix) -> Result<f64> {
    ratio(
        cfm.true_positives(),
        cfm.true_positives() + cfm.false_negatives(),
        "recall",
    )
}

/// Share of actual negatives that were predicted negative.
pub fn specificity(cfm: &ConfusionMatrix) -> Result<f64> {
    ratio(
        cfm.true_negatives(),
        cfm.true_negatives() + cfm.false_positives(),
        "specificity",
    )
}

/// Harmonic mean of precision and recall; 0 whenever it is undefined.
pub fn f1_score(cfm: &ConfusionMatrix) -> f64 {
    match (precision(cfm), recall(cfm)) {
        (Ok(p), Ok(r)) if p + r > 0.0 => 2.0 * (p * r) / (p + r),
        _ => 0.0,
    }
}

/// F1 computed straight from label slices, used as the grid-search score.
pub fn f1_from_labels(actual: &[bool], predicted: &[bool]) -> Result<f64> {
    Ok(f1_score(&ConfusionMatrix::new(actual, predicted)?))
}

fn check_scores(y_true: &[bool], y_score: &[f64]) -> Result<()> {
    if y_true.len() != y_score.len() {
        return Err(EvalError::LengthMismatch {
            left: y_true.len(),
            right: y_score.len(),
        });
    }
    Ok(())
}

/// Area under the ROC curve.
///
/// Computed as the probability that a random positive outranks a random
/// negative, ties counting one half. Needs both classes in `y_true`.
pub fn roc_auc(y_true: &[bool], y_score: &[f64]) -> Result<f64> {
    check_scores(y_true, y_score)?;

    let n_pos = y_true.iter().filter(|&&v| v).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(EvalError::UndefinedMetric(
            "ROC AUC needs both classes in y_true",
        ));
    }

    // Mid-ranks over ascending scores
    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| {
        y_score[a]
            .partial_cmp(&y_score[b])
            .unwrap_or(Ordering::Equal)
    });

    let mut ranks = vec![0.0f64; y_score.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && y_score[order[j + 1]] == y_score[order[i]] {
            j += 1;
        }
        let mid_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = mid_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(y_true.iter())
        .filter(|(_, &label)| label)
        .map(|(&rank, _)| rank)
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Average precision: `sum_n (R_n - R_{n-1}) * P_n` over descending score
/// thresholds. For a single binary target micro averaging is the plain score.
pub fn average_precision(y_true: &[bool], y_score: &[f64]) -> Result<f64> {
    check_scores(y_true, y_score)?;

    let n_pos = y_true.iter().filter(|&&v| v).count();
    if n_pos == 0 {
        return Err(EvalError::UndefinedMetric(
            "average precision needs at least one positive in y_true",
        ));
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| {
        y_score[b]
            .partial_cmp(&y_score[a])
            .unwrap_or(Ordering::Equal)
    });

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut prev_recall = 0.0;
    let mut ap = 0.0;
    let mut i = 0;
    while i < order.len() {
        // Consume every row sharing this threshold
        let threshold = y_score[order[i]];
        while i < order.len() && y_score[order[i]] == threshold {
            if y_true[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let precision = tp as f64 / (tp + fp) as f64;
        let recall = tp as f64 / n_pos as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }

    Ok(ap)
}

/// Map boolean predictions onto 0/1 scores.
pub fn labels_as_scores(predicted: &[bool]) -> Vec<f64> {
    predicted
        .iter()
        .map(|&p| if p { 1.0 } else { 0.0 })
        .collect()
}
