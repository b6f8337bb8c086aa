//! Scoring functions and evaluation summaries

use crate::error::{AutoMLError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Metric used to rank candidates during cross-validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    RocAuc,
    Accuracy,
    R2,
}

impl Scoring {
    pub fn name(&self) -> &'static str {
        match self {
            Scoring::RocAuc => "roc_auc",
            Scoring::Accuracy => "accuracy",
            Scoring::R2 => "r2",
        }
    }

    /// Score predictions; ROC-AUC needs class probabilities
    pub fn score(
        &self,
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        proba: Option<&Array2<f64>>,
    ) -> Result<f64> {
        match self {
            Scoring::Accuracy => Ok(accuracy(y_true, y_pred)),
            Scoring::R2 => Ok(r2_score(y_true, y_pred)),
            Scoring::RocAuc => {
                // Positive class is label 1; fall back to hard predictions
                let positive = match proba {
                    Some(p) if p.ncols() >= 2 => p.column(1).to_owned(),
                    _ => y_pred.clone(),
                };
                Ok(roc_auc(y_true, &positive))
            }
        }
    }
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Coefficient of determination; 0 when the target is constant
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    }
}

/// Area under the ROC curve via the rank-sum statistic (ties averaged)
///
/// Returns 0.5 when only one class is present.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> f64 {
    let mut pairs: Vec<(f64, bool)> = scores
        .iter()
        .zip(y_true.iter())
        .map(|(&s, &t)| (s, t > 0.5))
        .collect();
    let n_pos = pairs.iter().filter(|(_, p)| *p).count();
    let n_neg = pairs.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i;
        while j + 1 < pairs.len() && pairs[j + 1].0 == pairs[i].0 {
            j += 1;
        }
        // average 1-based rank of the tie block
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += avg_rank * pairs[i..=j].iter().filter(|(_, p)| *p).count() as f64;
        i = j + 1;
    }

    let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos * n_neg) as f64
}

/// Held-out evaluation summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: Option<f64>,
    /// Macro-averaged over classes
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub mse: Option<f64>,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub r2: Option<f64>,
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Classification metrics over integer-encoded labels
    pub fn compute_classification(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let classes: BTreeSet<i64> = y_true
            .iter()
            .chain(y_pred.iter())
            .map(|v| v.round() as i64)
            .collect();

        let mut precisions = Vec::new();
        let mut recalls = Vec::new();
        let mut f1s = Vec::new();
        for class in &classes {
            let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
            for (t, p) in y_true.iter().zip(y_pred.iter()) {
                let t = t.round() as i64 == *class;
                let p = p.round() as i64 == *class;
                match (t, p) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    _ => {}
                }
            }
            let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
            let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            precisions.push(precision);
            recalls.push(recall);
            f1s.push(f1);
        }

        let avg = |v: &[f64]| if v.is_empty() { 0.0 } else { v.iter().sum::<f64>() / v.len() as f64 };
        Self {
            accuracy: Some(accuracy(y_true, y_pred)),
            precision: Some(avg(&precisions)),
            recall: Some(avg(&recalls)),
            f1_score: Some(avg(&f1s)),
            n_samples: y_true.len(),
            ..Default::default()
        }
    }

    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len().max(1) as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();
        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;

        Self {
            mse: Some(mse),
            rmse: Some(mse.sqrt()),
            mae: Some(errors.iter().map(|e| e.abs()).sum::<f64>() / n),
            r2: Some(r2_score(y_true, y_pred)),
            n_samples: y_true.len(),
            ..Default::default()
        }
    }
}

/// Fail if a score is NaN or infinite
pub(crate) fn ensure_finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AutoMLError::ComputationError(format!(
            "{} produced a non-finite value",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&y, &array![0.1, 0.2, 0.8, 0.9]), 1.0);
        assert_eq!(roc_auc(&y, &array![0.9, 0.8, 0.2, 0.1]), 0.0);
    }

    #[test]
    fn test_roc_auc_ties_and_single_class() {
        let y = array![0.0, 1.0];
        assert_eq!(roc_auc(&y, &array![0.5, 0.5]), 0.5);
        assert_eq!(roc_auc(&array![1.0, 1.0], &array![0.2, 0.3]), 0.5);

        let y = array![0.0, 0.0, 1.0, 1.0];
        assert!((roc_auc(&y, &array![0.1, 0.4, 0.35, 0.8]) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![3.0, 3.0, 3.0];
        assert_eq!(r2_score(&y, &array![1.0, 2.0, 3.0]), 0.0);
        let y = array![1.0, 2.0, 3.0];
        assert_eq!(r2_score(&y, &y.clone()), 1.0);
    }

    #[test]
    fn test_scoring_uses_probability_column() {
        let y = array![0.0, 1.0, 0.0, 1.0];
        let pred = array![0.0, 0.0, 0.0, 1.0];
        let proba = array![[0.9, 0.1], [0.4, 0.6], [0.8, 0.2], [0.1, 0.9]];
        let auc = Scoring::RocAuc.score(&y, &pred, Some(&proba)).unwrap();
        assert_eq!(auc, 1.0);
        assert_eq!(Scoring::Accuracy.score(&y, &pred, None).unwrap(), 0.75);
    }

    #[test]
    fn test_classification_metrics_macro() {
        let y_true = array![0.0, 1.0, 2.0, 2.0];
        let y_pred = array![0.0, 1.0, 2.0, 1.0];
        let m = ModelMetrics::compute_classification(&y_true, &y_pred);
        assert_eq!(m.accuracy, Some(0.75));
        let f1 = m.f1_score.unwrap();
        assert!(f1 > 0.7 && f1 < 0.8);
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];
        let metrics = ModelMetrics::compute_regression(&y_true, &y_pred);
        assert!(metrics.r2.unwrap() > 0.9);
        assert!((metrics.mae.unwrap() - 0.06).abs() < 1e-9);
    }
}
