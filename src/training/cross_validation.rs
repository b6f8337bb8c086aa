//! Fold generation and hold-out splitting

use crate::error::{AutoMLError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
    /// Expanding-window split, never shuffled
    TimeSeriesSplit { n_splits: usize },
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match *self {
            CVStrategy::KFold { n_splits, .. }
            | CVStrategy::StratifiedKFold { n_splits, .. }
            | CVStrategy::TimeSeriesSplit { n_splits } => n_splits,
        }
    }
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 5, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 42,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Generate exactly `n_splits` train/test splits
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        let n_splits = self.strategy.n_splits();
        if n_splits < 2 {
            return Err(AutoMLError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }

        match self.strategy {
            CVStrategy::KFold { shuffle, .. } => self.k_fold_split(n_samples, n_splits, shuffle),
            CVStrategy::StratifiedKFold { shuffle, .. } => {
                self.stratified_k_fold_split(y, n_splits, shuffle)
            }
            CVStrategy::TimeSeriesSplit { .. } => time_series_split(n_samples, n_splits),
        }
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        if n_samples < n_splits {
            return Err(AutoMLError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            indices.shuffle(&mut rng);
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold_split(
        &self,
        y: &Array1<f64>,
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        if y.len() < n_splits {
            return Err(AutoMLError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                y.len(),
                n_splits
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        // Continue the round-robin across classes so fold sizes stay balanced
        let mut offset = 0;

        for mut indices in group_by_class(y).into_values() {
            if shuffle {
                indices.shuffle(&mut rng);
            }
            for idx in indices {
                folds[offset % n_splits].push(idx);
                offset += 1;
            }
        }

        Ok((0..n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect())
    }
}

fn time_series_split(n_samples: usize, n_splits: usize) -> Result<Vec<CVSplit>> {
    let test_size = n_samples / (n_splits + 1);
    if test_size == 0 {
        return Err(AutoMLError::ValidationError(format!(
            "{} samples are too few for {} time-series splits",
            n_samples, n_splits
        )));
    }

    // First fold trains on the leading remainder as well, like sklearn
    let first_test = n_samples - n_splits * test_size;
    Ok((0..n_splits)
        .map(|fold_idx| {
            let test_start = first_test + fold_idx * test_size;
            CVSplit {
                train_indices: (0..test_start).collect(),
                test_indices: (test_start..test_start + test_size).collect(),
                fold_idx,
            }
        })
        .collect())
}

/// Row indices grouped by class label, in label order
fn group_by_class(y: &Array1<f64>) -> BTreeMap<i64, Vec<usize>> {
    let mut classes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &val) in y.iter().enumerate() {
        classes.entry(val.round() as i64).or_default().push(idx);
    }
    classes
}

/// Seeded hold-out split, stratified by class when requested
///
/// Returns sorted (train, test) row indices. Every class with at least two
/// members keeps at least one row on each side.
pub fn train_test_split(
    y: &Array1<f64>,
    test_size: f64,
    stratify: bool,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let n = y.len();
    if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
        return Err(AutoMLError::ConfigurationError(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    if n < 2 {
        return Err(AutoMLError::ValidationError(
            "need at least two rows to split".to_string(),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    let groups: Vec<Vec<usize>> = if stratify {
        group_by_class(y).into_values().collect()
    } else {
        vec![(0..n).collect()]
    };

    for mut indices in groups {
        indices.shuffle(&mut rng);
        let len = indices.len();
        let mut n_test = (len as f64 * test_size).round() as usize;
        if len >= 2 {
            n_test = n_test.clamp(1, len - 1);
        } else {
            n_test = 0;
        }
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels(n: usize, classes: usize) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| (i % classes) as f64))
    }

    #[test]
    fn test_kfold_partitions_all_rows() {
        let y = labels(23, 1);
        let splits = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: true })
            .with_random_state(7)
            .split(&y)
            .unwrap();
        assert_eq!(splits.len(), 5);

        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());
        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 23);
        }
    }

    #[test]
    fn test_stratified_keeps_class_balance() {
        let y = labels(100, 2);
        let splits = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true })
            .split(&y)
            .unwrap();
        for split in &splits {
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(positives, 10);
        }
    }

    #[test]
    fn test_splits_are_deterministic() {
        let y = labels(40, 3);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 4, shuffle: true })
            .with_random_state(42);
        assert_eq!(cv.split(&y).unwrap(), cv.split(&y).unwrap());
    }

    #[test]
    fn test_time_series_split_is_forward_only() {
        let y = labels(12, 1);
        let splits = CrossValidator::new(CVStrategy::TimeSeriesSplit { n_splits: 3 })
            .split(&y)
            .unwrap();
        assert_eq!(splits.len(), 3);
        for split in &splits {
            let max_train = *split.train_indices.iter().max().unwrap();
            let min_test = *split.test_indices.iter().min().unwrap();
            assert!(max_train < min_test);
        }
        assert_eq!(splits[2].test_indices, vec![9, 10, 11]);
    }

    #[test]
    fn test_too_few_samples() {
        let y = array![0.0, 1.0];
        assert!(CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false })
            .split(&y)
            .is_err());
    }

    #[test]
    fn test_stratified_holdout() {
        let y = labels(50, 2);
        let (train, test) = train_test_split(&y, 0.2, true, 42).unwrap();
        assert_eq!(train.len() + test.len(), 50);
        assert_eq!(test.len(), 10);
        let pos = test.iter().filter(|&&i| y[i] == 1.0).count();
        assert_eq!(pos, 5);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn test_invalid_test_size() {
        let y = labels(10, 2);
        assert!(matches!(
            train_test_split(&y, 1.5, false, 1),
            Err(AutoMLError::ConfigurationError(_))
        ));
    }
}
