//! Random forest over bootstrapped CART trees

use super::decision_tree::{Criterion, DecisionTree};
use super::linear_models::argmax_rows;
use super::models::{check_features, check_xy, n_classes, Model};
use crate::error::{AutoMLError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for the number of features tried at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    Fraction(f64),
    Fixed(usize),
    All,
}

impl MaxFeatures {
    /// Resolve against a feature count, never below one
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        };
        k.clamp(1, n_features.max(1))
    }

    /// Parse a hyperparameter value: "sqrt", "log2", "all", an integer or a fraction
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => match s.as_str() {
                "sqrt" => Some(MaxFeatures::Sqrt),
                "log2" => Some(MaxFeatures::Log2),
                "all" => Some(MaxFeatures::All),
                _ => None,
            },
            serde_json::Value::Null => Some(MaxFeatures::All),
            serde_json::Value::Number(n) => match n.as_u64() {
                Some(k) => Some(MaxFeatures::Fixed(k as usize)),
                None => n
                    .as_f64()
                    .filter(|f| *f > 0.0 && *f <= 1.0)
                    .map(MaxFeatures::Fraction),
            },
            _ => None,
        }
    }
}

/// Random forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub criterion: Criterion,
    pub random_state: u64,
    is_classification: bool,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
    n_classes: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl RandomForest {
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: 42,
            is_classification: true,
            feature_importances: None,
            n_features: 0,
            n_classes: 0,
        }
    }

    pub fn new_regressor(n_estimators: usize) -> Self {
        Self {
            max_features: MaxFeatures::All,
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier(n_estimators)
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn compute_feature_importances(&mut self) {
        let mut total = Array1::<f64>::zeros(self.n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                total += &imp;
            }
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        self.feature_importances = Some(total);
    }

    /// Mean of the trees' leaf class distributions
    fn soft_votes(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let per_tree: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.class_distribution(x))
            .collect::<Result<_>>()?;

        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for dist in &per_tree {
            proba += dist;
        }
        Ok(proba / per_tree.len() as f64)
    }
}

impl Model for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if self.n_estimators == 0 {
            return Err(AutoMLError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.n_classes = if self.is_classification { n_classes(y) } else { 0 };
        let max_features = self.max_features.resolve(self.n_features);
        let base_seed = self.random_state;

        // Tree i draws from its own seed, so the forest does not depend on scheduling
        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y[i]).collect();

                let base = if self.is_classification {
                    DecisionTree::new_classifier()
                } else {
                    DecisionTree::new_regressor()
                };
                let mut tree = base
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion)
                    .with_max_features(Some(max_features))
                    .with_random_state(seed);
                tree.fit_with_classes(&x_boot, &y_boot, self.n_classes)?;
                Ok(tree)
            })
            .collect::<Result<_>>()?;

        self.trees = trees;
        self.compute_feature_importances();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AutoMLError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        if self.is_classification {
            return Ok(argmax_rows(&self.soft_votes(x)?));
        }

        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;
        let mut mean = Array1::<f64>::zeros(x.nrows());
        for pred in &per_tree {
            mean += pred;
        }
        Ok(mean / per_tree.len() as f64)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        if !self.is_classification {
            return Ok(None);
        }
        if self.trees.is_empty() {
            return Err(AutoMLError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;
        self.soft_votes(x).map(Some)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| {
            let base = if i < 30 { 0.0 } else { 5.0 };
            base + ((i * 7 + j * 3) % 10) as f64 / 10.0
        });
        let y = Array1::from_iter((0..60).map(|i| if i < 30 { 0.0 } else { 1.0 }));
        (x, y)
    }

    #[test]
    fn test_classifier_on_separated_blobs() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new_classifier(15).with_random_state(7);
        rf.fit(&x, &y).unwrap();

        assert_eq!(rf.n_trees(), 15);
        assert_eq!(rf.predict(&x).unwrap(), y);

        let proba = rf.predict_proba(&x).unwrap().unwrap();
        assert_eq!(proba.ncols(), 2);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_regressor_tracks_trend() {
        let x = Array2::from_shape_fn((50, 1), |(i, _)| i as f64);
        let y = Array1::from_iter((0..50).map(|i| 2.0 * i as f64));
        let mut rf = RandomForest::new_regressor(10);
        rf.fit(&x, &y).unwrap();

        let pred = rf.predict(&array![[10.0], [40.0]]).unwrap();
        assert!((pred[0] - 20.0).abs() < 6.0);
        assert!((pred[1] - 80.0).abs() < 6.0);
        assert!(rf.predict_proba(&x).unwrap().is_none());
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = blobs();
        let fit = || {
            let mut rf = RandomForest::new_classifier(8).with_random_state(3);
            rf.fit(&x, &y).unwrap();
            (rf.predict_proba(&x).unwrap().unwrap(), rf.feature_importances().unwrap())
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(10), 4);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::Fixed(50).resolve(5), 5);
        assert_eq!(
            MaxFeatures::from_json(&serde_json::json!("sqrt")),
            Some(MaxFeatures::Sqrt)
        );
        assert_eq!(
            MaxFeatures::from_json(&serde_json::json!(0.5)),
            Some(MaxFeatures::Fraction(0.5))
        );
        assert_eq!(MaxFeatures::from_json(&serde_json::json!("many")), None);
    }
}
