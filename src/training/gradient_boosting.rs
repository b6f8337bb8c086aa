//! Gradient boosted regression trees
//!
//! Each stage fits a shallow regression tree to the negative gradient of the
//! loss on a row/column subsample. Squared loss drives the regressor, log
//! loss the classifier; more than two classes are boosted one-vs-rest.

use super::decision_tree::DecisionTree;
use super::linear_models::argmax_rows;
use super::models::{check_features, check_xy, n_classes, Model};
use crate::error::{AutoMLError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gradient boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to every stage
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio for each tree
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 0.8,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        let bad = |name: &str, value: f64| AutoMLError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: "must be in (0, 1]".to_string(),
        };
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(bad("subsample", self.subsample));
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return Err(bad("colsample_bytree", self.colsample_bytree));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(AutoMLError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Loss {
    Squared,
    Logistic,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Additive ensemble of trees on a raw (pre-link) scale
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stages {
    init: f64,
    learning_rate: f64,
    trees: Vec<DecisionTree>,
    columns: Vec<Vec<usize>>,
}

impl Stages {
    fn fit(
        config: &GradientBoostingConfig,
        x: &Array2<f64>,
        y: &Array1<f64>,
        loss: Loss,
        rng: &mut Xoshiro256PlusPlus,
        importances: &mut Array1<f64>,
    ) -> Result<Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let init = match loss {
            Loss::Squared => y.mean().unwrap_or(0.0),
            Loss::Logistic => {
                let p = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
                (p / (1.0 - p)).ln()
            }
        };
        let mut raw = Array1::from_elem(n_samples, init);
        let mut stages = Self {
            init,
            learning_rate: config.learning_rate,
            trees: Vec::with_capacity(config.n_estimators),
            columns: Vec::with_capacity(config.n_estimators),
        };

        for round in 0..config.n_estimators {
            let residuals: Array1<f64> = match loss {
                Loss::Squared => y - &raw,
                Loss::Logistic => y - &raw.mapv(sigmoid),
            };

            let rows = sample_sorted(n_samples, config.subsample, rng);
            let cols = sample_sorted(n_features, config.colsample_bytree, rng);
            let x_sub = x.select(Axis(0), &rows).select(Axis(1), &cols);
            let r_sub: Array1<f64> = rows.iter().map(|&i| residuals[i]).collect();

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(Some(config.max_depth))
                .with_min_samples_leaf(config.min_samples_leaf)
                .with_random_state(config.random_state.wrapping_add(round as u64));
            tree.fit(&x_sub, &r_sub)?;

            // every row moves, not only the sampled ones
            let update = tree.predict(&x.select(Axis(1), &cols))?;
            raw.scaled_add(config.learning_rate, &update);

            if let Some(imp) = tree.feature_importances() {
                for (j, &col) in cols.iter().enumerate() {
                    importances[col] += imp[j];
                }
            }
            stages.trees.push(tree);
            stages.columns.push(cols);
        }

        Ok(stages)
    }

    fn raw(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mut out = Array1::from_elem(x.nrows(), self.init);
        for (tree, cols) in self.trees.iter().zip(&self.columns) {
            let update = tree.predict(&x.select(Axis(1), cols))?;
            out.scaled_add(self.learning_rate, &update);
        }
        Ok(out)
    }
}

fn sample_sorted(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let size = ((n as f64) * ratio).ceil() as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    if size < n {
        indices.shuffle(rng);
        indices.truncate(size.max(1));
        indices.sort_unstable();
    }
    indices
}

fn normalized(mut importances: Array1<f64>) -> Array1<f64> {
    let total = importances.sum();
    if total > 0.0 {
        importances /= total;
    }
    importances
}

/// Gradient boosting regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    pub config: GradientBoostingConfig,
    stages: Option<Stages>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            stages: None,
            n_features: 0,
            feature_importances: None,
        }
    }
}

impl Model for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        self.config.validate()?;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut importances = Array1::zeros(x.ncols());
        let stages = Stages::fit(&self.config, x, y, Loss::Squared, &mut rng, &mut importances)?;
        debug!(trees = stages.trees.len(), "Boosted regressor fitted");

        self.stages = Some(stages);
        self.n_features = x.ncols();
        self.feature_importances = Some(normalized(importances));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let stages = self.stages.as_ref().ok_or(AutoMLError::ModelNotFitted)?;
        check_features(self.n_features, x)?;
        stages.raw(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Gradient boosting classifier with log loss
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    pub config: GradientBoostingConfig,
    /// One ensemble for binary targets, one per class otherwise
    ensembles: Vec<Stages>,
    n_classes: usize,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            ensembles: Vec::new(),
            n_classes: 0,
            n_features: 0,
            feature_importances: None,
        }
    }
}

impl Model for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        self.config.validate()?;
        let k = n_classes(y);
        if k < 2 {
            return Err(AutoMLError::ValidationError(
                "gradient boosting needs at least two classes".to_string(),
            ));
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut importances = Array1::zeros(x.ncols());
        let ensembles = if k == 2 {
            vec![Stages::fit(&self.config, x, y, Loss::Logistic, &mut rng, &mut importances)?]
        } else {
            (0..k)
                .map(|class| {
                    let target = y.mapv(|v| if v.round() as usize == class { 1.0 } else { 0.0 });
                    Stages::fit(&self.config, x, &target, Loss::Logistic, &mut rng, &mut importances)
                })
                .collect::<Result<Vec<_>>>()?
        };
        debug!(classes = k, ensembles = ensembles.len(), "Boosted classifier fitted");

        self.ensembles = ensembles;
        self.n_classes = k;
        self.n_features = x.ncols();
        self.feature_importances = Some(normalized(importances));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?.ok_or(AutoMLError::ModelNotFitted)?;
        Ok(argmax_rows(&proba))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        if self.ensembles.is_empty() {
            return Err(AutoMLError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        if self.ensembles.len() == 1 {
            let p = self.ensembles[0].raw(x)?.mapv(sigmoid);
            proba.column_mut(0).assign(&p.mapv(|v| 1.0 - v));
            proba.column_mut(1).assign(&p);
        } else {
            for (class, stages) in self.ensembles.iter().enumerate() {
                proba.column_mut(class).assign(&stages.raw(x)?.mapv(sigmoid));
            }
            for mut row in proba.rows_mut() {
                let total = row.sum();
                if total > 0.0 {
                    row /= total;
                }
            }
        }
        Ok(Some(proba))
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

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((80, 2), |(i, j)| ((i * (j + 1)) % 17) as f64);
        let y = x.column(0).mapv(|v| 3.0 * v) + x.column(1).mapv(|v| 0.5 * v);
        (x, y)
    }

    #[test]
    fn test_regressor_reduces_error() {
        let (x, y) = regression_data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 60,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        let mse = (&pred - &y).mapv(|e| e * e).mean().unwrap();
        let var = y.mapv(|v| (v - y.mean().unwrap()).powi(2)).mean().unwrap();
        assert!(mse < 0.1 * var, "mse {} vs variance {}", mse, var);

        let imp = model.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        assert!(imp[0] > imp[1]);
    }

    #[test]
    fn test_binary_classifier() {
        let x = Array2::from_shape_fn((60, 1), |(i, _)| i as f64);
        let y = Array1::from_iter((0..60).map(|i| if i >= 30 { 1.0 } else { 0.0 }));

        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 30,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        assert!(crate::training::metrics::accuracy(&y, &pred) >= 0.95);
        let proba = model.predict_proba(&x).unwrap().unwrap();
        assert!(proba[[0, 0]] > 0.7);
        assert!(proba[[59, 1]] > 0.7);
    }

    #[test]
    fn test_multiclass_probabilities_sum_to_one() {
        let x = Array2::from_shape_fn((45, 1), |(i, _)| i as f64);
        let y = Array1::from_iter((0..45).map(|i| (i / 15) as f64));

        let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
            n_estimators: 20,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap().unwrap();
        assert_eq!(proba.ncols(), 3);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        let pred = model.predict(&x).unwrap();
        assert!(crate::training::metrics::accuracy(&y, &pred) >= 0.9);
    }

    #[test]
    fn test_invalid_subsample() {
        let (x, y) = regression_data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            subsample: 1.5,
            ..Default::default()
        });
        assert!(matches!(
            model.fit(&x, &y),
            Err(AutoMLError::InvalidParameter { .. })
        ));
    }
}
