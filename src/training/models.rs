//! Model trait and hyperparameter handling

use crate::error::{AutoMLError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimal interface every candidate algorithm implements
///
/// Classification targets arrive label-encoded as `0.0, 1.0, ..`;
/// `predict` returns labels in the same encoding.
pub trait Model: Send + Sync + std::fmt::Debug {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Class probabilities, one column per encoded label
    fn predict_proba(&self, _x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        Ok(None)
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Serialize fitted state
    fn to_json(&self) -> Result<serde_json::Value>;
}

/// Broad algorithm family, used in recommendations and assumptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Linear,
    Tree,
    Other,
}

/// Named hyperparameter values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hyperparameters(BTreeMap<String, serde_json::Value>);

impl Hyperparameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    /// Overlay `other` on top of these values
    pub fn merged(&self, other: &Hyperparameters) -> Hyperparameters {
        let mut out = self.clone();
        for (k, v) in &other.0 {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.0.get(name) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| invalid(name, v, "expected a number")),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.0.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| invalid(name, v, "expected a non-negative integer")),
        }
    }

    /// `null` or absent yields `None`
    pub fn opt_usize(&self, name: &str) -> Result<Option<usize>> {
        match self.0.get(name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(v) => v
                .as_u64()
                .map(|n| Some(n as usize))
                .ok_or_else(|| invalid(name, v, "expected a non-negative integer or null")),
        }
    }
}

fn invalid(name: &str, value: &serde_json::Value, reason: &str) -> AutoMLError {
    AutoMLError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Shape check shared by every model's fit
pub(crate) fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(AutoMLError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(AutoMLError::ValidationError(format!(
            "cannot fit on a {}x{} matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    Ok(())
}

/// Number of encoded classes: largest label + 1
pub(crate) fn n_classes(y: &Array1<f64>) -> usize {
    y.iter().fold(0.0f64, |m, &v| m.max(v)).round() as usize + 1
}

pub(crate) fn check_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(AutoMLError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_hyperparameter_lookup() {
        let hp = Hyperparameters::new()
            .with("n_estimators", 50)
            .with("learning_rate", 0.05)
            .with("max_depth", serde_json::Value::Null);
        assert_eq!(hp.usize_or("n_estimators", 100).unwrap(), 50);
        assert_eq!(hp.f64_or("learning_rate", 0.1).unwrap(), 0.05);
        assert_eq!(hp.f64_or("alpha", 1.0).unwrap(), 1.0);
        assert_eq!(hp.opt_usize("max_depth").unwrap(), None);
        assert!(hp.usize_or("learning_rate", 1).is_err());
    }

    #[test]
    fn test_merge_overrides() {
        let base = Hyperparameters::new().with("a", 1).with("b", 2);
        let merged = base.merged(&Hyperparameters::new().with("b", 3));
        assert_eq!(merged.usize_or("a", 0).unwrap(), 1);
        assert_eq!(merged.usize_or("b", 0).unwrap(), 3);
    }

    #[test]
    fn test_shape_checks() {
        let x = array![[1.0], [2.0]];
        assert!(check_xy(&x, &array![1.0]).is_err());
        assert!(check_xy(&x, &array![1.0, 0.0]).is_ok());
        assert_eq!(n_classes(&array![0.0, 2.0, 1.0]), 3);
    }
}
