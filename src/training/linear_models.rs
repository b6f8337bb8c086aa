//! Linear model implementations

use super::models::{check_features, check_xy, n_classes, Model};
use crate::error::{AutoMLError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve the symmetric positive-definite system `a x = b` by Cholesky
/// decomposition. Returns `None` if `a` is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                // relative floor catches rank deficiency lost to rounding
                if diag <= 1e-12 * a[[i, i]].abs() || diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }
    // L^T x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    Some(x)
}

/// Solve `(XᵀX + alpha I) w = Xᵀy`, adding a small ridge if the system is
/// singular (collinear or constant columns)
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Array1<f64>> {
    let n = x.ncols();
    let mut xtx = x.t().dot(x);
    let xty = x.t().dot(y);
    for i in 0..n {
        xtx[[i, i]] += alpha;
    }
    if let Some(w) = cholesky_solve(&xtx, &xty) {
        return Ok(w);
    }

    let scale = xtx.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let ridge = 1e-8 * scale.max(1.0);
    for i in 0..n {
        xtx[[i, i]] += ridge;
    }
    cholesky_solve(&xtx, &xty).ok_or_else(|| {
        AutoMLError::ComputationError("normal equations are singular".to_string())
    })
}

fn column_means(x: &Array2<f64>) -> Array1<f64> {
    x.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()))
}

/// Ordinary least squares, with optional L2 penalty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    pub fit_intercept: bool,
    /// L2 regularization strength; 0 means plain OLS
    pub alpha: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha: 0.0,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }
}

impl Model for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;

        let (coefficients, intercept) = if self.fit_intercept {
            let x_mean = column_means(x);
            let y_mean = y.mean().unwrap_or(0.0);
            let xc = x - &x_mean.view().insert_axis(Axis(0));
            let yc = y - y_mean;
            let w = solve_normal_equations(&xc, &yc, self.alpha)?;
            let b = y_mean - w.dot(&x_mean);
            (w, b)
        } else {
            (solve_normal_equations(x, y, self.alpha)?, 0.0)
        };

        self.coefficients = Some(coefficients);
        self.intercept = intercept;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.coefficients.as_ref().ok_or(AutoMLError::ModelNotFitted)?;
        check_features(w.len(), x)?;
        Ok(x.dot(w) + self.intercept)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.coefficients.as_ref().map(|w| w.mapv(f64::abs))
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Binary weights of one logistic unit
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogisticUnit {
    weights: Array1<f64>,
    bias: f64,
}

impl LogisticUnit {
    fn decision(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.weights) + self.bias
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// L2-regularized logistic regression trained by batch gradient descent
///
/// More than two classes are handled one-vs-rest; probabilities of the
/// per-class units are normalized to sum to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub learning_rate: f64,
    units: Vec<LogisticUnit>,
    n_classes: usize,
    n_features: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            units: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn fit_unit(&self, x: &Array2<f64>, y: &Array1<f64>) -> LogisticUnit {
        let n = x.nrows() as f64;
        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;

        for _ in 0..self.max_iter {
            let p = (x.dot(&weights) + bias).mapv(sigmoid);
            let errors = &p - y;
            let dw = x.t().dot(&errors) / n + self.alpha * &weights;
            let db = errors.sum() / n;

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }
            weights.scaled_add(-self.learning_rate, &dw);
            bias -= self.learning_rate * db;
        }
        LogisticUnit { weights, bias }
    }
}

impl Model for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        let k = n_classes(y);
        if k < 2 {
            return Err(AutoMLError::ValidationError(
                "logistic regression needs at least two classes".to_string(),
            ));
        }

        self.units = if k == 2 {
            vec![self.fit_unit(x, y)]
        } else {
            (0..k)
                .map(|class| {
                    let target = y.mapv(|v| if v.round() as usize == class { 1.0 } else { 0.0 });
                    self.fit_unit(x, &target)
                })
                .collect()
        };
        self.n_classes = k;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?.ok_or(AutoMLError::ModelNotFitted)?;
        Ok(argmax_rows(&proba))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        if self.units.is_empty() {
            return Err(AutoMLError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        if self.units.len() == 1 {
            let p = self.units[0].decision(x).mapv(sigmoid);
            for (i, &pi) in p.iter().enumerate() {
                proba[[i, 0]] = 1.0 - pi;
                proba[[i, 1]] = pi;
            }
        } else {
            for (class, unit) in self.units.iter().enumerate() {
                proba
                    .column_mut(class)
                    .assign(&unit.decision(x).mapv(sigmoid));
            }
            for mut row in proba.rows_mut() {
                let total = row.sum();
                if total > 0.0 {
                    row /= total;
                } else {
                    row.fill(1.0 / self.n_classes as f64);
                }
            }
        }
        Ok(Some(proba))
    }

    /// Mean absolute weight per feature across the units
    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.units.is_empty() {
            return None;
        }
        let mut total = Array1::<f64>::zeros(self.n_features);
        for unit in &self.units {
            total += &unit.weights.mapv(f64::abs);
        }
        Some(total / self.units.len() as f64)
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Index of the largest entry per row, earliest wins ties
pub(crate) fn argmax_rows(proba: &Array2<f64>) -> Array1<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (j, &p) in row.iter().enumerate() {
                if p > row[best] {
                    best = j;
                }
            }
            best as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_regression_recovers_line() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![3.0, 5.0, 7.0, 9.0, 11.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-8);
        assert!((model.intercept - 1.0).abs() < 1e-8);
        let pred = model.predict(&array![[6.0]]).unwrap();
        assert!((pred[0] - 13.0).abs() < 1e-8);
    }

    #[test]
    fn test_linear_regression_tolerates_collinear_columns() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-3);
        }
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::new();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(AutoMLError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_logistic_binary_separable() {
        let x = array![[-2.0], [-1.5], [-1.0], [1.0], [1.5], [2.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        let proba = model.predict_proba(&x).unwrap().unwrap();
        assert_eq!(proba.ncols(), 2);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_logistic_multiclass_one_vs_rest() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.2],
            [3.0, 0.0],
            [3.1, 0.1],
            [0.0, 3.0],
            [0.2, 3.1]
        ];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut model = LogisticRegression::new().with_max_iter(3000);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap().unwrap();
        assert_eq!(proba.dim(), (6, 3));
        assert_eq!(model.predict(&x).unwrap(), y);
        assert_eq!(model.feature_importances().unwrap().len(), 2);
    }

    #[test]
    fn test_logistic_state_survives_json() {
        let x = array![[-1.0], [1.0], [-2.0], [2.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let restored: LogisticRegression = serde_json::from_value(model.to_json().unwrap()).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), model.predict(&x).unwrap());
    }
}
