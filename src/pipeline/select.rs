//! Univariate F-score feature selection

use crate::training::TaskKind;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Keeps the k columns with the highest univariate F statistic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectKBest {
    k: usize,
    scores: Vec<f64>,
    /// Selected column indices in original order
    selected: Vec<usize>,
}

impl SelectKBest {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, task: TaskKind, k: usize) -> Self {
        let scores: Vec<f64> = x
            .axis_iter(Axis(1))
            .map(|column| {
                let f = match task {
                    TaskKind::Classification => f_classif(column, y.view()),
                    TaskKind::Regression => f_regression(column, y.view()),
                };
                if f.is_finite() {
                    f
                } else {
                    0.0
                }
            })
            .collect();

        let k = k.clamp(1, scores.len().max(1));
        let mut ranked: Vec<usize> = (0..scores.len()).collect();
        // Stable sort: equal scores keep the earlier column
        ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        let mut selected: Vec<usize> = ranked.into_iter().take(k).collect();
        selected.sort_unstable();

        Self { k, scores, selected }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        x.select(Axis(1), &self.selected)
    }

    pub fn select_names(&self, names: &[String]) -> Vec<String> {
        self.selected.iter().map(|&i| names[i].clone()).collect()
    }
}

/// F statistic of a simple linear regression of y on x
fn f_regression(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.len() as f64;
    if n < 3.0 {
        return 0.0;
    }
    let x_mean = x.mean().unwrap_or(0.0);
    let y_mean = y.mean().unwrap_or(0.0);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&a, &b) in x.iter().zip(y.iter()) {
        sxy += (a - x_mean) * (b - y_mean);
        sxx += (a - x_mean).powi(2);
        syy += (b - y_mean).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return 0.0;
    }
    let r2 = (sxy * sxy / (sxx * syy)).min(1.0);
    if r2 >= 1.0 {
        return f64::MAX;
    }
    r2 / (1.0 - r2) * (n - 2.0)
}

/// One-way ANOVA F statistic across the classes of y
fn f_classif(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let n = x.len();
    let grand = x.mean().unwrap_or(0.0);

    let mut groups: std::collections::BTreeMap<i64, (f64, usize)> = Default::default();
    for (&v, &label) in x.iter().zip(y.iter()) {
        let entry = groups.entry(label.round() as i64).or_insert((0.0, 0));
        entry.0 += v;
        entry.1 += 1;
    }
    let k = groups.len();
    if k < 2 || n <= k {
        return 0.0;
    }

    let between: f64 = groups
        .values()
        .map(|&(sum, count)| count as f64 * (sum / count as f64 - grand).powi(2))
        .sum();
    let within: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(&v, &label)| {
            let (sum, count) = groups[&(label.round() as i64)];
            (v - sum / count as f64).powi(2)
        })
        .sum();

    let between = between / (k - 1) as f64;
    let within = within / (n - k) as f64;
    if within <= 0.0 {
        return if between > 0.0 { f64::MAX } else { 0.0 };
    }
    between / within
}
