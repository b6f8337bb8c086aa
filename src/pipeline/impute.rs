//! Outlier clipping and numeric imputation over NaN-marked matrices

use super::ImputationMethod;
use crate::error::{AutoMLError, Result};
use crate::profiling::stats;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

fn present(column: ArrayView1<f64>) -> Vec<f64> {
    column.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Interquartile fences learned per column; `None` for columns with no
/// training values, which pass through unclipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierClipper {
    bounds: Vec<Option<(f64, f64)>>,
}

impl OutlierClipper {
    pub fn fit(x: &Array2<f64>, factor: f64) -> Self {
        let bounds = x
            .axis_iter(Axis(1))
            .map(|column| {
                let sorted = stats::sorted(&present(column));
                if sorted.is_empty() {
                    return None;
                }
                let q1 = stats::quantile_sorted(&sorted, 0.25);
                let q3 = stats::quantile_sorted(&sorted, 0.75);
                let iqr = q3 - q1;
                Some((q1 - factor * iqr, q3 + factor * iqr))
            })
            .collect();
        Self { bounds }
    }

    /// Clamp present values into the fences; NaN stays missing
    pub fn transform(&self, x: &mut Array2<f64>) {
        for (mut column, bounds) in x.axis_iter_mut(Axis(1)).zip(&self.bounds) {
            if let Some((lo, hi)) = *bounds {
                column.mapv_inplace(|v| if v.is_nan() { v } else { v.clamp(lo, hi) });
            }
        }
    }

    pub fn bounds(&self) -> &[Option<(f64, f64)>] {
        &self.bounds
    }
}

#[derive(Debug, Clone, Copy)]
struct Neighbour(f64, usize);

impl PartialEq for Neighbour {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbour {}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbour {
    // Max-heap on distance, later rows evicted first among equals
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// Column-wise fill values, or a KNN reference set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericImputer {
    method: ImputationMethod,
    n_neighbors: usize,
    /// Per-column fallback fill
    fill: Array1<f64>,
    /// Complete training rows used by KNN
    reference: Option<Array2<f64>>,
}

impl NumericImputer {
    pub fn new(method: ImputationMethod) -> Self {
        Self {
            method,
            n_neighbors: 5,
            fill: Array1::zeros(0),
            reference: None,
        }
    }

    pub fn with_neighbors(mut self, k: usize) -> Self {
        self.n_neighbors = k.max(1);
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        // Columns with no value at all fill with zero
        let fill: Array1<f64> = x
            .axis_iter(Axis(1))
            .map(|column| {
                let values = present(column);
                if values.is_empty() {
                    return 0.0;
                }
                match self.method {
                    ImputationMethod::Mean | ImputationMethod::Knn => stats::mean(&values),
                    ImputationMethod::Median => stats::median(&values),
                    ImputationMethod::Mode => most_frequent(&values),
                }
            })
            .collect();
        self.fill = fill;

        if self.method == ImputationMethod::Knn {
            let complete: Vec<usize> = x
                .axis_iter(Axis(0))
                .enumerate()
                .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
                .map(|(i, _)| i)
                .collect();
            self.reference = Some(x.select(Axis(0), &complete));
        }
        Ok(())
    }

    pub fn transform(&self, x: &mut Array2<f64>) -> Result<()> {
        if x.ncols() != self.fill.len() {
            return Err(AutoMLError::ShapeError {
                expected: format!("{} numeric columns", self.fill.len()),
                actual: format!("{} numeric columns", x.ncols()),
            });
        }

        match &self.reference {
            Some(reference) if reference.nrows() > 0 => {
                for mut row in x.axis_iter_mut(Axis(0)) {
                    if row.iter().all(|v| v.is_finite()) {
                        continue;
                    }
                    let neighbours = self.nearest(reference, row.view());
                    for (j, value) in row.iter_mut().enumerate() {
                        if value.is_finite() {
                            continue;
                        }
                        *value = if neighbours.is_empty() {
                            self.fill[j]
                        } else {
                            neighbours.iter().map(|&i| reference[[i, j]]).sum::<f64>()
                                / neighbours.len() as f64
                        };
                    }
                }
            }
            _ => {
                for (mut column, &fill) in x.axis_iter_mut(Axis(1)).zip(self.fill.iter()) {
                    column.mapv_inplace(|v| if v.is_finite() { v } else { fill });
                }
            }
        }
        Ok(())
    }

    /// Indices of the k closest reference rows on the observed coordinates
    fn nearest(&self, reference: &Array2<f64>, sample: ArrayView1<f64>) -> Vec<usize> {
        let mut heap: BinaryHeap<Neighbour> = BinaryHeap::with_capacity(self.n_neighbors + 1);

        for (i, row) in reference.axis_iter(Axis(0)).enumerate() {
            let mut count = 0usize;
            let mut accum = 0.0;
            for (&a, &b) in sample.iter().zip(row.iter()) {
                if a.is_finite() {
                    accum += (a - b).powi(2);
                    count += 1;
                }
            }
            // An all-missing row is equidistant to every reference row
            let dist = if count == 0 { 0.0 } else { (accum / count as f64).sqrt() };

            let candidate = Neighbour(dist, i);
            if heap.len() < self.n_neighbors {
                heap.push(candidate);
            } else if heap.peek().map_or(false, |worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        heap.into_iter().map(|n| n.1).collect()
    }
}

/// Most frequent value, smallest among ties
fn most_frequent(values: &[f64]) -> f64 {
    let sorted = stats::sorted(values);
    let mut best = (sorted[0], 0usize);
    let mut run = (sorted[0], 0usize);
    for &v in &sorted {
        if v == run.0 {
            run.1 += 1;
        } else {
            run = (v, 1);
        }
        if run.1 > best.1 {
            best = run;
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const NAN: f64 = f64::NAN;

    #[test]
    fn test_mean_and_median_fill() {
        let x = array![[1.0, 10.0], [NAN, 20.0], [3.0, NAN], [8.0, 90.0]];

        let mut mean = NumericImputer::new(ImputationMethod::Mean);
        mean.fit(&x).unwrap();
        let mut filled = x.clone();
        mean.transform(&mut filled).unwrap();
        assert_eq!(filled[[1, 0]], 4.0);
        assert_eq!(filled[[2, 1]], 40.0);

        let mut median = NumericImputer::new(ImputationMethod::Median);
        median.fit(&x).unwrap();
        let mut filled = x.clone();
        median.transform(&mut filled).unwrap();
        assert_eq!(filled[[1, 0]], 3.0);
        assert_eq!(filled[[2, 1]], 20.0);
    }

    #[test]
    fn test_mode_prefers_smallest_on_ties() {
        assert_eq!(most_frequent(&[3.0, 1.0, 3.0, 1.0, 2.0]), 1.0);
        assert_eq!(most_frequent(&[5.0, 5.0, 1.0]), 5.0);
    }

    #[test]
    fn test_knn_uses_nearest_rows() {
        let x = array![
            [0.0, 0.0],
            [0.1, 1.0],
            [0.2, 2.0],
            [10.0, 100.0],
            [10.1, 101.0],
            [10.05, NAN],
        ];
        let mut imputer = NumericImputer::new(ImputationMethod::Knn).with_neighbors(2);
        imputer.fit(&x).unwrap();

        let mut filled = x.clone();
        imputer.transform(&mut filled).unwrap();
        assert!((filled[[5, 1]] - 100.5).abs() < 1e-9);
        assert!(filled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_all_missing_column_fills_zero() {
        let x = array![[1.0, NAN], [2.0, NAN]];
        let mut imputer = NumericImputer::new(ImputationMethod::Median);
        imputer.fit(&x).unwrap();
        let mut filled = x.clone();
        imputer.transform(&mut filled).unwrap();
        assert_eq!(filled.column(1).to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let mut imputer = NumericImputer::new(ImputationMethod::Mean);
        imputer.fit(&array![[1.0, 2.0]]).unwrap();
        let mut wrong = array![[1.0]];
        assert!(imputer.transform(&mut wrong).is_err());
    }

    #[test]
    fn test_clipper_fences() {
        let mut x = array![[1.0], [2.0], [3.0], [4.0], [100.0], [NAN]];
        let clipper = OutlierClipper::fit(&x, 1.5);
        assert_eq!(clipper.bounds()[0], Some((-1.0, 7.0)));

        clipper.transform(&mut x);
        assert_eq!(x[[4, 0]], 7.0);
        assert!(x[[5, 0]].is_nan());
    }

    #[test]
    fn test_clipper_skips_empty_column_and_reloads() {
        let mut x = array![[1.0, NAN], [2.0, NAN], [50.0, NAN], [3.0, NAN]];
        let clipper = OutlierClipper::fit(&x, 1.5);
        assert_eq!(clipper.bounds()[1], None);

        let json = serde_json::to_string(&clipper).unwrap();
        let back: OutlierClipper = serde_json::from_str(&json).unwrap();
        assert_eq!(back, clipper);

        back.transform(&mut x);
        assert!(x.column(1).iter().all(|v| v.is_nan()));
        assert!(x[[2, 0]] < 50.0);
    }
}
