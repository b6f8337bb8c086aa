//! Column scaling

use super::ScalingMethod;
use crate::profiling::stats;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Learned center and scale per column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    method: ScalingMethod,
    params: Vec<(f64, f64)>,
}

impl Scaler {
    pub fn fit(method: ScalingMethod, x: &Array2<f64>) -> Self {
        let params = x
            .axis_iter(Axis(1))
            .map(|column| {
                let values: Vec<f64> = column.to_vec();
                let (center, scale) = match method {
                    ScalingMethod::Standard => {
                        (stats::mean(&values), stats::variance(&values).sqrt())
                    }
                    ScalingMethod::MinMax => {
                        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                        if values.is_empty() {
                            (0.0, 1.0)
                        } else {
                            (min, max - min)
                        }
                    }
                    ScalingMethod::Robust => {
                        let sorted = stats::sorted(&values);
                        let q1 = stats::quantile_sorted(&sorted, 0.25);
                        let q3 = stats::quantile_sorted(&sorted, 0.75);
                        (stats::quantile_sorted(&sorted, 0.5), q3 - q1)
                    }
                    ScalingMethod::None => (0.0, 1.0),
                };
                // Constant columns are only centered
                (center, if scale.abs() < 1e-12 { 1.0 } else { scale })
            })
            .collect();
        Self { method, params }
    }

    pub fn method(&self) -> ScalingMethod {
        self.method
    }

    pub fn transform(&self, x: &mut Array2<f64>) {
        if self.method == ScalingMethod::None {
            return;
        }
        for (mut column, &(center, scale)) in x.axis_iter_mut(Axis(1)).zip(&self.params) {
            column.mapv_inplace(|v| (v - center) / scale);
        }
    }
}
