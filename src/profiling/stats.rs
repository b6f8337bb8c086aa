//! Small descriptive-statistics helpers shared by profiling and preprocessing.
//!
//! All functions return finite values for any finite input; degenerate
//! inputs (empty, constant) fall back to zero.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1)
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Linear-interpolated quantile over already sorted values
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

pub fn median(values: &[f64]) -> f64 {
    quantile_sorted(&sorted(values), 0.5)
}

/// Moment skewness: mean of cubed z-scores
pub fn skewness(values: &[f64]) -> f64 {
    let std = variance(values).sqrt();
    if std < 1e-12 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| ((v - m) / std).powi(3)).sum::<f64>() / values.len() as f64
}

/// Excess kurtosis: mean of z^4 minus 3
pub fn kurtosis(values: &[f64]) -> f64 {
    let std = variance(values).sqrt();
    if std < 1e-12 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| ((v - m) / std).powi(4)).sum::<f64>() / values.len() as f64 - 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_moments() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!((mean(&v) - 2.5).abs() < 1e-12);
        assert!((variance(&v) - 1.25).abs() < 1e-12);
        assert!((sample_std(&v) - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((median(&v) - 2.5).abs() < 1e-12);
        assert!(skewness(&v).abs() < 1e-12);
    }

    #[test]
    fn test_quantiles() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&s, 0.25), 2.0);
        assert_eq!(quantile_sorted(&s, 0.75), 4.0);
        assert_eq!(quantile_sorted(&[], 0.5), 0.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(sample_std(&[3.0]), 0.0);
        assert_eq!(skewness(&[2.0, 2.0, 2.0]), 0.0);
        assert_eq!(kurtosis(&[]), 0.0);
    }

    #[test]
    fn test_right_skew_is_positive() {
        let v = [1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 20.0];
        assert!(skewness(&v) > 1.0);
        assert!(kurtosis(&v) > 0.0);
    }
}
