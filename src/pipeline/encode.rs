//! Categorical imputation and encoding

use super::EncodingMethod;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mode imputation followed by one-hot, label or target encoding of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    name: String,
    method: EncodingMethod,
    /// Most frequent training level
    fill: Option<String>,
    /// Sorted training levels
    levels: Vec<String>,
    target_means: BTreeMap<String, f64>,
    global_mean: f64,
}

impl CategoricalEncoder {
    /// Learn levels (and smoothed target means) from the training rows
    pub fn fit(
        name: &str,
        method: EncodingMethod,
        keys: &[Option<String>],
        target: &[f64],
        smoothing: f64,
    ) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for key in keys.iter().flatten() {
            *counts.entry(key.as_str()).or_insert(0) += 1;
        }

        // Strictly greater keeps the lexicographically first level on ties
        let mut fill: Option<(&str, usize)> = None;
        for (&level, &count) in &counts {
            if fill.map_or(true, |(_, best)| count > best) {
                fill = Some((level, count));
            }
        }
        let fill = fill.map(|(level, _)| level.to_string());
        let levels: Vec<String> = counts.keys().map(|s| s.to_string()).collect();

        let mut global_mean = 0.0;
        let mut target_means = BTreeMap::new();
        if method == EncodingMethod::Target && !target.is_empty() {
            global_mean = target.iter().sum::<f64>() / target.len() as f64;

            let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
            for (key, &y) in keys.iter().zip(target) {
                let level = key.as_deref().or(fill.as_deref());
                if let Some(level) = level {
                    let entry = sums.entry(level).or_insert((0.0, 0));
                    entry.0 += y;
                    entry.1 += 1;
                }
            }
            for (level, (sum, n)) in sums {
                let n = n as f64;
                let smoothed = (sum + smoothing * global_mean) / (n + smoothing);
                target_means.insert(level.to_string(), smoothed);
            }
        }

        Self {
            name: name.to_string(),
            method,
            fill,
            levels,
            target_means,
            global_mean,
        }
    }

    pub fn width(&self) -> usize {
        match self.method {
            EncodingMethod::OneHot => self.levels.len().saturating_sub(1),
            EncodingMethod::Label | EncodingMethod::Target => 1,
        }
    }

    pub fn output_names(&self) -> Vec<String> {
        match self.method {
            EncodingMethod::OneHot => self.levels[1.min(self.levels.len())..]
                .iter()
                .map(|level| format!("{}_{}", self.name, level))
                .collect(),
            EncodingMethod::Label | EncodingMethod::Target => vec![self.name.clone()],
        }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Encode a column into an n x width block
    pub fn transform(&self, keys: &[Option<String>]) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((keys.len(), self.width()));

        for (i, key) in keys.iter().enumerate() {
            let level = key.as_deref().or(self.fill.as_deref());
            let index = level.and_then(|l| self.levels.binary_search_by(|p| p.as_str().cmp(l)).ok());

            match self.method {
                EncodingMethod::OneHot => {
                    // First level and unknown levels are all zeros
                    if let Some(idx) = index.filter(|&idx| idx > 0) {
                        out[[i, idx - 1]] = 1.0;
                    }
                }
                EncodingMethod::Label => {
                    out[[i, 0]] = index.map_or(-1.0, |idx| idx as f64);
                }
                EncodingMethod::Target => {
                    out[[i, 0]] = level
                        .and_then(|l| self.target_means.get(l))
                        .copied()
                        .unwrap_or(self.global_mean);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
            .collect()
    }

    #[test]
    fn test_one_hot_drops_first_and_ignores_unknown() {
        let train = keys(&["red", "green", "blue", "green"]);
        let enc = CategoricalEncoder::fit("color", EncodingMethod::OneHot, &train, &[], 10.0);

        assert_eq!(enc.levels(), ["blue", "green", "red"]);
        assert_eq!(enc.output_names(), vec!["color_green", "color_red"]);

        let block = enc.transform(&keys(&["blue", "red", "purple", ""]));
        assert_eq!(block.row(0).to_vec(), vec![0.0, 0.0]);
        assert_eq!(block.row(1).to_vec(), vec![0.0, 1.0]);
        assert_eq!(block.row(2).to_vec(), vec![0.0, 0.0]);
        // missing takes the mode, green
        assert_eq!(block.row(3).to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_label_encoding_marks_unknown() {
        let enc = CategoricalEncoder::fit(
            "size",
            EncodingMethod::Label,
            &keys(&["s", "m", "l", "m"]),
            &[],
            10.0,
        );
        let block = enc.transform(&keys(&["l", "m", "s", "xl"]));
        assert_eq!(block.column(0).to_vec(), vec![0.0, 1.0, 2.0, -1.0]);
    }

    #[test]
    fn test_target_encoding_is_smoothed() {
        let train = keys(&["a", "a", "b", "b"]);
        let target = [1.0, 1.0, 0.0, 0.0];
        let enc = CategoricalEncoder::fit("grp", EncodingMethod::Target, &train, &target, 2.0);

        let block = enc.transform(&keys(&["a", "b", "zzz"]));
        // (2 + 2 * 0.5) / (2 + 2)
        assert!((block[[0, 0]] - 0.75).abs() < 1e-12);
        assert!((block[[1, 0]] - 0.25).abs() < 1e-12);
        assert!((block[[2, 0]] - 0.5).abs() < 1e-12);
    }
}
