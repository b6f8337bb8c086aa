//! Single-column profiling and semantic-type inference

use super::stats;
use super::{
    CategoricalStats, ColumnProfile, DatetimeStats, NumericStats, ProfilingThresholds,
    QualityIssue, SemanticType, TextStats, TypeStats, ValueCount,
};
use crate::patterns;
use crate::table::{Column, Value};
use chrono::NaiveDate;
use std::collections::BTreeMap;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Profile one column against the table's total row count
pub fn profile_column(
    column: &Column,
    total_rows: usize,
    thresholds: &ProfilingThresholds,
) -> ColumnProfile {
    let present: Vec<&Value> = column.present().collect();
    let missing_count = column.len() - present.len();

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in &present {
        if let Some(key) = value.key() {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    let unique_count = counts.len();

    let pct = |n: usize| {
        if total_rows == 0 {
            0.0
        } else {
            n as f64 / total_rows as f64 * 100.0
        }
    };
    let missing_pct = pct(missing_count);
    let unique_pct = pct(unique_count);

    let semantic_type = infer_semantic_type(column.name(), &present, unique_count, thresholds);

    let stats = match semantic_type {
        SemanticType::Numeric => TypeStats::Numeric(numeric_stats(&present, thresholds)),
        SemanticType::Categorical | SemanticType::Boolean => {
            TypeStats::Categorical(categorical_stats(&counts, present.len(), thresholds))
        }
        SemanticType::Text => TypeStats::Text(text_stats(&present)),
        SemanticType::Datetime => TypeStats::Datetime(datetime_stats(&present)),
        SemanticType::Unknown => TypeStats::None,
    };

    let mut issues = Vec::new();
    if missing_pct > thresholds.high_missing_pct {
        issues.push(QualityIssue::HighMissing);
    }
    if unique_count <= 1 {
        issues.push(QualityIssue::ConstantColumn);
    }
    if semantic_type == SemanticType::Categorical && unique_pct > thresholds.high_cardinality_pct {
        issues.push(QualityIssue::HighCardinality);
    }
    if let TypeStats::Numeric(ref numeric) = stats {
        if numeric.outlier_count as f64 > total_rows as f64 * thresholds.outlier_rows_pct / 100.0 {
            issues.push(QualityIssue::OutliersDetected);
        }
        if numeric.skewness.abs() > thresholds.skew_limit {
            issues.push(QualityIssue::SkewedDistribution);
        }
    }

    let quality_score = if unique_count <= 1 {
        0.0
    } else {
        (100.0
            - missing_pct.min(thresholds.max_missing_penalty)
            - thresholds.issue_penalty * issues.len() as f64)
            .clamp(0.0, 100.0)
    };

    ColumnProfile {
        name: column.name().to_string(),
        semantic_type,
        missing_count,
        missing_pct,
        unique_count,
        unique_pct,
        stats,
        issues,
        quality_score,
    }
}

/// Fixed precedence: boolean, numeric, datetime, categorical, text, fallback
pub(crate) fn infer_semantic_type(
    name: &str,
    present: &[&Value],
    unique_count: usize,
    thresholds: &ProfilingThresholds,
) -> SemanticType {
    if present.is_empty() {
        return SemanticType::Unknown;
    }

    if unique_count <= 2 && present.iter().all(|v| is_boolean_like(v)) {
        return SemanticType::Boolean;
    }

    if present.iter().all(|v| v.parses_as_number()) {
        return SemanticType::Numeric;
    }

    let sample: Vec<String> = present
        .iter()
        .take(thresholds.sample_size)
        .filter_map(|v| v.as_text())
        .collect();

    let date_hits = sample.iter().filter(|s| patterns::looks_like_date(s)).count();
    let looks_dated = !sample.is_empty()
        && date_hits as f64 / sample.len() as f64 > thresholds.datetime_match_ratio;
    if looks_dated || patterns::is_time_name(name) {
        return SemanticType::Datetime;
    }

    let ratio = unique_count as f64 / present.len() as f64;
    if ratio < thresholds.categorical_ratio && unique_count < thresholds.categorical_max_unique {
        return SemanticType::Categorical;
    }

    if !sample.is_empty() {
        let n = sample.len() as f64;
        let avg_len = sample.iter().map(|s| s.chars().count()).sum::<usize>() as f64 / n;
        let avg_words = sample.iter().map(|s| s.split_whitespace().count()).sum::<usize>() as f64 / n;
        if avg_len > thresholds.text_min_avg_length || avg_words > thresholds.text_min_avg_words {
            return SemanticType::Text;
        }
    }

    SemanticType::Categorical
}

fn is_boolean_like(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(v) => *v == 0.0 || *v == 1.0,
        Value::Text(s) => matches!(s.trim(), "0" | "1" | "true" | "false" | "True" | "False"),
        Value::Missing => false,
    }
}

fn numeric_stats(present: &[&Value], thresholds: &ProfilingThresholds) -> NumericStats {
    let values: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
    let sorted = stats::sorted(&values);

    let mean = stats::mean(&values);
    let population_std = stats::variance(&values).sqrt();
    let outlier_count = if population_std > 1e-12 {
        values
            .iter()
            .filter(|v| ((*v - mean) / population_std).abs() > thresholds.outlier_z_score)
            .count()
    } else {
        0
    };

    NumericStats {
        mean,
        median: stats::quantile_sorted(&sorted, 0.5),
        std: stats::sample_std(&values),
        min: sorted.first().copied().unwrap_or(0.0),
        max: sorted.last().copied().unwrap_or(0.0),
        q1: stats::quantile_sorted(&sorted, 0.25),
        q3: stats::quantile_sorted(&sorted, 0.75),
        skewness: stats::skewness(&values),
        kurtosis: stats::kurtosis(&values),
        outlier_count,
        zero_count: values.iter().filter(|v| **v == 0.0).count(),
    }
}

fn categorical_stats(
    counts: &BTreeMap<String, usize>,
    n_present: usize,
    thresholds: &ProfilingThresholds,
) -> CategoricalStats {
    let mut ranked: Vec<(&String, &usize)> = counts.iter().collect();
    // BTreeMap iteration is already value-ascending; stable sort keeps it for ties
    ranked.sort_by(|a, b| b.1.cmp(a.1));

    CategoricalStats {
        top_values: ranked
            .into_iter()
            .take(thresholds.top_k_values)
            .map(|(value, count)| ValueCount {
                value: value.clone(),
                count: *count,
            })
            .collect(),
        cardinality_ratio: if n_present == 0 {
            0.0
        } else {
            counts.len() as f64 / n_present as f64
        },
    }
}

fn text_stats(present: &[&Value]) -> TextStats {
    let texts: Vec<String> = present.iter().filter_map(|v| v.as_text()).collect();
    let lengths: Vec<usize> = texts.iter().map(|s| s.chars().count()).collect();
    let as_f64: Vec<f64> = lengths.iter().map(|&l| l as f64).collect();
    let words: Vec<f64> = texts
        .iter()
        .map(|s| s.split_whitespace().count() as f64)
        .collect();

    TextStats {
        length_mean: stats::mean(&as_f64),
        length_median: stats::median(&as_f64),
        length_min: lengths.iter().copied().min().unwrap_or(0),
        length_max: lengths.iter().copied().max().unwrap_or(0),
        avg_word_count: stats::mean(&words),
    }
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
}

fn datetime_stats(present: &[&Value]) -> DatetimeStats {
    let dates: Vec<NaiveDate> = present
        .iter()
        .filter_map(|v| v.as_text())
        .filter_map(|s| parse_date(&s))
        .collect();

    DatetimeStats {
        min: dates.iter().min().map(|d| d.to_string()),
        max: dates.iter().max().map(|d| d.to_string()),
        parsed_count: dates.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(column: Column) -> ColumnProfile {
        let n = column.len();
        profile_column(&column, n, &ProfilingThresholds::default())
    }

    #[test]
    fn test_boolean_detection() {
        let p = profile(Column::numeric("flag", vec![0.0, 1.0, 1.0, 0.0]));
        assert_eq!(p.semantic_type, SemanticType::Boolean);

        let p = profile(Column::text("answer", &["True", "False", "True"]));
        assert_eq!(p.semantic_type, SemanticType::Boolean);

        let p = profile(Column::text("opted_in", &["1", "0", " 1", "0"]));
        assert_eq!(p.semantic_type, SemanticType::Boolean);

        let p = profile(Column::text("rating", &["1", "2", "1"]));
        assert_eq!(p.semantic_type, SemanticType::Numeric);
    }

    #[test]
    fn test_numeric_detection_and_stats() {
        let p = profile(Column::text("amount", &["1.5", "2.5", "3.5", "10"]));
        assert_eq!(p.semantic_type, SemanticType::Numeric);
        let stats = p.numeric_stats().unwrap();
        assert!((stats.mean - 4.375).abs() < 1e-9);
        assert_eq!(stats.min, 1.5);
        assert_eq!(stats.max, 10.0);
    }

    #[test]
    fn test_datetime_by_value_and_name() {
        let p = profile(Column::text("day", &["2024-01-02", "2024-03-05", "2023-12-31"]));
        assert_eq!(p.semantic_type, SemanticType::Datetime);
        match p.stats {
            TypeStats::Datetime(ref d) => {
                assert_eq!(d.min.as_deref(), Some("2023-12-31"));
                assert_eq!(d.max.as_deref(), Some("2024-03-05"));
            }
            ref other => panic!("unexpected stats {:?}", other),
        }

        let p = profile(Column::text("created", &["a", "b", "c"]));
        assert_eq!(p.semantic_type, SemanticType::Datetime);
    }

    #[test]
    fn test_categorical_by_low_cardinality() {
        let values: Vec<&str> = (0..100).map(|i| ["red", "green", "blue"][i % 3]).collect();
        let p = profile(Column::text("color", &values));
        assert_eq!(p.semantic_type, SemanticType::Categorical);
        match p.stats {
            TypeStats::Categorical(ref c) => {
                assert_eq!(c.top_values[0].value, "red");
                assert_eq!(c.top_values[0].count, 34);
                assert!((c.cardinality_ratio - 0.03).abs() < 1e-9);
            }
            ref other => panic!("unexpected stats {:?}", other),
        }
    }

    #[test]
    fn test_text_detection() {
        let values: Vec<String> = (0..30)
            .map(|i| format!("customer wrote a long complaint number {}", i))
            .collect();
        let p = profile(Column::text("notes", &values));
        assert_eq!(p.semantic_type, SemanticType::Text);
    }

    #[test]
    fn test_short_unique_strings_fall_back_to_categorical() {
        let values: Vec<String> = (0..30).map(|i| format!("c{}", i)).collect();
        let p = profile(Column::text("code", &values));
        assert_eq!(p.semantic_type, SemanticType::Categorical);
        assert!(p.has_issue(QualityIssue::HighCardinality));
    }

    #[test]
    fn test_unknown_when_all_missing() {
        let p = profile(Column::numeric_opt("empty", vec![None, None, None]));
        assert_eq!(p.semantic_type, SemanticType::Unknown);
        assert_eq!(p.quality_score, 0.0);
        assert!(p.has_issue(QualityIssue::HighMissing));
        assert!(p.has_issue(QualityIssue::ConstantColumn));
    }

    #[test]
    fn test_constant_column_scores_zero() {
        let p = profile(Column::numeric("k", vec![7.0; 20]));
        assert!(p.has_issue(QualityIssue::ConstantColumn));
        assert_eq!(p.quality_score, 0.0);
    }

    #[test]
    fn test_outliers_and_skew() {
        let mut values = vec![1.0; 95];
        values.extend((0..5).map(|i| 1.0 + i as f64 * 0.1));
        values[0] = 500.0;
        let p = profile(Column::numeric("spend", values));
        assert_eq!(p.outlier_count(), 1);
        assert!(p.has_issue(QualityIssue::SkewedDistribution));
        assert!(!p.has_issue(QualityIssue::OutliersDetected));
        assert_eq!(p.quality_score, 90.0);
    }

    #[test]
    fn test_missing_penalty() {
        let mut values: Vec<Option<f64>> = (0..10).map(|i| Some(i as f64)).collect();
        values[0] = None;
        values[1] = None;
        let p = profile(Column::numeric_opt("x", values));
        assert_eq!(p.missing_count, 2);
        assert!((p.missing_pct - 20.0).abs() < 1e-9);
        assert!((p.quality_score - 80.0).abs() < 1e-9);
    }
}
