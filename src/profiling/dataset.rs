//! Dataset-level aggregation of column profiles

use super::{profile_column, ColumnProfile, ProfilingThresholds, QualityIssue, SemanticType};
use crate::table::Table;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

/// Dataset-level quality flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetIssue {
    DuplicateRows,
    InconsistentFormat,
}

/// Aggregated profile of a whole table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub n_rows: usize,
    pub n_cols: usize,
    /// Column names in table order
    pub column_order: Vec<String>,
    pub memory_mb: f64,
    pub duplicate_rows: usize,
    pub duplicate_pct: f64,
    pub columns: BTreeMap<String, ColumnProfile>,
    /// 0..=100
    pub overall_quality_score: f64,
    pub issues: Vec<DatasetIssue>,
    pub recommendations: Vec<String>,
    pub type_distribution: BTreeMap<SemanticType, usize>,
}

impl DatasetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.get(name)
    }

    /// Profiles in table order
    pub fn ordered(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.column_order.iter().filter_map(|n| self.columns.get(n))
    }

    /// Sum of per-column issue counts
    pub fn total_column_issues(&self) -> usize {
        self.columns.values().map(|c| c.issues.len()).sum()
    }

    pub fn columns_of_type(&self, semantic_type: SemanticType) -> Vec<&ColumnProfile> {
        self.ordered()
            .filter(|c| c.semantic_type == semantic_type)
            .collect()
    }
}

/// Profile every column and aggregate the results
pub fn profile_dataset(table: &Table, thresholds: &ProfilingThresholds) -> DatasetProfile {
    let start = Instant::now();
    let n_rows = table.n_rows();

    // Collected in column order regardless of scheduling
    let profiles: Vec<ColumnProfile> = table
        .columns()
        .par_iter()
        .map(|column| profile_column(column, n_rows, thresholds))
        .collect();

    let duplicate_rows = count_duplicate_rows(table);
    let duplicate_pct = if n_rows == 0 {
        0.0
    } else {
        duplicate_rows as f64 / n_rows as f64 * 100.0
    };

    let overall_quality_score = if profiles.is_empty() {
        0.0
    } else {
        let avg = profiles.iter().map(|p| p.quality_score).sum::<f64>() / profiles.len() as f64;
        (avg - duplicate_pct.min(thresholds.max_duplicate_penalty)).clamp(0.0, 100.0)
    };

    let mut issues = Vec::new();
    if duplicate_pct > thresholds.duplicate_rows_pct {
        issues.push(DatasetIssue::DuplicateRows);
    }
    let with_issues = profiles.iter().filter(|p| !p.issues.is_empty()).count();
    if !profiles.is_empty() && with_issues as f64 > profiles.len() as f64 / 2.0 {
        issues.push(DatasetIssue::InconsistentFormat);
    }

    let mut type_distribution = BTreeMap::new();
    for profile in &profiles {
        *type_distribution.entry(profile.semantic_type).or_insert(0) += 1;
    }

    let recommendations = recommendations(&profiles, &issues);

    let column_order: Vec<String> = profiles.iter().map(|p| p.name.clone()).collect();
    let columns: BTreeMap<String, ColumnProfile> =
        profiles.into_iter().map(|p| (p.name.clone(), p)).collect();

    debug!(
        duplicates = duplicate_rows,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Dataset profiled"
    );
    info!(
        rows = n_rows,
        cols = table.n_cols(),
        score = overall_quality_score,
        "Data profiling complete"
    );

    DatasetProfile {
        n_rows,
        n_cols: table.n_cols(),
        column_order,
        memory_mb: table.memory_bytes() as f64 / (1024.0 * 1024.0),
        duplicate_rows,
        duplicate_pct,
        columns,
        overall_quality_score,
        issues,
        recommendations,
        type_distribution,
    }
}

fn count_duplicate_rows(table: &Table) -> usize {
    let mut seen = HashSet::new();
    table
        .row_keys()
        .into_iter()
        .filter(|row| !seen.insert(row.clone()))
        .count()
}

fn recommendations(profiles: &[ColumnProfile], issues: &[DatasetIssue]) -> Vec<String> {
    let mut out = Vec::new();

    if issues.contains(&DatasetIssue::DuplicateRows) {
        out.push("Remove duplicate rows to improve data quality".to_string());
    }

    let numeric = profiles
        .iter()
        .filter(|p| p.semantic_type == SemanticType::Numeric)
        .count();
    if numeric > 0 {
        out.push(format!(
            "Consider scaling {} numeric columns for better model performance",
            numeric
        ));
    }

    let categorical = profiles
        .iter()
        .filter(|p| p.semantic_type == SemanticType::Categorical)
        .count();
    if categorical > 0 {
        out.push(format!(
            "Encode {} categorical columns before training",
            categorical
        ));
    }

    let high_missing = profiles
        .iter()
        .filter(|p| p.has_issue(QualityIssue::HighMissing))
        .count();
    if high_missing > 0 {
        out.push(format!(
            "Develop strategy for {} columns with high missing values",
            high_missing
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn test_duplicates_penalize_score() {
        let table = Table::new(vec![
            Column::numeric("a", vec![1.0, 1.0, 1.0, 2.0, 3.0]),
            Column::text("b", &["x", "x", "x", "y", "z"]),
        ])
        .unwrap();
        let profile = profile_dataset(&table, &ProfilingThresholds::default());

        assert_eq!(profile.duplicate_rows, 2);
        assert!((profile.duplicate_pct - 40.0).abs() < 1e-9);
        assert!(profile.issues.contains(&DatasetIssue::DuplicateRows));
        assert_eq!(profile.recommendations[0], "Remove duplicate rows to improve data quality");

        let avg = profile.columns.values().map(|c| c.quality_score).sum::<f64>() / 2.0;
        assert!((profile.overall_quality_score - (avg - 20.0).max(0.0)).abs() < 1e-9);
    }

    #[test]
    fn test_column_order_kept() {
        let table = Table::new(vec![
            Column::numeric("zeta", vec![1.0, 2.0]),
            Column::numeric("alpha", vec![3.0, 4.0]),
        ])
        .unwrap();
        let profile = profile_dataset(&table, &ProfilingThresholds::default());
        assert_eq!(profile.column_order, vec!["zeta", "alpha"]);
        let names: Vec<&str> = profile.ordered().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_inconsistent_format() {
        let table = Table::new(vec![
            Column::numeric("c1", vec![5.0; 4]),
            Column::numeric("c2", vec![6.0; 4]),
            Column::numeric("ok", vec![1.0, 2.0, 3.0, 4.0]),
        ])
        .unwrap();
        let profile = profile_dataset(&table, &ProfilingThresholds::default());
        assert!(profile.issues.contains(&DatasetIssue::InconsistentFormat));
    }

    #[test]
    fn test_empty_table_scores_zero() {
        let table = Table::new(vec![]).unwrap();
        let profile = profile_dataset(&table, &ProfilingThresholds::default());
        assert_eq!(profile.overall_quality_score, 0.0);
        assert!(profile.columns.is_empty());
    }
}
