//! Column and dataset profiling
//!
//! Profiling is total: it never fails on messy data. Columns whose values
//! cannot be interpreted degrade to [`SemanticType::Unknown`] or the
//! categorical fallback instead of raising.

mod column;
mod dataset;
pub(crate) mod stats;

pub(crate) use column::parse_date;
pub use column::profile_column;
pub use dataset::{profile_dataset, DatasetIssue, DatasetProfile};

use serde::{Deserialize, Serialize};

/// Inferred meaning of a column's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    Categorical,
    Boolean,
    Datetime,
    Text,
    Unknown,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Numeric => "numeric",
            SemanticType::Categorical => "categorical",
            SemanticType::Boolean => "boolean",
            SemanticType::Datetime => "datetime",
            SemanticType::Text => "text",
            SemanticType::Unknown => "unknown",
        }
    }

    /// Categorical or boolean
    pub fn is_discrete(&self) -> bool {
        matches!(self, SemanticType::Categorical | SemanticType::Boolean)
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-column quality flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityIssue {
    HighMissing,
    ConstantColumn,
    HighCardinality,
    OutliersDetected,
    SkewedDistribution,
}

/// Detection and quality thresholds
///
/// The categorical cut-offs (`categorical_ratio`, `categorical_max_unique`)
/// are empirical and kept configurable rather than derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingThresholds {
    /// Cardinality ratio below which non-numeric data is categorical
    pub categorical_ratio: f64,
    /// Unique count below which non-numeric data is categorical
    pub categorical_max_unique: usize,
    /// Average character length above which values are free text
    pub text_min_avg_length: f64,
    /// Average word count above which values are free text
    pub text_min_avg_words: f64,
    /// Share of sampled values that must look like dates
    pub datetime_match_ratio: f64,
    /// Values sampled for the text and datetime checks
    pub sample_size: usize,
    /// |z| above which a numeric value is an outlier
    pub outlier_z_score: f64,
    pub high_missing_pct: f64,
    pub high_cardinality_pct: f64,
    /// Outlier share of rows (percent) that raises OUTLIERS_DETECTED
    pub outlier_rows_pct: f64,
    pub skew_limit: f64,
    pub top_k_values: usize,
    /// Missing percentage capped in the score penalty
    pub max_missing_penalty: f64,
    pub issue_penalty: f64,
    pub max_duplicate_penalty: f64,
    pub duplicate_rows_pct: f64,
}

impl Default for ProfilingThresholds {
    fn default() -> Self {
        Self {
            categorical_ratio: 0.1,
            categorical_max_unique: 50,
            text_min_avg_length: 20.0,
            text_min_avg_words: 3.0,
            datetime_match_ratio: 0.7,
            sample_size: 100,
            outlier_z_score: 3.0,
            high_missing_pct: 50.0,
            high_cardinality_pct: 80.0,
            outlier_rows_pct: 5.0,
            skew_limit: 2.0,
            top_k_values: 10,
            max_missing_penalty: 50.0,
            issue_penalty: 10.0,
            max_duplicate_penalty: 20.0,
            duplicate_rows_pct: 10.0,
        }
    }
}

/// Numeric summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    pub outlier_count: usize,
    pub zero_count: usize,
}

/// Value frequency entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Categorical / boolean summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStats {
    /// Most frequent values, count descending then value ascending
    pub top_values: Vec<ValueCount>,
    /// unique / non-missing
    pub cardinality_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStats {
    pub length_mean: f64,
    pub length_median: f64,
    pub length_min: usize,
    pub length_max: usize,
    pub avg_word_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatetimeStats {
    /// Earliest parsable date (ISO format)
    pub min: Option<String>,
    pub max: Option<String>,
    pub parsed_count: usize,
}

/// Type-specific statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeStats {
    Numeric(NumericStats),
    Categorical(CategoricalStats),
    Text(TextStats),
    Datetime(DatetimeStats),
    None,
}

/// Profile of a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub semantic_type: SemanticType,
    pub missing_count: usize,
    pub missing_pct: f64,
    pub unique_count: usize,
    pub unique_pct: f64,
    pub stats: TypeStats,
    pub issues: Vec<QualityIssue>,
    /// 0..=100
    pub quality_score: f64,
}

impl ColumnProfile {
    pub fn is_constant(&self) -> bool {
        self.unique_count <= 1
    }

    pub fn has_issue(&self, issue: QualityIssue) -> bool {
        self.issues.contains(&issue)
    }

    pub fn numeric_stats(&self) -> Option<&NumericStats> {
        match &self.stats {
            TypeStats::Numeric(s) => Some(s),
            _ => None,
        }
    }

    pub fn outlier_count(&self) -> usize {
        self.numeric_stats().map_or(0, |s| s.outlier_count)
    }
}
