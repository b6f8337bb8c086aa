//! Preprocessing strategy selection and the fitted feature transform
//!
//! [`PipelineSelector`] turns a dataset profile into a [`PipelineConfig`]
//! (strategy tier plus data-driven customizations). [`FittedTransform`]
//! learns that configuration on the training rows of a [`Table`] and maps
//! any table with the same schema to a dense feature matrix.
//!
//! [`Table`]: crate::table::Table

mod encode;
mod impute;
mod scale;
mod select;
mod selector;
mod transform;

pub use encode::CategoricalEncoder;
pub use impute::{NumericImputer, OutlierClipper};
pub use scale::Scaler;
pub use select::SelectKBest;
pub use selector::PipelineSelector;
pub use transform::FittedTransform;

use serde::{Deserialize, Serialize};

/// Preprocessing strategy tier, from least to most involved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyTier {
    Minimal,
    Standard,
    Robust,
    Advanced,
}

impl StrategyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyTier::Minimal => "minimal",
            StrategyTier::Standard => "standard",
            StrategyTier::Robust => "robust",
            StrategyTier::Advanced => "advanced",
        }
    }

    /// Processing-time multiplier for the tier
    pub fn time_multiplier(&self) -> f64 {
        match self {
            StrategyTier::Minimal => 1.0,
            StrategyTier::Standard => 1.5,
            StrategyTier::Robust => 2.0,
            StrategyTier::Advanced => 3.0,
        }
    }

    pub fn all() -> [StrategyTier; 4] {
        [
            StrategyTier::Minimal,
            StrategyTier::Standard,
            StrategyTier::Robust,
            StrategyTier::Advanced,
        ]
    }
}

impl std::fmt::Display for StrategyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How missing values are filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationMethod {
    Mean,
    Median,
    /// Most frequent value
    Mode,
    /// Mean of the nearest complete training rows
    Knn,
}

impl ImputationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImputationMethod::Mean => "mean",
            ImputationMethod::Median => "median",
            ImputationMethod::Mode => "mode",
            ImputationMethod::Knn => "knn",
        }
    }
}

impl std::fmt::Display for ImputationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric feature scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMethod {
    /// (x - mean) / std
    Standard,
    /// (x - min) / (max - min)
    MinMax,
    /// (x - median) / IQR
    Robust,
    None,
}

impl ScalingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingMethod::Standard => "standard",
            ScalingMethod::MinMax => "minmax",
            ScalingMethod::Robust => "robust",
            ScalingMethod::None => "none",
        }
    }
}

impl std::fmt::Display for ScalingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical feature encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMethod {
    /// One indicator per level, first level dropped
    OneHot,
    /// Sorted level index, unknown levels map to -1
    Label,
    /// Smoothed per-level target mean
    Target,
}

impl EncodingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingMethod::OneHot => "onehot",
            EncodingMethod::Label => "label",
            EncodingMethod::Target => "target",
        }
    }
}

impl std::fmt::Display for EncodingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds driving tier selection, customization and fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineRules {
    /// Missing percentage above which a column counts as high-missing
    pub high_missing_pct: f64,
    pub minimal_min_quality: f64,
    pub standard_min_quality: f64,
    pub robust_min_quality: f64,
    /// Column count above which a dataset is considered wide
    pub wide_max_columns: usize,
    pub knn_missing_pct: f64,
    pub knn_min_rows: usize,
    pub knn_neighbors: usize,
    /// Categorical unique count above which one-hot becomes target encoding
    pub target_encoding_min_unique: usize,
    pub selection_min_columns: usize,
    pub selection_max_k: usize,
    /// k used when a tier enables selection without a column-count trigger
    pub default_selection_k: usize,
    pub clip_iqr_factor: f64,
    /// Pseudo-count pulling rare levels towards the global target mean
    pub target_smoothing: f64,
}

impl Default for PipelineRules {
    fn default() -> Self {
        Self {
            high_missing_pct: 20.0,
            minimal_min_quality: 90.0,
            standard_min_quality: 70.0,
            robust_min_quality: 50.0,
            wide_max_columns: 50,
            knn_missing_pct: 30.0,
            knn_min_rows: 1000,
            knn_neighbors: 5,
            target_encoding_min_unique: 10,
            selection_min_columns: 20,
            selection_max_k: 15,
            default_selection_k: 15,
            clip_iqr_factor: 1.5,
            target_smoothing: 10.0,
        }
    }
}

/// A tier default overridden by a customization rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineCustomization {
    pub setting: String,
    pub from: String,
    pub to: String,
    pub reason: String,
}

/// Chosen preprocessing strategy with its reasoning trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub strategy: StrategyTier,
    pub numeric_imputation: ImputationMethod,
    pub categorical_imputation: ImputationMethod,
    pub scaling: ScalingMethod,
    pub encoding: EncodingMethod,
    pub feature_selection: bool,
    pub feature_selection_k: Option<usize>,
    pub outlier_clipping: bool,
    /// Numeric and boolean feature columns, in table order
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    /// Ordered description of the transform
    pub steps: Vec<String>,
    pub customizations: Vec<PipelineCustomization>,
    pub reasoning: Vec<String>,
    pub estimated_time_secs: f64,
    pub estimated_memory_mb: f64,
    pub memory_requirements: String,
    /// Neighbour count, outlier fence and smoothing used when fitting
    pub rules: PipelineRules,
}

impl PipelineConfig {
    pub fn n_input_columns(&self) -> usize {
        self.numeric_columns.len() + self.categorical_columns.len()
    }
}
