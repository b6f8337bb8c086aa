//! Run configuration

use crate::error::{AutoMLError, Result};
use crate::intelligence::{ClassThresholds, ColumnOverrides, RoleRules};
use crate::pipeline::PipelineRules;
use crate::profiling::ProfilingThresholds;
use crate::training::{Hyperparameters, TrainerSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything a run needs besides the table and the algorithm registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoMLConfig {
    pub profiling: ProfilingThresholds,
    pub roles: RoleRules,
    pub classes: ClassThresholds,
    pub pipeline: PipelineRules,
    pub trainer: TrainerSettings,
    pub overrides: ColumnOverrides,
    /// Tables with fewer rows are rejected before profiling
    pub min_rows: usize,
    pub min_columns: usize,
}

impl Default for AutoMLConfig {
    fn default() -> Self {
        Self {
            profiling: ProfilingThresholds::default(),
            roles: RoleRules::default(),
            classes: ClassThresholds::default(),
            pipeline: PipelineRules::default(),
            trainer: TrainerSettings::default(),
            overrides: ColumnOverrides::default(),
            min_rows: 10,
            min_columns: 2,
        }
    }
}

impl AutoMLConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn random_seed(&self) -> u64 {
        self.trainer.random_seed
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.trainer.random_seed = seed;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.overrides.target = Some(target.into());
        self
    }

    pub fn with_features<S: Into<String>>(mut self, features: impl IntoIterator<Item = S>) -> Self {
        self.overrides.features = Some(features.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.trainer.cv_folds = folds;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.trainer.test_size = test_size;
        self
    }

    /// Restrict and order the candidate algorithms
    pub fn with_algorithms<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.trainer.algorithms = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_hyperparameters(mut self, algorithm: &str, params: Hyperparameters) -> Self {
        self.trainer
            .hyperparameters
            .insert(algorithm.to_string(), params);
        self
    }

    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    pub fn with_profiling(mut self, thresholds: ProfilingThresholds) -> Self {
        self.profiling = thresholds;
        self
    }

    pub fn with_pipeline_rules(mut self, rules: PipelineRules) -> Self {
        self.pipeline = rules;
        self
    }

    /// Reject inconsistent values before any fitting
    pub fn validate(&self) -> Result<()> {
        self.trainer.validate()?;

        let pct_fields = [
            ("profiling.high_missing_pct", self.profiling.high_missing_pct),
            ("profiling.high_cardinality_pct", self.profiling.high_cardinality_pct),
            ("roles.ignore_missing_pct", self.roles.ignore_missing_pct),
            ("roles.identifier_unique_pct", self.roles.identifier_unique_pct),
            ("pipeline.high_missing_pct", self.pipeline.high_missing_pct),
            ("pipeline.knn_missing_pct", self.pipeline.knn_missing_pct),
        ];
        for (name, value) in pct_fields {
            if !(0.0..=100.0).contains(&value) {
                return Err(AutoMLError::ConfigurationError(format!(
                    "{} must be a percentage, got {}",
                    name, value
                )));
            }
        }

        if !(self.profiling.categorical_ratio > 0.0 && self.profiling.categorical_ratio <= 1.0) {
            return Err(AutoMLError::ConfigurationError(format!(
                "profiling.categorical_ratio must be in (0, 1], got {}",
                self.profiling.categorical_ratio
            )));
        }
        if self.classes.binary_max_unique < 2
            || self.classes.multiclass_max_unique < self.classes.binary_max_unique
        {
            return Err(AutoMLError::ConfigurationError(format!(
                "class thresholds must satisfy 2 <= binary ({}) <= multiclass ({})",
                self.classes.binary_max_unique, self.classes.multiclass_max_unique
            )));
        }
        if self.pipeline.knn_neighbors == 0 {
            return Err(AutoMLError::ConfigurationError(
                "pipeline.knn_neighbors must be at least 1".to_string(),
            ));
        }
        if self.pipeline.target_smoothing < 0.0 || self.pipeline.clip_iqr_factor <= 0.0 {
            return Err(AutoMLError::ConfigurationError(
                "pipeline.target_smoothing must be >= 0 and clip_iqr_factor > 0".to_string(),
            ));
        }
        if self.min_rows < 2 || self.min_columns < 2 {
            return Err(AutoMLError::ConfigurationError(format!(
                "min_rows ({}) and min_columns ({}) must be at least 2",
                self.min_rows, self.min_columns
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
