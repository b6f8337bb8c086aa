//! Model training module
//!
//! Provides the candidate algorithms and the machinery that compares them:
//! - Linear models (least squares, logistic regression)
//! - Decision trees and random forests
//! - Gradient boosted trees
//! - Fold generation, scoring and the candidate registry

pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod metrics;
pub mod models;
pub mod random_forest;
pub mod registry;
pub mod trainer;

pub use cross_validation::{train_test_split, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{
    GradientBoostingClassifier, GradientBoostingConfig, GradientBoostingRegressor,
};
pub use linear_models::{LinearRegression, LogisticRegression};
pub use metrics::{ModelMetrics, Scoring};
pub use models::{Hyperparameters, Model, ModelFamily};
pub use random_forest::{MaxFeatures, RandomForest};
pub use registry::{AlgorithmRegistry, AlgorithmSpec, ModelFactory, ModelLoader};
pub use trainer::{
    confidence_level, default_scoring, AutoMLResult, CandidateFailure, ConfidenceLevel,
    ModelResult, ModelTrainer, PerformanceSummary, TrainerSettings, TrainingData, TrainingOutcome,
};

use serde::{Deserialize, Serialize};

/// Supervised task a candidate is trained for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Classification,
    Regression,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Classification => "classification",
            TaskKind::Regression => "regression",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
