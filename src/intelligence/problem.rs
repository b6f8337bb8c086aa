//! Problem-type determination and derived ML strategy

use super::roles::RoleAssignment;
use crate::profiling::{DatasetProfile, SemanticType};
use crate::training::TaskKind;
use serde::{Deserialize, Serialize};

/// Class of predictive task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    BinaryClassification,
    MulticlassClassification,
    Regression,
    TimeSeries,
    TextAnalytics,
    Exploratory,
}

impl ProblemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemType::BinaryClassification => "binary_classification",
            ProblemType::MulticlassClassification => "multiclass_classification",
            ProblemType::Regression => "regression",
            ProblemType::TimeSeries => "time_series",
            ProblemType::TextAnalytics => "text_analytics",
            ProblemType::Exploratory => "exploratory",
        }
    }

    pub fn is_classification(&self) -> bool {
        matches!(
            self,
            ProblemType::BinaryClassification | ProblemType::MulticlassClassification
        )
    }
}

impl std::fmt::Display for ProblemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-validation fold scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvScheme {
    StratifiedKfold,
    Kfold,
    TimeSeriesSplit,
}

/// Candidate algorithms, metrics and fold scheme for a problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlStrategy {
    pub problem_type: ProblemType,
    /// Supervised task actually trained, if any
    pub task: Option<TaskKind>,
    pub algorithms: Vec<String>,
    pub evaluation_metrics: Vec<String>,
    pub cross_validation: Option<CvScheme>,
    pub test_size: f64,
}

/// Unique-count limits separating binary, multiclass and regression targets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassThresholds {
    pub binary_max_unique: usize,
    pub multiclass_max_unique: usize,
}

impl Default for ClassThresholds {
    fn default() -> Self {
        Self {
            binary_max_unique: 2,
            multiclass_max_unique: 20,
        }
    }
}

/// Fixed-order problem-type decision with its confidence
pub fn determine_problem_type(
    roles: &RoleAssignment,
    profile: &DatasetProfile,
    limits: ClassThresholds,
) -> (ProblemType, f64, Vec<String>) {
    let mut reasoning = Vec::new();

    let target = match roles.target.as_deref().and_then(|t| profile.column(t)) {
        Some(t) => t,
        None => {
            reasoning.push(
                "No clear target column identified - defaulting to exploratory analysis"
                    .to_string(),
            );
            return (ProblemType::Exploratory, 0.6, reasoning);
        }
    };

    if !roles.timestamps.is_empty() {
        reasoning.push(format!("Timestamp columns detected: {:?}", roles.timestamps));
        return (ProblemType::TimeSeries, 0.8, reasoning);
    }

    if target.semantic_type == SemanticType::Text || !roles.text.is_empty() {
        reasoning.push("Text data detected - suitable for text analytics".to_string());
        return (ProblemType::TextAnalytics, 0.7, reasoning);
    }

    let unique = target.unique_count;
    match target.semantic_type {
        SemanticType::Numeric => {
            if unique <= limits.binary_max_unique {
                reasoning.push(format!(
                    "Target '{}' has {} unique values - binary classification",
                    target.name, unique
                ));
                (ProblemType::BinaryClassification, 0.9, reasoning)
            } else if unique <= limits.multiclass_max_unique {
                reasoning.push(format!(
                    "Target '{}' has {} unique values - multiclass classification",
                    target.name, unique
                ));
                (ProblemType::MulticlassClassification, 0.8, reasoning)
            } else {
                reasoning.push(format!(
                    "Target '{}' is numeric with {} unique values - regression",
                    target.name, unique
                ));
                (ProblemType::Regression, 0.9, reasoning)
            }
        }
        SemanticType::Categorical | SemanticType::Boolean => {
            if unique <= limits.binary_max_unique {
                reasoning.push(format!(
                    "Target '{}' is categorical with {} classes - binary classification",
                    target.name, unique
                ));
                (ProblemType::BinaryClassification, 0.95, reasoning)
            } else {
                reasoning.push(format!(
                    "Target '{}' is categorical with {} classes - multiclass classification",
                    target.name, unique
                ));
                (ProblemType::MulticlassClassification, 0.9, reasoning)
            }
        }
        _ => {
            reasoning.push(
                "Unable to determine clear problem type - defaulting to exploratory".to_string(),
            );
            (ProblemType::Exploratory, 0.4, reasoning)
        }
    }
}

/// Supervised task implied by the problem type and the target column
///
/// Time-series and text problems still train on the tabular features,
/// so their task follows the target's own type.
pub fn training_task(
    problem_type: ProblemType,
    roles: &RoleAssignment,
    profile: &DatasetProfile,
    limits: ClassThresholds,
) -> Option<TaskKind> {
    match problem_type {
        ProblemType::BinaryClassification | ProblemType::MulticlassClassification => {
            Some(TaskKind::Classification)
        }
        ProblemType::Regression => Some(TaskKind::Regression),
        ProblemType::Exploratory => None,
        ProblemType::TimeSeries | ProblemType::TextAnalytics => {
            let target = profile.column(roles.target.as_deref()?)?;
            match target.semantic_type {
                SemanticType::Numeric if target.unique_count > limits.multiclass_max_unique => {
                    Some(TaskKind::Regression)
                }
                SemanticType::Numeric | SemanticType::Categorical | SemanticType::Boolean => {
                    Some(TaskKind::Classification)
                }
                _ => None,
            }
        }
    }
}

const CLASSIFIERS: [&str; 4] = [
    "logistic_regression",
    "random_forest",
    "gradient_boosting",
    "decision_tree",
];
const REGRESSORS: [&str; 4] = [
    "linear_regression",
    "random_forest",
    "gradient_boosting",
    "decision_tree",
];

pub fn default_algorithms(task: TaskKind) -> Vec<String> {
    let ids: &[&str] = match task {
        TaskKind::Classification => &CLASSIFIERS,
        TaskKind::Regression => &REGRESSORS,
    };
    ids.iter().map(|s| s.to_string()).collect()
}

pub fn ml_strategy(problem_type: ProblemType, task: Option<TaskKind>) -> MlStrategy {
    let metrics: &[&str] = match (problem_type, task) {
        (ProblemType::BinaryClassification, _) => {
            &["accuracy", "precision", "recall", "f1_score", "roc_auc"]
        }
        (ProblemType::MulticlassClassification, _) => {
            &["accuracy", "precision_macro", "recall_macro", "f1_macro"]
        }
        (ProblemType::Exploratory, _) => &["silhouette_score", "calinski_harabasz_score"],
        (_, Some(TaskKind::Classification)) => &["accuracy", "precision", "recall", "f1_score"],
        (_, _) => &["mse", "rmse", "mae", "r2_score"],
    };

    let cross_validation = match (problem_type, task) {
        (ProblemType::TimeSeries, Some(_)) => Some(CvScheme::TimeSeriesSplit),
        (_, Some(TaskKind::Classification)) => Some(CvScheme::StratifiedKfold),
        (_, Some(TaskKind::Regression)) => Some(CvScheme::Kfold),
        (_, None) => None,
    };

    MlStrategy {
        problem_type,
        task,
        algorithms: task.map(default_algorithms).unwrap_or_default(),
        evaluation_metrics: metrics.iter().map(|s| s.to_string()).collect(),
        cross_validation,
        test_size: 0.2,
    }
}
