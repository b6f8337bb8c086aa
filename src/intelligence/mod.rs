//! Dataset intelligence: column roles, target inference and problem type
//!
//! Everything here is a pure function of the table profile. Classification
//! never fails on messy data; it degrades to the `ignore` role or the
//! exploratory problem type instead. Only explicit overrides naming
//! columns that do not exist are rejected.

mod problem;
mod roles;

pub use problem::{
    default_algorithms, determine_problem_type, ml_strategy, training_task, ClassThresholds,
    CvScheme, MlStrategy, ProblemType,
};
pub use roles::{
    assign_roles, pick_target, score_columns, score_target_candidates, ColumnRole, RoleAssignment,
    RoleRules, TargetCandidate,
};

use crate::error::{AutoMLError, Result};
use crate::profiling::{DatasetProfile, QualityIssue, SemanticType};
use crate::training::TaskKind;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Output of the intelligence classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceResult {
    pub roles: RoleAssignment,
    pub problem_type: ProblemType,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    /// Why the target was chosen, when there is one
    pub target_rationale: Option<String>,
    /// Scores of the implicit target search, empty if a target was named
    pub target_candidates: Vec<TargetCandidate>,
    pub ml_strategy: MlStrategy,
    pub preprocessing_requirements: Vec<String>,
    pub recommendations: Vec<String>,
}

impl IntelligenceResult {
    pub fn task(&self) -> Option<TaskKind> {
        self.ml_strategy.task
    }
}

/// Explicit target / feature choices supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnOverrides {
    pub target: Option<String>,
    pub features: Option<Vec<String>>,
}

/// Role and problem-type classifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntelligenceClassifier {
    rules: RoleRules,
    limits: ClassThresholds,
}

impl IntelligenceClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(mut self, rules: RoleRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_class_thresholds(mut self, limits: ClassThresholds) -> Self {
        self.limits = limits;
        self
    }

    /// Classify without overrides; infallible
    pub fn analyze(&self, profile: &DatasetProfile) -> IntelligenceResult {
        let (roles, reasoning) = assign_roles(profile, &self.rules);
        self.complete(roles, reasoning, profile, None, None)
    }

    /// Classify, then honor explicit target / feature choices
    pub fn analyze_with_overrides(
        &self,
        profile: &DatasetProfile,
        overrides: &ColumnOverrides,
    ) -> Result<IntelligenceResult> {
        let (mut roles, mut reasoning) = assign_roles(profile, &self.rules);
        let mut rationale = None;

        let known = |name: &str| -> Result<()> {
            if profile.column(name).is_some() {
                Ok(())
            } else {
                Err(AutoMLError::ValidationError(format!(
                    "column '{}' not found",
                    name
                )))
            }
        };

        if let Some(target) = &overrides.target {
            known(target)?;
            roles.remove(target);
            if let Some(previous) = roles.target.take() {
                reasoning.push(format!(
                    "Pattern-matched target '{}' demoted to feature by explicit choice",
                    previous
                ));
                roles.features.push(previous);
            }
            roles.target = Some(target.clone());
            rationale = Some(format!("Target '{}' set explicitly by the caller", target));
        }

        let mut search_pool = None;
        if let Some(requested) = &overrides.features {
            let mut features: Vec<String> = Vec::with_capacity(requested.len());
            for name in requested {
                known(name)?;
                if overrides.target.as_deref() == Some(name.as_str()) {
                    return Err(AutoMLError::ValidationError(format!(
                        "column '{}' cannot be both target and feature",
                        name
                    )));
                }
                if !features.contains(name) {
                    features.push(name.clone());
                }
            }
            if roles.target.as_ref().is_some_and(|t| features.contains(t)) {
                if let Some(previous) = roles.target.take() {
                    reasoning.push(format!(
                        "Pattern-matched target '{}' kept as an explicit feature",
                        previous
                    ));
                }
            }
            let dropped: Vec<String> = roles
                .features
                .iter()
                .filter(|f| !features.contains(f))
                .cloned()
                .collect();
            for name in &features {
                roles.remove(name);
            }
            roles.features.retain(|f| !dropped.contains(f));
            roles.ignore.extend(dropped.iter().cloned());
            roles.features.extend(features.iter().cloned());
            reasoning.push(format!("Feature set restricted to {} explicit columns", features.len()));
            search_pool = Some(dropped);
        }

        Ok(self.complete(roles, reasoning, profile, rationale, search_pool))
    }

    fn complete(
        &self,
        mut roles: RoleAssignment,
        mut reasoning: Vec<String>,
        profile: &DatasetProfile,
        explicit_rationale: Option<String>,
        search_pool: Option<Vec<String>>,
    ) -> IntelligenceResult {
        let mut target_candidates = Vec::new();

        let target_rationale = if let Some(rationale) = explicit_rationale {
            Some(rationale)
        } else if let Some(target) = roles.target.clone() {
            Some(format!("Column '{}' matches a target naming pattern", target))
        } else {
            // an explicit feature list is never searched for the target
            target_candidates = match &search_pool {
                Some(pool) => score_columns(pool, profile),
                None => score_target_candidates(&roles, profile),
            };
            let picked = pick_target(&target_candidates, self.rules.target_min_score).cloned();
            match picked {
                Some(best) => {
                    roles.features.retain(|f| f != &best.column);
                    roles.ignore.retain(|f| f != &best.column);
                    roles.target = Some(best.column.clone());
                    Some(format!(
                        "Column '{}' inferred as target with score {:.1} out of {} candidates",
                        best.column,
                        best.score,
                        target_candidates.len()
                    ))
                }
                None => {
                    reasoning.push(format!(
                        "No target candidate scored above {:.0}",
                        self.rules.target_min_score
                    ));
                    None
                }
            }
        };

        let (problem_type, confidence, problem_reasoning) =
            determine_problem_type(&roles, profile, self.limits);
        reasoning.extend(problem_reasoning);

        let task = training_task(problem_type, &roles, profile, self.limits);
        let ml_strategy = ml_strategy(problem_type, task);
        let preprocessing_requirements = preprocessing_requirements(&roles, profile);
        let recommendations = recommendations(problem_type, &roles, profile);

        info!(
            problem_type = %problem_type,
            confidence,
            target = roles.target.as_deref().unwrap_or("-"),
            features = roles.features.len(),
            "Intelligence analysis complete"
        );

        IntelligenceResult {
            roles,
            problem_type,
            confidence,
            reasoning,
            target_rationale,
            target_candidates,
            ml_strategy,
            preprocessing_requirements,
            recommendations,
        }
    }
}

fn preprocessing_requirements(roles: &RoleAssignment, profile: &DatasetProfile) -> Vec<String> {
    let features: Vec<_> = roles
        .features
        .iter()
        .filter_map(|f| profile.column(f))
        .collect();
    let mut out = Vec::new();

    let missing = features.iter().filter(|c| c.missing_count > 0).count();
    if missing > 0 {
        out.push(format!("Handle missing values in {} columns", missing));
    }
    let categorical = features
        .iter()
        .filter(|c| c.semantic_type == SemanticType::Categorical)
        .count();
    if categorical > 0 {
        out.push(format!("Encode {} categorical columns", categorical));
    }
    let numeric = features
        .iter()
        .filter(|c| c.semantic_type == SemanticType::Numeric)
        .count();
    if numeric > 0 {
        out.push(format!("Scale {} numerical columns", numeric));
    }
    if !roles.text.is_empty() {
        out.push(format!(
            "Process {} text columns with TF-IDF or embeddings",
            roles.text.len()
        ));
    }
    if !roles.timestamps.is_empty() {
        out.push(format!(
            "Extract features from {} datetime columns",
            roles.timestamps.len()
        ));
    }
    let outliers = profile.ordered().filter(|c| c.outlier_count() > 0).count();
    if outliers > 0 {
        out.push(format!("Address outliers in {} columns", outliers));
    }
    if profile
        .ordered()
        .any(|c| c.has_issue(QualityIssue::HighMissing))
    {
        out.push("Review columns with more than half of their values missing".to_string());
    }
    out
}

fn recommendations(
    problem_type: ProblemType,
    roles: &RoleAssignment,
    profile: &DatasetProfile,
) -> Vec<String> {
    let mut out = vec![match problem_type {
        ProblemType::BinaryClassification => {
            "Binary classification detected - ensure balanced classes for optimal performance"
        }
        ProblemType::MulticlassClassification => {
            "Multiclass classification - consider class imbalance and feature importance analysis"
        }
        ProblemType::Regression => {
            "Regression problem - focus on feature scaling and outlier handling"
        }
        ProblemType::TimeSeries => {
            "Time series data - ensure proper temporal ordering and consider seasonality"
        }
        ProblemType::TextAnalytics => {
            "Text columns present - text fields are excluded from the tabular feature set"
        }
        ProblemType::Exploratory => {
            "Exploratory analysis recommended - consider clustering or dimensionality reduction"
        }
    }
    .to_string()];

    if profile.overall_quality_score < 70.0 {
        out.push(
            "Data quality score is below 70% - address quality issues before ML training"
                .to_string(),
        );
    }
    if roles.features.len() < 3 {
        out.push(
            "Limited features detected - consider feature engineering or external data sources"
                .to_string(),
        );
    }
    if roles.features.len() > 50 {
        out.push(
            "High dimensionality detected - consider feature selection or dimensionality reduction"
                .to_string(),
        );
    }
    if !roles.identifiers.is_empty() {
        out.push(format!(
            "Remove identifier columns {:?} before training",
            roles.identifiers
        ));
    }
    out
}
