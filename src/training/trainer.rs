//! Candidate evaluation, ranking and selection

use super::cross_validation::{CVSplit, CVStrategy, CrossValidator};
use super::metrics::{accuracy, ensure_finite, r2_score, ModelMetrics, Scoring};
use super::models::{Hyperparameters, Model, ModelFamily};
use super::registry::{AlgorithmRegistry, AlgorithmSpec};
use super::TaskKind;
use crate::error::{AutoMLError, Result};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Trainer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    pub cv_folds: usize,
    pub random_seed: u64,
    /// Shuffle rows before k-fold splitting (time-series splits never shuffle)
    pub shuffle: bool,
    /// Held-out fraction
    pub test_size: f64,
    /// Restrict candidates to these identifiers, in this order
    pub algorithms: Option<Vec<String>>,
    /// Per-algorithm hyperparameter overrides
    pub hyperparameters: BTreeMap<String, Hyperparameters>,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            random_seed: 42,
            shuffle: true,
            test_size: 0.2,
            algorithms: None,
            hyperparameters: BTreeMap::new(),
        }
    }
}

impl TrainerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(AutoMLError::ConfigurationError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(AutoMLError::ConfigurationError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        Ok(())
    }
}

/// Metric used to rank candidates for a task
pub fn default_scoring(task: TaskKind, n_classes: usize) -> Scoring {
    match task {
        TaskKind::Classification if n_classes <= 2 => Scoring::RocAuc,
        TaskKind::Classification => Scoring::Accuracy,
        TaskKind::Regression => Scoring::R2,
    }
}

/// Evaluation of one successful candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub algorithm: String,
    pub family: ModelFamily,
    /// One score per fold, in fold order
    pub cv_scores: Vec<f64>,
    pub cv_mean: f64,
    /// Population standard deviation of `cv_scores`
    pub cv_std: f64,
    /// Accuracy or R² on the held-out split
    pub test_score: f64,
    pub test_metrics: ModelMetrics,
    pub training_time_secs: f64,
    pub hyperparameters: Hyperparameters,
    pub feature_importance: Option<BTreeMap<String, f64>>,
}

impl ModelResult {
    /// Features by descending importance, names ascending on ties
    pub fn top_features(&self, n: usize) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .feature_importance
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// A candidate that was dropped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFailure {
    pub algorithm: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub best_model: String,
    pub cv_score: f64,
    pub cv_std: f64,
    pub test_score: f64,
    pub training_time_secs: f64,
    /// Metric behind `cv_score`
    pub cv_metric: String,
    /// Metric behind `test_score`
    pub test_metric: String,
}

/// Ranked outcome of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoMLResult {
    pub task: TaskKind,
    pub scoring: Scoring,
    pub best_model: ModelResult,
    /// Successful candidates, best first
    pub ranked: Vec<ModelResult>,
    pub failed_candidates: Vec<CandidateFailure>,
    pub train_size: usize,
    pub test_size: usize,
    pub performance_summary: PerformanceSummary,
    pub recommendations: Vec<String>,
    pub confidence_level: ConfidenceLevel,
}

/// Train/test matrices handed to the trainer
#[derive(Debug, Clone, Copy)]
pub struct TrainingData<'a> {
    pub x_train: &'a Array2<f64>,
    pub y_train: &'a Array1<f64>,
    pub x_test: &'a Array2<f64>,
    pub y_test: &'a Array1<f64>,
    pub feature_names: &'a [String],
}

/// Result plus the fitted winner
#[derive(Debug)]
pub struct TrainingOutcome {
    pub result: AutoMLResult,
    pub best_model: Box<dyn Model>,
    pub best_spec: AlgorithmSpec,
}

/// Evaluates every resolved candidate and picks the winner
#[derive(Debug, Clone)]
pub struct ModelTrainer<'r> {
    registry: &'r AlgorithmRegistry,
    settings: TrainerSettings,
}

impl<'r> ModelTrainer<'r> {
    pub fn new(registry: &'r AlgorithmRegistry, settings: TrainerSettings) -> Self {
        Self { registry, settings }
    }

    pub fn settings(&self) -> &TrainerSettings {
        &self.settings
    }

    /// Fold scheme for a task; `time_ordered` selects forward-only splits
    pub fn cv_strategy(&self, task: TaskKind, time_ordered: bool) -> CVStrategy {
        let n_splits = self.settings.cv_folds;
        let shuffle = self.settings.shuffle;
        match (time_ordered, task) {
            (true, _) => CVStrategy::TimeSeriesSplit { n_splits },
            (false, TaskKind::Classification) => CVStrategy::StratifiedKFold { n_splits, shuffle },
            (false, TaskKind::Regression) => CVStrategy::KFold { n_splits, shuffle },
        }
    }

    /// Candidates for `task` under the configured identifier list
    pub fn resolve(&self, task: TaskKind) -> Result<Vec<&'r AlgorithmSpec>> {
        self.registry.resolve(task, self.settings.algorithms.as_deref())
    }

    pub fn train(
        &self,
        task: TaskKind,
        scoring: Scoring,
        cv: CVStrategy,
        data: TrainingData<'_>,
    ) -> Result<TrainingOutcome> {
        let specs = self.resolve(task)?;
        self.train_candidates(&specs, task, scoring, cv, data)
    }

    /// Evaluate already-resolved candidates in the given order
    pub fn train_candidates(
        &self,
        specs: &[&AlgorithmSpec],
        task: TaskKind,
        scoring: Scoring,
        cv: CVStrategy,
        data: TrainingData<'_>,
    ) -> Result<TrainingOutcome> {
        self.settings.validate()?;
        if specs.is_empty() {
            return Err(AutoMLError::ConfigurationError(format!(
                "no {} algorithms configured",
                task
            )));
        }
        let splits = CrossValidator::new(cv)
            .with_random_state(self.settings.random_seed)
            .split(data.y_train)?;

        info!(
            task = %task,
            candidates = specs.len(),
            folds = splits.len(),
            train_rows = data.x_train.nrows(),
            features = data.x_train.ncols(),
            "Evaluating candidates"
        );

        let mut fitted: Vec<(ModelResult, Box<dyn Model>, &AlgorithmSpec)> = Vec::new();
        let mut failures = Vec::new();
        for spec in specs {
            match self.evaluate(spec, task, scoring, &splits, data) {
                Ok((result, model)) => {
                    info!(
                        candidate = %spec.id,
                        cv_mean = result.cv_mean,
                        cv_std = result.cv_std,
                        test_score = result.test_score,
                        "Candidate evaluated"
                    );
                    fitted.push((result, model, *spec));
                }
                Err(err) => {
                    warn!(candidate = %spec.id, error = %err, "Candidate dropped");
                    failures.push(CandidateFailure {
                        algorithm: spec.id.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if fitted.is_empty() {
            return Err(AutoMLError::FatalTrainingError(format!(
                "all {} candidates failed",
                specs.len()
            )));
        }

        // stable: equal means keep registry order
        fitted.sort_by(|a, b| b.0.cv_mean.total_cmp(&a.0.cv_mean));
        let mut fitted = fitted.into_iter();
        let (best, best_model, best_spec) = match fitted.next() {
            Some(first) => first,
            None => {
                return Err(AutoMLError::FatalTrainingError(
                    "no candidate survived".to_string(),
                ))
            }
        };
        let mut ranked = vec![best.clone()];
        ranked.extend(fitted.map(|(r, _, _)| r));

        let confidence_level = confidence_level(&best, &ranked);
        let recommendations = recommendations(&best);
        let test_metric = match task {
            TaskKind::Classification => "accuracy",
            TaskKind::Regression => "r2",
        };
        let performance_summary = PerformanceSummary {
            best_model: best.algorithm.clone(),
            cv_score: best.cv_mean,
            cv_std: best.cv_std,
            test_score: best.test_score,
            training_time_secs: best.training_time_secs,
            cv_metric: scoring.name().to_string(),
            test_metric: test_metric.to_string(),
        };

        info!(
            best = %best.algorithm,
            cv_mean = best.cv_mean,
            confidence = %confidence_level,
            dropped = failures.len(),
            "Candidate selection complete"
        );

        Ok(TrainingOutcome {
            result: AutoMLResult {
                task,
                scoring,
                best_model: best,
                ranked,
                failed_candidates: failures,
                train_size: data.x_train.nrows(),
                test_size: data.x_test.nrows(),
                performance_summary,
                recommendations,
                confidence_level,
            },
            best_model,
            best_spec: best_spec.clone(),
        })
    }

    /// Cross-validate, refit on the full training split, score the hold-out.
    /// Every failure is reported as a processing error for this candidate.
    fn evaluate(
        &self,
        spec: &AlgorithmSpec,
        task: TaskKind,
        scoring: Scoring,
        splits: &[CVSplit],
        data: TrainingData<'_>,
    ) -> Result<(ModelResult, Box<dyn Model>)> {
        let start = Instant::now();
        let seed = self.settings.random_seed;
        let params = spec.params(self.settings.hyperparameters.get(&spec.id));
        let fail = |e: AutoMLError| AutoMLError::processing(&spec.id, e);

        let cv_scores: Vec<f64> = splits
            .par_iter()
            .map(|split| {
                let x_tr = data.x_train.select(Axis(0), &split.train_indices);
                let y_tr: Array1<f64> = split.train_indices.iter().map(|&i| data.y_train[i]).collect();
                let x_va = data.x_train.select(Axis(0), &split.test_indices);
                let y_va: Array1<f64> = split.test_indices.iter().map(|&i| data.y_train[i]).collect();

                let mut model = spec.build(&params, seed)?;
                model.fit(&x_tr, &y_tr)?;
                let pred = model.predict(&x_va)?;
                let proba = match scoring {
                    Scoring::RocAuc => model.predict_proba(&x_va)?,
                    _ => None,
                };
                let score = scoring.score(&y_va, &pred, proba.as_ref())?;
                debug!(candidate = %spec.id, fold = split.fold_idx, score, "Fold scored");
                ensure_finite(scoring.name(), score)
            })
            .collect::<Result<_>>()
            .map_err(fail)?;

        let mut model = spec.build(&params, seed).map_err(fail)?;
        model.fit(data.x_train, data.y_train).map_err(fail)?;
        let test_pred = model.predict(data.x_test).map_err(fail)?;
        let (test_score, test_metrics) = match task {
            TaskKind::Classification => (
                accuracy(data.y_test, &test_pred),
                ModelMetrics::compute_classification(data.y_test, &test_pred),
            ),
            TaskKind::Regression => (
                r2_score(data.y_test, &test_pred),
                ModelMetrics::compute_regression(data.y_test, &test_pred),
            ),
        };
        let test_score = ensure_finite("test score", test_score).map_err(fail)?;

        let feature_importance = model.feature_importances().and_then(|imp| {
            (imp.len() == data.feature_names.len()).then(|| {
                data.feature_names
                    .iter()
                    .cloned()
                    .zip(imp.iter().copied())
                    .collect::<BTreeMap<_, _>>()
            })
        });

        let n = cv_scores.len() as f64;
        let cv_mean = cv_scores.iter().sum::<f64>() / n;
        let cv_std = (cv_scores.iter().map(|s| (s - cv_mean).powi(2)).sum::<f64>() / n).sqrt();

        Ok((
            ModelResult {
                algorithm: spec.id.clone(),
                family: spec.family,
                cv_scores,
                cv_mean,
                cv_std,
                test_score,
                test_metrics,
                training_time_secs: start.elapsed().as_secs_f64(),
                hyperparameters: params,
                feature_importance,
            },
            model,
        ))
    }
}

/// High, Medium or Low from hold-out score, fold stability and the spread
/// between the best and worst candidate
pub fn confidence_level(best: &ModelResult, all: &[ModelResult]) -> ConfidenceLevel {
    let worst = all
        .iter()
        .map(|r| r.cv_mean)
        .fold(best.cv_mean, f64::min);
    let gap = best.cv_mean - worst;

    if best.test_score > 0.85 && best.cv_std < 0.05 {
        ConfidenceLevel::High
    } else if best.test_score > 0.7 && gap > 0.05 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

fn recommendations(best: &ModelResult) -> Vec<String> {
    let mut out = Vec::new();
    if best.test_score < 0.7 {
        out.push("Model performance is below 70% - consider feature engineering or more data".to_string());
    } else if best.test_score > 0.9 {
        out.push("Excellent model performance - ready for production deployment".to_string());
    }
    if best.cv_std > 0.1 {
        out.push("High variance in cross-validation - consider regularization or more data".to_string());
    }
    match best.family {
        ModelFamily::Tree => out.push(
            "Tree-based model selected - captures non-linear effects and feature interactions"
                .to_string(),
        ),
        ModelFamily::Linear => out.push(
            "Linear model selected - highly interpretable but may need feature engineering"
                .to_string(),
        ),
        ModelFamily::Other => {}
    }
    let top = best.top_features(3);
    if !top.is_empty() {
        let names: Vec<&str> = top.iter().map(|(n, _)| n.as_str()).collect();
        out.push(format!("Top important features: {}", names.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::registry::AlgorithmSpec;

    #[derive(Debug)]
    struct Broken;

    impl Model for Broken {
        fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
            Err(AutoMLError::ComputationError("boom".to_string()))
        }
        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            Ok(Array1::zeros(x.nrows()))
        }
        fn to_json(&self) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    fn broken(id: &str) -> AlgorithmSpec {
        AlgorithmSpec::new(
            id,
            TaskKind::Classification,
            ModelFamily::Other,
            Hyperparameters::new(),
            |_, _| Ok(Box::new(Broken)),
        )
    }

    fn separable(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let shift = if i % 2 == 0 { 0.0 } else { 4.0 };
            shift + ((i * 3 + j * 5) % 7) as f64 / 7.0
        });
        let y = Array1::from_iter((0..n).map(|i| (i % 2) as f64));
        (x, y)
    }

    fn result(algorithm: &str, cv_mean: f64, cv_std: f64, test_score: f64) -> ModelResult {
        ModelResult {
            algorithm: algorithm.to_string(),
            family: ModelFamily::Tree,
            cv_scores: vec![cv_mean],
            cv_mean,
            cv_std,
            test_score,
            test_metrics: ModelMetrics::default(),
            training_time_secs: 0.0,
            hyperparameters: Hyperparameters::new(),
            feature_importance: None,
        }
    }

    #[test]
    fn test_only_survivor_wins() {
        let registry = AlgorithmRegistry::empty()
            .with(broken("a"))
            .with(broken("b"))
            .with(AlgorithmRegistry::builtin()
                .get(TaskKind::Classification, "decision_tree")
                .unwrap()
                .clone())
            .with(broken("c"));
        let (x, y) = separable(60);
        let (xt, yt) = separable(20);
        let names = vec!["f0".to_string(), "f1".to_string()];

        let trainer = ModelTrainer::new(&registry, TrainerSettings::default());
        let cv = trainer.cv_strategy(TaskKind::Classification, false);
        let outcome = trainer
            .train(
                TaskKind::Classification,
                Scoring::RocAuc,
                cv,
                TrainingData {
                    x_train: &x,
                    y_train: &y,
                    x_test: &xt,
                    y_test: &yt,
                    feature_names: &names,
                },
            )
            .unwrap();

        let result = outcome.result;
        assert_eq!(result.best_model.algorithm, "decision_tree");
        assert_eq!(result.ranked.len(), 1);
        assert_eq!(result.failed_candidates.len(), 3);
        assert_eq!(result.best_model.cv_scores.len(), 5);
        assert!(result.failed_candidates[0].reason.contains("boom"));
    }

    #[test]
    fn test_all_failing_is_fatal() {
        let registry = AlgorithmRegistry::empty().with(broken("a")).with(broken("b"));
        let (x, y) = separable(30);
        let trainer = ModelTrainer::new(&registry, TrainerSettings::default());
        let err = trainer
            .train(
                TaskKind::Classification,
                Scoring::Accuracy,
                CVStrategy::StratifiedKFold { n_splits: 3, shuffle: true },
                TrainingData {
                    x_train: &x,
                    y_train: &y,
                    x_test: &x,
                    y_test: &y,
                    feature_names: &[],
                },
            )
            .unwrap_err();
        assert!(matches!(err, AutoMLError::FatalTrainingError(_)));
    }

    #[test]
    fn test_resolve_rejects_unknown_ids_up_front() {
        let registry = AlgorithmRegistry::empty().with(broken("a"));
        let settings = TrainerSettings {
            algorithms: Some(vec!["a".into(), "svm".into()]),
            ..TrainerSettings::default()
        };
        let trainer = ModelTrainer::new(&registry, settings);
        let err = trainer.resolve(TaskKind::Classification).unwrap_err();
        assert!(matches!(err, AutoMLError::ConfigurationError(ref m) if m.contains("svm")));

        let (x, y) = separable(30);
        let err = trainer
            .train_candidates(
                &[],
                TaskKind::Classification,
                Scoring::Accuracy,
                CVStrategy::StratifiedKFold { n_splits: 3, shuffle: true },
                TrainingData {
                    x_train: &x,
                    y_train: &y,
                    x_test: &x,
                    y_test: &y,
                    feature_names: &[],
                },
            )
            .unwrap_err();
        assert!(matches!(err, AutoMLError::ConfigurationError(_)));
    }

    #[test]
    fn test_regression_candidates_ranked() {
        let x = Array2::from_shape_fn((80, 2), |(i, j)| {
            if j == 0 { i as f64 * 0.5 } else { ((i * 7) % 13) as f64 }
        });
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        let names = vec!["a".to_string(), "b".to_string()];
        let registry = AlgorithmRegistry::default();
        let trainer = ModelTrainer::new(&registry, TrainerSettings::default());
        let outcome = trainer
            .train(
                TaskKind::Regression,
                Scoring::R2,
                trainer.cv_strategy(TaskKind::Regression, false),
                TrainingData {
                    x_train: &x,
                    y_train: &y,
                    x_test: &x,
                    y_test: &y,
                    feature_names: &names,
                },
            )
            .unwrap();

        let ranked = &outcome.result.ranked;
        assert_eq!(ranked.len(), 4);
        for pair in ranked.windows(2) {
            assert!(pair[0].cv_mean >= pair[1].cv_mean);
        }
        assert_eq!(outcome.result.best_model.algorithm, "linear_regression");
        assert_eq!(outcome.result.confidence_level, ConfidenceLevel::High);
        let top = outcome.result.best_model.top_features(1);
        assert_eq!(top[0].0, "a");
    }

    #[test]
    fn test_confidence_rules() {
        let best = result("a", 0.9, 0.01, 0.9);
        assert_eq!(confidence_level(&best, &[best.clone()]), ConfidenceLevel::High);

        let best = result("a", 0.8, 0.08, 0.8);
        let worst = result("b", 0.7, 0.01, 0.7);
        assert_eq!(
            confidence_level(&best, &[best.clone(), worst]),
            ConfidenceLevel::Medium
        );
        assert_eq!(confidence_level(&best, &[best.clone()]), ConfidenceLevel::Low);
    }

    #[test]
    fn test_settings_validation() {
        let settings = TrainerSettings {
            cv_folds: 1,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(AutoMLError::ConfigurationError(_))
        ));
        assert_eq!(default_scoring(TaskKind::Classification, 2), Scoring::RocAuc);
        assert_eq!(default_scoring(TaskKind::Classification, 3), Scoring::Accuracy);
    }
}
