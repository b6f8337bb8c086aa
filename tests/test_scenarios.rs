//! Integration test: end-to-end acceptance scenarios

mod common;

use automl_engine::prelude::*;
use automl_engine::training::ModelMetrics;
use ndarray::{Array1, Array2};

fn quick_config() -> AutoMLConfig {
    AutoMLConfig::new()
        .with_cv_folds(3)
        .with_algorithms(["decision_tree", "logistic_regression"])
}

#[test]
fn test_binary_churn_target_is_inferred() {
    let table = common::churn_table(500);
    let profile = profile_dataset(&table, &ProfilingThresholds::default());
    let intel = IntelligenceClassifier::new().analyze(&profile);

    assert_eq!(intel.roles.target.as_deref(), Some("churn"));
    assert_eq!(intel.problem_type, ProblemType::BinaryClassification);
    assert!(intel.confidence >= 0.9, "confidence {}", intel.confidence);
    assert_eq!(intel.roles.features.len(), 8);

    let output = AutoMLEngine::new(quick_config()).run(&table).unwrap();
    assert_eq!(output.result.task, TaskKind::Classification);
    assert_eq!(output.model.class_labels(), ["0", "1"]);
}

#[test]
fn test_constant_columns_score_zero() {
    let n = 40;
    let table = Table::new(vec![
        Column::numeric("a", vec![3.0; n]),
        Column::text("b", &vec!["same"; n]),
        Column::boolean("c", vec![true; n]),
    ])
    .unwrap();
    let profile = profile_dataset(&table, &ProfilingThresholds::default());

    for column in profile.ordered() {
        assert_eq!(column.quality_score, 0.0, "column {}", column.name);
        assert!(column.has_issue(QualityIssue::ConstantColumn));
    }
    assert_eq!(profile.overall_quality_score, 0.0);
}

#[test]
fn test_five_rows_is_too_small() {
    let table = common::churn_table(5);
    let err = AutoMLEngine::default().run(&table).unwrap_err();
    match err {
        AutoMLError::ValidationError(message) => assert!(message.contains("dataset too small")),
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[test]
fn test_numeric_target_with_many_values_is_regression() {
    let table = common::regression_table(1000);
    let profile = profile_dataset(&table, &ProfilingThresholds::default());
    assert_eq!(profile.column("target").unwrap().unique_count, 200);

    let intel = IntelligenceClassifier::new().analyze(&profile);
    assert_eq!(intel.problem_type, ProblemType::Regression);

    let config = AutoMLConfig::new()
        .with_cv_folds(3)
        .with_algorithms(["linear_regression", "decision_tree"]);
    let output = AutoMLEngine::new(config).run(&table).unwrap();
    assert_eq!(output.result.task, TaskKind::Regression);
    assert!(output.result.best_model.test_metrics.r2.is_some());
}

#[derive(Debug)]
struct FailsToFit;

impl Model for FailsToFit {
    fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
        Err(AutoMLError::ComputationError("solver diverged".to_string()))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(Array1::zeros(x.nrows()))
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
}

fn failing(id: &str) -> AlgorithmSpec {
    AlgorithmSpec::new(
        id,
        TaskKind::Classification,
        ModelFamily::Other,
        Hyperparameters::new(),
        |_, _| Ok(Box::new(FailsToFit)),
    )
}

#[test]
fn test_sole_surviving_candidate_wins() {
    let survivor = AlgorithmRegistry::builtin()
        .get(TaskKind::Classification, "decision_tree")
        .unwrap()
        .clone();
    let registry = AlgorithmRegistry::empty()
        .with(failing("unstable_a"))
        .with(failing("unstable_b"))
        .with(survivor)
        .with(failing("unstable_c"));

    let table = common::customer_table(120);
    let output = AutoMLEngine::new(AutoMLConfig::new().with_cv_folds(3))
        .with_registry(registry)
        .run(&table)
        .unwrap();

    assert_eq!(output.result.best_model.algorithm, "decision_tree");
    assert_eq!(output.result.ranked.len(), 1);
    assert_eq!(output.result.failed_candidates.len(), 3);
    assert!(output
        .result
        .failed_candidates
        .iter()
        .all(|f| f.reason.contains("solver diverged")));
    assert_eq!(output.decision_log.entries_of(DecisionType::CandidateDropped).count(), 3);
    assert_ne!(output.result.best_model.test_metrics, ModelMetrics::default());
}

#[test]
fn test_identical_runs_make_identical_choices() {
    let table = common::customer_table(200);
    let engine = AutoMLEngine::new(AutoMLConfig::new().with_random_seed(7));

    let first = engine.run(&table).unwrap();
    let second = engine.run(&table).unwrap();

    assert_eq!(
        first.decision_log.chosen_options(),
        second.decision_log.chosen_options()
    );
    let ranking = |o: &RunOutput| -> Vec<String> {
        o.result.ranked.iter().map(|r| r.algorithm.clone()).collect()
    };
    assert_eq!(ranking(&first), ranking(&second));
    assert_eq!(
        first.result.best_model.cv_scores,
        second.result.best_model.cv_scores
    );
    assert_ne!(first.decision_log.model_id(), second.decision_log.model_id());
}
