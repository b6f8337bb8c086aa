//! Integration test: pipeline selection and the fitted transform on engine runs

mod common;

use automl_engine::pipeline::{EncodingMethod, PipelineRules};
use automl_engine::prelude::*;

#[test]
fn test_transform_width_matches_on_new_rows() {
    let table = common::customer_table(160);
    let config = AutoMLConfig::new()
        .with_cv_folds(3)
        .with_algorithms(["decision_tree"]);
    let output = AutoMLEngine::new(config).run(&table).unwrap();

    let holdout = table.select_rows(&(100..160).collect::<Vec<_>>()).unwrap();
    let names = output.model.feature_names().to_vec();
    assert!(!names.iter().any(|n| n == "customer_id"));
    assert_eq!(output.pipeline.strategy, StrategyTier::Standard);
    assert!(names.iter().any(|n| n == "plan_pro"));

    let predictions = output.model.predict(&holdout).unwrap();
    assert_eq!(predictions.len(), 60);
    assert_eq!(output.model.feature_names(), names.as_slice());
}

#[test]
fn test_identifier_is_excluded_and_steps_are_recorded() {
    let table = common::customer_table(160);
    let output = AutoMLEngine::new(AutoMLConfig::new().with_cv_folds(3).with_algorithms(["decision_tree"]))
        .run(&table)
        .unwrap();

    assert_eq!(output.intelligence.roles.identifiers, vec!["customer_id"]);
    assert!(output.pipeline.categorical_columns.contains(&"plan".to_string()));
    assert!(!output.pipeline.steps.is_empty());
    assert_eq!(
        output.decision_log.summary().preprocessing_steps,
        output.pipeline.steps
    );
    assert!(output.decision_log.verify_integrity().valid);
}

#[test]
fn test_high_cardinality_switches_to_target_encoding() {
    let n = 200;
    let cities: Vec<String> = (0..n).map(|i| format!("city_{}", i % 25)).collect();
    let table = Table::new(vec![
        Column::text("city", &cities),
        Column::numeric("income", (0..n).map(|i| 20.0 + (i % 60) as f64).collect()),
        Column::numeric("balance", common::skewed(n)),
        Column::text(
            "default_flag_label",
            &(0..n).map(|i| if i % 25 < 8 { "yes" } else { "no" }).collect::<Vec<_>>(),
        ),
    ])
    .unwrap();
    let output = AutoMLEngine::new(AutoMLConfig::new().with_cv_folds(3).with_algorithms(["decision_tree"]))
        .run(&table)
        .unwrap();

    assert_eq!(output.pipeline.encoding, EncodingMethod::Target);
    assert!(output
        .pipeline
        .customizations
        .iter()
        .any(|c| c.setting == "encoding"));
    assert_eq!(output.pipeline.strategy, StrategyTier::Standard);
    assert_eq!(output.model.feature_names(), ["income", "balance", "city"]);
}

#[test]
fn test_custom_rules_flow_into_the_pipeline() {
    let rules = PipelineRules {
        target_encoding_min_unique: 1000,
        ..PipelineRules::default()
    };
    let table = common::customer_table(120);
    let config = AutoMLConfig::new()
        .with_cv_folds(3)
        .with_algorithms(["decision_tree"])
        .with_pipeline_rules(rules.clone());
    let output = AutoMLEngine::new(config).run(&table).unwrap();
    assert_eq!(output.pipeline.rules, rules);
}

#[test]
fn test_explicit_features_restrict_the_matrix() {
    let table = common::customer_table(160);
    let config = AutoMLConfig::new()
        .with_cv_folds(3)
        .with_algorithms(["decision_tree"])
        .with_target("renewal_label")
        .with_features(["age", "plan", "age"]);
    let output = AutoMLEngine::new(config).run(&table).unwrap();

    let roles = &output.intelligence.roles;
    assert_eq!(roles.features, vec!["age", "plan"]);
    assert!(roles.ignore.contains(&"monthly_spend".to_string()));
    assert!(roles.ignore.contains(&"support_tickets".to_string()));
    assert_eq!(roles.all_columns().len(), table.n_cols());
    assert!(output
        .model
        .feature_names()
        .iter()
        .all(|n| n == "age" || n.starts_with("plan")));
}

#[test]
fn test_features_without_target_keep_the_named_target() {
    let table = common::customer_table(160);
    let config = AutoMLConfig::new()
        .with_cv_folds(3)
        .with_algorithms(["decision_tree"])
        .with_features(["age", "monthly_spend"]);
    let output = AutoMLEngine::new(config).run(&table).unwrap();

    let roles = &output.intelligence.roles;
    assert_eq!(roles.target.as_deref(), Some("renewal_label"));
    assert_eq!(roles.features, vec!["age", "monthly_spend"]);
}

#[test]
fn test_unknown_algorithm_stops_before_the_pipeline_stage() {
    let table = common::churn_table(300);
    let stages = parking_lot::Mutex::new(Vec::new());
    let sink = |stage: RunStage, _: f64| -> Result<()> {
        stages.lock().push(stage);
        Ok(())
    };
    let engine = AutoMLEngine::new(AutoMLConfig::new().with_algorithms(["decision_tree", "svm"]));
    let err = engine.run_with_progress(&table, &sink).unwrap_err();

    assert!(matches!(err, AutoMLError::ConfigurationError(_)));
    let stages = stages.into_inner();
    assert!(!stages.contains(&RunStage::Pipeline));
    assert!(!stages.contains(&RunStage::Training));
}

#[test]
fn test_model_with_empty_numeric_columns_reloads() {
    let n = 160;
    let mut columns = common::customer_table(n).columns().to_vec();
    columns.push(Column::numeric_opt("blank", vec![None; n]));
    columns.push(Column::numeric_opt(
        "sparse_score",
        (0..n).map(|i| if i % 25 == 3 { Some(i as f64) } else { None }).collect(),
    ));
    let table = Table::new(columns).unwrap();
    let config = AutoMLConfig::new()
        .with_cv_folds(3)
        .with_algorithms(["decision_tree"])
        .with_target("renewal_label")
        .with_features(["age", "plan", "monthly_spend", "blank", "sparse_score"]);
    let engine = AutoMLEngine::new(config);
    let output = engine.run(&table).unwrap();
    assert!(output.pipeline.outlier_clipping);

    let json = output.model.to_json().unwrap();
    let restored = TrainedModel::from_json(&json, engine.registry()).unwrap();
    assert_eq!(restored.feature_names(), output.model.feature_names());
    assert_eq!(
        restored.predict(&table).unwrap(),
        output.model.predict(&table).unwrap()
    );
}
