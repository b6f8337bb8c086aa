//! End-to-end run orchestration
//!
//! A run is synchronous and touches no files: the table goes through
//! profiling, role and problem-type inference, pipeline selection,
//! candidate training and decision recording, and comes back as a
//! [`RunOutput`]. Persisting that output is a separate step through an
//! [`ArtifactStore`].

use crate::config::AutoMLConfig;
use crate::decision::{DecisionContext, DecisionLog, DecisionRecorder};
use crate::error::{AutoMLError, Result};
use crate::intelligence::{IntelligenceClassifier, IntelligenceResult, ProblemType};
use crate::persistence::ArtifactStore;
use crate::pipeline::{FittedTransform, PipelineConfig, PipelineSelector};
use crate::profiling::{parse_date, profile_dataset, DatasetProfile};
use crate::table::{Table, Value};
use crate::training::{
    default_scoring, train_test_split, AlgorithmRegistry, AutoMLResult, Model, ModelTrainer,
    TaskKind, TrainingData,
};
use chrono::Datelike;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Coarse run stages reported to a [`ProgressSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Profiling,
    Analysis,
    Pipeline,
    Training,
    Recording,
    Complete,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Profiling => "profiling",
            RunStage::Analysis => "analysis",
            RunStage::Pipeline => "pipeline",
            RunStage::Training => "training",
            RunStage::Recording => "recording",
            RunStage::Complete => "complete",
        }
    }

    /// Percent done when the stage starts
    pub fn percent(&self) -> f64 {
        match self {
            RunStage::Profiling => 0.0,
            RunStage::Analysis => 15.0,
            RunStage::Pipeline => 30.0,
            RunStage::Training => 45.0,
            RunStage::Recording => 90.0,
            RunStage::Complete => 100.0,
        }
    }
}

/// Receives stage updates; a failing sink never aborts the run
pub trait ProgressSink: Send + Sync {
    fn report(&self, stage: RunStage, percent: f64) -> Result<()>;
}

impl<F> ProgressSink for F
where
    F: Fn(RunStage, f64) -> Result<()> + Send + Sync,
{
    fn report(&self, stage: RunStage, percent: f64) -> Result<()> {
        self(stage, percent)
    }
}

/// Everything a run produces
#[derive(Debug)]
pub struct RunOutput {
    pub profile: DatasetProfile,
    pub intelligence: IntelligenceResult,
    pub pipeline: PipelineConfig,
    pub result: AutoMLResult,
    pub decision_log: DecisionLog,
    pub model: TrainedModel,
}

/// The fitted transform and winning model, ready to predict on new tables
#[derive(Debug)]
pub struct TrainedModel {
    transform: FittedTransform,
    model: Box<dyn Model>,
    algorithm: String,
    task: TaskKind,
    /// Class label for each encoded index; empty for regression
    class_labels: Vec<String>,
    /// The label of each class as the target column held it
    class_values: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
struct SavedModel {
    algorithm: String,
    task: TaskKind,
    class_labels: Vec<String>,
    #[serde(default)]
    class_values: Vec<Value>,
    transform: FittedTransform,
    state: serde_json::Value,
}

impl TrainedModel {
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    /// Class labels in the target's own value kind
    pub fn class_values(&self) -> &[Value] {
        &self.class_values
    }

    pub fn feature_names(&self) -> &[String] {
        self.transform.feature_names()
    }

    /// Raw model output; classification labels stay index-encoded
    pub fn predict_encoded(&self, table: &Table) -> Result<Array1<f64>> {
        let x = self.transform.transform(table)?;
        self.model.predict(&x)
    }

    /// Predictions in the target's own terms: class labels of the target's
    /// value kind, or numbers
    pub fn predict(&self, table: &Table) -> Result<Vec<Value>> {
        let raw = self.predict_encoded(table)?;
        Ok(match self.task {
            TaskKind::Regression => raw.iter().map(|&v| Value::Number(v)).collect(),
            TaskKind::Classification => raw
                .iter()
                .map(|&v| {
                    let max = self.class_labels.len().saturating_sub(1);
                    let idx = (v.round().max(0.0) as usize).min(max);
                    match self.class_values.get(idx) {
                        Some(value) => value.clone(),
                        None => self
                            .class_labels
                            .get(idx)
                            .map_or(Value::Missing, |label| Value::Text(label.clone())),
                    }
                })
                .collect(),
        })
    }

    pub fn predict_proba(&self, table: &Table) -> Result<Option<Array2<f64>>> {
        let x = self.transform.transform(table)?;
        self.model.predict_proba(&x)
    }

    pub fn to_json(&self) -> Result<String> {
        let saved = SavedModel {
            algorithm: self.algorithm.clone(),
            task: self.task,
            class_labels: self.class_labels.clone(),
            class_values: self.class_values.clone(),
            transform: self.transform.clone(),
            state: self.model.to_json()?,
        };
        Ok(serde_json::to_string_pretty(&saved)?)
    }

    /// Restore with the loader the registry holds for the algorithm
    pub fn from_json(json: &str, registry: &AlgorithmRegistry) -> Result<Self> {
        let saved: SavedModel = serde_json::from_str(json)?;
        let spec = registry.get(saved.task, &saved.algorithm).ok_or_else(|| {
            AutoMLError::ConfigurationError(format!(
                "unknown algorithm '{}' for {}",
                saved.algorithm, saved.task
            ))
        })?;
        Ok(Self {
            model: spec.load(saved.state)?,
            transform: saved.transform,
            algorithm: saved.algorithm,
            task: saved.task,
            class_labels: saved.class_labels,
            class_values: saved.class_values,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>, registry: &AlgorithmRegistry) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json, registry)
    }
}

/// Target values of the rows that have one
struct EncodedTarget {
    rows: Vec<usize>,
    y: Array1<f64>,
    class_labels: Vec<String>,
    class_values: Vec<Value>,
}

impl EncodedTarget {
    fn class_counts(&self, positions: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.class_labels.len()];
        for &p in positions {
            if let Some(c) = counts.get_mut(self.y[p] as usize) {
                *c += 1;
            }
        }
        counts
    }
}

/// Runs the full pipeline with one configuration and one algorithm registry
#[derive(Debug, Clone)]
pub struct AutoMLEngine {
    config: AutoMLConfig,
    registry: AlgorithmRegistry,
}

impl Default for AutoMLEngine {
    fn default() -> Self {
        Self::new(AutoMLConfig::default())
    }
}

impl AutoMLEngine {
    pub fn new(config: AutoMLConfig) -> Self {
        Self {
            config,
            registry: AlgorithmRegistry::builtin(),
        }
    }

    pub fn with_registry(mut self, registry: AlgorithmRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &AutoMLConfig {
        &self.config
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    pub fn run(&self, table: &Table) -> Result<RunOutput> {
        self.run_with_progress(table, &|_: RunStage, _: f64| -> Result<()> { Ok(()) })
    }

    pub fn run_with_progress(&self, table: &Table, progress: &dyn ProgressSink) -> Result<RunOutput> {
        let start = Instant::now();
        let config = &self.config;
        config.validate()?;

        if table.n_rows() < config.min_rows {
            return Err(AutoMLError::ValidationError(format!(
                "dataset too small: {} rows, at least {} required",
                table.n_rows(),
                config.min_rows
            )));
        }
        if table.n_cols() < config.min_columns {
            return Err(AutoMLError::ValidationError(format!(
                "too few columns: {}, at least {} required",
                table.n_cols(),
                config.min_columns
            )));
        }

        notify(progress, RunStage::Profiling);
        let profile = profile_dataset(table, &config.profiling);

        notify(progress, RunStage::Analysis);
        let intelligence = IntelligenceClassifier::new()
            .with_rules(config.roles.clone())
            .with_class_thresholds(config.classes)
            .analyze_with_overrides(&profile, &config.overrides)?;
        let target = intelligence.roles.target.clone().ok_or_else(|| {
            AutoMLError::ValidationError("no target column could be identified".to_string())
        })?;
        let task = intelligence.task().ok_or_else(|| {
            AutoMLError::ValidationError(format!(
                "target '{}' has an unsupported type for {}",
                target, intelligence.problem_type
            ))
        })?;
        let problem_type = intelligence.problem_type;

        // unknown algorithm identifiers fail before anything is fitted
        let trainer = ModelTrainer::new(&self.registry, config.trainer.clone());
        let candidates = trainer.resolve(task)?;

        let mut recorder = DecisionRecorder::new();
        recorder.record_intelligence(&intelligence);

        let encoded = encode_target(table, &target, task)?;
        let time_ordered = problem_type == ProblemType::TimeSeries;
        let (train_pos, test_pos) = if time_ordered {
            let order = match intelligence.roles.timestamps.first() {
                Some(column) => time_order(table, column, &encoded.rows)?,
                None => (0..encoded.rows.len()).collect(),
            };
            chronological_split(&order, config.trainer.test_size)?
        } else {
            train_test_split(
                &encoded.y,
                config.trainer.test_size,
                task == TaskKind::Classification,
                config.random_seed(),
            )?
        };
        let train_rows: Vec<usize> = train_pos.iter().map(|&p| encoded.rows[p]).collect();
        let test_rows: Vec<usize> = test_pos.iter().map(|&p| encoded.rows[p]).collect();
        let y_train = Array1::from_iter(train_pos.iter().map(|&p| encoded.y[p]));
        let y_test = Array1::from_iter(test_pos.iter().map(|&p| encoded.y[p]));
        debug!(train = train_rows.len(), test = test_rows.len(), time_ordered, "Hold-out split");

        notify(progress, RunStage::Pipeline);
        let pipeline = PipelineSelector::new()
            .with_rules(config.pipeline.clone())
            .select(problem_type, &intelligence.roles, &profile);
        recorder.record_pipeline(&pipeline);

        let transform = FittedTransform::fit(&pipeline, table, &train_rows, &y_train, task)?;
        let x_train = transform.transform_rows(table, &train_rows)?;
        let x_test = transform.transform_rows(table, &test_rows)?;

        notify(progress, RunStage::Training);
        let scoring = default_scoring(task, encoded.class_labels.len());
        let cv = trainer.cv_strategy(task, time_ordered);
        let outcome = trainer.train_candidates(
            &candidates,
            task,
            scoring,
            cv,
            TrainingData {
                x_train: &x_train,
                y_train: &y_train,
                x_test: &x_test,
                y_test: &y_test,
                feature_names: transform.feature_names(),
            },
        )?;

        notify(progress, RunStage::Recording);
        recorder.record_training(&outcome.result, profile.n_rows, problem_type);
        let class_counts = encoded.class_counts(&train_pos);
        let dataset_hash = table.content_hash();
        let decision_log = recorder.finish(DecisionContext {
            profile: &profile,
            intelligence: &intelligence,
            pipeline: &pipeline,
            result: &outcome.result,
            settings: &config.trainer,
            feature_names: transform.feature_names(),
            class_counts: &class_counts,
            dataset_hash: &dataset_hash,
        });

        let model = TrainedModel {
            transform,
            model: outcome.best_model,
            algorithm: outcome.best_spec.id.clone(),
            task,
            class_labels: encoded.class_labels,
            class_values: encoded.class_values,
        };

        notify(progress, RunStage::Complete);
        info!(
            target_column = %target,
            problem_type = %problem_type,
            best = %model.algorithm,
            confidence = %outcome.result.confidence_level,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Run complete"
        );

        Ok(RunOutput {
            profile,
            intelligence,
            pipeline,
            result: outcome.result,
            decision_log,
            model,
        })
    }

    /// Write every record and the model; returns artifact name to location
    pub fn persist(
        &self,
        output: &RunOutput,
        store: &dyn ArtifactStore,
    ) -> Result<BTreeMap<String, String>> {
        let id = output.decision_log.model_id();
        let records = [
            ("profile", serde_json::to_value(&output.profile)?),
            ("intelligence", serde_json::to_value(&output.intelligence)?),
            ("pipeline", serde_json::to_value(&output.pipeline)?),
            ("result", serde_json::to_value(&output.result)?),
            ("decision_log", serde_json::to_value(&output.decision_log)?),
            ("config", serde_json::to_value(&self.config)?),
        ];

        let mut written = BTreeMap::new();
        for (name, record) in &records {
            let file = format!("{}.json", name);
            let location = store.save_record(&file, record)?;
            written.insert(file, location);
        }
        let location = store.save_artifact("model.json", output.model.to_json()?.as_bytes())?;
        written.insert("model.json".to_string(), location);

        info!(model_id = %id, artifacts = written.len(), "Run persisted");
        Ok(written)
    }
}

fn notify(progress: &dyn ProgressSink, stage: RunStage) {
    if let Err(e) = progress.report(stage, stage.percent()) {
        debug!(stage = stage.as_str(), error = %e, "Progress sink failed");
    }
}

/// Drop rows without a target; classes map to sorted-label indices
fn encode_target(table: &Table, target: &str, task: TaskKind) -> Result<EncodedTarget> {
    let values = table.require(target)?.values();

    let (rows, y, class_labels, class_values) = match task {
        TaskKind::Regression => {
            let (rows, y): (Vec<usize>, Vec<f64>) = values
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.as_f64().map(|y| (i, y)))
                .unzip();
            (rows, y, Vec::new(), Vec::new())
        }
        TaskKind::Classification => {
            let keyed: Vec<(usize, String)> = values
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.key().map(|k| (i, k)))
                .collect();
            // first value seen for each label, in label order
            let mut first_seen: BTreeMap<String, Value> = BTreeMap::new();
            for (i, key) in &keyed {
                first_seen.entry(key.clone()).or_insert_with(|| match &values[*i] {
                    Value::Text(_) => Value::Text(key.clone()),
                    other => other.clone(),
                });
            }
            let (labels, class_values): (Vec<String>, Vec<Value>) = first_seen.into_iter().unzip();
            if labels.len() < 2 {
                return Err(AutoMLError::ValidationError(format!(
                    "target '{}' needs at least two classes, found {}",
                    target,
                    labels.len()
                )));
            }
            let index: BTreeMap<&str, usize> = labels
                .iter()
                .enumerate()
                .map(|(i, l)| (l.as_str(), i))
                .collect();
            let y = keyed.iter().map(|(_, k)| index[k.as_str()] as f64).collect();
            let rows = keyed.iter().map(|(i, _)| *i).collect();
            (rows, y, labels, class_values)
        }
    };

    let dropped = values.len() - rows.len();
    if dropped > 0 {
        debug!(target_column = target, dropped, "Rows without a target value dropped");
    }
    if rows.len() < 2 {
        return Err(AutoMLError::ValidationError(format!(
            "target '{}' has fewer than two usable values",
            target
        )));
    }
    Ok(EncodedTarget {
        rows,
        y: Array1::from_vec(y),
        class_labels,
        class_values,
    })
}

/// Positions into `rows` ordered by the timestamp column. Rows without a
/// readable time keep their table order ahead of the dated ones.
fn time_order(table: &Table, column: &str, rows: &[usize]) -> Result<Vec<usize>> {
    let values = table.require(column)?.values();
    let mut order: Vec<(Option<f64>, usize)> = rows
        .iter()
        .enumerate()
        .map(|(pos, &row)| (values.get(row).and_then(time_key), pos))
        .collect();
    // stable, so equal times keep table order
    order.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    Ok(order.into_iter().map(|(_, pos)| pos).collect())
}

fn time_key(value: &Value) -> Option<f64> {
    match value {
        Value::Text(s) => match parse_date(s) {
            Some(date) => Some(f64::from(date.num_days_from_ce())),
            None => value.as_f64(),
        },
        other => other.as_f64(),
    }
}

/// The last `test_size` share of `order` is held out
fn chronological_split(order: &[usize], test_size: f64) -> Result<(Vec<usize>, Vec<usize>)> {
    let n = order.len();
    if n < 2 {
        return Err(AutoMLError::ValidationError(
            "need at least two rows to split".to_string(),
        ));
    }
    let n_test = ((n as f64 * test_size).round() as usize).clamp(1, n - 1);
    let (train, test) = order.split_at(n - n_test);
    Ok((train.to_vec(), test.to_vec()))
}
