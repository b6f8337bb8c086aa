//! Candidate algorithm registry
//!
//! Maps `(task, identifier)` to a constructor, its default hyperparameters
//! and a loader that restores a fitted model from its JSON state. The
//! registry order is the evaluation order, which also breaks score ties.

use super::decision_tree::DecisionTree;
use super::gradient_boosting::{
    GradientBoostingClassifier, GradientBoostingConfig, GradientBoostingRegressor,
};
use super::linear_models::{LinearRegression, LogisticRegression};
use super::models::{Hyperparameters, Model, ModelFamily};
use super::random_forest::{MaxFeatures, RandomForest};
use super::TaskKind;
use crate::error::{AutoMLError, Result};
use std::fmt;
use std::sync::Arc;

/// Builds an unfitted model from hyperparameters and a seed
pub type ModelFactory = Arc<dyn Fn(&Hyperparameters, u64) -> Result<Box<dyn Model>> + Send + Sync>;

/// Restores a fitted model from `Model::to_json` output
pub type ModelLoader = Arc<dyn Fn(serde_json::Value) -> Result<Box<dyn Model>> + Send + Sync>;

/// One registered candidate
#[derive(Clone)]
pub struct AlgorithmSpec {
    pub id: String,
    pub task: TaskKind,
    pub family: ModelFamily,
    pub defaults: Hyperparameters,
    factory: ModelFactory,
    loader: Option<ModelLoader>,
}

impl fmt::Debug for AlgorithmSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmSpec")
            .field("id", &self.id)
            .field("task", &self.task)
            .field("family", &self.family)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl AlgorithmSpec {
    pub fn new<F>(id: &str, task: TaskKind, family: ModelFamily, defaults: Hyperparameters, factory: F) -> Self
    where
        F: Fn(&Hyperparameters, u64) -> Result<Box<dyn Model>> + Send + Sync + 'static,
    {
        Self {
            id: id.to_string(),
            task,
            family,
            defaults,
            factory: Arc::new(factory),
            loader: None,
        }
    }

    pub fn with_loader<L>(mut self, loader: L) -> Self
    where
        L: Fn(serde_json::Value) -> Result<Box<dyn Model>> + Send + Sync + 'static,
    {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Defaults overlaid with `overrides`
    pub fn params(&self, overrides: Option<&Hyperparameters>) -> Hyperparameters {
        match overrides {
            Some(o) => self.defaults.merged(o),
            None => self.defaults.clone(),
        }
    }

    pub fn build(&self, params: &Hyperparameters, seed: u64) -> Result<Box<dyn Model>> {
        (self.factory)(params, seed)
    }

    pub fn load(&self, state: serde_json::Value) -> Result<Box<dyn Model>> {
        match &self.loader {
            Some(loader) => loader(state),
            None => Err(AutoMLError::ConfigurationError(format!(
                "algorithm '{}' cannot be restored from saved state",
                self.id
            ))),
        }
    }
}

/// Ordered set of candidate algorithms
#[derive(Debug, Clone)]
pub struct AlgorithmRegistry {
    specs: Vec<AlgorithmSpec>,
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AlgorithmRegistry {
    /// Registry with no candidates
    pub fn empty() -> Self {
        Self { specs: Vec::new() }
    }

    /// The four built-in candidates per task
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(logistic_regression());
        registry.register(random_forest(TaskKind::Classification));
        registry.register(gradient_boosting(TaskKind::Classification));
        registry.register(decision_tree(TaskKind::Classification));
        registry.register(linear_regression());
        registry.register(random_forest(TaskKind::Regression));
        registry.register(gradient_boosting(TaskKind::Regression));
        registry.register(decision_tree(TaskKind::Regression));
        registry
    }

    /// Add a candidate; an existing `(task, id)` entry is replaced in place
    pub fn register(&mut self, spec: AlgorithmSpec) {
        match self
            .specs
            .iter_mut()
            .find(|s| s.task == spec.task && s.id == spec.id)
        {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
    }

    pub fn with(mut self, spec: AlgorithmSpec) -> Self {
        self.register(spec);
        self
    }

    pub fn get(&self, task: TaskKind, id: &str) -> Option<&AlgorithmSpec> {
        self.specs.iter().find(|s| s.task == task && s.id == id)
    }

    /// Candidates for a task in registration order
    pub fn candidates(&self, task: TaskKind) -> Vec<&AlgorithmSpec> {
        self.specs.iter().filter(|s| s.task == task).collect()
    }

    /// Resolve an optional identifier list; unknown identifiers are a
    /// configuration error
    pub fn resolve(&self, task: TaskKind, ids: Option<&[String]>) -> Result<Vec<&AlgorithmSpec>> {
        let resolved = match ids {
            None => self.candidates(task),
            Some(ids) => ids
                .iter()
                .map(|id| {
                    self.get(task, id).ok_or_else(|| {
                        AutoMLError::ConfigurationError(format!(
                            "unknown {} algorithm '{}'",
                            task, id
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };
        if resolved.is_empty() {
            return Err(AutoMLError::ConfigurationError(format!(
                "no {} algorithms configured",
                task
            )));
        }
        Ok(resolved)
    }
}

fn restore<M>(state: serde_json::Value) -> Result<Box<dyn Model>>
where
    M: Model + serde::de::DeserializeOwned + 'static,
{
    Ok(Box::new(serde_json::from_value::<M>(state)?))
}

fn max_features(params: &Hyperparameters, default: MaxFeatures) -> Result<MaxFeatures> {
    match params.get("max_features") {
        None => Ok(default),
        Some(v) => MaxFeatures::from_json(v).ok_or_else(|| AutoMLError::InvalidParameter {
            name: "max_features".to_string(),
            value: v.to_string(),
            reason: "expected sqrt, log2, all, an integer or a fraction".to_string(),
        }),
    }
}

fn logistic_regression() -> AlgorithmSpec {
    let defaults = Hyperparameters::new()
        .with("alpha", 0.01)
        .with("learning_rate", 0.1)
        .with("max_iter", 1000);
    AlgorithmSpec::new(
        "logistic_regression",
        TaskKind::Classification,
        ModelFamily::Linear,
        defaults,
        |p, _seed| {
            Ok(Box::new(
                LogisticRegression::new()
                    .with_alpha(p.f64_or("alpha", 0.01)?)
                    .with_learning_rate(p.f64_or("learning_rate", 0.1)?)
                    .with_max_iter(p.usize_or("max_iter", 1000)?),
            ))
        },
    )
    .with_loader(restore::<LogisticRegression>)
}

fn linear_regression() -> AlgorithmSpec {
    let defaults = Hyperparameters::new()
        .with("alpha", 0.0)
        .with("fit_intercept", true);
    AlgorithmSpec::new(
        "linear_regression",
        TaskKind::Regression,
        ModelFamily::Linear,
        defaults,
        |p, _seed| {
            let fit_intercept = p
                .get("fit_intercept")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(true);
            Ok(Box::new(
                LinearRegression::new()
                    .with_alpha(p.f64_or("alpha", 0.0)?)
                    .with_fit_intercept(fit_intercept),
            ))
        },
    )
    .with_loader(restore::<LinearRegression>)
}

fn random_forest(task: TaskKind) -> AlgorithmSpec {
    let default_features = match task {
        TaskKind::Classification => MaxFeatures::Sqrt,
        TaskKind::Regression => MaxFeatures::All,
    };
    let defaults = Hyperparameters::new()
        .with("n_estimators", 50)
        .with("max_depth", 12)
        .with("min_samples_split", 2)
        .with("min_samples_leaf", 1);
    AlgorithmSpec::new(
        "random_forest",
        task,
        ModelFamily::Tree,
        defaults,
        move |p, seed| {
            let n_estimators = p.usize_or("n_estimators", 50)?;
            let base = match task {
                TaskKind::Classification => RandomForest::new_classifier(n_estimators),
                TaskKind::Regression => RandomForest::new_regressor(n_estimators),
            };
            Ok(Box::new(
                base.with_max_depth(p.opt_usize("max_depth")?)
                    .with_min_samples_split(p.usize_or("min_samples_split", 2)?)
                    .with_min_samples_leaf(p.usize_or("min_samples_leaf", 1)?)
                    .with_max_features(max_features(p, default_features)?)
                    .with_random_state(seed),
            ))
        },
    )
    .with_loader(restore::<RandomForest>)
}

fn gradient_boosting(task: TaskKind) -> AlgorithmSpec {
    let d = GradientBoostingConfig::default();
    let defaults = Hyperparameters::new()
        .with("n_estimators", d.n_estimators)
        .with("learning_rate", d.learning_rate)
        .with("max_depth", d.max_depth)
        .with("subsample", d.subsample);
    let spec = AlgorithmSpec::new(
        "gradient_boosting",
        task,
        ModelFamily::Tree,
        defaults,
        move |p, seed| {
            let d = GradientBoostingConfig::default();
            let config = GradientBoostingConfig {
                n_estimators: p.usize_or("n_estimators", d.n_estimators)?,
                learning_rate: p.f64_or("learning_rate", d.learning_rate)?,
                max_depth: p.usize_or("max_depth", d.max_depth)?,
                min_samples_leaf: p.usize_or("min_samples_leaf", d.min_samples_leaf)?,
                subsample: p.f64_or("subsample", d.subsample)?,
                colsample_bytree: p.f64_or("colsample_bytree", d.colsample_bytree)?,
                random_state: seed,
            };
            let model: Box<dyn Model> = match task {
                TaskKind::Classification => Box::new(GradientBoostingClassifier::new(config)),
                TaskKind::Regression => Box::new(GradientBoostingRegressor::new(config)),
            };
            Ok(model)
        },
    );
    match task {
        TaskKind::Classification => spec.with_loader(restore::<GradientBoostingClassifier>),
        TaskKind::Regression => spec.with_loader(restore::<GradientBoostingRegressor>),
    }
}

fn decision_tree(task: TaskKind) -> AlgorithmSpec {
    let defaults = Hyperparameters::new()
        .with("max_depth", 10)
        .with("min_samples_split", 2)
        .with("min_samples_leaf", 1);
    AlgorithmSpec::new(
        "decision_tree",
        task,
        ModelFamily::Tree,
        defaults,
        move |p, seed| {
            let base = match task {
                TaskKind::Classification => DecisionTree::new_classifier(),
                TaskKind::Regression => DecisionTree::new_regressor(),
            };
            Ok(Box::new(
                base.with_max_depth(p.opt_usize("max_depth")?)
                    .with_min_samples_split(p.usize_or("min_samples_split", 2)?)
                    .with_min_samples_leaf(p.usize_or("min_samples_leaf", 1)?)
                    .with_random_state(seed),
            ))
        },
    )
    .with_loader(restore::<DecisionTree>)
}
