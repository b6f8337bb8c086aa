//! automl-engine: deterministic AutoML orchestration for tabular data
//!
//! A run takes a [`table::Table`] through:
//! - [`profiling`] - per-column statistics, semantic types and quality scores
//! - [`intelligence`] - column roles and the problem type
//! - [`pipeline`] - preprocessing strategy and the fitted transform
//! - [`training`] - candidate models, cross-validation and ranking
//! - [`decision`] - a hash-chained log of every automated choice
//!
//! [`engine::AutoMLEngine`] wires the stages together. [`ingest`] reads CSV
//! files and [`persistence`] stores the run artifacts; the core never does
//! I/O on its own.

pub mod error;

// Data
pub mod patterns;
pub mod table;

// Stages
pub mod profiling;
pub mod intelligence;
pub mod pipeline;
pub mod training;
pub mod decision;

// Orchestration
pub mod config;
pub mod engine;

// Collaborators
pub mod ingest;
pub mod persistence;

// Services
pub mod cli;

pub use error::{AutoMLError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::AutoMLConfig;
    pub use crate::decision::{DecisionEntry, DecisionLog, DecisionType, IntegrityReport, RunSummary};
    pub use crate::engine::{AutoMLEngine, ProgressSink, RunOutput, RunStage, TrainedModel};
    pub use crate::error::{AutoMLError, Result};
    pub use crate::ingest::{CsvIngestor, FileMetadata};
    pub use crate::intelligence::{
        ColumnOverrides, IntelligenceClassifier, IntelligenceResult, ProblemType, RoleAssignment,
    };
    pub use crate::persistence::{ArtifactStore, DirectoryArtifactStore, InMemoryArtifactStore};
    pub use crate::pipeline::{FittedTransform, PipelineConfig, PipelineSelector, StrategyTier};
    pub use crate::profiling::{
        profile_dataset, ColumnProfile, DatasetProfile, ProfilingThresholds, QualityIssue,
        SemanticType,
    };
    pub use crate::table::{Column, Table, Value};
    pub use crate::training::{
        AlgorithmRegistry, AlgorithmSpec, AutoMLResult, ConfidenceLevel, Hyperparameters, Model,
        ModelFamily, ModelResult, TaskKind,
    };
}
