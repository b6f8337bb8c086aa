//! Decision recording
//!
//! Every automated choice made during a run is appended to a
//! [`DecisionRecorder`] as a hash-chained [`DecisionEntry`]. Finishing the
//! recorder consumes it and yields a read-only [`DecisionLog`] whose chain
//! (and summary digest) can be checked with [`DecisionLog::verify_integrity`].

mod narrative;

pub use narrative::{assumptions, known_biases, limitations};

use crate::intelligence::{IntelligenceResult, ProblemType};
use crate::pipeline::PipelineConfig;
use crate::profiling::DatasetProfile;
use crate::training::{AutoMLResult, ConfidenceLevel, Hyperparameters, ModelFamily, TrainerSettings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Kind of automated decision point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    TargetSelection,
    ProblemType,
    PipelineStrategy,
    PipelineCustomization,
    AlgorithmSelection,
    ConfidenceAssessment,
    CandidateDropped,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::TargetSelection => "target_selection",
            DecisionType::ProblemType => "problem_type",
            DecisionType::PipelineStrategy => "pipeline_strategy",
            DecisionType::PipelineCustomization => "pipeline_customization",
            DecisionType::AlgorithmSelection => "algorithm_selection",
            DecisionType::ConfidenceAssessment => "confidence_assessment",
            DecisionType::CandidateDropped => "candidate_dropped",
        }
    }
}

/// A single recorded decision, linked to its predecessor by hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub sequence: u64,
    pub decision_type: DecisionType,
    pub chosen_option: String,
    pub alternatives: Vec<String>,
    pub reasoning: String,
    /// In [0, 1]
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub prev_hash: String,
    pub hash: String,
}

impl DecisionEntry {
    fn digest(&self) -> String {
        let alternatives = serde_json::to_string(&self.alternatives).unwrap_or_default();
        compute_hash(&format!(
            "{}|{}|{}|{}|{}|{}|{}|{}",
            self.sequence,
            self.prev_hash,
            self.timestamp.to_rfc3339(),
            self.decision_type.as_str(),
            self.chosen_option,
            alternatives,
            self.reasoning,
            self.confidence
        ))
    }
}

/// Seed, versions and data fingerprint needed to reproduce a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reproducibility {
    pub random_seed: u64,
    pub engine_version: String,
    pub components: BTreeMap<String, String>,
    /// SHA-256 of the input table contents
    pub dataset_hash: String,
}

impl Reproducibility {
    pub fn new(random_seed: u64, dataset_hash: impl Into<String>) -> Self {
        let components = [
            ("engine", env!("CARGO_PKG_VERSION")),
            ("target_os", std::env::consts::OS),
            ("target_arch", std::env::consts::ARCH),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            random_seed,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            components,
            dataset_hash: dataset_hash.into(),
        }
    }
}

/// Everything about the run that is not a decision point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub model_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub problem_type: ProblemType,
    pub target_column: Option<String>,
    pub target_rationale: Option<String>,
    pub feature_columns: Vec<String>,
    pub selected_algorithm: String,
    pub algorithm_rationale: String,
    pub alternatives_considered: Vec<String>,
    pub data_quality_score: f64,
    pub preprocessing_steps: Vec<String>,
    pub hyperparameters: Hyperparameters,
    pub training_config: TrainerSettings,
    pub validation_metrics: BTreeMap<String, f64>,
    pub training_time_secs: f64,
    pub assumptions: Vec<String>,
    pub limitations: Vec<String>,
    pub known_biases: Vec<String>,
    pub reproducibility: Reproducibility,
}

/// Inputs the finished log is summarised from
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub profile: &'a DatasetProfile,
    pub intelligence: &'a IntelligenceResult,
    pub pipeline: &'a PipelineConfig,
    pub result: &'a AutoMLResult,
    pub settings: &'a TrainerSettings,
    /// Transformed feature names fed to the models
    pub feature_names: &'a [String],
    /// Training-target class frequencies, empty for regression
    pub class_counts: &'a [usize],
    pub dataset_hash: &'a str,
}

/// Outcome of [`DecisionLog::verify_integrity`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub total_entries: usize,
    pub verified_entries: usize,
    pub first_invalid: Option<u64>,
    pub message: String,
}

/// Append-only recorder used while a run is in progress
#[derive(Debug, Default)]
pub struct DecisionRecorder {
    entries: Vec<DecisionEntry>,
}

impl DecisionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(
        &mut self,
        decision_type: DecisionType,
        chosen_option: impl Into<String>,
        alternatives: Vec<String>,
        reasoning: impl Into<String>,
        confidence: f64,
    ) -> &DecisionEntry {
        let prev_hash = self
            .entries
            .last()
            .map_or_else(|| GENESIS_HASH.to_string(), |e| e.hash.clone());

        let mut entry = DecisionEntry {
            sequence: self.entries.len() as u64,
            decision_type,
            chosen_option: chosen_option.into(),
            alternatives,
            reasoning: reasoning.into(),
            confidence: if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 },
            timestamp: Utc::now(),
            prev_hash,
            hash: String::new(),
        };
        entry.hash = entry.digest();

        debug!(
            decision = decision_type.as_str(),
            chosen = %entry.chosen_option,
            "Decision recorded"
        );
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Target choice and problem type
    pub fn record_intelligence(&mut self, intelligence: &IntelligenceResult) {
        let alternatives: Vec<String> = intelligence
            .target_candidates
            .iter()
            .filter(|c| intelligence.roles.target.as_deref() != Some(c.column.as_str()))
            .map(|c| c.column.clone())
            .collect();
        let target = intelligence.roles.target.clone().unwrap_or_else(|| "none".to_string());
        let rationale = intelligence
            .target_rationale
            .clone()
            .unwrap_or_else(|| "No column qualified as a target".to_string());
        self.record(
            DecisionType::TargetSelection,
            target,
            alternatives,
            rationale,
            intelligence.confidence,
        );

        let problem_alternatives = [
            ProblemType::BinaryClassification,
            ProblemType::MulticlassClassification,
            ProblemType::Regression,
            ProblemType::TimeSeries,
            ProblemType::TextAnalytics,
            ProblemType::Exploratory,
        ]
        .into_iter()
        .filter(|p| *p != intelligence.problem_type)
        .map(|p| p.as_str().to_string())
        .collect();
        self.record(
            DecisionType::ProblemType,
            intelligence.problem_type.as_str(),
            problem_alternatives,
            intelligence.reasoning.join("; "),
            intelligence.confidence,
        );
    }

    /// Strategy tier and each customization applied on top of it
    pub fn record_pipeline(&mut self, pipeline: &PipelineConfig) {
        let alternatives = crate::pipeline::StrategyTier::all()
            .into_iter()
            .filter(|t| *t != pipeline.strategy)
            .map(|t| t.as_str().to_string())
            .collect();
        let reasoning = pipeline.reasoning.get(1).cloned().unwrap_or_default();
        self.record(
            DecisionType::PipelineStrategy,
            pipeline.strategy.as_str(),
            alternatives,
            reasoning,
            1.0,
        );

        for customization in &pipeline.customizations {
            self.record(
                DecisionType::PipelineCustomization,
                format!("{}={}", customization.setting, customization.to),
                vec![format!("{}={}", customization.setting, customization.from)],
                customization.reason.clone(),
                1.0,
            );
        }
    }

    /// Winner, confidence assessment and dropped candidates
    pub fn record_training(&mut self, result: &AutoMLResult, n_rows: usize, problem_type: ProblemType) {
        let best = &result.best_model;
        let alternatives: Vec<String> = result
            .ranked
            .iter()
            .skip(1)
            .map(|r| r.algorithm.clone())
            .chain(result.failed_candidates.iter().map(|f| f.algorithm.clone()))
            .collect();
        self.record(
            DecisionType::AlgorithmSelection,
            best.algorithm.clone(),
            alternatives,
            algorithm_rationale(result, n_rows, problem_type),
            confidence_score(result.confidence_level),
        );

        let levels = [ConfidenceLevel::High, ConfidenceLevel::Medium, ConfidenceLevel::Low];
        self.record(
            DecisionType::ConfidenceAssessment,
            result.confidence_level.as_str(),
            levels
                .iter()
                .filter(|l| **l != result.confidence_level)
                .map(|l| l.as_str().to_string())
                .collect(),
            format!(
                "test score {:.4}, cv std {:.4} over {} successful candidates",
                best.test_score,
                best.cv_std,
                result.ranked.len()
            ),
            confidence_score(result.confidence_level),
        );

        for failure in &result.failed_candidates {
            self.record(
                DecisionType::CandidateDropped,
                failure.algorithm.clone(),
                Vec::new(),
                failure.reason.clone(),
                1.0,
            );
        }
    }

    /// Freeze the recorded entries into a read-only log
    pub fn finish(self, ctx: DecisionContext<'_>) -> DecisionLog {
        let best = &ctx.result.best_model;
        let task = ctx.result.task;
        let family = best.family;

        let mut validation_metrics = BTreeMap::new();
        validation_metrics.insert(format!("cv_{}", ctx.result.scoring.name()), best.cv_mean);
        validation_metrics.insert("cv_std".to_string(), best.cv_std);
        validation_metrics.insert("test_score".to_string(), best.test_score);
        let metrics = &best.test_metrics;
        for (name, value) in [
            ("accuracy", metrics.accuracy),
            ("precision", metrics.precision),
            ("recall", metrics.recall),
            ("f1_score", metrics.f1_score),
            ("mse", metrics.mse),
            ("rmse", metrics.rmse),
            ("mae", metrics.mae),
            ("r2", metrics.r2),
        ] {
            if let Some(v) = value {
                validation_metrics.insert(name.to_string(), v);
            }
        }

        let summary = RunSummary {
            model_id: Uuid::new_v4(),
            created_at: Utc::now(),
            problem_type: ctx.intelligence.problem_type,
            target_column: ctx.intelligence.roles.target.clone(),
            target_rationale: ctx.intelligence.target_rationale.clone(),
            feature_columns: ctx.feature_names.to_vec(),
            selected_algorithm: best.algorithm.clone(),
            algorithm_rationale: algorithm_rationale(
                ctx.result,
                ctx.profile.n_rows,
                ctx.intelligence.problem_type,
            ),
            alternatives_considered: ctx
                .result
                .ranked
                .iter()
                .map(|r| r.algorithm.clone())
                .filter(|a| a != &best.algorithm)
                .collect(),
            data_quality_score: ctx.profile.overall_quality_score,
            preprocessing_steps: ctx.pipeline.steps.clone(),
            hyperparameters: best.hyperparameters.clone(),
            training_config: ctx.settings.clone(),
            validation_metrics,
            training_time_secs: ctx.result.ranked.iter().map(|r| r.training_time_secs).sum(),
            assumptions: assumptions(task, family),
            limitations: limitations(ctx.profile),
            known_biases: known_biases(ctx.profile, &ctx.intelligence.roles, ctx.class_counts),
            reproducibility: Reproducibility::new(ctx.settings.random_seed, ctx.dataset_hash),
        };

        DecisionLog::seal(summary, self.entries)
    }
}

/// Read-only record of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLog {
    summary: RunSummary,
    entries: Vec<DecisionEntry>,
    /// Digest of the summary chained onto the last entry hash
    summary_hash: String,
}

impl DecisionLog {
    fn seal(summary: RunSummary, entries: Vec<DecisionEntry>) -> Self {
        let summary_hash = summary_digest(&summary, &entries);
        Self {
            summary,
            entries,
            summary_hash,
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn model_id(&self) -> Uuid {
        self.summary.model_id
    }

    pub fn entries(&self) -> &[DecisionEntry] {
        &self.entries
    }

    pub fn entries_of(&self, decision_type: DecisionType) -> impl Iterator<Item = &DecisionEntry> {
        self.entries.iter().filter(move |e| e.decision_type == decision_type)
    }

    /// Chosen option of every entry, in recording order
    pub fn chosen_options(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.chosen_option.as_str()).collect()
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Re-derive every hash and report the first break in the chain
    pub fn verify_integrity(&self) -> IntegrityReport {
        let total = self.entries.len();
        let broken = |seq: u64, verified: usize, message: String| IntegrityReport {
            valid: false,
            total_entries: total,
            verified_entries: verified,
            first_invalid: Some(seq),
            message,
        };

        let mut expected_prev = GENESIS_HASH;
        for (verified, entry) in self.entries.iter().enumerate() {
            if entry.sequence != verified as u64 {
                return broken(
                    entry.sequence,
                    verified,
                    format!("Entry {} is out of sequence", entry.sequence),
                );
            }
            if entry.prev_hash != expected_prev {
                return broken(
                    entry.sequence,
                    verified,
                    format!("Chain broken at entry {}: prev_hash mismatch", entry.sequence),
                );
            }
            if entry.hash != entry.digest() {
                return broken(
                    entry.sequence,
                    verified,
                    format!("Hash mismatch at entry {}", entry.sequence),
                );
            }
            expected_prev = entry.hash.as_str();
        }

        if self.summary_hash != summary_digest(&self.summary, &self.entries) {
            return IntegrityReport {
                valid: false,
                total_entries: total,
                verified_entries: total,
                first_invalid: None,
                message: "Run summary does not match its digest".to_string(),
            };
        }

        IntegrityReport {
            valid: true,
            total_entries: total,
            verified_entries: total,
            first_invalid: None,
            message: "Decision log integrity verified".to_string(),
        }
    }
}

fn summary_digest(summary: &RunSummary, entries: &[DecisionEntry]) -> String {
    let last = entries.last().map_or(GENESIS_HASH, |e| e.hash.as_str());
    let body = serde_json::to_string(summary).unwrap_or_default();
    compute_hash(&format!("{}|{}", last, body))
}

fn compute_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn confidence_score(level: ConfidenceLevel) -> f64 {
    match level {
        ConfidenceLevel::High => 0.9,
        ConfidenceLevel::Medium => 0.7,
        ConfidenceLevel::Low => 0.5,
    }
}

fn algorithm_rationale(result: &AutoMLResult, n_rows: usize, problem_type: ProblemType) -> String {
    let best = &result.best_model;
    let family_note = match best.family {
        ModelFamily::Linear => "an interpretable linear model",
        ModelFamily::Tree => "a tree-based model capturing non-linear effects",
        ModelFamily::Other => "the strongest candidate",
    };
    format!(
        "{} selected for {} on {} rows as {}: best mean CV {} of {:.4} (std {:.4}) among {} successful candidates",
        best.algorithm,
        problem_type,
        n_rows,
        family_note,
        result.scoring.name(),
        best.cv_mean,
        best.cv_std,
        result.ranked.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> DecisionRecorder {
        let mut rec = DecisionRecorder::new();
        rec.record(DecisionType::TargetSelection, "churn", vec!["plan".into()], "pattern", 0.9);
        rec.record(DecisionType::ProblemType, "binary_classification", vec![], "2 classes", 0.9);
        rec.record(
            DecisionType::AlgorithmSelection,
            "random_forest",
            vec!["logistic_regression".into()],
            "best cv",
            1.7,
        );
        rec
    }

    fn sealed(rec: DecisionRecorder) -> DecisionLog {
        DecisionLog::seal(summary(), rec.entries)
    }

    fn summary() -> RunSummary {
        RunSummary {
            model_id: Uuid::new_v4(),
            created_at: Utc::now(),
            problem_type: ProblemType::BinaryClassification,
            target_column: Some("churn".into()),
            target_rationale: None,
            feature_columns: vec!["a".into()],
            selected_algorithm: "random_forest".into(),
            algorithm_rationale: "best".into(),
            alternatives_considered: vec![],
            data_quality_score: 88.0,
            preprocessing_steps: vec![],
            hyperparameters: Hyperparameters::new().with("n_estimators", 50),
            training_config: TrainerSettings::default(),
            validation_metrics: BTreeMap::new(),
            training_time_secs: 0.1,
            assumptions: vec![],
            limitations: vec![],
            known_biases: vec![],
            reproducibility: Reproducibility::new(42, "abc"),
        }
    }

    #[test]
    fn test_chain_links_entries() {
        let log = sealed(recorder());
        let entries = log.entries();
        assert_eq!(entries[0].prev_hash, GENESIS_HASH);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert_eq!(entries[2].confidence, 1.0);
        assert_eq!(log.chosen_options(), vec!["churn", "binary_classification", "random_forest"]);

        let report = log.verify_integrity();
        assert!(report.valid, "{}", report.message);
        assert_eq!(report.verified_entries, 3);
    }

    #[test]
    fn test_tampered_entry_is_detected() {
        let mut log = sealed(recorder());
        log.entries[1].chosen_option = "regression".into();
        let report = log.verify_integrity();
        assert!(!report.valid);
        assert_eq!(report.first_invalid, Some(1));
        assert_eq!(report.verified_entries, 1);
    }

    #[test]
    fn test_tampered_summary_is_detected() {
        let mut log = sealed(recorder());
        log.summary.selected_algorithm = "decision_tree".into();
        let report = log.verify_integrity();
        assert!(!report.valid);
        assert_eq!(report.first_invalid, None);
    }

    #[test]
    fn test_json_round_trip_keeps_integrity() {
        let log = sealed(recorder());
        let json = log.to_json().unwrap();
        let back: DecisionLog = serde_json::from_str(&json).unwrap();
        assert!(back.verify_integrity().valid);
        assert_eq!(back.entries_of(DecisionType::ProblemType).count(), 1);
    }

    #[test]
    fn test_reloaded_log_with_inexact_floats_verifies() {
        let mut summary = summary();
        summary.data_quality_score = 100.0 / 3.0;
        summary.training_time_secs = 0.1 + 0.2;
        summary.validation_metrics.insert("roc_auc".into(), 0.8123456789012345);
        summary.validation_metrics.insert("log_loss".into(), 2.0_f64.sqrt() * 1e-7);
        let log = DecisionLog::seal(summary, recorder().entries);

        let back: DecisionLog = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(back.summary().training_time_secs, 0.1 + 0.2);
        assert!(back.verify_integrity().valid);
    }

    #[test]
    fn test_reproducibility_metadata() {
        let info = Reproducibility::new(7, "deadbeef");
        assert_eq!(info.random_seed, 7);
        assert_eq!(info.engine_version, env!("CARGO_PKG_VERSION"));
        assert!(info.components.contains_key("target_os"));
    }
}
