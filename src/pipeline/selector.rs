//! Tier selection and data-driven customization

use super::{
    EncodingMethod, ImputationMethod, PipelineConfig, PipelineCustomization, PipelineRules,
    ScalingMethod, StrategyTier,
};
use crate::intelligence::{ProblemType, RoleAssignment};
use crate::profiling::{DatasetProfile, SemanticType};
use tracing::{debug, info};

/// Tier defaults before customization
struct TierDefaults {
    numeric_imputation: ImputationMethod,
    categorical_imputation: ImputationMethod,
    scaling: ScalingMethod,
    encoding: EncodingMethod,
    feature_selection: bool,
    outlier_clipping: bool,
}

impl TierDefaults {
    fn of(tier: StrategyTier) -> Self {
        use EncodingMethod as E;
        use ImputationMethod as I;
        use ScalingMethod as S;
        let (numeric_imputation, scaling, encoding, heavy) = match tier {
            StrategyTier::Minimal => (I::Median, S::None, E::Label, false),
            StrategyTier::Standard => (I::Mean, S::Standard, E::OneHot, false),
            StrategyTier::Robust => (I::Median, S::Robust, E::OneHot, true),
            StrategyTier::Advanced => (I::Knn, S::Robust, E::Target, true),
        };
        Self {
            numeric_imputation,
            categorical_imputation: I::Mode,
            scaling,
            encoding,
            feature_selection: heavy,
            outlier_clipping: heavy,
        }
    }
}

/// Chooses the preprocessing strategy for a profiled dataset
#[derive(Debug, Clone, Default)]
pub struct PipelineSelector {
    rules: PipelineRules,
}

impl PipelineSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(mut self, rules: PipelineRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &PipelineRules {
        &self.rules
    }

    /// Tier implied by quality score, issue count, missingness and width
    pub fn determine_tier(&self, profile: &DatasetProfile) -> StrategyTier {
        let quality = profile.overall_quality_score;
        let issues = profile.total_column_issues();
        let high_missing = profile
            .columns
            .values()
            .filter(|c| c.missing_pct > self.rules.high_missing_pct)
            .count();
        let wide = profile.n_cols > self.rules.wide_max_columns;

        debug!(quality, issues, high_missing, wide, "Selecting strategy tier");

        if quality >= self.rules.minimal_min_quality && issues == 0 {
            StrategyTier::Minimal
        } else if quality >= self.rules.standard_min_quality && high_missing == 0 && !wide {
            StrategyTier::Standard
        } else if quality >= self.rules.robust_min_quality || high_missing > 0 || wide {
            StrategyTier::Robust
        } else {
            StrategyTier::Advanced
        }
    }

    pub fn select(
        &self,
        problem_type: ProblemType,
        roles: &RoleAssignment,
        profile: &DatasetProfile,
    ) -> PipelineConfig {
        let rules = &self.rules;
        let strategy = self.determine_tier(profile);
        let defaults = TierDefaults::of(strategy);

        let (numeric_columns, categorical_columns) = feature_columns(roles, profile);

        let mut config = PipelineConfig {
            strategy,
            numeric_imputation: defaults.numeric_imputation,
            categorical_imputation: defaults.categorical_imputation,
            scaling: defaults.scaling,
            encoding: defaults.encoding,
            feature_selection: defaults.feature_selection,
            feature_selection_k: None,
            outlier_clipping: defaults.outlier_clipping,
            numeric_columns,
            categorical_columns,
            steps: Vec::new(),
            customizations: Vec::new(),
            reasoning: Vec::new(),
            estimated_time_secs: 0.0,
            estimated_memory_mb: 0.0,
            memory_requirements: String::new(),
            rules: rules.clone(),
        };

        self.customize(&mut config, problem_type, profile);

        if config.feature_selection && config.feature_selection_k.is_none() {
            config.feature_selection_k = Some(rules.default_selection_k);
        }

        config.reasoning = reasoning(&config);
        config.steps = steps(&config);
        config.estimated_time_secs = profile.n_rows as f64 * profile.n_cols as f64 / 100_000.0
            * strategy.time_multiplier();
        config.estimated_memory_mb = profile.memory_mb
            * match strategy {
                StrategyTier::Robust | StrategyTier::Advanced => 2.5,
                _ => 1.5,
            };
        config.memory_requirements = memory_label(config.estimated_memory_mb).to_string();

        info!(
            strategy = %config.strategy,
            scaling = %config.scaling,
            encoding = %config.encoding,
            customizations = config.customizations.len(),
            "Pipeline selected"
        );
        config
    }

    fn customize(&self, config: &mut PipelineConfig, problem_type: ProblemType, profile: &DatasetProfile) {
        let rules = &self.rules;

        let high_missing_numeric: Vec<String> = config
            .numeric_columns
            .iter()
            .filter(|name| {
                profile.column(name).map_or(false, |c| {
                    c.semantic_type == SemanticType::Numeric && c.missing_pct > rules.knn_missing_pct
                })
            })
            .cloned()
            .collect();
        if !high_missing_numeric.is_empty()
            && profile.n_rows > rules.knn_min_rows
            && config.numeric_imputation != ImputationMethod::Knn
        {
            let reason = format!(
                "{} numeric feature(s) above {:.0}% missing on {} rows: {}",
                high_missing_numeric.len(),
                rules.knn_missing_pct,
                profile.n_rows,
                high_missing_numeric.join(", ")
            );
            let from = config.numeric_imputation.as_str();
            record(
                config,
                "numeric_imputation",
                from,
                ImputationMethod::Knn.as_str(),
                reason,
            );
            config.numeric_imputation = ImputationMethod::Knn;
        }

        if problem_type.is_classification() && config.scaling == ScalingMethod::None {
            record(
                config,
                "scaling",
                ScalingMethod::None.as_str(),
                ScalingMethod::Standard.as_str(),
                "classification benefits from scaled inputs".to_string(),
            );
            config.scaling = ScalingMethod::Standard;
        }

        let high_cardinality: Vec<String> = config
            .categorical_columns
            .iter()
            .filter(|name| {
                profile
                    .column(name)
                    .map_or(false, |c| c.unique_count > rules.target_encoding_min_unique)
            })
            .cloned()
            .collect();
        if !high_cardinality.is_empty() && config.encoding == EncodingMethod::OneHot {
            let reason = format!(
                "categorical feature(s) with more than {} levels: {}",
                rules.target_encoding_min_unique,
                high_cardinality.join(", ")
            );
            record(
                config,
                "encoding",
                EncodingMethod::OneHot.as_str(),
                EncodingMethod::Target.as_str(),
                reason,
            );
            config.encoding = EncodingMethod::Target;
        }

        if profile.n_cols > rules.selection_min_columns {
            let k = rules.selection_max_k.min(profile.n_cols - 1);
            let from = if config.feature_selection { "on" } else { "off" };
            record(
                config,
                "feature_selection",
                from,
                &format!("on (k={})", k),
                format!("{} columns exceed {}", profile.n_cols, rules.selection_min_columns),
            );
            config.feature_selection = true;
            config.feature_selection_k = Some(k);
        }
    }
}

fn record(config: &mut PipelineConfig, setting: &str, from: &str, to: &str, reason: String) {
    debug!(setting, from, to, "Pipeline customization");
    config.customizations.push(PipelineCustomization {
        setting: setting.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        reason,
    });
}

/// Numeric (and boolean) versus categorical features, in table order
fn feature_columns(roles: &RoleAssignment, profile: &DatasetProfile) -> (Vec<String>, Vec<String>) {
    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    for column in profile.ordered() {
        if !roles.features.iter().any(|f| f == &column.name) {
            continue;
        }
        match column.semantic_type {
            SemanticType::Numeric | SemanticType::Boolean => numeric.push(column.name.clone()),
            SemanticType::Categorical | SemanticType::Unknown => {
                categorical.push(column.name.clone())
            }
            SemanticType::Datetime | SemanticType::Text => {}
        }
    }
    (numeric, categorical)
}

fn reasoning(config: &PipelineConfig) -> Vec<String> {
    let mut out = vec![format!("Selected {} preprocessing strategy", config.strategy)];
    out.push(
        match config.strategy {
            StrategyTier::Minimal => "High data quality detected - minimal preprocessing sufficient",
            StrategyTier::Standard => "Good data quality - standard preprocessing recommended",
            StrategyTier::Robust => "Data quality issues detected - robust preprocessing required",
            StrategyTier::Advanced => {
                "Complex data characteristics - advanced preprocessing needed"
            }
        }
        .to_string(),
    );
    for c in &config.customizations {
        out.push(format!("{} changed from {} to {}: {}", c.setting, c.from, c.to, c.reason));
    }
    if config.numeric_imputation == ImputationMethod::Knn {
        out.push("KNN imputation chosen for better handling of missing patterns".to_string());
    }
    if config.scaling != ScalingMethod::None {
        out.push(format!("{} scaling applied for algorithm compatibility", config.scaling));
    }
    if config.encoding == EncodingMethod::Target {
        out.push("Target encoding chosen for high-cardinality categorical variables".to_string());
    }
    if config.outlier_clipping {
        out.push("Outliers clipped to the interquartile fences".to_string());
    }
    if config.feature_selection {
        out.push("Feature selection enabled for dimensionality reduction".to_string());
    }
    out
}

fn steps(config: &PipelineConfig) -> Vec<String> {
    let mut out = Vec::new();
    if !config.numeric_columns.is_empty() {
        if config.outlier_clipping {
            out.push(format!(
                "clip_outliers(iqr x {}) on {} numeric columns",
                config.rules.clip_iqr_factor,
                config.numeric_columns.len()
            ));
        }
        out.push(format!(
            "impute_{}({})",
            config.numeric_imputation,
            config.numeric_columns.join(", ")
        ));
        if config.scaling != ScalingMethod::None {
            out.push(format!("scale_{}({})", config.scaling, config.numeric_columns.join(", ")));
        }
    }
    if !config.categorical_columns.is_empty() {
        let cols = config.categorical_columns.join(", ");
        out.push(format!("impute_{}({})", config.categorical_imputation, cols));
        out.push(format!("encode_{}({})", config.encoding, cols));
    }
    if let (true, Some(k)) = (config.feature_selection, config.feature_selection_k) {
        out.push(format!("select_k_best(k={}, f_score)", k));
    }
    out
}

fn memory_label(mb: f64) -> &'static str {
    if mb < 100.0 {
        "Low (< 100MB)"
    } else if mb < 500.0 {
        "Medium (100-500MB)"
    } else {
        "High (> 500MB)"
    }
}
