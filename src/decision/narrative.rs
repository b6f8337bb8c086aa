//! Assumptions, limitations and known biases attached to a run

use crate::intelligence::RoleAssignment;
use crate::profiling::DatasetProfile;
use crate::training::{ModelFamily, TaskKind};

const SMALL_DATASET_ROWS: usize = 1000;
const LOW_QUALITY_SCORE: f64 = 80.0;
const FEW_COLUMNS: usize = 5;
const IMBALANCE_RATIO: f64 = 10.0;
const BIAS_MISSING_PCT: f64 = 10.0;

pub fn assumptions(task: TaskKind, family: ModelFamily) -> Vec<String> {
    let mut out = vec![
        "Target variable is correctly labeled".to_string(),
        "Training data is representative of production data".to_string(),
        "Features are available at prediction time".to_string(),
    ];
    if task == TaskKind::Classification {
        out.push("Class distribution in training reflects production".to_string());
    }
    match family {
        ModelFamily::Linear => {
            out.push("Features contribute independently and linearly to the target".to_string())
        }
        ModelFamily::Tree => {
            out.push("Feature interactions are important for prediction".to_string())
        }
        ModelFamily::Other => {}
    }
    out
}

pub fn limitations(profile: &DatasetProfile) -> Vec<String> {
    let mut out = Vec::new();
    if profile.n_rows < SMALL_DATASET_ROWS {
        out.push(format!(
            "Small dataset ({} rows) may limit model generalization",
            profile.n_rows
        ));
    }
    if profile.overall_quality_score < LOW_QUALITY_SCORE {
        out.push(format!(
            "Data quality score of {:.1} indicates issues that may impact model performance",
            profile.overall_quality_score
        ));
    }
    if profile.n_cols < FEW_COLUMNS {
        out.push("Limited feature set may constrain predictive power".to_string());
    }
    out.push("Model performance may degrade over time (concept drift)".to_string());
    out
}

/// Class imbalance in the target and heavy missingness in features
pub fn known_biases(
    profile: &DatasetProfile,
    roles: &RoleAssignment,
    class_counts: &[usize],
) -> Vec<String> {
    let mut out = Vec::new();

    let present: Vec<usize> = class_counts.iter().copied().filter(|&c| c > 0).collect();
    if let (Some(&max), Some(&min)) = (present.iter().max(), present.iter().min()) {
        let ratio = max as f64 / min as f64;
        if present.len() > 1 && ratio > IMBALANCE_RATIO {
            out.push(format!(
                "Severe class imbalance in target '{}' (majority/minority ratio {:.1})",
                roles.target.as_deref().unwrap_or("-"),
                ratio
            ));
        }
    }

    for name in &roles.features {
        if let Some(column) = profile.column(name) {
            if column.missing_pct > BIAS_MISSING_PCT {
                out.push(format!(
                    "Feature '{}' is {:.1}% missing; imputation may introduce selection bias",
                    name, column.missing_pct
                ));
            }
        }
    }
    out
}
