//! Column role assignment

use crate::patterns;
use crate::profiling::{ColumnProfile, DatasetProfile, SemanticType};
use serde::{Deserialize, Serialize};

/// Functional purpose of a column for modeling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Target,
    Feature,
    Identifier,
    Timestamp,
    Text,
    Ignore,
}

/// Partition of every column into exactly one role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub target: Option<String>,
    pub features: Vec<String>,
    pub identifiers: Vec<String>,
    pub timestamps: Vec<String>,
    pub text: Vec<String>,
    pub ignore: Vec<String>,
}

impl RoleAssignment {
    pub fn role_of(&self, column: &str) -> Option<ColumnRole> {
        if self.target.as_deref() == Some(column) {
            return Some(ColumnRole::Target);
        }
        let sets = [
            (&self.features, ColumnRole::Feature),
            (&self.identifiers, ColumnRole::Identifier),
            (&self.timestamps, ColumnRole::Timestamp),
            (&self.text, ColumnRole::Text),
            (&self.ignore, ColumnRole::Ignore),
        ];
        sets.iter()
            .find(|(names, _)| names.iter().any(|n| n == column))
            .map(|(_, role)| *role)
    }

    /// Every assigned column, target first
    pub fn all_columns(&self) -> Vec<&str> {
        self.target
            .iter()
            .chain(&self.features)
            .chain(&self.identifiers)
            .chain(&self.timestamps)
            .chain(&self.text)
            .chain(&self.ignore)
            .map(String::as_str)
            .collect()
    }

    pub(crate) fn push(&mut self, column: &str, role: ColumnRole) {
        let name = column.to_string();
        match role {
            ColumnRole::Target => self.target = Some(name),
            ColumnRole::Feature => self.features.push(name),
            ColumnRole::Identifier => self.identifiers.push(name),
            ColumnRole::Timestamp => self.timestamps.push(name),
            ColumnRole::Text => self.text.push(name),
            ColumnRole::Ignore => self.ignore.push(name),
        }
    }

    /// Remove a column from whichever set holds it
    pub(crate) fn remove(&mut self, column: &str) -> Option<ColumnRole> {
        let role = self.role_of(column)?;
        match role {
            ColumnRole::Target => self.target = None,
            ColumnRole::Feature => self.features.retain(|n| n != column),
            ColumnRole::Identifier => self.identifiers.retain(|n| n != column),
            ColumnRole::Timestamp => self.timestamps.retain(|n| n != column),
            ColumnRole::Text => self.text.retain(|n| n != column),
            ColumnRole::Ignore => self.ignore.retain(|n| n != column),
        }
        Some(role)
    }
}

/// Thresholds for the data-driven role rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleRules {
    /// Missing percentage above which a column is ignored
    pub ignore_missing_pct: f64,
    pub identifier_unique_pct: f64,
    pub identifier_min_unique: usize,
    /// Minimum inference score for an implicit target
    pub target_min_score: f64,
}

impl Default for RoleRules {
    fn default() -> Self {
        Self {
            ignore_missing_pct: 90.0,
            identifier_unique_pct: 95.0,
            identifier_min_unique: 100,
            target_min_score: 20.0,
        }
    }
}

/// Role of a single column, returned with a short justification
pub(crate) fn classify_column(profile: &ColumnProfile, rules: &RoleRules) -> (ColumnRole, String) {
    let name = &profile.name;

    if patterns::is_identifier_name(name) {
        return (
            ColumnRole::Identifier,
            format!("'{}' matches an identifier naming pattern", name),
        );
    }
    if patterns::is_time_name(name) || profile.semantic_type == SemanticType::Datetime {
        return (
            ColumnRole::Timestamp,
            format!("'{}' is temporal by name or inferred type", name),
        );
    }
    if patterns::is_target_name(name) {
        return (
            ColumnRole::Target,
            format!("'{}' matches a target naming pattern", name),
        );
    }
    if profile.semantic_type == SemanticType::Text {
        return (ColumnRole::Text, format!("'{}' holds free text", name));
    }
    if profile.is_constant() || profile.missing_pct > rules.ignore_missing_pct {
        return (
            ColumnRole::Ignore,
            format!(
                "'{}' ignored: {} unique values, {:.1}% missing",
                name, profile.unique_count, profile.missing_pct
            ),
        );
    }
    if profile.unique_pct > rules.identifier_unique_pct
        && profile.unique_count > rules.identifier_min_unique
    {
        return (
            ColumnRole::Identifier,
            format!(
                "'{}' is nearly unique ({:.1}%) and treated as an identifier",
                name, profile.unique_pct
            ),
        );
    }
    (ColumnRole::Feature, format!("'{}' used as a feature", name))
}

/// Assign roles in table order; later target-pattern matches become features
pub fn assign_roles(profile: &DatasetProfile, rules: &RoleRules) -> (RoleAssignment, Vec<String>) {
    let mut roles = RoleAssignment::default();
    let mut reasoning = Vec::new();

    for column in profile.ordered() {
        let (role, reason) = classify_column(column, rules);
        if role == ColumnRole::Target && roles.target.is_some() {
            reasoning.push(format!(
                "'{}' also matches a target pattern but a target is already set; kept as feature",
                column.name
            ));
            roles.push(&column.name, ColumnRole::Feature);
            continue;
        }
        if role != ColumnRole::Feature {
            reasoning.push(reason);
        }
        roles.push(&column.name, role);
    }

    (roles, reasoning)
}

/// Scored target candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCandidate {
    pub column: String,
    pub score: f64,
}

/// Score every feature as a potential target
pub fn score_target_candidates(roles: &RoleAssignment, profile: &DatasetProfile) -> Vec<TargetCandidate> {
    score_columns(&roles.features, profile)
}

/// Score the named columns, in the given order, as potential targets
pub fn score_columns(names: &[String], profile: &DatasetProfile) -> Vec<TargetCandidate> {
    let n_cols = profile.column_order.len();

    names
        .iter()
        .filter_map(|name| {
            let column = profile.column(name)?;
            let position = profile.column_order.iter().position(|n| n == name)?;

            let mut score = 0.0;
            if (2..=50).contains(&column.unique_count) {
                score += 30.0;
            }
            if column.semantic_type.is_discrete() {
                score += 20.0;
            }
            if position + 3 >= n_cols {
                score += 15.0;
            }
            score -= column.missing_pct * 0.5;
            if column.unique_count > 100 {
                score -= 20.0;
            }

            Some(TargetCandidate {
                column: name.clone(),
                score,
            })
        })
        .collect()
}

/// Best candidate strictly above the threshold; earlier columns win ties
pub fn pick_target(candidates: &[TargetCandidate], min_score: f64) -> Option<&TargetCandidate> {
    candidates
        .iter()
        .fold(None::<&TargetCandidate>, |best, c| match best {
            Some(b) if b.score >= c.score => Some(b),
            _ => Some(c),
        })
        .filter(|c| c.score > min_score)
}
