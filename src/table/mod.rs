//! Typed in-memory table
//!
//! An ordered list of named, equal-length columns. Profiling, role
//! classification and the preprocessing transform only ever read data
//! through this abstraction.

mod value;

pub use value::Value;

use crate::error::{AutoMLError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// A named column of values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Numeric column, NaN entries are treated as missing
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, values.into_iter().map(Value::from).collect())
    }

    /// Numeric column with explicit gaps
    pub fn numeric_opt(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, values.into_iter().map(Value::from).collect())
    }

    pub fn text<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        Self::new(
            name,
            values.iter().map(|s| Value::from(s.as_ref())).collect(),
        )
    }

    pub fn text_opt<S: AsRef<str>>(name: impl Into<String>, values: &[Option<S>]) -> Self {
        Self::new(
            name,
            values
                .iter()
                .map(|s| match s {
                    Some(s) => Value::from(s.as_ref()),
                    None => Value::Missing,
                })
                .collect(),
        )
    }

    pub fn boolean(name: impl Into<String>, values: Vec<bool>) -> Self {
        Self::new(name, values.into_iter().map(Value::Bool).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterator over the non-missing values
    pub fn present(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().filter(|v| !v.is_missing())
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }

    fn take(&self, indices: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }
}

/// Ordered collection of equal-length named columns
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table, rejecting ragged columns and duplicate names
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, Column::len);
        let mut seen = HashSet::new();

        for column in &columns {
            if column.len() != n_rows {
                return Err(AutoMLError::ValidationError(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.len(),
                    n_rows
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(AutoMLError::ValidationError(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }

        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0 || self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Look up a column or fail with a validation error
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| AutoMLError::ValidationError(format!("column '{}' not found", name)))
    }

    /// New table holding the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Result<Table> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_rows) {
            return Err(AutoMLError::ShapeError {
                expected: format!("row index < {}", self.n_rows),
                actual: bad.to_string(),
            });
        }
        Ok(Table {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            n_rows: indices.len(),
        })
    }

    /// Canonical per-row keys, used for duplicate detection
    pub fn row_keys(&self) -> Vec<Vec<Option<String>>> {
        (0..self.n_rows)
            .map(|r| self.columns.iter().map(|c| c.values[r].key()).collect())
            .collect()
    }

    /// Rough in-memory footprint in bytes
    pub fn memory_bytes(&self) -> usize {
        self.columns
            .iter()
            .map(|c| {
                c.name.len() + c.values.iter().map(Value::memory_bytes).sum::<usize>()
            })
            .sum()
    }

    /// SHA-256 over column names and canonical cell keys
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for column in &self.columns {
            hasher.update(column.name.as_bytes());
            hasher.update([0x1f]);
            for value in &column.values {
                match value.key() {
                    Some(key) => hasher.update(key.as_bytes()),
                    None => hasher.update([0x00]),
                }
                hasher.update([0x1e]);
            }
        }
        format!("{:x}", hasher.finalize())
    }
}
