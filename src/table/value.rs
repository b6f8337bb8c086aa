//! Cell values

use serde::{Deserialize, Serialize};

/// A single table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
    Missing,
}

impl Value {
    /// Missing, NaN, or blank text
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Number(v) => v.is_nan(),
            Value::Text(s) => s.trim().is_empty(),
            Value::Bool(_) => false,
        }
    }

    /// Numeric reading of the value; text is parsed after trimming
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) if v.is_finite() => Some(*v),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// True when the value is a number or text that parses as one
    pub fn parses_as_number(&self) -> bool {
        match self {
            Value::Number(v) => v.is_finite(),
            Value::Text(s) => s.trim().parse::<f64>().map_or(false, f64::is_finite),
            _ => false,
        }
    }

    /// Canonical string key used for counting distinct values
    pub fn key(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        Some(match self {
            // -0.0 and 0.0 are the same category
            Value::Number(v) if *v == 0.0 => "0".to_string(),
            Value::Number(v) => format!("{}", v),
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => s.trim().to_string(),
            Value::Missing => return None,
        })
    }

    /// Text rendering used for length statistics
    pub fn as_text(&self) -> Option<String> {
        self.key()
    }

    pub(crate) fn memory_bytes(&self) -> usize {
        match self {
            Value::Number(_) | Value::Missing => 8,
            Value::Bool(_) => 1,
            Value::Text(s) => s.len() + 24,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Value::Missing, Value::Number)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}
