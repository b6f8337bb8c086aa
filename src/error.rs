//! Error types for the AutoML engine
//!
//! Two families matter to the orchestrator: [`AutoMLError::ProcessingError`]
//! is recovered by dropping the offending candidate, everything reported by
//! [`AutoMLError::is_fatal`] aborts the run.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AutoMLError>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum AutoMLError {
    /// Input rejected before training starts (bad target, too few rows, ...)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A single candidate failed to fit or predict
    #[error("Processing error in candidate '{candidate}': {reason}")]
    ProcessingError { candidate: String, reason: String },

    /// No candidate survived, or the preprocessing transform failed
    #[error("Fatal training error: {0}")]
    FatalTrainingError(String),

    /// Unknown algorithm identifier or invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Ingestion error: {0}")]
    IngestionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl AutoMLError {
    /// Whether this error must abort a training run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AutoMLError::ProcessingError { .. })
    }

    /// Short machine-readable category name
    pub fn kind(&self) -> &'static str {
        match self {
            AutoMLError::ValidationError(_) => "validation",
            AutoMLError::ProcessingError { .. } => "processing",
            AutoMLError::FatalTrainingError(_) => "fatal_training",
            AutoMLError::ConfigurationError(_) => "configuration",
            AutoMLError::ShapeError { .. } => "shape",
            AutoMLError::ModelNotFitted => "model_not_fitted",
            AutoMLError::InvalidParameter { .. } => "invalid_parameter",
            AutoMLError::ComputationError(_) => "computation",
            AutoMLError::IngestionError(_) => "ingestion",
            AutoMLError::IoError(_) => "io",
            AutoMLError::SerializationError(_) => "serialization",
        }
    }

    /// Wrap any error raised while evaluating a candidate
    pub(crate) fn processing(candidate: &str, err: impl std::fmt::Display) -> Self {
        AutoMLError::ProcessingError {
            candidate: candidate.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for AutoMLError {
    fn from(err: polars::error::PolarsError) -> Self {
        AutoMLError::IngestionError(err.to_string())
    }
}

impl From<serde_json::Error> for AutoMLError {
    fn from(err: serde_json::Error) -> Self {
        AutoMLError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AutoMLError {
    fn from(err: ndarray::ShapeError) -> Self {
        AutoMLError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutoMLError::ValidationError("dataset too small".to_string());
        assert_eq!(err.to_string(), "Validation error: dataset too small");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AutoMLError = io_err.into();
        assert!(matches!(err, AutoMLError::IoError(_)));
    }

    #[test]
    fn test_only_processing_is_recoverable() {
        let err = AutoMLError::processing("random_forest", "singular matrix");
        assert!(!err.is_fatal());
        assert_eq!(err.kind(), "processing");
        assert!(err.to_string().contains("random_forest"));

        assert!(AutoMLError::FatalTrainingError("none".into()).is_fatal());
        assert!(AutoMLError::ConfigurationError("svm".into()).is_fatal());
        assert!(AutoMLError::ValidationError("x".into()).is_fatal());
    }
}
