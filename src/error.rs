//! Error types for the tabular copilot workflow engine

use thiserror::Error;

/// Result type alias for copilot operations
pub type Result<T> = std::result::Result<T, CopilotError>;

/// Main error type for the workflow engine
#[derive(Error, Debug)]
pub enum CopilotError {
    #[error("Load error: {0}")]
    LoadError(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Planning error: {0}")]
    PlanningError(String),

    #[error("Report error: {0}")]
    ReportError(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for CopilotError {
    fn from(err: polars::error::PolarsError) -> Self {
        CopilotError::LoadError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CopilotError::LoadError("bad file".to_string());
        assert_eq!(err.to_string(), "Load error: bad file");

        let err = CopilotError::SessionNotFound("run1".to_string());
        assert_eq!(err.to_string(), "Session not found: run1");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CopilotError = io_err.into();
        assert!(matches!(err, CopilotError::IoError(_)));
    }
}
