//! Error types for gradlab

use thiserror::Error;

/// Main error type for gradlab
#[derive(Error, Debug)]
pub enum GradlabError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid hyperparameter `{name}` = {value}: {reason}")]
    InvalidHyperparameter {
        name: String,
        value: f64,
        reason: String,
    },

    #[error("Shape mismatch for parameter {index}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        index: usize,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Sweep error: {0}")]
    Sweep(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GradlabError {
    /// Build an [`GradlabError::InvalidHyperparameter`]
    pub fn invalid(name: impl Into<String>, value: f64, reason: impl Into<String>) -> Self {
        Self::InvalidHyperparameter {
            name: name.into(),
            value,
            reason: reason.into(),
        }
    }
}

/// Result type alias for gradlab operations
pub type Result<T> = std::result::Result<T, GradlabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_hyperparameter_message() {
        let err = GradlabError::invalid("lr", -0.1, "must be >= 0");
        assert_eq!(
            err.to_string(),
            "Invalid hyperparameter `lr` = -0.1: must be >= 0"
        );
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = GradlabError::ShapeMismatch {
            index: 2,
            expected: vec![2, 3],
            got: vec![3],
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch for parameter 2: expected [2, 3], got [3]"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GradlabError = io.into();
        assert!(matches!(err, GradlabError::Io(_)));
    }
}
