//! Error types for model fitting and inference.

use thiserror::Error;

/// Errors raised while fitting or rebuilding a model.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// No training rows were supplied.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Design matrix rows and target length disagree.
    #[error("Length mismatch: {rows} rows but {targets} targets")]
    LengthMismatch { rows: usize, targets: usize },

    /// A target value is NaN or infinite.
    #[error("Non-finite target at row {row}: {value}")]
    NonFiniteTarget { row: usize, value: f64 },

    /// A hyperparameter is out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input width does not match the width seen during fit.
    #[error("Feature mismatch: expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    /// Persisted parameters are internally inconsistent.
    #[error("Corrupt model parameters: {0}")]
    CorruptParams(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::LengthMismatch {
            rows: 3,
            targets: 2,
        };
        assert_eq!(err.to_string(), "Length mismatch: 3 rows but 2 targets");

        let err = ModelError::NonFiniteTarget {
            row: 4,
            value: f64::NAN,
        };
        assert!(err.to_string().contains("row 4"));
    }
}
