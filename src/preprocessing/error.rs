//! Error types for preprocessing operations.

use thiserror::Error;

/// Error type for preprocessing operations.
#[derive(Debug, Error)]
pub enum PreprocessingError {
    /// Shape mismatch between expected and actual dimensions.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape { expected: String, got: String },
    /// A column required by a transformer is absent from the input frame.
    #[error("Missing column: {0}")]
    MissingColumn(String),
    /// A column has the wrong kind for the transformer applied to it.
    #[error("Column '{column}' must be {expected}, got {got}")]
    ColumnType {
        column: String,
        expected: String,
        got: String,
    },
    /// A category not seen during fit, with unknown handling set to error.
    #[error("Unknown category {value:?} in column '{column}'")]
    UnknownCategory {
        column: String,
        value: Option<String>,
    },
    /// Invalid hyperparameter value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    IoError(String),
    /// Empty data provided where non-empty was required.
    #[error("Empty data: {0}")]
    EmptyData(String),
    /// Feature dimension mismatch.
    #[error("Feature mismatch: expected {expected_features} features, got {got_features}")]
    FeatureMismatch {
        expected_features: usize,
        got_features: usize,
    },
}

impl From<std::io::Error> for PreprocessingError {
    fn from(err: std::io::Error) -> Self {
        PreprocessingError::IoError(err.to_string())
    }
}

impl From<bincode::Error> for PreprocessingError {
    fn from(err: bincode::Error) -> Self {
        PreprocessingError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_missing_column() {
        let err = PreprocessingError::MissingColumn("seller_type".to_string());
        assert_eq!(err.to_string(), "Missing column: seller_type");
    }

    #[test]
    fn test_error_display_column_type() {
        let err = PreprocessingError::ColumnType {
            column: "year".to_string(),
            expected: "categorical".to_string(),
            got: "numeric".to_string(),
        };
        assert!(err.to_string().contains("'year' must be categorical"));
    }

    #[test]
    fn test_error_display_unknown_category() {
        let err = PreprocessingError::UnknownCategory {
            column: "name".to_string(),
            value: Some("Yamaha RX 100".to_string()),
        };
        assert!(err.to_string().contains("Yamaha RX 100"));
    }

    #[test]
    fn test_error_display_feature_mismatch() {
        let err = PreprocessingError::FeatureMismatch {
            expected_features: 5,
            got_features: 3,
        };
        assert!(err.to_string().contains("Feature mismatch"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: PreprocessingError = io_err.into();
        assert!(matches!(err, PreprocessingError::IoError(_)));
    }

    #[test]
    fn test_error_from_bincode_error() {
        let bad_bytes: &[u8] = &[0xff, 0xff, 0xff, 0xff];
        let bincode_result: Result<String, bincode::Error> = bincode::deserialize(bad_bytes);
        if let Err(e) = bincode_result {
            let err: PreprocessingError = e.into();
            assert!(matches!(err, PreprocessingError::SerializationError(_)));
        }
    }
}
