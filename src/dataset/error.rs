//! Error types for loading and summarizing listing data.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or describing a listings table.
///
/// Bad rows never show up here; they are dropped by the loader. These
/// variants describe problems with the input as a whole.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The input file does not exist.
    #[error("Dataset file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// A required column is absent from the header row.
    #[error("Required column '{0}' not found in dataset header")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The cleaned table has no rows.
    #[error("Dataset has no usable listings")]
    Empty,

    /// Loader or summary settings are out of range.
    #[error("Invalid dataset configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_resource() {
        let err = DatasetError::MissingFile(PathBuf::from("data/BIKE_DETAILS.csv"));
        assert!(err.to_string().contains("data/BIKE_DETAILS.csv"));

        let err = DatasetError::MissingColumn("ex_showroom_price".to_string());
        assert!(err.to_string().contains("'ex_showroom_price'"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: DatasetError = io.into();
        assert!(matches!(err, DatasetError::Io(_)));
    }
}
