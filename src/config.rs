//! Training configuration.
//!
//! Every section has a `Default`, and JSON files may set any subset of
//! fields. Command-line flags are applied on top of the loaded values.

use crate::dataset::{DatasetError, LoaderConfig};
use crate::model::{ForestConfig, ModelError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading or checking a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid forest configuration: {0}")]
    Forest(#[from] ModelError),

    #[error("Invalid loader configuration: {0}")]
    Loader(#[from] DatasetError),
}

/// Everything the training entry point needs besides file paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Random forest hyperparameters.
    pub forest: ForestConfig,
    /// CSV parsing and cleaning.
    pub loader: LoaderConfig,
}

impl TrainingConfig {
    /// Read a JSON configuration file. Absent fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// [`from_json_file`](Self::from_json_file) when a path is given, defaults otherwise.
    pub fn from_optional_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.forest.validate()?;
        self.loader.validate()?;
        Ok(())
    }
}
