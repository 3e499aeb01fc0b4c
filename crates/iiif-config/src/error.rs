//! Error types for configuration loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("configuration io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// File involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// YAML configuration could not be decoded.
    #[error("invalid yaml configuration")]
    Yaml {
        /// File that failed to decode.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
    /// JSON configuration could not be decoded.
    #[error("invalid json configuration")]
    Json {
        /// File that failed to decode.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// A field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section containing the field.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &'static str,
        field: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::InvalidField {
            section,
            field,
            reason,
            value,
        }
    }
}
