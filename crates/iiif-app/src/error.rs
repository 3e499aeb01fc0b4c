//! # Design
//!
//! - Centralize bootstrap errors for the watcher process.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: iiif_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: iiif_telemetry::TelemetryError,
    },
    /// The watcher could not start or stopped with an error.
    #[error("watcher operation failed")]
    Watch {
        /// Operation identifier.
        operation: &'static str,
        /// Source watcher error.
        source: iiif_watcher::WatchError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: iiif_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: iiif_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn watch(operation: &'static str, source: iiif_watcher::WatchError) -> Self {
        Self::Watch { operation, source }
    }
}
