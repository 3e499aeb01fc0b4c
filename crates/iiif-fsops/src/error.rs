//! # Design
//!
//! - Provide structured, constant-message errors for file and path utilities.
//! - Capture operation context (paths, fields, attempts) so failures are reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem utilities.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the file and path utilities.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory traversal failures.
    #[error("fsops walkdir failure")]
    Walkdir {
        /// Operation that triggered the traversal failure.
        operation: &'static str,
        /// Path involved in the traversal failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Zip archive failures.
    #[error("fsops zip failure")]
    Zip {
        /// Operation that triggered the archive failure.
        operation: &'static str,
        /// Path involved in the archive failure.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// Sidecar documents that could not be parsed.
    #[error("fsops xml failure")]
    Xml {
        /// Operation that triggered the parse failure.
        operation: &'static str,
        /// Sidecar path when the document came from disk.
        path: Option<PathBuf>,
        /// Underlying XML error.
        source: quick_xml::Error,
    },
    /// Input validation failures.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A required metadata field was absent from the sidecar.
    #[error("fsops missing metadata field")]
    MissingField {
        /// Element name that was not found.
        field: &'static str,
        /// Sidecar path when the document came from disk.
        path: Option<PathBuf>,
    },
    /// A retried operation failed on every attempt.
    #[error("fsops retries exhausted")]
    RetriesExhausted {
        /// Operation that was retried.
        operation: &'static str,
        /// Path the operation targeted.
        path: PathBuf,
        /// Number of attempts made.
        attempts: u32,
        /// Error returned by the final attempt.
        source: io::Error,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn xml(
        operation: &'static str,
        path: Option<PathBuf>,
        source: quick_xml::Error,
    ) -> Self {
        Self::Xml {
            operation,
            path,
            source,
        }
    }
}
