//! # Design
//!
//! - Constant messages; the command line, paths and exit status live in fields.
//! - Access problems are reported before any process is started.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for encoder operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors produced by the encoder adapter.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The encoder executable could not be located.
    #[error("encoder executable not found")]
    MissingExecutable {
        /// Executable name or path that was looked up.
        executable: PathBuf,
        /// Underlying lookup error.
        source: which::Error,
    },
    /// An input was unreadable or the output directory was not writable.
    #[error("encoder path not accessible")]
    Access {
        /// Check that failed.
        operation: &'static str,
        /// Path that failed the check.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },
    /// Arguments that cannot form a valid invocation.
    #[error("encoder invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// An option profile file could not be read.
    #[error("encoder profile unreadable")]
    Profile {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Profile file path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The encoder process could not be started.
    #[error("encoder spawn failed")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The encoder ran and exited unsuccessfully.
    #[error("encoder exited unsuccessfully")]
    Failed {
        /// Rendered command line.
        command: String,
        /// Exit code, absent when terminated by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

impl CodecError {
    pub(crate) fn access(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Access {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn invalid(field: &'static str, reason: &'static str, value: Option<String>) -> Self {
        Self::InvalidInput {
            field,
            reason,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn failed_carries_command_and_status() {
        let err = CodecError::Failed {
            command: "kdu_compress -i a.tif -o a.jp2".into(),
            status: Some(1),
            stderr: "Kakadu Error".into(),
        };
        assert_eq!(err.to_string(), "encoder exited unsuccessfully");
        assert!(err.source().is_none());
    }

    #[test]
    fn access_preserves_source() {
        let err = CodecError::access("encode.input", "/tmp/a.tif", io::Error::other("denied"));
        assert!(matches!(
            err,
            CodecError::Access {
                operation: "encode.input",
                ..
            }
        ));
        assert!(err.source().is_some());
    }
}
