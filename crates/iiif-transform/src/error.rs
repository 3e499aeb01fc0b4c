//! # Design
//!
//! - One error type for the whole chain; the failing step is logged by the pipeline.
//! - External tool failures keep the rendered command, exit status and stderr.

use std::io;
use std::path::PathBuf;

use iiif_codec::CodecError;
use iiif_fsops::FsOpsError;
use thiserror::Error;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors produced while transforming an image.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A file utility failed.
    #[error("transform file operation failed")]
    FsOps {
        /// Underlying file utility error.
        #[from]
        source: FsOpsError,
    },
    /// The encoder failed.
    #[error("transform encode failed")]
    Codec {
        /// Underlying encoder error.
        #[from]
        source: CodecError,
    },
    /// Decoding, resizing or re-encoding pixels failed.
    #[error("transform image failure")]
    Image {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Image path.
        path: PathBuf,
        /// Underlying image error.
        source: image::ImageError,
    },
    /// An external tool exited unsuccessfully.
    #[error("transform tool failed")]
    Tool {
        /// Rendered command line.
        command: String,
        /// Exit code, absent when terminated by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
    /// An external tool could not be started.
    #[error("transform tool spawn failed")]
    ToolSpawn {
        /// Rendered command line.
        command: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A tool reported success without producing its output.
    #[error("transform tool output missing")]
    MissingOutput {
        /// Operation that expected the output.
        operation: &'static str,
        /// Expected output path.
        path: PathBuf,
    },
    /// Filesystem failures outside the file utilities.
    #[error("transform io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A step ran before the state it depends on was populated.
    #[error("transform state missing")]
    MissingState {
        /// State field that was absent.
        field: &'static str,
    },
}

impl TransformError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: image::ImageError,
    ) -> Self {
        Self::Image {
            operation,
            path: path.into(),
            source,
        }
    }
}
