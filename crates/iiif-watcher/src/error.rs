//! # Design
//!
//! - Unit-level failures are values carried by the unit outcome; the watch loop never
//!   stops because of one.
//! - Startup problems (missing sequencer, unwatchable root) surface from the service.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use iiif_fsops::FsOpsError;
use thiserror::Error;

/// Result type for watcher operations.
pub type WatchResult<T> = Result<T, WatchError>;

/// Errors produced by the watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    /// A file utility failed.
    #[error("watcher file operation failed")]
    FsOps {
        /// Underlying file utility error.
        #[from]
        source: FsOpsError,
    },
    /// The unpacked archive lacks a member with the required format.
    #[error("archive classification failed")]
    Classification {
        /// Role that could not be filled (`essence` or `sidecar`).
        role: &'static str,
        /// Format identifier the role requires.
        expected: &'static str,
        /// Work directory that was searched.
        work_dir: PathBuf,
    },
    /// The filesystem notification backend failed.
    #[error("watcher notification failure")]
    Notify {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path being watched.
        path: PathBuf,
        /// Underlying notify error.
        source: notify::Error,
    },
    /// The sequencer process could not be started or awaited.
    #[error("sequencer process failure")]
    Spawn {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Sequencer program.
        program: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The sequencer exited unsuccessfully.
    #[error("sequencer exited unsuccessfully")]
    SequencerFailed {
        /// Sequencer program.
        program: PathBuf,
        /// Exit code, absent when terminated by a signal.
        status: Option<i32>,
    },
    /// The sequencer exceeded its time limit and was killed.
    #[error("sequencer timed out")]
    SequencerTimeout {
        /// Sequencer program.
        program: PathBuf,
        /// Limit that was exceeded.
        timeout: Duration,
    },
    /// A required executable is not installed.
    #[error("required executable not found")]
    MissingDependency {
        /// Executable that was looked up.
        program: PathBuf,
        /// Underlying lookup error.
        source: which::Error,
    },
    /// A blocking task panicked or was cancelled.
    #[error("watcher task failed")]
    Task {
        /// Operation the task performed.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl WatchError {
    pub(crate) fn spawn(operation: &'static str, program: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Spawn {
            operation,
            program: program.into(),
            source,
        }
    }
}
