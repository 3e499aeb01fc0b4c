//! Delegation of a work unit to the sequencer process.
//!
//! # Design
//! - The sequencer runs as a child process so a crash in pixel work cannot take down
//!   the watch loop.
//! - The toolchain binary directory is prepended to the child's `PATH`.
//! - An optional timeout kills the child; the child is also killed if the unit is dropped.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use iiif_config::SequencerConfig;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{WatchError, WatchResult};

/// Arguments of one sequencer run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencerInvocation {
    /// Essence file to transform.
    pub essence: PathBuf,
    /// Export destination of the encoded image.
    pub destination: PathBuf,
    /// Size class forwarded as `--max_size`.
    pub size_class: Option<String>,
    /// Encoder profile forwarded as `--profile`.
    pub profile: Option<String>,
}

impl SequencerInvocation {
    /// Per-unit command line arguments.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("--file_path"),
            self.essence.clone().into_os_string(),
            OsString::from("--destination"),
            self.destination.clone().into_os_string(),
        ];
        if let Some(size_class) = &self.size_class {
            args.push(OsString::from("--max_size"));
            args.push(OsString::from(size_class));
        }
        if let Some(profile) = &self.profile {
            args.push(OsString::from("--profile"));
            args.push(OsString::from(profile));
        }
        args
    }
}

/// Runs the sequencer for a work unit.
#[async_trait]
pub trait SequencerLauncher: Send + Sync {
    /// Run the sequencer to completion.
    ///
    /// # Errors
    ///
    /// Returns an error when the sequencer cannot be started, exits unsuccessfully or
    /// exceeds its time limit.
    async fn launch(&self, invocation: &SequencerInvocation) -> WatchResult<()>;
}

/// [`SequencerLauncher`] spawning the `transform-file` executable.
#[derive(Clone, Debug)]
pub struct ProcessLauncher {
    program: PathBuf,
    base_args: Vec<String>,
    toolchain_bin_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ProcessLauncher {
    /// Build a launcher for `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            toolchain_bin_dir: None,
            timeout: None,
        }
    }

    /// Build from configuration.
    #[must_use]
    pub fn from_config(config: &SequencerConfig, timeout: Option<Duration>) -> Self {
        Self {
            program: config.program.clone(),
            base_args: config.args.clone(),
            toolchain_bin_dir: config.toolchain_bin_dir.clone(),
            timeout,
        }
    }

    /// Prepend `dir` to the child's `PATH`.
    #[must_use]
    pub fn with_toolchain_bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.toolchain_bin_dir = Some(dir.into());
        self
    }

    /// Kill the child after `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sequencer program.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// `PATH` for the child: the toolchain directory followed by the inherited `PATH`.
    #[must_use]
    pub fn search_path(&self) -> Option<OsString> {
        let inherited = env::var_os("PATH");
        let Some(bin_dir) = self.toolchain_bin_dir.as_ref() else {
            return inherited;
        };
        let mut entries = vec![bin_dir.clone()];
        if let Some(inherited) = inherited.as_ref() {
            entries.extend(env::split_paths(inherited));
        }
        match env::join_paths(entries) {
            Ok(joined) => Some(joined),
            Err(err) => {
                warn!(error = %err, bin_dir = %bin_dir.display(), "toolchain directory not usable in PATH");
                inherited
            }
        }
    }

    /// Check that the program can be found on the child's `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::MissingDependency`] when it cannot be found.
    pub fn resolve(&self) -> WatchResult<PathBuf> {
        let cwd = env::current_dir().unwrap_or_default();
        which::which_in(&self.program, self.search_path(), cwd).map_err(|source| {
            WatchError::MissingDependency {
                program: self.program.clone(),
                source,
            }
        })
    }
}

#[async_trait]
impl SequencerLauncher for ProcessLauncher {
    async fn launch(&self, invocation: &SequencerInvocation) -> WatchResult<()> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .args(invocation.args())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(path) = self.search_path() {
            command.env("PATH", path);
        }

        info!(
            program = %self.program.display(),
            essence = %invocation.essence.display(),
            destination = %invocation.destination.display(),
            "launching sequencer"
        );
        let mut child = command
            .spawn()
            .map_err(|source| WatchError::spawn("launch.spawn", &self.program, source))?;

        let status = match self.timeout {
            Some(limit) => {
                if let Ok(waited) = tokio::time::timeout(limit, child.wait()).await {
                    waited
                } else {
                    if let Err(err) = child.kill().await {
                        warn!(error = %err, "failed to kill timed out sequencer");
                    }
                    return Err(WatchError::SequencerTimeout {
                        program: self.program.clone(),
                        timeout: limit,
                    });
                }
            }
            None => child.wait().await,
        }
        .map_err(|source| WatchError::spawn("launch.wait", &self.program, source))?;

        if status.success() {
            Ok(())
        } else {
            Err(WatchError::SequencerFailed {
                program: self.program.clone(),
                status: status.code(),
            })
        }
    }
}
