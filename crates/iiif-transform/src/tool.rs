//! Runner for external command-line tools.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{TransformError, TransformResult};

/// A program plus its argument vector. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

/// Captured result of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl ToolCommand {
    /// Start a command for `program`.
    #[must_use]
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Program to run.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments in order.
    #[must_use]
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Space-joined command line for logs and errors.
    #[must_use]
    pub fn render(&self) -> String {
        let mut rendered = self.program.display().to_string();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        rendered
    }

    /// Run to completion and capture its output.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::ToolSpawn`] when the process cannot start and
    /// [`TransformError::Tool`] when it exits unsuccessfully.
    pub fn run(&self) -> TransformResult<ToolOutput> {
        let command = self.render();
        info!(command = %command, "running tool");
        let started = Instant::now();
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|source| TransformError::ToolSpawn {
                command: command.clone(),
                source,
            })?;
        let elapsed = started.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            warn!(
                command = %command,
                status = ?output.status.code(),
                elapsed_ms = elapsed.as_millis(),
                stderr = %stderr,
                "tool failed"
            );
            return Err(TransformError::Tool {
                command,
                status: output.status.code(),
                stderr,
            });
        }
        debug!(command = %command, elapsed_ms = elapsed.as_millis(), "tool finished");
        Ok(ToolOutput {
            stdout,
            stderr,
            elapsed,
        })
    }
}
