//! Kakadu `kdu_compress` process wrapper.
//!
//! # Design
//! - The executable is resolved once at construction so a missing encoder is a startup error.
//! - Inputs must be readable and the output directory writable before the process starts.
//! - Invoked by argument vector; no shell, no retry.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::{CodecError, CodecResult};

/// Encodes one or more raster inputs into a JPEG 2000 file.
pub trait Encoder: Send + Sync {
    /// Encode `inputs` into `output` using `options`.
    ///
    /// # Errors
    ///
    /// Returns an error when preconditions fail or the encoder reports failure.
    fn encode(&self, inputs: &[PathBuf], output: &Path, options: &[String]) -> CodecResult<()>;
}

/// [`Encoder`] backed by the `kdu_compress` executable.
#[derive(Debug, Clone)]
pub struct KakaduEncoder {
    executable: PathBuf,
}

impl KakaduEncoder {
    /// Resolve `executable` on `PATH` (or as given when it is a path).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MissingExecutable`] when it cannot be found.
    pub fn new(executable: impl AsRef<Path>) -> CodecResult<Self> {
        let requested = executable.as_ref();
        let executable = which::which(requested).map_err(|source| CodecError::MissingExecutable {
            executable: requested.to_path_buf(),
            source,
        })?;
        debug!(executable = %executable.display(), "resolved encoder executable");
        Ok(Self { executable })
    }

    /// Resolved executable path.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Argument vector passed to the executable.
    #[must_use]
    pub fn arguments(inputs: &[PathBuf], output: &Path, options: &[String]) -> Vec<OsString> {
        let mut joined = OsString::new();
        for (index, input) in inputs.iter().enumerate() {
            if index > 0 {
                joined.push(",");
            }
            joined.push(input.as_os_str());
        }
        let mut args = vec![
            OsString::from("-i"),
            joined,
            OsString::from("-o"),
            output.as_os_str().to_os_string(),
        ];
        args.extend(options.iter().map(OsString::from));
        args
    }

    fn render_command(&self, args: &[OsString]) -> String {
        let mut rendered = self.executable.display().to_string();
        for arg in args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        rendered
    }
}

impl Encoder for KakaduEncoder {
    fn encode(&self, inputs: &[PathBuf], output: &Path, options: &[String]) -> CodecResult<()> {
        if inputs.is_empty() {
            return Err(CodecError::invalid("inputs", "empty", None));
        }
        if output.as_os_str().is_empty() {
            return Err(CodecError::invalid("output", "empty", None));
        }
        for input in inputs {
            check_readable(input)?;
        }
        let output_dir = output
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        check_writable_dir(output_dir)?;

        let args = Self::arguments(inputs, output, options);
        let command = self.render_command(&args);
        info!(command = %command, "running encoder");

        let started = Instant::now();
        let result = Command::new(&self.executable)
            .args(&args)
            .output()
            .map_err(|source| CodecError::Spawn {
                command: command.clone(),
                source,
            })?;
        let elapsed_ms = started.elapsed().as_millis();

        if result.status.success() {
            info!(output = %output.display(), elapsed_ms, "encoder finished");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            warn!(
                command = %command,
                status = ?result.status.code(),
                elapsed_ms,
                stderr = %stderr,
                "encoder failed"
            );
            Err(CodecError::Failed {
                command,
                status: result.status.code(),
                stderr,
            })
        }
    }
}

#[cfg(unix)]
fn check_readable(path: &Path) -> CodecResult<()> {
    use nix::unistd::{AccessFlags, access};

    access(path, AccessFlags::R_OK)
        .map_err(|errno| CodecError::access("encode.input_readable", path, errno.into()))
}

#[cfg(unix)]
fn check_writable_dir(path: &Path) -> CodecResult<()> {
    use nix::unistd::{AccessFlags, access};

    access(path, AccessFlags::W_OK | AccessFlags::X_OK)
        .map_err(|errno| CodecError::access("encode.output_writable", path, errno.into()))
}

#[cfg(not(unix))]
fn check_readable(path: &Path) -> CodecResult<()> {
    std::fs::File::open(path)
        .map(drop)
        .map_err(|source| CodecError::access("encode.input_readable", path, source))
}

#[cfg(not(unix))]
fn check_writable_dir(path: &Path) -> CodecResult<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|source| CodecError::access("encode.output_writable", path, source))?;
    if metadata.permissions().readonly() {
        return Err(CodecError::access(
            "encode.output_writable",
            path,
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        ));
    }
    Ok(())
}
