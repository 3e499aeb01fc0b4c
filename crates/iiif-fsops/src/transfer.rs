//! Copy, rename, retrying move, and tolerant removal of working files.
//!
//! # Design
//! - A vanished source turns a move into a logged no-op rather than an error.
//! - Removing something that is already gone is a logged no-op.
//! - Retries use exponential backoff; the mover is injectable so tests can count attempts.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{FsOpsError, FsOpsResult};

/// Suffix appended to the stem of a preserved original.
pub const COPY_SUFFIX: &str = "-copy";

/// Retry budget for moving delivered artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    /// Delay after the first failed attempt; doubles on each subsequent failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given zero-based failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        2_u32
            .checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// Result of a move request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The source now lives at the destination.
    Moved,
    /// The source did not exist; nothing was changed.
    SourceMissing,
}

/// Result of a removal request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The file was deleted.
    Removed,
    /// The file did not exist.
    Missing,
}

/// Move `source` to `destination`, retrying with backoff.
///
/// # Errors
///
/// Returns [`FsOpsError::RetriesExhausted`] when every attempt fails.
pub fn move_file(
    source: &Path,
    destination: &Path,
    policy: RetryPolicy,
) -> FsOpsResult<MoveOutcome> {
    move_file_with(source, destination, policy, move_path)
}

/// Move using a caller-supplied mover, applying the same retry and no-op rules as
/// [`move_file`].
///
/// # Errors
///
/// Returns [`FsOpsError::RetriesExhausted`] when every attempt fails.
pub fn move_file_with<F>(
    source: &Path,
    destination: &Path,
    policy: RetryPolicy,
    mut mover: F,
) -> FsOpsResult<MoveOutcome>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        if !source.exists() {
            info!(
                source = %source.display(),
                destination = %destination.display(),
                "move source does not exist; skipping"
            );
            return Ok(MoveOutcome::SourceMissing);
        }

        match mover(source, destination) {
            Ok(()) => {
                info!(
                    source = %source.display(),
                    destination = %destination.display(),
                    attempt = attempt + 1,
                    "moved file"
                );
                return Ok(MoveOutcome::Moved);
            }
            Err(err) if attempt + 1 < attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    error = %err,
                    source = %source.display(),
                    destination = %destination.display(),
                    attempt = attempt + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "move failed; retrying"
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => {
                return Err(FsOpsError::RetriesExhausted {
                    operation: "move_file",
                    path: destination.to_path_buf(),
                    attempts,
                    source: err,
                });
            }
        }
    }
}

/// Rename, falling back to copy and delete when the destination is on another device.
///
/// # Errors
///
/// Returns the IO error from the copy or the removal of the source.
pub fn move_path(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(_rename_err) => {
            fs::copy(source, destination)?;
            fs::remove_file(source)
        }
    }
}

/// Delete a file, treating a missing file as success.
///
/// # Errors
///
/// Returns an error for failures other than the file being absent.
pub fn remove_file(path: &Path) -> FsOpsResult<RemoveOutcome> {
    match fs::remove_file(path) {
        Ok(()) => Ok(RemoveOutcome::Removed),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "file does not exist; nothing to remove");
            Ok(RemoveOutcome::Missing)
        }
        Err(err) => Err(FsOpsError::io("remove_file", path, err)),
    }
}

/// Copy `<dir>/<stem><ext>` to `<dir>/<stem>-copy<ext>` and return the copy's path.
///
/// # Errors
///
/// Returns an error when the source has no file name or the copy fails.
pub fn copy_file(source: &Path) -> FsOpsResult<PathBuf> {
    let stem = source.file_stem().ok_or_else(|| FsOpsError::InvalidInput {
        field: "source",
        reason: "missing_file_name",
        value: Some(source.to_string_lossy().into_owned()),
    })?;
    let mut name = OsString::from(stem);
    name.push(COPY_SUFFIX);
    if let Some(extension) = source.extension() {
        name.push(".");
        name.push(extension);
    }
    let copied = source.with_file_name(name);
    fs::copy(source, &copied).map_err(|err| FsOpsError::io("copy_file", &copied, err))?;
    Ok(copied)
}

/// Rename a file within its directory, returning the new path.
///
/// # Errors
///
/// Returns an error when the name is not a single path segment or the rename fails.
pub fn rename_file(current: &Path, new_name: &str) -> FsOpsResult<PathBuf> {
    if new_name.is_empty() || new_name.contains(['/', '\\']) {
        return Err(FsOpsError::InvalidInput {
            field: "new_name",
            reason: "not_a_file_name",
            value: Some(new_name.to_string()),
        });
    }
    let renamed = current.with_file_name(new_name);
    if renamed == current {
        return Ok(renamed);
    }
    fs::rename(current, &renamed).map_err(|err| FsOpsError::io("rename_file", &renamed, err))?;
    Ok(renamed)
}

/// Remove every regular file next to `path` whose name starts with `path`'s file name,
/// including `path` itself. Failures are logged; the number of removed files is returned.
#[must_use]
pub fn remove_prefixed_siblings(path: &Path) -> usize {
    let (Some(parent), Some(prefix)) = (path.parent(), path.file_name()) else {
        return 0;
    };
    let prefix = prefix.to_string_lossy().into_owned();
    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(error = %err, path = %parent.display(), "failed to list copy variants");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(&prefix) {
            continue;
        }
        if !entry.file_type().is_ok_and(|kind| kind.is_file()) {
            continue;
        }
        let candidate = entry.path();
        match fs::remove_file(&candidate) {
            Ok(()) => removed += 1,
            Err(err) => warn!(
                error = %err,
                path = %candidate.display(),
                "failed to remove copy variant"
            ),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    type TestResult<T> = anyhow::Result<T>;

    const NO_DELAY: RetryPolicy = RetryPolicy {
        attempts: 5,
        base_delay: Duration::ZERO,
    };

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(0), Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(40), Duration::MAX);
    }

    #[test]
    fn move_with_missing_source_is_a_no_op() -> TestResult<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("absent.jp2");
        let destination = temp.path().join("out").join("absent.jp2");
        let outcome = move_file(&source, &destination, NO_DELAY)?;
        assert_eq!(outcome, MoveOutcome::SourceMissing);
        assert!(!destination.exists());
        assert!(!temp.path().join("out").exists());
        Ok(())
    }

    #[test]
    fn move_gives_up_after_five_attempts() -> TestResult<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("encoded.jp2");
        fs::write(&source, b"jp2")?;
        let calls = Cell::new(0_u32);
        let err = move_file_with(&source, &temp.path().join("locked.jp2"), NO_DELAY, |_, _| {
            calls.set(calls.get() + 1);
            Err(io::Error::new(io::ErrorKind::ResourceBusy, "locked"))
        })
        .expect_err("locked destination must surface");
        assert_eq!(calls.get(), 5);
        assert!(matches!(
            err,
            FsOpsError::RetriesExhausted { attempts: 5, .. }
        ));
        assert!(source.exists());
        Ok(())
    }

    #[test]
    fn move_recovers_from_transient_failures() -> TestResult<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("encoded.jp2");
        let destination = temp.path().join("delivered.jp2");
        fs::write(&source, b"jp2")?;
        let calls = Cell::new(0_u32);
        let outcome = move_file_with(&source, &destination, NO_DELAY, |from, to| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(io::Error::other("storage unavailable"))
            } else {
                move_path(from, to)
            }
        })?;
        assert_eq!(outcome, MoveOutcome::Moved);
        assert_eq!(calls.get(), 3);
        assert_eq!(fs::read(&destination)?, b"jp2");
        assert!(!source.exists());
        Ok(())
    }

    #[test]
    fn remove_missing_file_is_a_no_op() -> TestResult<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("gone.tif");
        assert_eq!(remove_file(&path)?, RemoveOutcome::Missing);
        fs::write(&path, b"x")?;
        assert_eq!(remove_file(&path)?, RemoveOutcome::Removed);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn copy_file_tags_the_stem() -> TestResult<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("ab12.tif");
        fs::write(&source, b"pixels")?;
        let copied = copy_file(&source)?;
        assert_eq!(copied, temp.path().join("ab12-copy.tif"));
        assert_eq!(fs::read(&copied)?, b"pixels");
        assert!(source.exists());
        Ok(())
    }

    #[test]
    fn rename_file_is_a_no_op_for_identical_names() -> TestResult<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("ab12.tif");
        fs::write(&source, b"pixels")?;
        assert_eq!(rename_file(&source, "ab12.tif")?, source);
        let renamed = rename_file(&source, "cd34.tif")?;
        assert!(renamed.exists());
        assert!(!source.exists());
        assert!(rename_file(&renamed, "../escape.tif").is_err());
        Ok(())
    }

    #[test]
    fn prefixed_siblings_are_removed() -> TestResult<()> {
        let temp = TempDir::new()?;
        let copy = temp.path().join("ab12-copy.tif");
        fs::write(&copy, b"a")?;
        fs::write(temp.path().join("ab12-copy.tif_original"), b"b")?;
        fs::write(temp.path().join("ab12.tif"), b"c")?;
        fs::create_dir(temp.path().join("ab12-copy.tif.d"))?;

        assert_eq!(remove_prefixed_siblings(&copy), 2);
        assert!(!copy.exists());
        assert!(temp.path().join("ab12.tif").exists());
        assert!(temp.path().join("ab12-copy.tif.d").exists());
        Ok(())
    }
}
