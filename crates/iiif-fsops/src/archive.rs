//! Zip extraction into isolated work directories and member listing.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{FsOpsError, FsOpsResult};

/// Base name of an archive with its extension stripped.
///
/// # Errors
///
/// Returns an error when the path has no usable file stem.
pub fn archive_stem(archive: &Path) -> FsOpsResult<String> {
    archive
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| FsOpsError::InvalidInput {
            field: "archive",
            reason: "missing_file_stem",
            value: Some(archive.to_string_lossy().into_owned()),
        })
}

/// Extract every entry of a zip archive below `target`, returning the number of files
/// written.
///
/// # Errors
///
/// Returns an error when the archive cannot be opened or decoded, when an entry path
/// would escape `target`, or when writing an entry fails.
pub fn extract_zip(source: &Path, target: &Path) -> FsOpsResult<usize> {
    let file = File::open(source)
        .map_err(|source_err| FsOpsError::io("extract_zip.open", source, source_err))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|source_err| FsOpsError::zip("extract_zip.decode", source, source_err))?;

    fs::create_dir_all(target)
        .map_err(|source_err| FsOpsError::io("extract_zip.create_target", target, source_err))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|source_err| FsOpsError::zip("extract_zip.read_entry", source, source_err))?;
        let entry_path = sanitize_archive_path(entry.name())?;
        let destination = target.join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&destination).map_err(|source_err| {
                FsOpsError::io("extract_zip.create_dir", &destination, source_err)
            })?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source_err| {
                FsOpsError::io("extract_zip.create_parent", parent, source_err)
            })?;
        }

        let mut output = File::create(&destination).map_err(|source_err| {
            FsOpsError::io("extract_zip.create_file", &destination, source_err)
        })?;
        io::copy(&mut entry, &mut output)
            .map_err(|source_err| FsOpsError::io("extract_zip.copy", &destination, source_err))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            let perms = fs::Permissions::from_mode(mode | 0o600);
            fs::set_permissions(&destination, perms).map_err(|source_err| {
                FsOpsError::io("extract_zip.set_permissions", &destination, source_err)
            })?;
        }
        written += 1;
    }

    Ok(written)
}

/// Normalise an entry name, rejecting absolute paths and parent references.
///
/// # Errors
///
/// Returns [`FsOpsError::InvalidInput`] for names that would escape the extraction root.
pub fn sanitize_archive_path(entry: &str) -> FsOpsResult<PathBuf> {
    let path = Path::new(entry);
    if path.is_absolute() {
        return Err(FsOpsError::InvalidInput {
            field: "archive_entry",
            reason: "absolute_path",
            value: Some(entry.to_string()),
        });
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            _ => {
                return Err(FsOpsError::InvalidInput {
                    field: "archive_entry",
                    reason: "invalid_segment",
                    value: Some(entry.to_string()),
                });
            }
        }
    }

    Ok(sanitized)
}

/// Regular files directly inside `dir`, sorted by file name.
///
/// # Errors
///
/// Returns an error when the directory cannot be traversed.
pub fn list_members(dir: &Path) -> FsOpsResult<Vec<PathBuf>> {
    let mut members = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| FsOpsError::walkdir("list_members", dir, err))?;
        if entry.file_type().is_file() {
            members.push(entry.into_path());
        }
    }
    Ok(members)
}
