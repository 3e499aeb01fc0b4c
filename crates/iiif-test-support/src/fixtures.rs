//! Test fixtures: archive builders, sample file bytes and fake executables.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;

/// Minimal little-endian TIFF header; enough for signature probing.
pub const TIFF_LE_HEADER: &[u8] = b"II*\0\x08\0\0\0\0\0";

/// Render a metadata sidecar carrying the given identifiers.
#[must_use]
pub fn sidecar_xml(owner_id: &str, fragment_id: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <mhs:Sidecar xmlns:mhs=\"https://zeticon.mediahaven.com/metadata/20.1/mhs/\" \
         version=\"20.1\">\n  <mhs:Dynamic>\n    <CP_id>{owner_id}</CP_id>\n  </mhs:Dynamic>\n  \
         <mhs:Internal>\n    <FragmentId>{fragment_id}</FragmentId>\n  </mhs:Internal>\n\
         </mhs:Sidecar>\n"
    )
}

/// Write a zip archive containing the given `(name, contents)` entries.
///
/// # Errors
///
/// Returns an error if the archive cannot be created or written.
pub fn write_zip_archive(archive: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(archive)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    for (path, contents) in entries {
        zip.start_file(*path, options)?;
        zip.write_all(contents)?;
    }
    zip.finish()?;
    Ok(())
}

/// Write an archive holding one TIFF essence and one sidecar, as deposited upstream.
///
/// # Errors
///
/// Returns an error if the archive cannot be created or written.
pub fn write_ingest_archive(archive: &Path, owner_id: &str, fragment_id: &str) -> Result<()> {
    let sidecar = sidecar_xml(owner_id, fragment_id);
    write_zip_archive(
        archive,
        &[
            ("essence.tif", TIFF_LE_HEADER),
            ("sidecar.xml", sidecar.as_bytes()),
        ],
    )
}

/// Create an executable shell script named `name` inside `dir` running `body`.
///
/// # Errors
///
/// Returns an error if the script cannot be written or made executable.
#[cfg(unix)]
pub fn fake_executable(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}
