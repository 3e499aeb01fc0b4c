//! Sidecar identifier extraction and export destination derivation.
//!
//! # Design
//! - Destinations are recomputed from sidecar content and visibility on every run.
//! - Element lookup is a descendant search by local name, so namespace prefixes do not matter.
//! - Identifiers become path segments, so separators and parent references are rejected.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{FsOpsError, FsOpsResult};

/// Element holding the owner (content partner) identifier.
pub const OWNER_ID_ELEMENT: &str = "CP_id";
/// Element holding the fragment identifier.
pub const FRAGMENT_ID_ELEMENT: &str = "FragmentId";

const SHARD_LEN: usize = 2;

/// Access classification of an ingested archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    /// Published to the open image tree.
    Public,
    /// Restricted to authorised consumers.
    Restricted,
}

impl Visibility {
    /// Classify from the directory the archive was found in.
    ///
    /// Any occurrence of `public` in the path makes the archive public.
    #[must_use]
    pub fn from_source_dir(dir: &Path) -> Self {
        if dir.to_string_lossy().contains("public") {
            Self::Public
        } else {
            Self::Restricted
        }
    }

    /// Path segment used in the export tree.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Restricted => "restricted",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers read from a metadata sidecar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SidecarIds {
    /// Owner or collection identifier (`CP_id`).
    pub owner_id: String,
    /// Fragment identifier used as the output filename stem.
    pub fragment_id: String,
}

impl SidecarIds {
    /// Parse a sidecar document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, is not well-formed, or lacks either
    /// identifier.
    pub fn from_path(path: &Path) -> FsOpsResult<Self> {
        let document =
            fs::read_to_string(path).map_err(|err| FsOpsError::io("sidecar.read", path, err))?;
        Self::parse(&document, Some(path))
    }

    /// Parse a sidecar document held in memory.
    ///
    /// # Errors
    ///
    /// Returns an error when the document is not well-formed or lacks either identifier.
    pub fn from_xml(document: &str) -> FsOpsResult<Self> {
        Self::parse(document, None)
    }

    fn parse(document: &str, origin: Option<&Path>) -> FsOpsResult<Self> {
        let mut reader = Reader::from_str(document);
        reader.config_mut().trim_text(true);

        let mut owner_id: Option<String> = None;
        let mut fragment_id: Option<String> = None;
        let mut capturing: Option<&'static str> = None;
        let mut text = String::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|err| FsOpsError::xml("sidecar.parse", origin.map(Path::to_path_buf), err))?;
            match event {
                Event::Start(start) if capturing.is_none() => {
                    let name = start.local_name();
                    capturing = match name.as_ref() {
                        b"CP_id" if owner_id.is_none() => Some(OWNER_ID_ELEMENT),
                        b"FragmentId" if fragment_id.is_none() => Some(FRAGMENT_ID_ELEMENT),
                        _ => None,
                    };
                    text.clear();
                }
                Event::Text(chunk) if capturing.is_some() => {
                    let value = chunk.unescape().map_err(|err| {
                        FsOpsError::xml("sidecar.unescape", origin.map(Path::to_path_buf), err)
                    })?;
                    text.push_str(&value);
                }
                Event::CData(chunk) if capturing.is_some() => {
                    text.push_str(&String::from_utf8_lossy(&chunk.into_inner()));
                }
                Event::End(end) => {
                    if let Some(field) = capturing
                        && end.local_name().as_ref() == field.as_bytes()
                    {
                        let value = text.trim().to_string();
                        if !value.is_empty() {
                            if field == OWNER_ID_ELEMENT {
                                owner_id = Some(value);
                            } else {
                                fragment_id = Some(value);
                            }
                        }
                        capturing = None;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            if owner_id.is_some() && fragment_id.is_some() {
                break;
            }
        }

        let owner_id = owner_id.ok_or_else(|| FsOpsError::MissingField {
            field: OWNER_ID_ELEMENT,
            path: origin.map(Path::to_path_buf),
        })?;
        let fragment_id = fragment_id.ok_or_else(|| FsOpsError::MissingField {
            field: FRAGMENT_ID_ELEMENT,
            path: origin.map(Path::to_path_buf),
        })?;
        ensure_path_segment(OWNER_ID_ELEMENT, &owner_id)?;
        ensure_path_segment(FRAGMENT_ID_ELEMENT, &fragment_id)?;

        Ok(Self {
            owner_id,
            fragment_id,
        })
    }
}

/// Fully described export location for one encoded image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Destination {
    root: PathBuf,
    visibility: Visibility,
    ids: SidecarIds,
    extension: String,
}

impl Destination {
    /// Describe the export location for the given identifiers.
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        visibility: Visibility,
        ids: SidecarIds,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            visibility,
            ids,
            extension: extension.into(),
        }
    }

    /// First two characters of the fragment identifier.
    #[must_use]
    pub fn shard(&self) -> String {
        self.ids.fragment_id.chars().take(SHARD_LEN).collect()
    }

    /// Visibility segment of the destination.
    #[must_use]
    pub const fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Identifiers the destination was derived from.
    #[must_use]
    pub const fn ids(&self) -> &SidecarIds {
        &self.ids
    }

    /// `<root>/<visibility>/<owner>/<shard>/<fragment>.<ext>`.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.root
            .join(self.visibility.as_str())
            .join(&self.ids.owner_id)
            .join(self.shard())
            .join(format!("{}.{}", self.ids.fragment_id, self.extension))
    }
}

fn ensure_path_segment(field: &'static str, value: &str) -> FsOpsResult<()> {
    if value.contains(['/', '\\']) {
        return Err(FsOpsError::InvalidInput {
            field,
            reason: "path_separator",
            value: Some(value.to_string()),
        });
    }
    if value == "." || value == ".." {
        return Err(FsOpsError::InvalidInput {
            field,
            reason: "relative_segment",
            value: Some(value.to_string()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iiif_test_support::fixtures::sidecar_xml;
    use tempfile::TempDir;

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn public_destination_matches_export_layout() {
        let ids = SidecarIds {
            owner_id: "OR-rf5kf25".into(),
            fragment_id: "abc123xyz".into(),
        };
        let destination = Destination::new("/export/images", Visibility::Public, ids, "jp2");
        assert_eq!(destination.shard(), "ab");
        assert_eq!(
            destination.path(),
            PathBuf::from("/export/images/public/OR-rf5kf25/ab/abc123xyz.jp2")
        );
    }

    #[test]
    fn visibility_is_a_substring_test() {
        assert_eq!(
            Visibility::from_source_dir(Path::new("/export/home/viaa/pub/public/batch")),
            Visibility::Public
        );
        assert_eq!(
            Visibility::from_source_dir(Path::new("/srv/republication")),
            Visibility::Public
        );
        assert_eq!(
            Visibility::from_source_dir(Path::new("/export/home/viaa/pub/restricted")),
            Visibility::Restricted
        );
    }

    #[test]
    fn sidecar_fields_are_found_at_any_depth() -> TestResult<()> {
        let document = r#"<?xml version="1.0" encoding="UTF-8"?>
<mhs:Sidecar xmlns:mhs="https://zeticon.mediahaven.com/metadata/20.1/mhs/">
  <mhs:Dynamic>
    <CP_id> OR-rf5kf25 </CP_id>
    <nested><FragmentId>abc&amp;123</FragmentId></nested>
  </mhs:Dynamic>
</mhs:Sidecar>"#;
        let ids = SidecarIds::from_xml(document)?;
        assert_eq!(ids.owner_id, "OR-rf5kf25");
        assert_eq!(ids.fragment_id, "abc&123");
        Ok(())
    }

    #[test]
    fn first_occurrence_wins() -> TestResult<()> {
        let document = "<?xml version=\"1.0\"?><r><CP_id>OR-1</CP_id><CP_id>OR-2</CP_id>\
                        <FragmentId>frag</FragmentId></r>";
        let ids = SidecarIds::from_xml(document)?;
        assert_eq!(ids.owner_id, "OR-1");
        Ok(())
    }

    #[test]
    fn missing_or_empty_fields_are_metadata_errors() {
        let missing = SidecarIds::from_xml("<r><CP_id>OR-1</CP_id></r>")
            .expect_err("fragment id is required");
        assert!(matches!(
            missing,
            FsOpsError::MissingField {
                field: FRAGMENT_ID_ELEMENT,
                ..
            }
        ));

        let empty = SidecarIds::from_xml("<r><CP_id>  </CP_id><FragmentId>f</FragmentId></r>")
            .expect_err("blank owner id is rejected");
        assert!(matches!(
            empty,
            FsOpsError::MissingField {
                field: OWNER_ID_ELEMENT,
                ..
            }
        ));
    }

    #[test]
    fn identifiers_cannot_escape_the_export_root() {
        let err = SidecarIds::from_xml("<r><CP_id>..</CP_id><FragmentId>f</FragmentId></r>")
            .expect_err("parent segment must be rejected");
        assert!(matches!(
            err,
            FsOpsError::InvalidInput {
                reason: "relative_segment",
                ..
            }
        ));

        let err = SidecarIds::from_xml("<r><CP_id>OR</CP_id><FragmentId>a/b</FragmentId></r>")
            .expect_err("separator must be rejected");
        assert!(matches!(
            err,
            FsOpsError::InvalidInput {
                reason: "path_separator",
                ..
            }
        ));
    }

    #[test]
    fn malformed_documents_are_reported() {
        let err = SidecarIds::from_xml("<r><CP_id>OR</FragmentId></r>")
            .expect_err("mismatched tags must fail");
        assert!(matches!(err, FsOpsError::Xml { .. }));
    }

    #[test]
    fn from_path_reads_fixture_sidecar() -> TestResult<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("meta.xml");
        std::fs::write(&path, sidecar_xml("OR-x", "ab12"))?;
        let ids = SidecarIds::from_path(&path)?;
        assert_eq!(
            ids,
            SidecarIds {
                owner_id: "OR-x".into(),
                fragment_id: "ab12".into(),
            }
        );
        Ok(())
    }

    #[test]
    fn short_fragment_ids_use_what_is_available() {
        let ids = SidecarIds {
            owner_id: "OR-x".into(),
            fragment_id: "a".into(),
        };
        let destination = Destination::new("/e", Visibility::Restricted, ids, "jp2");
        assert_eq!(destination.path(), PathBuf::from("/e/restricted/OR-x/a/a.jp2"));
    }
}
