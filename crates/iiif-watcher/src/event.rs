//! Archive events derived from filesystem notifications.

use std::path::{Path, PathBuf};

use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind};

/// Kind of filesystem event the watcher reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveEventKind {
    /// A file opened for writing was closed.
    CloseWrite,
}

/// A candidate archive that finished being written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEvent {
    /// Full path of the written file.
    pub path: PathBuf,
    /// Directory containing the file.
    pub directory: PathBuf,
    /// File name component.
    pub file_name: String,
    /// Event kind.
    pub kind: ArchiveEventKind,
}

impl ArchiveEvent {
    /// Describe a close-write of `path`; `None` when the path has no file name.
    #[must_use]
    pub fn close_write(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Some(Self {
            path,
            directory,
            file_name,
            kind: ArchiveEventKind::CloseWrite,
        })
    }

    /// Convert a notification; anything other than close-write yields nothing.
    #[must_use]
    pub fn from_notify(event: &Event) -> Vec<Self> {
        if !matches!(
            event.kind,
            EventKind::Access(AccessKind::Close(AccessMode::Write))
        ) {
            return Vec::new();
        }
        event
            .paths
            .iter()
            .filter_map(|path| Self::close_write(path.clone()))
            .collect()
    }

    /// Whether the file name ends in `.<extension>`, ignoring ASCII case.
    #[must_use]
    pub fn has_extension(&self, extension: &str) -> bool {
        let name = self.file_name.to_ascii_lowercase();
        let suffix = format!(".{}", extension.to_ascii_lowercase());
        name.len() > suffix.len() && name.ends_with(&suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    #[test]
    fn close_write_events_are_converted() {
        let event = Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write)))
            .add_path(PathBuf::from("/pub/public/bundle.zip"))
            .add_path(PathBuf::from("/pub/restricted/other.zip"));
        let events = ArchiveEvent::from_notify(&event);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].file_name, "bundle.zip");
        assert_eq!(events[0].directory, PathBuf::from("/pub/public"));
        assert_eq!(events[1].kind, ArchiveEventKind::CloseWrite);
    }

    #[test]
    fn other_event_kinds_are_dropped() {
        for kind in [
            EventKind::Create(CreateKind::File),
            EventKind::Modify(ModifyKind::Any),
            EventKind::Access(AccessKind::Close(AccessMode::Read)),
        ] {
            let event = Event::new(kind).add_path(PathBuf::from("/pub/a.zip"));
            assert!(ArchiveEvent::from_notify(&event).is_empty());
        }
    }

    #[test]
    fn extension_filter_ignores_case() {
        let event = ArchiveEvent::close_write("/pub/a.ZIP").map(|e| e.has_extension("zip"));
        assert_eq!(event, Some(true));
        let event = ArchiveEvent::close_write("/pub/a.zip.part").map(|e| e.has_extension("zip"));
        assert_eq!(event, Some(false));
        let event = ArchiveEvent::close_write("/pub/.zip").map(|e| e.has_extension("zip"));
        assert_eq!(event, Some(false));
    }
}
