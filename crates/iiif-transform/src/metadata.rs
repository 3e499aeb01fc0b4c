//! Metadata re-attachment with exiftool.

use std::path::{Path, PathBuf};

use crate::error::TransformResult;
use crate::tool::ToolCommand;

/// Copies embedded metadata tags from one file to another.
pub trait MetadataCopier: Send + Sync {
    /// Copy every tag of `source` into `target`, rewriting `target` in place.
    ///
    /// # Errors
    ///
    /// Returns an error when the copy tool fails.
    fn copy_metadata(&self, source: &Path, target: &Path) -> TransformResult<()>;
}

/// [`MetadataCopier`] running `exiftool -overwrite_original -tagsFromFile`.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
}

impl ExifTool {
    /// Use `program` as the exiftool executable.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The command copying tags from `source` into `target`.
    #[must_use]
    pub fn command(&self, source: &Path, target: &Path) -> ToolCommand {
        ToolCommand::new(&self.program)
            .args(["-overwrite_original", "-tagsFromFile"])
            .arg(source)
            .arg(target)
    }
}

impl MetadataCopier for ExifTool {
    fn copy_metadata(&self, source: &Path, target: &Path) -> TransformResult<()> {
        self.command(source, target).run().map(drop)
    }
}
