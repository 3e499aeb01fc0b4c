//! Border and colour chart cropping through the colour-checker detector.
//!
//! # Design
//! - The detector writes `<project>/cropped/<file name>`; a run that exits cleanly without
//!   producing that file is a failure.
//! - Only invoked when cropping is enabled in configuration.

use std::path::{Path, PathBuf};

use iiif_config::CropConfig;
use tracing::info;

use crate::error::{TransformError, TransformResult};
use crate::tool::ToolCommand;

/// Name of the detector run directory below the project directory.
pub const CROP_RUN_NAME: &str = "cropped";

/// Produces a cropped variant of an image.
pub trait Cropper: Send + Sync {
    /// Crop `image`, writing results below `project_dir`, and return the cropped file.
    ///
    /// # Errors
    ///
    /// Returns an error when the detector fails or produces no output.
    fn crop(&self, image: &Path, project_dir: &Path) -> TransformResult<PathBuf>;
}

/// [`Cropper`] running the YOLO based colour-checker detector script.
#[derive(Debug, Clone)]
pub struct ColorcheckerCropper {
    python: PathBuf,
    script: PathBuf,
    weights: PathBuf,
}

impl ColorcheckerCropper {
    /// Build from explicit paths.
    #[must_use]
    pub fn new(python: impl Into<PathBuf>, script: impl Into<PathBuf>, weights: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            script: script.into(),
            weights: weights.into(),
        }
    }

    /// Build from configuration, or `None` when cropping is disabled.
    #[must_use]
    pub fn from_config(config: &CropConfig) -> Option<Self> {
        config.enabled.then(|| {
            Self::new(
                config.python.clone(),
                config.detector_script.clone(),
                config.weights.clone(),
            )
        })
    }

    /// The detector command for `image`.
    #[must_use]
    pub fn command(&self, image: &Path, project_dir: &Path) -> ToolCommand {
        ToolCommand::new(&self.python)
            .arg(&self.script)
            .arg("--weights")
            .arg(&self.weights)
            .arg("--source")
            .arg(image)
            .args(["--crop", "True", "--project"])
            .arg(project_dir)
            .args(["--name", CROP_RUN_NAME, "--exist-ok"])
    }
}

impl Cropper for ColorcheckerCropper {
    fn crop(&self, image: &Path, project_dir: &Path) -> TransformResult<PathBuf> {
        let file_name = image.file_name().ok_or(TransformError::MissingState {
            field: "crop.file_name",
        })?;
        self.command(image, project_dir).run()?;
        let cropped = project_dir.join(CROP_RUN_NAME).join(file_name);
        if !cropped.is_file() {
            return Err(TransformError::MissingOutput {
                operation: "crop",
                path: cropped,
            });
        }
        info!(source = %image.display(), cropped = %cropped.display(), "cropped image");
        Ok(cropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_matches_detector_interface() {
        let cropper = ColorcheckerCropper::new("python3", "/cc/detect.py", "/cc/best.pt");
        let command = cropper.command(Path::new("/w/a.tif"), Path::new("/t"));
        assert_eq!(
            command.render(),
            "python3 /cc/detect.py --weights /cc/best.pt --source /w/a.tif --crop True \
             --project /t --name cropped --exist-ok"
        );
    }

    #[test]
    fn disabled_config_builds_nothing() {
        assert!(ColorcheckerCropper::from_config(&CropConfig::default()).is_none());
        let enabled = CropConfig {
            enabled: true,
            ..CropConfig::default()
        };
        assert!(ColorcheckerCropper::from_config(&enabled).is_some());
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use iiif_test_support::fixtures::fake_executable;
        use std::fs;
        use tempfile::TempDir;

        type TestResult<T> = anyhow::Result<T>;

        #[test]
        fn crop_returns_detector_output() -> TestResult<()> {
            let temp = TempDir::new()?;
            let project = temp.path().join("transform");
            let python = fake_executable(
                temp.path(),
                "python3",
                &format!(
                    "mkdir -p '{dir}/cropped' && cp \"$5\" '{dir}/cropped/'",
                    dir = project.display()
                ),
            )?;
            let image = temp.path().join("a.tif");
            fs::write(&image, b"II*\0")?;

            let cropper = ColorcheckerCropper::new(python, "detect.py", "best.pt");
            let cropped = cropper.crop(&image, &project)?;
            assert_eq!(cropped, project.join("cropped").join("a.tif"));
            assert!(cropped.is_file());
            Ok(())
        }

        #[test]
        fn silent_detector_is_missing_output() -> TestResult<()> {
            let temp = TempDir::new()?;
            let python = fake_executable(temp.path(), "python3", "exit 0")?;
            let image = temp.path().join("a.tif");
            fs::write(&image, b"II*\0")?;
            let err = ColorcheckerCropper::new(python, "detect.py", "best.pt")
                .crop(&image, &temp.path().join("transform"))
                .expect_err("missing output must fail");
            assert!(matches!(
                err,
                TransformError::MissingOutput {
                    operation: "crop",
                    ..
                }
            ));
            Ok(())
        }
    }
}
