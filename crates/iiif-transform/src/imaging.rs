//! Pixel and colour primitives.
//!
//! # Design
//! - Dimensions, ICC extraction and resizing run in process through the `image` crate.
//! - Colour space conversion is delegated to ImageMagick.
//! - Resized pixels overwrite the source file in its original format.

use std::path::{Path, PathBuf};

use image::error::{ImageFormatHint, UnsupportedError, UnsupportedErrorKind};
use image::imageops::FilterType;
use image::{ImageDecoder, ImageReader};
use tracing::debug;

use crate::error::{TransformError, TransformResult};
use crate::tool::ToolCommand;

/// Facts read from an image before it is modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Embedded ICC profile, when present.
    pub icc_profile: Option<Vec<u8>>,
}

/// Image operations used by the sequencer.
pub trait ImageOps: Send + Sync {
    /// Read dimensions and the embedded ICC profile.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or decoded.
    fn inspect(&self, path: &Path) -> TransformResult<ImageInfo>;

    /// Overwrite `path` with its pixels resized to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error when the image cannot be decoded or re-encoded.
    fn resize(&self, path: &Path, target: (u32, u32)) -> TransformResult<()>;

    /// Convert `path` to sRGB in place, attaching `icc_profile` when given.
    ///
    /// # Errors
    ///
    /// Returns an error when the conversion tool fails.
    fn convert_to_srgb(&self, path: &Path, icc_profile: Option<&Path>) -> TransformResult<()>;
}

/// [`ImageOps`] backed by the `image` crate and ImageMagick.
#[derive(Debug, Clone)]
pub struct RasterOps {
    convert_program: PathBuf,
}

impl RasterOps {
    /// Use `convert_program` (usually `magick`) for colour conversion.
    #[must_use]
    pub fn new(convert_program: impl Into<PathBuf>) -> Self {
        Self {
            convert_program: convert_program.into(),
        }
    }

    /// The conversion command for `path`.
    #[must_use]
    pub fn convert_command(&self, path: &Path, icc_profile: Option<&Path>) -> ToolCommand {
        let command = ToolCommand::new(&self.convert_program)
            .arg(path)
            .args(["-colorspace", "sRGB"]);
        let command = match icc_profile {
            Some(profile) => command.arg("-profile").arg(profile),
            None => command,
        };
        command.arg(path)
    }
}

impl ImageOps for RasterOps {
    fn inspect(&self, path: &Path) -> TransformResult<ImageInfo> {
        let reader = open_reader(path)?;
        let mut decoder = reader
            .into_decoder()
            .map_err(|source| TransformError::image("inspect.decode", path, source))?;
        let icc_profile = decoder
            .icc_profile()
            .map_err(|source| TransformError::image("inspect.icc", path, source))?;
        let (width, height) = decoder.dimensions();
        debug!(
            path = %path.display(),
            width,
            height,
            icc = icc_profile.is_some(),
            "inspected image"
        );
        Ok(ImageInfo {
            width,
            height,
            icc_profile,
        })
    }

    fn resize(&self, path: &Path, target: (u32, u32)) -> TransformResult<()> {
        let reader = open_reader(path)?;
        let format = reader
            .format()
            .ok_or_else(|| TransformError::image("resize.format", path, unknown_format(path)))?;
        let pixels = reader
            .decode()
            .map_err(|source| TransformError::image("resize.decode", path, source))?;
        let (width, height) = target;
        let resized = pixels.resize_exact(width, height, FilterType::CatmullRom);
        resized
            .save_with_format(path, format)
            .map_err(|source| TransformError::image("resize.save", path, source))?;
        debug!(path = %path.display(), width, height, "resized image");
        Ok(())
    }

    fn convert_to_srgb(&self, path: &Path, icc_profile: Option<&Path>) -> TransformResult<()> {
        self.convert_command(path, icc_profile).run().map(drop)
    }
}

fn unknown_format(path: &Path) -> image::ImageError {
    image::ImageError::Unsupported(UnsupportedError::from_format_and_kind(
        ImageFormatHint::Unknown,
        UnsupportedErrorKind::Format(ImageFormatHint::PathExtension(path.to_path_buf())),
    ))
}

fn open_reader(path: &Path) -> TransformResult<ImageReader<std::io::BufReader<std::fs::File>>> {
    ImageReader::open(path)
        .map_err(|source| TransformError::io("image.open", path, source))?
        .with_guessed_format()
        .map_err(|source| TransformError::io("image.guess_format", path, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use tempfile::TempDir;

    type TestResult<T> = anyhow::Result<T>;

    fn write_png(path: &Path, width: u32, height: u32) -> TestResult<()> {
        RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]))
            .save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }

    #[test]
    fn inspect_reads_dimensions_without_icc() -> TestResult<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("page.png");
        write_png(&path, 64, 32)?;
        let info = RasterOps::new("magick").inspect(&path)?;
        assert_eq!((info.width, info.height), (64, 32));
        assert!(info.icc_profile.is_none());
        Ok(())
    }

    #[test]
    fn resize_overwrites_in_original_format() -> TestResult<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("page.tif");
        RgbImage::from_pixel(80, 40, image::Rgb([1, 2, 3]))
            .save_with_format(&path, ImageFormat::Tiff)?;
        let ops = RasterOps::new("magick");
        ops.resize(&path, (20, 10))?;
        assert_eq!(image::image_dimensions(&path)?, (20, 10));
        assert_eq!(ImageFormat::from_path(&path)?, ImageFormat::Tiff);
        let reader = ImageReader::open(&path)?.with_guessed_format()?;
        assert_eq!(reader.format(), Some(ImageFormat::Tiff));
        Ok(())
    }

    #[test]
    fn inspect_rejects_non_images() -> TestResult<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, "not an image")?;
        let err = RasterOps::new("magick")
            .inspect(&path)
            .expect_err("text must not decode");
        assert!(matches!(err, TransformError::Image { .. }));
        Ok(())
    }

    #[test]
    fn convert_command_attaches_profile() {
        let ops = RasterOps::new("magick");
        let with_profile = ops.convert_command(Path::new("/w/a.tif"), Some(Path::new("/w/a.icc")));
        assert_eq!(
            with_profile.render(),
            "magick /w/a.tif -colorspace sRGB -profile /w/a.icc /w/a.tif"
        );
        let without = ops.convert_command(Path::new("/w/a.tif"), None);
        assert_eq!(without.render(), "magick /w/a.tif -colorspace sRGB /w/a.tif");
    }
}
