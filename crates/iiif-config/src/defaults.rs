//! Deployment defaults for the image processing host.
//!
//! # Design
//! - Mirror the directory layout of the production image host.
//! - Keep retry and concurrency defaults explicit for auditability.

/// Directory tree watched for incoming archives.
pub const WATCH_ROOT: &str = "/export/home/viaa/pub";
/// Root under which each archive gets its own work directory.
pub const WORK_ROOT: &str = "/opt/image-processing-workfolder";
/// Root of the delivered image tree.
pub const EXPORT_ROOT: &str = "/export/images";
/// Extension of delivered images.
pub const EXPORT_EXTENSION: &str = "jp2";
/// Extension of archives the watcher reacts to.
pub const ARCHIVE_EXTENSION: &str = "zip";
/// Sequencer executable launched per work unit.
pub const SEQUENCER_PROGRAM: &str = "/opt/iiif-image-processing/bin/transform-file";
/// Binary directory of the image processing toolchain, prepended to `PATH`.
pub const TOOLCHAIN_BIN_DIR: &str = "/opt/iiif-image-processing/env/bin";
/// Directory receiving encoded images before delivery.
pub const TRANSFORM_OUTPUT_DIR: &str = "/opt/iiif-image-processing/transform";
/// Colour conversion executable.
pub const CONVERT_PROGRAM: &str = "magick";
/// Metadata copy executable.
pub const METADATA_PROGRAM: &str = "exiftool";
/// JPEG 2000 encoder executable.
pub const CODEC_EXECUTABLE: &str = "kdu_compress";
/// Name of the encoder profile used when none is requested.
pub const DEFAULT_PROFILE: &str = "default";
/// Python interpreter running the crop detector.
pub const CROP_PYTHON: &str = "python3";
/// Crop detector entry point.
pub const CROP_DETECTOR: &str = "/opt/iiif-image-processing/colorchecker/detect.py";
/// Crop detector model weights.
pub const CROP_WEIGHTS: &str = "/opt/iiif-image-processing/colorchecker/weights/best.pt";
/// Default log level when `RUST_LOG` is not set.
pub const LOG_LEVEL: &str = "info";
/// Attempts made to deliver an encoded image.
pub const MOVE_ATTEMPTS: u32 = 5;
/// Delay after the first failed delivery attempt, in milliseconds.
pub const MOVE_BASE_DELAY_MS: u64 = 1_000;
/// Work units processed concurrently.
pub const MAX_CONCURRENT_UNITS: usize = 1;
