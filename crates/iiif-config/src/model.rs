//! Typed configuration sections.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Complete configuration shared by the watcher and sequencer processes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Archive watching and work unit handling.
    pub watcher: WatcherConfig,
    /// How the sequencer process is launched.
    pub sequencer: SequencerConfig,
    /// Delivered image tree.
    pub export: ExportConfig,
    /// Sequencer working directories and helper tools.
    pub transform: TransformConfig,
    /// JPEG 2000 encoder.
    pub codec: CodecConfig,
    /// Optional border and colour chart cropping.
    pub crop: CropConfig,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Watcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatcherConfig {
    /// Directory tree monitored recursively.
    pub watch_root: PathBuf,
    /// Root for per-archive work directories.
    pub work_root: PathBuf,
    /// Archive extension without the leading dot.
    pub archive_extension: String,
    /// Upper bound on concurrently processed work units.
    pub max_concurrent_units: usize,
    /// Optional limit on a single sequencer run, in seconds.
    pub transform_timeout_secs: Option<u64>,
    /// Use the archive's parent directory name as the encoder profile.
    pub profile_from_parent_dir: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            watch_root: PathBuf::from(defaults::WATCH_ROOT),
            work_root: PathBuf::from(defaults::WORK_ROOT),
            archive_extension: defaults::ARCHIVE_EXTENSION.to_string(),
            max_concurrent_units: defaults::MAX_CONCURRENT_UNITS,
            transform_timeout_secs: None,
            profile_from_parent_dir: false,
        }
    }
}

impl WatcherConfig {
    /// Sequencer timeout, when one is configured.
    #[must_use]
    pub fn transform_timeout(&self) -> Option<Duration> {
        self.transform_timeout_secs.map(Duration::from_secs)
    }
}

/// Sequencer launch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SequencerConfig {
    /// Sequencer executable.
    pub program: PathBuf,
    /// Arguments placed before the per-unit arguments.
    pub args: Vec<String>,
    /// Toolchain binary directory prepended to the child's `PATH`.
    pub toolchain_bin_dir: Option<PathBuf>,
    /// Size class token forwarded as `--max_size`.
    pub size_class: Option<String>,
    /// Encoder profile forwarded as `--profile`.
    pub profile: Option<String>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(defaults::SEQUENCER_PROGRAM),
            args: Vec::new(),
            toolchain_bin_dir: Some(PathBuf::from(defaults::TOOLCHAIN_BIN_DIR)),
            size_class: None,
            profile: None,
        }
    }
}

/// Export tree settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Root of the delivered image tree.
    pub root: PathBuf,
    /// Extension of delivered files.
    pub extension: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(defaults::EXPORT_ROOT),
            extension: defaults::EXPORT_EXTENSION.to_string(),
        }
    }
}

/// Sequencer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// Directory receiving encoded images before delivery.
    pub output_dir: PathBuf,
    /// Colour conversion executable (ImageMagick).
    pub convert_program: PathBuf,
    /// Metadata copy executable (exiftool).
    pub metadata_program: PathBuf,
    /// Delivery attempts before giving up.
    pub move_attempts: u32,
    /// Delay after the first failed delivery, doubled per retry.
    pub move_base_delay_ms: u64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(defaults::TRANSFORM_OUTPUT_DIR),
            convert_program: PathBuf::from(defaults::CONVERT_PROGRAM),
            metadata_program: PathBuf::from(defaults::METADATA_PROGRAM),
            move_attempts: defaults::MOVE_ATTEMPTS,
            move_base_delay_ms: defaults::MOVE_BASE_DELAY_MS,
        }
    }
}

impl TransformConfig {
    /// Delay after the first failed delivery attempt.
    #[must_use]
    pub const fn move_base_delay(&self) -> Duration {
        Duration::from_millis(self.move_base_delay_ms)
    }
}

/// Encoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Encoder executable, resolved on `PATH` when relative.
    pub executable: PathBuf,
    /// Directory holding `<name>.profile` option files.
    pub profile_dir: Option<PathBuf>,
    /// Profile used when none or an unknown one is requested.
    pub default_profile: String,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(defaults::CODEC_EXECUTABLE),
            profile_dir: None,
            default_profile: defaults::DEFAULT_PROFILE.to_string(),
        }
    }
}

/// Crop detector settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    /// Run the detector before resizing.
    pub enabled: bool,
    /// Interpreter used to run the detector.
    pub python: PathBuf,
    /// Detector script.
    pub detector_script: PathBuf,
    /// Detector model weights.
    pub weights: PathBuf,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            python: PathBuf::from(defaults::CROP_PYTHON),
            detector_script: PathBuf::from(defaults::CROP_DETECTOR),
            weights: PathBuf::from(defaults::CROP_WEIGHTS),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Directive used when `RUST_LOG` is unset.
    pub level: String,
    /// `json` or `pretty`; inferred from the build profile when absent.
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}
