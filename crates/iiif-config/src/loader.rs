//! Configuration file parsing and environment overrides.
//!
//! # Design
//! - The configuration is built once per process and passed explicitly to components.
//! - Precedence: built-in defaults, then the file, then environment variables.
//! - Environment access goes through a lookup closure so tests never mutate the process env.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::model::ProcessorConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "IIIF_CONFIG";

const WATCH_ROOT_ENV: &str = "IIIF_WATCH_ROOT";
const WORK_ROOT_ENV: &str = "IIIF_WORK_ROOT";
const EXPORT_ROOT_ENV: &str = "IIIF_EXPORT_ROOT";
const TRANSFORM_DIR_ENV: &str = "IIIF_TRANSFORM_DIR";
const SEQUENCER_PROGRAM_ENV: &str = "IIIF_SEQUENCER_PROGRAM";
const TOOLCHAIN_BIN_ENV: &str = "IIIF_TOOLCHAIN_BIN";
const MAX_CONCURRENT_UNITS_ENV: &str = "IIIF_MAX_CONCURRENT_UNITS";
const LOG_LEVEL_ENV: &str = "IIIF_LOG_LEVEL";
const LOG_FORMAT_ENV: &str = "IIIF_LOG_FORMAT";

impl ProcessorConfig {
    /// Load from `path` (or defaults), apply process environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded, an override cannot be
    /// parsed, or validation fails.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Same as [`ProcessorConfig::load`] with an explicit environment lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded, an override cannot be
    /// parsed, or validation fails.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Decode a configuration file; `.json` files are JSON, everything else is YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            operation: "config.read",
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        } else if raw.trim().is_empty() {
            Ok(Self::default())
        } else {
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    /// Apply `IIIF_*` overrides found through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override cannot be parsed.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = non_empty(WATCH_ROOT_ENV) {
            self.watcher.watch_root = PathBuf::from(value);
        }
        if let Some(value) = non_empty(WORK_ROOT_ENV) {
            self.watcher.work_root = PathBuf::from(value);
        }
        if let Some(value) = non_empty(EXPORT_ROOT_ENV) {
            self.export.root = PathBuf::from(value);
        }
        if let Some(value) = non_empty(TRANSFORM_DIR_ENV) {
            self.transform.output_dir = PathBuf::from(value);
        }
        if let Some(value) = non_empty(SEQUENCER_PROGRAM_ENV) {
            self.sequencer.program = PathBuf::from(value);
        }
        if let Some(value) = non_empty(TOOLCHAIN_BIN_ENV) {
            self.sequencer.toolchain_bin_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = non_empty(MAX_CONCURRENT_UNITS_ENV) {
            self.watcher.max_concurrent_units = value.trim().parse().map_err(|_| {
                ConfigError::invalid(
                    "watcher",
                    "max_concurrent_units",
                    "not_an_integer",
                    Some(value.clone()),
                )
            })?;
        }
        if let Some(value) = non_empty(LOG_LEVEL_ENV) {
            self.logging.level = value;
        }
        if let Some(value) = non_empty(LOG_FORMAT_ENV) {
            self.logging.format = Some(value);
        }
        Ok(())
    }
}
