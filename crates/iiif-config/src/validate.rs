//! Validation of a fully assembled configuration.

use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ProcessorConfig;

const LOG_FORMATS: &[&str] = &["json", "pretty"];

impl ProcessorConfig {
    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for the first violated constraint.
    pub fn validate(&self) -> ConfigResult<()> {
        require_path("watcher", "watch_root", &self.watcher.watch_root)?;
        require_path("watcher", "work_root", &self.watcher.work_root)?;
        require_path("export", "root", &self.export.root)?;
        require_path("transform", "output_dir", &self.transform.output_dir)?;
        require_path("sequencer", "program", &self.sequencer.program)?;
        require_path("codec", "executable", &self.codec.executable)?;

        let extension = self.watcher.archive_extension.as_str();
        if extension.is_empty() {
            return Err(ConfigError::invalid(
                "watcher",
                "archive_extension",
                "empty",
                None,
            ));
        }
        if extension.starts_with('.') {
            return Err(ConfigError::invalid(
                "watcher",
                "archive_extension",
                "leading_dot",
                Some(extension.to_string()),
            ));
        }
        if self.watcher.max_concurrent_units == 0 {
            return Err(ConfigError::invalid(
                "watcher",
                "max_concurrent_units",
                "zero",
                Some("0".into()),
            ));
        }
        if self.watcher.transform_timeout_secs == Some(0) {
            return Err(ConfigError::invalid(
                "watcher",
                "transform_timeout_secs",
                "zero",
                Some("0".into()),
            ));
        }
        if self.export.extension.is_empty() {
            return Err(ConfigError::invalid("export", "extension", "empty", None));
        }
        if self.transform.move_attempts == 0 {
            return Err(ConfigError::invalid(
                "transform",
                "move_attempts",
                "zero",
                Some("0".into()),
            ));
        }
        let profile = self.codec.default_profile.as_str();
        if profile.is_empty() || profile.contains(['/', '\\']) {
            return Err(ConfigError::invalid(
                "codec",
                "default_profile",
                "not_a_profile_name",
                Some(profile.to_string()),
            ));
        }
        if self.crop.enabled {
            require_path("crop", "detector_script", &self.crop.detector_script)?;
            require_path("crop", "weights", &self.crop.weights)?;
        }
        if let Some(format) = self.logging.format.as_deref()
            && !LOG_FORMATS.contains(&format)
        {
            return Err(ConfigError::invalid(
                "logging",
                "format",
                "unsupported",
                Some(format.to_string()),
            ));
        }
        Ok(())
    }
}

fn require_path(section: &'static str, field: &'static str, path: &Path) -> ConfigResult<()> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::invalid(section, field, "empty", None));
    }
    Ok(())
}
