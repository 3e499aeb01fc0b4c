//! Subscriber installation.
//!
//! # Design
//! - One entry point per process; a second call reports the subscriber already set.
//! - `RUST_LOG` wins over the configured level.
//! - JSON output records the current span so work unit ids appear on every line.

use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Result;

/// Level directive used when neither `RUST_LOG` nor the configuration provide one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const BUILD_SHA_ENV: Option<&str> = option_env!("IIIF_BUILD_SHA");

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    let (json, pretty) = match config.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(false),
            ),
            None,
        ),
        LogFormat::Pretty => (None, Some(fmt::layer().with_target(false))),
    };
    tracing_subscriber::registry()
        .with(env_filter(config.level))
        .with(json)
        .with(pretty)
        .try_init()?;
    Ok(())
}

/// Build identifier recorded at initialisation, or the compile-time value.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA
        .get()
        .map(String::as_str)
        .or(BUILD_SHA_ENV)
        .unwrap_or("dev")
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Level directive such as `info` or `iiif_watcher=debug`.
    pub level: &'a str,
    /// Output format.
    pub format: LogFormat,
    /// Build identifier recorded on the process span.
    pub build_sha: &'a str,
}

impl<'a> LoggingConfig<'a> {
    /// Settings from a configured level and optional format name.
    #[must_use]
    pub fn from_settings(level: &'a str, format: Option<&str>) -> Self {
        Self {
            level,
            format: LogFormat::from_name(format),
            build_sha: build_sha(),
        }
    }
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self::from_settings(DEFAULT_LOG_LEVEL, None)
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable lines.
    Pretty,
}

impl LogFormat {
    /// Pretty for debug builds, JSON otherwise.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Map a configured name, ignoring case; absent or unknown names are inferred.
    #[must_use]
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(name) if name.eq_ignore_ascii_case("json") => Self::Json,
            Some(name) if name.eq_ignore_ascii_case("pretty") => Self::Pretty,
            _ => Self::infer(),
        }
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}
