//! # Design
//!
//! - Subscriber installation and metrics registry failures are startup problems; the
//!   binaries report them and exit.
//! - Messages are constant; the failing metric name travels as a field.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber is already installed or could not be set.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[from]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A Prometheus collector could not be built from its options.
    #[error("failed to build metrics collector")]
    MetricsCollector {
        /// Metric that failed.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// A collector was rejected by the registry.
    #[error("failed to register metrics collector")]
    MetricsRegister {
        /// Metric that failed.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The text exposition could not be produced.
    #[error("failed to render metrics")]
    MetricsRender {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
}

impl TelemetryError {
    pub(crate) const fn collector(name: &'static str, source: PrometheusError) -> Self {
        Self::MetricsCollector { name, source }
    }
}
