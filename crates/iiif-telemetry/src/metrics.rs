//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Counts work unit outcomes, per-stage results and sequencer steps.
//! - No exporter is started; the registry is rendered on demand and a snapshot is
//!   logged at shutdown.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

const WORK_UNITS_TOTAL: &str = "work_units_total";
const UNIT_STAGES_TOTAL: &str = "unit_stages_total";
const TRANSFORM_STEPS_TOTAL: &str = "transform_steps_total";
const UNITS_IN_FLIGHT: &str = "units_in_flight";
const LAST_UNIT_DURATION_MS: &str = "last_unit_duration_ms";

/// Prometheus-backed metrics registry shared across the pipeline.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    work_units_total: IntCounterVec,
    unit_stages_total: IntCounterVec,
    transform_steps_total: IntCounterVec,
    units_in_flight: IntGauge,
    last_unit_duration_ms: IntGauge,
}

/// Snapshot of selected gauges and counters for shutdown reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Work units currently being processed.
    pub units_in_flight: i64,
    /// Work units delivered successfully.
    pub units_completed: u64,
    /// Work units that failed after unpacking.
    pub units_failed: u64,
    /// Work units whose archive could not be unpacked.
    pub units_abandoned: u64,
    /// Events that did not describe an archive.
    pub units_ignored: u64,
    /// Wall time of the most recently finished work unit (ms).
    pub last_unit_duration_ms: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let work_units_total = counter_vec(
            WORK_UNITS_TOTAL,
            "Work units finished by outcome",
            &["outcome"],
        )?;
        let unit_stages_total = counter_vec(
            UNIT_STAGES_TOTAL,
            "Watcher work unit stages executed by status",
            &["stage", "status"],
        )?;
        let transform_steps_total = counter_vec(
            TRANSFORM_STEPS_TOTAL,
            "Transformation steps executed by status",
            &["step", "status"],
        )?;
        let units_in_flight = gauge(UNITS_IN_FLIGHT, "Work units currently being processed")?;
        let last_unit_duration_ms = gauge(
            LAST_UNIT_DURATION_MS,
            "Wall time of the most recently finished work unit (ms)",
        )?;

        register(&registry, WORK_UNITS_TOTAL, work_units_total.clone())?;
        register(&registry, UNIT_STAGES_TOTAL, unit_stages_total.clone())?;
        register(&registry, TRANSFORM_STEPS_TOTAL, transform_steps_total.clone())?;
        register(&registry, UNITS_IN_FLIGHT, units_in_flight.clone())?;
        register(&registry, LAST_UNIT_DURATION_MS, last_unit_duration_ms.clone())?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                work_units_total,
                unit_stages_total,
                transform_steps_total,
                units_in_flight,
                last_unit_duration_ms,
            }),
        })
    }

    /// Increment the finished work unit counter for `outcome`.
    pub fn inc_work_unit(&self, outcome: &str) {
        self.inner
            .work_units_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Increment the watcher stage counter.
    pub fn inc_unit_stage(&self, stage: &str, status: &str) {
        self.inner
            .unit_stages_total
            .with_label_values(&[stage, status])
            .inc();
    }

    /// Increment the sequencer step counter.
    pub fn inc_transform_step(&self, step: &str, status: &str) {
        self.inner
            .transform_steps_total
            .with_label_values(&[step, status])
            .inc();
    }

    /// Mark a work unit as started.
    pub fn unit_started(&self) {
        self.inner.units_in_flight.inc();
    }

    /// Mark a work unit as finished after `elapsed`.
    pub fn unit_finished(&self, elapsed: Duration) {
        self.inner.units_in_flight.dec();
        self.inner
            .last_unit_duration_ms
            .set(Self::duration_to_ms(elapsed));
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be encoded.
    pub fn render(&self) -> Result<String> {
        TextEncoder::new()
            .encode_to_string(&self.inner.registry.gather())
            .map_err(|source| TelemetryError::MetricsRender { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let outcome = |label: &str| {
            self.inner
                .work_units_total
                .with_label_values(&[label])
                .get()
        };
        MetricsSnapshot {
            units_in_flight: self.inner.units_in_flight.get(),
            units_completed: outcome("completed"),
            units_failed: outcome("failed"),
            units_abandoned: outcome("abandoned"),
            units_ignored: outcome("ignored"),
            last_unit_duration_ms: self.inner.last_unit_duration_ms.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::collector(name, source))
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::collector(name, source))
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
