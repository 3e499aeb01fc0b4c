#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Telemetry primitives shared by the watcher and sequencer processes.
//!
//! Layout: `init.rs` (subscriber installation), `context.rs` (process span guard),
//! `metrics.rs` (Prometheus counters), `error.rs`.

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{GlobalContextGuard, unit_span};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot};
