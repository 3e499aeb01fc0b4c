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

//! File and environment backed configuration for the watcher and sequencer processes.
//!
//! Layout: `model.rs` (typed sections), `defaults.rs` (deployment defaults), `loader.rs`
//! (file parsing and environment overrides), `validate.rs` (validation), `error.rs`.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::CONFIG_PATH_ENV;
pub use model::{
    CodecConfig, CropConfig, ExportConfig, LoggingSettings, ProcessorConfig, SequencerConfig,
    TransformConfig, WatcherConfig,
};
