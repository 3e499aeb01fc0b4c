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
#![allow(clippy::module_name_repetitions)]

//! Watches the ingest tree for finished archive uploads and turns each one into a
//! work unit: unpack, classify, derive the destination, delegate to the sequencer
//! process and clean up.
//!
//! Layout: `service.rs` (notify subscription and worker pool), `unit.rs` (per-archive
//! handler), `launcher.rs` (sequencer process), `event.rs`, `locks.rs`, `error.rs`.

pub mod error;
pub mod event;
pub mod launcher;
pub mod locks;
pub mod service;
pub mod unit;

pub use error::{WatchError, WatchResult};
pub use event::{ArchiveEvent, ArchiveEventKind};
pub use launcher::{ProcessLauncher, SequencerInvocation, SequencerLauncher};
pub use locks::WorkDirLocks;
pub use service::WatchService;
pub use unit::{
    CleanupReport, UnitContext, UnitOutcome, UnitSettings, UnitStage, WorkUnit, process_archive,
};
