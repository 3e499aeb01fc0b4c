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

//! File and path utilities shared by the watcher and the transformation sequencer.
//!
//! Layout: `probe.rs` (format identification), `destination.rs` (sidecar parsing and
//! export paths), `transfer.rs` (copy/rename/move/remove), `archive.rs` (zip extraction),
//! `error.rs` (error types).

pub mod archive;
pub mod destination;
pub mod error;
pub mod probe;
pub mod transfer;

pub use archive::{archive_stem, extract_zip, list_members, sanitize_archive_path};
pub use destination::{Destination, SidecarIds, Visibility};
pub use error::{FsOpsError, FsOpsResult};
pub use probe::{FormatProbe, PronomId, SignatureProbe};
pub use transfer::{
    COPY_SUFFIX, MoveOutcome, RemoveOutcome, RetryPolicy, copy_file, move_file, move_file_with,
    move_path, remove_file, remove_prefixed_siblings, rename_file,
};
