#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Bootstrap wiring for the `iiif-image-processor` watcher.
//!
//! Layout: `bootstrap.rs` (dependency construction and watch loop start), `error.rs`.

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level errors.
pub mod error;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
