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
#![allow(clippy::redundant_pub_crate)]

//! `transform-file`: runs the transformation sequencer for one master image.
//!
//! Layout:
//! - `cli.rs`: argument parsing, validation and dispatch
//! - `error.rs`: exit code mapping
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod error;

pub use cli::{run, run_from};
