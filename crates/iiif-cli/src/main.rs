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

//! Thin entrypoint for the `transform-file` sequencer process.

use std::process;

fn main() {
    process::exit(iiif_cli::run());
}
