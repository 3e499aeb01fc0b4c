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

//! Encoder adapter: validated invocation of the Kakadu JPEG 2000 encoder.
//!
//! Layout: `kakadu.rs` (process wrapper and [`Encoder`] seam), `profile.rs` (named option
//! lists), `error.rs`.

pub mod error;
pub mod kakadu;
pub mod profile;

pub use error::{CodecError, CodecResult};
pub use kakadu::{Encoder, KakaduEncoder};
pub use profile::{BUILTIN_DEFAULT_OPTIONS, EncoderProfile, PROFILE_EXTENSION, ProfileStore};
