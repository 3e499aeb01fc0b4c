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

//! Transformation sequencer: preserve, crop, resize, colour convert, encode, restore
//! metadata, deliver and clean up a single master image.
//!
//! Layout: `sequencer.rs` (ordered step pipeline), `resize.rs` (size policy),
//! `imaging.rs` (pixel and colour primitives), `crop.rs`, `metadata.rs`, `tool.rs`
//! (external process runner), `error.rs`.

pub mod crop;
pub mod error;
pub mod imaging;
pub mod metadata;
pub mod resize;
pub mod sequencer;
pub mod tool;

pub use crop::{ColorcheckerCropper, Cropper};
pub use error::{TransformError, TransformResult};
pub use imaging::{ImageInfo, ImageOps, RasterOps};
pub use metadata::{ExifTool, MetadataCopier};
pub use resize::{SizeClass, resize_policy, target_dimensions};
pub use sequencer::{
    Sequencer, SequencerDeps, SequencerSettings, TransformReport, TransformRequest,
    TransformState,
};
pub use tool::{ToolCommand, ToolOutput};
