//! Byte-signature format identification using PRONOM identifiers.
//!
//! # Design
//! - Identify files from their leading bytes only; the extension is never consulted.
//! - Keep identification behind [`FormatProbe`] so another identifier can be substituted.
//! - Identifier comparison is exact; there is no fuzzy or family matching.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{FsOpsError, FsOpsResult};

const SNIFF_LEN: u64 = 512;
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const TIFF_LE: &[u8] = b"II*\0";
const TIFF_BE: &[u8] = b"MM\0*";
const JP2_SIGNATURE: &[u8] = &[
    0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
];

/// PRONOM format identifier such as `fmt/353`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PronomId(&'static str);

impl PronomId {
    /// Tagged Image File Format.
    pub const TIFF: Self = Self("fmt/353");
    /// Extensible Markup Language.
    pub const XML: Self = Self("fmt/101");
    /// JPEG 2000 JP2 container.
    pub const JP2: Self = Self("x-fmt/392");

    /// Borrow the identifier string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PronomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Capability answering "which format is this file" and "is this file format X".
pub trait FormatProbe: Send + Sync {
    /// Identify the file's format, returning `None` when no signature matches.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or read.
    fn identify(&self, path: &Path) -> FsOpsResult<Option<PronomId>>;

    /// Check whether the file matches the expected identifier exactly.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or read.
    fn matches(&self, path: &Path, expected: PronomId) -> FsOpsResult<bool> {
        Ok(self.identify(path)? == Some(expected))
    }
}

/// Probe that recognises TIFF, XML and JP2 from their leading bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureProbe;

impl SignatureProbe {
    /// Classify a byte prefix without touching the filesystem.
    #[must_use]
    pub fn classify(prefix: &[u8]) -> Option<PronomId> {
        if prefix.starts_with(TIFF_LE) || prefix.starts_with(TIFF_BE) {
            return Some(PronomId::TIFF);
        }
        if prefix.starts_with(JP2_SIGNATURE) {
            return Some(PronomId::JP2);
        }
        let body = prefix.strip_prefix(UTF8_BOM).unwrap_or(prefix);
        let body = body.trim_ascii_start();
        if body.starts_with(b"<?xml") {
            return Some(PronomId::XML);
        }
        None
    }
}

impl FormatProbe for SignatureProbe {
    fn identify(&self, path: &Path) -> FsOpsResult<Option<PronomId>> {
        let file = File::open(path).map_err(|err| FsOpsError::io("probe.open", path, err))?;
        let mut prefix = Vec::with_capacity(64);
        file.take(SNIFF_LEN)
            .read_to_end(&mut prefix)
            .map_err(|err| FsOpsError::io("probe.read", path, err))?;
        Ok(Self::classify(&prefix))
    }
}
