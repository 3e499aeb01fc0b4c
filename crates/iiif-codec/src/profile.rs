//! Named encoder option profiles.
//!
//! # Design
//! - A profile file holds one argv token per line; only surrounding whitespace is
//!   trimmed, so a value may contain spaces (`-com` followed by a comment line).
//! - Blank lines and `#` comments are skipped.
//! - Unknown or malformed names fall back to the default profile with a warning.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{CodecError, CodecResult};

/// File extension of profile files inside the store directory.
pub const PROFILE_EXTENSION: &str = "profile";

/// Options used when no default profile file is installed.
pub const BUILTIN_DEFAULT_OPTIONS: &[&str] = &[
    "Clevels=5",
    "Clayers=12",
    "Cprecincts={256,256}",
    "Cblk={64,64}",
    "Cuse_sop=yes",
    "Cuse_eph=yes",
    "Creversible=no",
    "Corder=RPCL",
    "ORGgen_plt=yes",
    "ORGtparts=R",
    "ORGplt_parts=R",
    "Qfactor=100",
    "-rate",
    "2.5,0.5",
    "-no_weights",
    "-precise",
    "-flush_period",
    "1024",
];

/// A named, ordered list of encoder option tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderProfile {
    name: String,
    options: Vec<String>,
}

impl EncoderProfile {
    /// Build a profile from already tokenised options.
    #[must_use]
    pub fn new(name: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }

    /// Parse the contents of a profile file.
    #[must_use]
    pub fn parse(name: impl Into<String>, text: &str) -> Self {
        let options = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self::new(name, options)
    }

    /// The built-in default option list under `name`.
    #[must_use]
    pub fn builtin(name: impl Into<String>) -> Self {
        Self::new(
            name,
            BUILTIN_DEFAULT_OPTIONS
                .iter()
                .map(|option| (*option).to_string())
                .collect(),
        )
    }

    /// Profile name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Option tokens in order.
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }
}

/// Directory of `<name>.profile` files plus the name of the fallback profile.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: Option<PathBuf>,
    default_name: String,
}

impl ProfileStore {
    /// Create a store rooted at `dir`; without a directory only the built-in default exists.
    #[must_use]
    pub fn new(dir: Option<PathBuf>, default_name: impl Into<String>) -> Self {
        Self {
            dir,
            default_name: default_name.into(),
        }
    }

    /// Name of the fallback profile.
    #[must_use]
    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Resolve `requested` to a profile, falling back to the default.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Profile`] when a profile file exists but cannot be read.
    pub fn resolve(&self, requested: Option<&str>) -> CodecResult<EncoderProfile> {
        if let Some(name) = requested.map(str::trim).filter(|name| !name.is_empty()) {
            if !is_profile_name(name) {
                warn!(profile = %name, "invalid encoder profile name; using default");
            } else if let Some(profile) = self.load(name)? {
                debug!(profile = %name, "resolved encoder profile");
                return Ok(profile);
            } else if name != self.default_name {
                warn!(profile = %name, "unknown encoder profile; using default");
            }
        }
        self.resolve_default()
    }

    fn resolve_default(&self) -> CodecResult<EncoderProfile> {
        if is_profile_name(&self.default_name)
            && let Some(profile) = self.load(&self.default_name)?
        {
            return Ok(profile);
        }
        Ok(EncoderProfile::builtin(self.default_name.clone()))
    }

    fn load(&self, name: &str) -> CodecResult<Option<EncoderProfile>> {
        let Some(dir) = self.dir.as_deref() else {
            return Ok(None);
        };
        let path = profile_path(dir, name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(EncoderProfile::parse(name, &text))),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CodecError::Profile {
                operation: "profile.read",
                path,
                source,
            }),
        }
    }
}

fn profile_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{PROFILE_EXTENSION}"))
}

fn is_profile_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
