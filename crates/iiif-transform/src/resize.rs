//! Target dimension policy.
//!
//! # Design
//! - Pure functions; the aspect ratio is kept and results are rounded half to even.
//! - With a maximum dimension the longest side is pinned to it.
//! - Without one, widths above 5000 px are shrunk and widths above 15000 px capped at 10000.

use std::fmt;

use tracing::warn;

const CAP_THRESHOLD: u32 = 15_000;
const CAPPED_WIDTH: u32 = 10_000;
const SHRINK_THRESHOLD: u32 = 5_000;

/// Named output size requested through `--max_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    /// Longest side 2000 px.
    Small,
    /// Longest side 4500 px.
    Medium,
    /// Longest side 10000 px.
    Large,
    /// Original dimensions.
    Full,
}

impl SizeClass {
    /// Parse a size class token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    /// Parse an optional token; unknown tokens are logged and treated as absent.
    #[must_use]
    pub fn from_token(token: Option<&str>) -> Option<Self> {
        let token = token?;
        let parsed = Self::parse(token);
        if parsed.is_none() {
            warn!(max_size = %token, "unknown size class; using width based policy");
        }
        parsed
    }

    /// Longest side for this class; `None` for [`SizeClass::Full`].
    #[must_use]
    pub const fn max_dimension(self) -> Option<u32> {
        match self {
            Self::Small => Some(2_000),
            Self::Medium => Some(4_500),
            Self::Large => Some(10_000),
            Self::Full => None,
        }
    }

    /// Token form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Compute the resized dimensions for an image of `width` x `height`.
#[must_use]
pub fn resize_policy(width: u32, height: u32, max_dimension: Option<u32>) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let ratio = f64::from(width) / f64::from(height);

    if let Some(max) = max_dimension {
        let max_f = f64::from(max);
        return if width > height {
            (max, round_dimension(max_f / ratio))
        } else {
            (round_dimension(max_f * ratio), max)
        };
    }

    let new_width = if width > CAP_THRESHOLD {
        f64::from(CAPPED_WIDTH)
    } else if width > SHRINK_THRESHOLD {
        f64::from(SHRINK_THRESHOLD) + f64::from(width - SHRINK_THRESHOLD) / 2.0
    } else {
        f64::from(width)
    };
    (round_dimension(new_width), round_dimension(new_width / ratio))
}

/// Dimensions for a size class; [`SizeClass::Full`] keeps the original size.
#[must_use]
pub fn target_dimensions(width: u32, height: u32, size_class: Option<SizeClass>) -> (u32, u32) {
    match size_class {
        Some(SizeClass::Full) => (width, height),
        Some(class) => resize_policy(width, height, class.max_dimension()),
        None => resize_policy(width, height, None),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_dimension(value: f64) -> u32 {
    let rounded = value.round_ties_even();
    if rounded.is_nan() || rounded < 1.0 {
        1
    } else if rounded >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        rounded as u32
    }
}
