//! Process-level span helpers.
//!
//! # Design
//! - Both binaries enter one long-lived span carrying the process mode and build SHA.
//! - Work units open their own child spans keyed by a generated identifier.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    #[must_use]
    /// Enter the application-level tracing span for the lifetime of the guard.
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Build the span covering one work unit.
#[must_use]
pub fn unit_span(unit_id: &str, archive: &str) -> Span {
    tracing::info_span!("work_unit", unit_id = %unit_id, archive = %archive)
}
