//! Per work directory mutual exclusion.
//!
//! Two archives with the same stem map to the same work directory; the registry makes
//! the second unit wait until the first has cleaned up.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of locks keyed by work directory.
#[derive(Clone, Debug, Default)]
pub struct WorkDirLocks {
    inner: Arc<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>>,
}

impl WorkDirLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `work_dir`; released when the guard drops.
    pub async fn acquire(&self, work_dir: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = match self.inner.lock() {
                Ok(map) => map,
                Err(poisoned) => poisoned.into_inner(),
            };
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(work_dir.to_path_buf()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of work directories currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.inner.lock().map_or(0, |map| map.len())
    }
}
