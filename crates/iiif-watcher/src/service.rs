//! Watch loop: filesystem notifications in, bounded concurrent work units out.
//!
//! # Design
//! - The notify backend runs on its own thread and forwards close-write events over an
//!   unbounded channel; filtering by extension happens in the work unit.
//! - A semaphore caps the number of units in flight; events wait for a permit in arrival
//!   order.
//! - On shutdown no new events are taken and in-flight units run to completion. An
//!   event still waiting for a permit is dropped and its archive stays in place.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{WatchError, WatchResult};
use crate::event::ArchiveEvent;
use crate::unit::{UnitContext, UnitOutcome, process_archive};

/// Long-running watcher over an archive drop tree.
pub struct WatchService {
    watch_root: PathBuf,
    max_concurrent_units: usize,
    ctx: Arc<UnitContext>,
}

impl WatchService {
    /// Build a service; a concurrency limit of zero is treated as one.
    #[must_use]
    pub fn new(watch_root: impl Into<PathBuf>, max_concurrent_units: usize, ctx: UnitContext) -> Self {
        Self {
            watch_root: watch_root.into(),
            max_concurrent_units: max_concurrent_units.max(1),
            ctx: Arc::new(ctx),
        }
    }

    /// Directory tree being watched.
    #[must_use]
    pub fn watch_root(&self) -> &Path {
        &self.watch_root
    }

    /// Watch the root recursively until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] when the notification backend cannot be created or
    /// the root cannot be watched.
    pub async fn run<F>(&self, shutdown: F) -> WatchResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let _watcher = self.subscribe(tx)?;
        info!(
            watch_root = %self.watch_root.display(),
            max_concurrent_units = self.max_concurrent_units,
            "watching for archives"
        );
        self.consume(rx, shutdown).await;
        Ok(())
    }

    fn subscribe(&self, tx: UnboundedSender<ArchiveEvent>) -> WatchResult<RecommendedWatcher> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for archive in ArchiveEvent::from_notify(&event) {
                    if tx.send(archive).is_err() {
                        debug!("watch loop stopped; dropping event");
                    }
                }
            }
            Err(err) => warn!(error = %err, "filesystem notification error"),
        })
        .map_err(|source| WatchError::Notify {
            operation: "watch.create",
            path: self.watch_root.clone(),
            source,
        })?;
        watcher
            .watch(&self.watch_root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Notify {
                operation: "watch.subscribe",
                path: self.watch_root.clone(),
                source,
            })?;
        Ok(watcher)
    }

    /// Process events from `rx` until the channel closes or `shutdown` resolves, then
    /// wait for in-flight units.
    pub async fn consume<F>(&self, mut rx: UnboundedReceiver<ArchiveEvent>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let permits = Arc::new(Semaphore::new(self.max_concurrent_units));
        let mut units = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(in_flight = units.len(), "shutdown requested; draining work units");
                    break;
                }
                received = rx.recv() => {
                    let Some(event) = received else {
                        debug!("event channel closed");
                        break;
                    };
                    let permit = tokio::select! {
                        biased;
                        () = &mut shutdown => {
                            info!(
                                in_flight = units.len(),
                                path = %event.path.display(),
                                "shutdown requested while waiting for a worker; leaving archive in place"
                            );
                            break;
                        }
                        acquired = Arc::clone(&permits).acquire_owned() => match acquired {
                            Ok(permit) => permit,
                            Err(_) => break,
                        },
                    };
                    let ctx = Arc::clone(&self.ctx);
                    units.spawn(async move {
                        let _permit = permit;
                        process_archive(event, &ctx).await
                    });
                }
                Some(joined) = units.join_next(), if !units.is_empty() => log_joined(joined),
            }
        }

        while let Some(joined) = units.join_next().await {
            log_joined(joined);
        }
        let snapshot = self.ctx.metrics.snapshot();
        info!(
            completed = snapshot.units_completed,
            failed = snapshot.units_failed,
            abandoned = snapshot.units_abandoned,
            ignored = snapshot.units_ignored,
            "watch loop stopped"
        );
    }
}

fn log_joined(joined: Result<UnitOutcome, JoinError>) {
    match joined {
        Ok(outcome) => debug!(outcome = outcome.label(), "work unit finished"),
        Err(err) => warn!(error = %err, "work unit task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::{SequencerInvocation, SequencerLauncher};
    use crate::locks::WorkDirLocks;
    use crate::unit::UnitSettings;
    use async_trait::async_trait;
    use iiif_fsops::SignatureProbe;
    use iiif_telemetry::Metrics;
    use iiif_test_support::fixtures::write_ingest_archive;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    type TestResult<T> = anyhow::Result<T>;

    #[derive(Default)]
    struct SlowLauncher {
        active: AtomicUsize,
        peak: AtomicUsize,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl SequencerLauncher for SlowLauncher {
        async fn launch(&self, _invocation: &SequencerInvocation) -> WatchResult<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn context(temp: &TempDir, launcher: Arc<SlowLauncher>) -> TestResult<UnitContext> {
        Ok(UnitContext {
            settings: UnitSettings {
                work_root: temp.path().join("work"),
                archive_extension: "zip".into(),
                export_root: temp.path().join("export"),
                export_extension: "jp2".into(),
                size_class: None,
                profile: None,
                profile_from_parent_dir: false,
            },
            probe: Arc::new(SignatureProbe),
            launcher,
            metrics: Metrics::new()?,
            locks: WorkDirLocks::new(),
        })
    }

    #[tokio::test]
    async fn concurrency_is_bounded_and_all_units_finish() -> TestResult<()> {
        let temp = TempDir::new()?;
        let launcher = Arc::new(SlowLauncher::default());
        let service = WatchService::new(temp.path(), 2, context(&temp, launcher.clone())?);

        let (tx, rx) = mpsc::unbounded_channel();
        for index in 0..4 {
            let archive = temp.path().join(format!("pub/restricted/bundle-{index}.zip"));
            write_ingest_archive(&archive, "OR-x", &format!("ab{index}"))?;
            tx.send(ArchiveEvent::close_write(&archive).ok_or_else(|| anyhow::anyhow!("name"))?)?;
        }
        let notes = temp.path().join("pub/restricted/readme.txt");
        std::fs::write(&notes, "x")?;
        tx.send(ArchiveEvent::close_write(&notes).ok_or_else(|| anyhow::anyhow!("name"))?)?;
        drop(tx);

        service.consume(rx, std::future::pending()).await;

        assert_eq!(launcher.runs.load(Ordering::SeqCst), 4);
        assert!(launcher.peak.load(Ordering::SeqCst) <= 2);
        let snapshot = service.ctx.metrics.snapshot();
        assert_eq!(snapshot.units_completed, 4);
        assert_eq!(snapshot.units_ignored, 1);
        assert_eq!(snapshot.units_in_flight, 0);
        assert!(notes.exists());
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() -> TestResult<()> {
        let temp = TempDir::new()?;
        let launcher = Arc::new(SlowLauncher::default());
        let service = WatchService::new(temp.path(), 0, context(&temp, launcher.clone())?);
        let (_tx, rx) = mpsc::unbounded_channel();
        let stopped = tokio::time::timeout(
            Duration::from_secs(5),
            service.consume(rx, std::future::ready(())),
        )
        .await;
        assert!(stopped.is_ok());
        assert_eq!(launcher.runs.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_while_waiting_for_a_worker_starts_nothing_new() -> TestResult<()> {
        let temp = TempDir::new()?;
        let launcher = Arc::new(SlowLauncher::default());
        let service = WatchService::new(temp.path(), 1, context(&temp, launcher.clone())?);

        let (tx, rx) = mpsc::unbounded_channel();
        let mut archives = Vec::new();
        for index in 0..2 {
            let archive = temp.path().join(format!("pub/restricted/queued-{index}.zip"));
            write_ingest_archive(&archive, "OR-x", &format!("cd{index}"))?;
            tx.send(ArchiveEvent::close_write(&archive).ok_or_else(|| anyhow::anyhow!("name"))?)?;
            archives.push(archive);
        }

        service
            .consume(rx, tokio::time::sleep(Duration::from_millis(20)))
            .await;

        assert_eq!(launcher.runs.load(Ordering::SeqCst), 1);
        assert!(!archives[0].exists());
        assert!(archives[1].exists());
        drop(tx);
        Ok(())
    }

    #[tokio::test]
    async fn missing_root_cannot_be_watched() -> TestResult<()> {
        let temp = TempDir::new()?;
        let launcher = Arc::new(SlowLauncher::default());
        let service = WatchService::new(
            temp.path().join("does-not-exist"),
            1,
            context(&temp, launcher)?,
        );
        let err = service
            .run(std::future::ready(()))
            .await
            .expect_err("missing root must fail");
        assert!(matches!(err, WatchError::Notify { .. }));
        Ok(())
    }
}
