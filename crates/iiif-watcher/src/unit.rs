//! Per-archive work unit handling.
//!
//! # Design
//! - [`process_archive`] depends only on the event, [`UnitSettings`] and the injected
//!   collaborators in [`UnitContext`]; it never reads process globals.
//! - An archive that fails to unpack is left untouched for inspection.
//! - Once unpacked, the archive and the work directory are removed whatever happens next.
//! - Every stage is logged and counted; the outcome is returned, never raised.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use iiif_config::ProcessorConfig;
use iiif_fsops::{
    Destination, FormatProbe, PronomId, RemoveOutcome, SidecarIds, Visibility, archive_stem,
    extract_zip, list_members,
};
use iiif_telemetry::{Metrics, unit_span};
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use crate::error::{WatchError, WatchResult};
use crate::event::ArchiveEvent;
use crate::launcher::{SequencerInvocation, SequencerLauncher};
use crate::locks::WorkDirLocks;

/// Stages of a work unit, used for logs and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitStage {
    /// Archive extension check.
    Filter,
    /// Zip extraction into the work directory.
    Unpack,
    /// Locating the essence and the sidecar.
    Classify,
    /// Sidecar parsing and export path derivation.
    Destination,
    /// Sequencer run.
    Launch,
    /// Removal of the archive and the work directory.
    Cleanup,
}

impl UnitStage {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Unpack => "unpack",
            Self::Classify => "classify",
            Self::Destination => "destination",
            Self::Launch => "launch",
            Self::Cleanup => "cleanup",
        }
    }
}

/// What cleanup achieved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// The archive was deleted (or was already gone).
    pub archive_removed: bool,
    /// The work directory was deleted (or was already gone).
    pub work_dir_removed: bool,
}

/// Result of handling one archive event.
#[derive(Debug)]
pub enum UnitOutcome {
    /// The event did not name an archive.
    Ignored,
    /// The archive could not be unpacked and was left in place.
    Abandoned {
        /// Stage that failed.
        stage: UnitStage,
        /// Failure cause.
        error: WatchError,
    },
    /// A stage after unpacking failed; cleanup ran.
    Failed {
        /// Stage that failed.
        stage: UnitStage,
        /// Failure cause.
        error: WatchError,
        /// Cleanup result.
        cleanup: CleanupReport,
    },
    /// The sequencer delivered the image; cleanup ran.
    Completed {
        /// Export path handed to the sequencer.
        destination: PathBuf,
        /// Cleanup result.
        cleanup: CleanupReport,
    },
}

impl UnitOutcome {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Abandoned { .. } => "abandoned",
            Self::Failed { .. } => "failed",
            Self::Completed { .. } => "completed",
        }
    }
}

/// A successfully unpacked and classified archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkUnit {
    /// Correlation identifier used in log spans.
    pub id: Uuid,
    /// Archive the unit came from.
    pub archive: PathBuf,
    /// Directory the archive was unpacked into.
    pub work_dir: PathBuf,
    /// Immediate file entries of the work directory, sorted by name.
    pub members: Vec<PathBuf>,
    /// Selected master image.
    pub essence: PathBuf,
    /// Selected metadata sidecar.
    pub sidecar: PathBuf,
    /// Visibility derived from the archive location.
    pub visibility: Visibility,
}

impl WorkUnit {
    /// Classify the members of `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Classification`] when no essence or no sidecar is present, or
    /// a file utility error when the directory or a member cannot be read.
    pub fn classify(
        id: Uuid,
        archive: &Path,
        work_dir: &Path,
        probe: &dyn FormatProbe,
    ) -> WatchResult<Self> {
        let members = list_members(work_dir)?;
        let essence = select_member(&members, probe, PronomId::TIFF, "essence", work_dir)?;
        let sidecar = select_member(&members, probe, PronomId::XML, "sidecar", work_dir)?;
        let directory = archive.parent().unwrap_or_else(|| Path::new(""));
        Ok(Self {
            id,
            archive: archive.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
            members,
            essence,
            sidecar,
            visibility: Visibility::from_source_dir(directory),
        })
    }
}

fn select_member(
    members: &[PathBuf],
    probe: &dyn FormatProbe,
    expected: PronomId,
    role: &'static str,
    work_dir: &Path,
) -> WatchResult<PathBuf> {
    let mut candidates = Vec::new();
    for member in members {
        if probe.matches(member, expected)? {
            candidates.push(member);
        }
    }
    let Some(chosen) = candidates.first() else {
        return Err(WatchError::Classification {
            role,
            expected: expected.as_str(),
            work_dir: work_dir.to_path_buf(),
        });
    };
    if candidates.len() > 1 {
        warn!(
            role,
            candidates = candidates.len(),
            chosen = %chosen.display(),
            "multiple candidates; using the first by name"
        );
    }
    Ok((*chosen).clone())
}

/// Settings a work unit needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitSettings {
    /// Root for per-archive work directories.
    pub work_root: PathBuf,
    /// Archive extension without the leading dot.
    pub archive_extension: String,
    /// Root of the delivered image tree.
    pub export_root: PathBuf,
    /// Extension of delivered images.
    pub export_extension: String,
    /// Size class forwarded to the sequencer.
    pub size_class: Option<String>,
    /// Encoder profile forwarded to the sequencer.
    pub profile: Option<String>,
    /// Use the archive's parent directory name as the encoder profile.
    pub profile_from_parent_dir: bool,
}

impl UnitSettings {
    /// Derive settings from the process configuration.
    #[must_use]
    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self {
            work_root: config.watcher.work_root.clone(),
            archive_extension: config.watcher.archive_extension.clone(),
            export_root: config.export.root.clone(),
            export_extension: config.export.extension.clone(),
            size_class: config.sequencer.size_class.clone(),
            profile: config.sequencer.profile.clone(),
            profile_from_parent_dir: config.watcher.profile_from_parent_dir,
        }
    }

    fn profile_for(&self, archive: &Path) -> Option<String> {
        if self.profile_from_parent_dir {
            let derived = archive
                .parent()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned());
            if derived.is_some() {
                return derived;
            }
        }
        self.profile.clone()
    }
}

/// Collaborators shared by all work units.
#[derive(Clone)]
pub struct UnitContext {
    /// Static settings.
    pub settings: UnitSettings,
    /// Member format identification.
    pub probe: Arc<dyn FormatProbe>,
    /// Sequencer delegation.
    pub launcher: Arc<dyn SequencerLauncher>,
    /// Unit counters.
    pub metrics: Metrics,
    /// Work directory exclusion.
    pub locks: WorkDirLocks,
}

/// Handle one archive event end to end.
pub async fn process_archive(event: ArchiveEvent, ctx: &UnitContext) -> UnitOutcome {
    if !event.has_extension(&ctx.settings.archive_extension) {
        debug!(path = %event.path.display(), "ignoring non-archive file");
        ctx.metrics.inc_unit_stage(UnitStage::Filter.as_str(), "skipped");
        ctx.metrics.inc_work_unit(UnitOutcome::Ignored.label());
        return UnitOutcome::Ignored;
    }

    let id = Uuid::new_v4();
    let span = unit_span(&id.to_string(), &event.path.display().to_string());
    async move {
        let started = Instant::now();
        ctx.metrics.unit_started();
        let outcome = run_unit(id, &event, ctx).await;
        ctx.metrics.unit_finished(started.elapsed());
        ctx.metrics.inc_work_unit(outcome.label());
        log_outcome(&outcome);
        outcome
    }
    .instrument(span)
    .await
}

fn log_outcome(outcome: &UnitOutcome) {
    match outcome {
        UnitOutcome::Completed { destination, .. } => {
            info!(destination = %destination.display(), "work unit completed");
        }
        UnitOutcome::Failed { stage, error, .. } | UnitOutcome::Abandoned { stage, error } => {
            warn!(
                stage = stage.as_str(),
                outcome = outcome.label(),
                error = %error,
                detail = ?error,
                "work unit did not complete"
            );
        }
        UnitOutcome::Ignored => {}
    }
}

async fn run_unit(id: Uuid, event: &ArchiveEvent, ctx: &UnitContext) -> UnitOutcome {
    let archive = event.path.clone();
    let stem = match archive_stem(&archive) {
        Ok(stem) => stem,
        Err(err) => return abandon(ctx, UnitStage::Unpack, err.into()),
    };
    let work_dir = ctx.settings.work_root.join(stem);
    let _guard = ctx.locks.acquire(&work_dir).await;

    if let Err(error) = unpack(&archive, &work_dir).await {
        return abandon(ctx, UnitStage::Unpack, error);
    }
    record_stage(ctx, UnitStage::Unpack, "completed");

    let result = delegate(id, &archive, &work_dir, ctx).await;
    let cleanup = cleanup(&archive, &work_dir).await;
    record_stage(ctx, UnitStage::Cleanup, "completed");

    match result {
        Ok(destination) => UnitOutcome::Completed {
            destination,
            cleanup,
        },
        Err((stage, error)) => UnitOutcome::Failed {
            stage,
            error,
            cleanup,
        },
    }
}

fn abandon(ctx: &UnitContext, stage: UnitStage, error: WatchError) -> UnitOutcome {
    record_stage(ctx, stage, "failed");
    UnitOutcome::Abandoned { stage, error }
}

fn record_stage(ctx: &UnitContext, stage: UnitStage, status: &str) {
    ctx.metrics.inc_unit_stage(stage.as_str(), status);
}

async fn unpack(archive: &Path, work_dir: &Path) -> WatchResult<usize> {
    let archive = archive.to_path_buf();
    let work_dir = work_dir.to_path_buf();
    tokio::task::spawn_blocking(move || -> WatchResult<usize> {
        if work_dir.exists() {
            warn!(work_dir = %work_dir.display(), "removing stale work directory");
            std::fs::remove_dir_all(&work_dir).map_err(|source| iiif_fsops::FsOpsError::Io {
                operation: "unpack.remove_stale",
                path: work_dir.clone(),
                source,
            })?;
        }
        match extract_zip(&archive, &work_dir) {
            Ok(count) => {
                info!(archive = %archive.display(), work_dir = %work_dir.display(), files = count, "unpacked archive");
                Ok(count)
            }
            Err(err) => {
                if work_dir.exists()
                    && let Err(remove_err) = std::fs::remove_dir_all(&work_dir)
                {
                    warn!(error = %remove_err, work_dir = %work_dir.display(), "failed to remove partial work directory");
                }
                Err(WatchError::from(err))
            }
        }
    })
    .await
    .map_err(|source| WatchError::Task {
        operation: "unpack",
        source,
    })?
}

async fn delegate(
    id: Uuid,
    archive: &Path,
    work_dir: &Path,
    ctx: &UnitContext,
) -> Result<PathBuf, (UnitStage, WatchError)> {
    let unit = run_stage(ctx, UnitStage::Classify, || {
        WorkUnit::classify(id, archive, work_dir, ctx.probe.as_ref())
    })?;
    debug!(
        essence = %unit.essence.display(),
        sidecar = %unit.sidecar.display(),
        visibility = %unit.visibility,
        members = unit.members.len(),
        "classified archive"
    );

    let destination = run_stage(ctx, UnitStage::Destination, || {
        let ids = SidecarIds::from_path(&unit.sidecar)?;
        Ok(Destination::new(
            &ctx.settings.export_root,
            unit.visibility,
            ids,
            &ctx.settings.export_extension,
        )
        .path())
    })?;

    let invocation = SequencerInvocation {
        essence: unit.essence.clone(),
        destination: destination.clone(),
        size_class: ctx.settings.size_class.clone(),
        profile: ctx.settings.profile_for(archive),
    };
    match ctx.launcher.launch(&invocation).await {
        Ok(()) => {
            record_stage(ctx, UnitStage::Launch, "completed");
            Ok(destination)
        }
        Err(error) => {
            record_stage(ctx, UnitStage::Launch, "failed");
            Err((UnitStage::Launch, error))
        }
    }
}

fn run_stage<T, F>(ctx: &UnitContext, stage: UnitStage, op: F) -> Result<T, (UnitStage, WatchError)>
where
    F: FnOnce() -> WatchResult<T>,
{
    match op() {
        Ok(value) => {
            record_stage(ctx, stage, "completed");
            Ok(value)
        }
        Err(error) => {
            record_stage(ctx, stage, "failed");
            Err((stage, error))
        }
    }
}

async fn cleanup(archive: &Path, work_dir: &Path) -> CleanupReport {
    let archive = archive.to_path_buf();
    let work_dir = work_dir.to_path_buf();
    let joined = tokio::task::spawn_blocking(move || {
        let archive_removed = match iiif_fsops::remove_file(&archive) {
            Ok(RemoveOutcome::Removed | RemoveOutcome::Missing) => true,
            Err(err) => {
                warn!(error = %err, archive = %archive.display(), "failed to delete archive");
                false
            }
        };
        let work_dir_removed = match std::fs::remove_dir_all(&work_dir) {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
            Err(err) => {
                warn!(error = %err, work_dir = %work_dir.display(), "failed to remove work directory");
                false
            }
        };
        CleanupReport {
            archive_removed,
            work_dir_removed,
        }
    })
    .await;
    joined.unwrap_or_else(|err| {
        warn!(error = %err, "cleanup task failed");
        CleanupReport::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use iiif_fsops::SignatureProbe;
    use iiif_test_support::fixtures::{
        TIFF_LE_HEADER, sidecar_xml, write_ingest_archive, write_zip_archive,
    };
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    type TestResult<T> = anyhow::Result<T>;

    #[derive(Default)]
    struct FakeLauncher {
        calls: Mutex<Vec<SequencerInvocation>>,
        exit_status: Option<i32>,
        seen_essence: Mutex<Vec<bool>>,
    }

    impl FakeLauncher {
        fn failing(status: i32) -> Self {
            Self {
                exit_status: Some(status),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<SequencerInvocation> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl SequencerLauncher for FakeLauncher {
        async fn launch(&self, invocation: &SequencerInvocation) -> WatchResult<()> {
            if let Ok(mut seen) = self.seen_essence.lock() {
                seen.push(invocation.essence.is_file());
            }
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(invocation.clone());
            }
            match self.exit_status {
                Some(status) => Err(WatchError::SequencerFailed {
                    program: PathBuf::from("transform-file"),
                    status: Some(status),
                }),
                None => Ok(()),
            }
        }
    }

    struct Fixture {
        temp: TempDir,
        launcher: Arc<FakeLauncher>,
        ctx: UnitContext,
    }

    impl Fixture {
        fn new(launcher: FakeLauncher) -> TestResult<Self> {
            let temp = TempDir::new()?;
            let launcher = Arc::new(launcher);
            let settings = UnitSettings {
                work_root: temp.path().join("work"),
                archive_extension: "zip".into(),
                export_root: PathBuf::from("/export/images"),
                export_extension: "jp2".into(),
                size_class: None,
                profile: None,
                profile_from_parent_dir: false,
            };
            let launcher_dyn: Arc<dyn SequencerLauncher> = launcher.clone();
            let ctx = UnitContext {
                settings,
                probe: Arc::new(SignatureProbe),
                launcher: launcher_dyn,
                metrics: Metrics::new()?,
                locks: WorkDirLocks::new(),
            };
            Ok(Self {
                temp,
                launcher,
                ctx,
            })
        }

        fn incoming(&self, relative: &str) -> PathBuf {
            self.temp.path().join("incoming").join(relative)
        }

        fn event(path: &Path) -> TestResult<ArchiveEvent> {
            ArchiveEvent::close_write(path).ok_or_else(|| anyhow::anyhow!("no file name"))
        }
    }

    #[tokio::test]
    async fn restricted_archive_is_delivered_and_cleaned() -> TestResult<()> {
        let fixture = Fixture::new(FakeLauncher::default())?;
        let archive = fixture.incoming("restricted/bundle.zip");
        write_ingest_archive(&archive, "OR-x", "ab12")?;

        let outcome = process_archive(Fixture::event(&archive)?, &fixture.ctx).await;
        match outcome {
            UnitOutcome::Completed {
                destination,
                cleanup,
            } => {
                assert_eq!(
                    destination,
                    PathBuf::from("/export/images/restricted/OR-x/ab/ab12.jp2")
                );
                assert!(cleanup.archive_removed && cleanup.work_dir_removed);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let calls = fixture.launcher.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].essence,
            fixture.temp.path().join("work/bundle/essence.tif")
        );
        assert_eq!(fixture.launcher.seen_essence.lock().map(|s| s.clone()).unwrap_or_default(), [true]);
        assert!(!archive.exists());
        assert!(!fixture.temp.path().join("work/bundle").exists());
        assert_eq!(fixture.ctx.metrics.snapshot().units_completed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn public_directory_yields_public_visibility() -> TestResult<()> {
        let fixture = Fixture::new(FakeLauncher::default())?;
        let archive = fixture.incoming("public/OR-rf5kf25/bundle.zip");
        write_ingest_archive(&archive, "OR-rf5kf25", "abc123xyz")?;
        let outcome = process_archive(Fixture::event(&archive)?, &fixture.ctx).await;
        assert!(matches!(
            outcome,
            UnitOutcome::Completed { ref destination, .. }
                if destination == Path::new("/export/images/public/OR-rf5kf25/ab/abc123xyz.jp2")
        ));
        Ok(())
    }

    #[tokio::test]
    async fn non_archives_are_ignored() -> TestResult<()> {
        let fixture = Fixture::new(FakeLauncher::default())?;
        let path = fixture.incoming("restricted/notes.txt");
        fs::create_dir_all(fixture.incoming("restricted"))?;
        fs::write(&path, "hello")?;
        let outcome = process_archive(Fixture::event(&path)?, &fixture.ctx).await;
        assert!(matches!(outcome, UnitOutcome::Ignored));
        assert!(path.exists());
        assert!(fixture.launcher.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_archive_is_left_in_place() -> TestResult<()> {
        let fixture = Fixture::new(FakeLauncher::default())?;
        let archive = fixture.incoming("restricted/broken.zip");
        fs::create_dir_all(fixture.incoming("restricted"))?;
        fs::write(&archive, b"definitely not a zip")?;
        let outcome = process_archive(Fixture::event(&archive)?, &fixture.ctx).await;
        assert!(matches!(
            outcome,
            UnitOutcome::Abandoned {
                stage: UnitStage::Unpack,
                ..
            }
        ));
        assert!(archive.exists());
        assert!(!fixture.temp.path().join("work/broken").exists());
        assert!(fixture.launcher.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_sidecar_fails_classification_and_cleans_up() -> TestResult<()> {
        let fixture = Fixture::new(FakeLauncher::default())?;
        let archive = fixture.incoming("restricted/nosidecar.zip");
        write_zip_archive(&archive, &[("essence.tif", TIFF_LE_HEADER)])?;
        let outcome = process_archive(Fixture::event(&archive)?, &fixture.ctx).await;
        match outcome {
            UnitOutcome::Failed {
                stage,
                error,
                cleanup,
            } => {
                assert_eq!(stage, UnitStage::Classify);
                assert!(matches!(
                    error,
                    WatchError::Classification {
                        role: "sidecar",
                        ..
                    }
                ));
                assert!(cleanup.archive_removed);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!archive.exists());
        assert!(!fixture.temp.path().join("work/nosidecar").exists());
        assert!(fixture.launcher.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_essence_fails_classification_without_launching() -> TestResult<()> {
        let fixture = Fixture::new(FakeLauncher::default())?;
        let archive = fixture.incoming("public/noessence.zip");
        let sidecar = sidecar_xml("OR-x", "ab12");
        write_zip_archive(&archive, &[("sidecar.xml", sidecar.as_bytes())])?;
        let outcome = process_archive(Fixture::event(&archive)?, &fixture.ctx).await;
        match outcome {
            UnitOutcome::Failed {
                stage,
                error,
                cleanup,
            } => {
                assert_eq!(stage, UnitStage::Classify);
                assert!(matches!(
                    error,
                    WatchError::Classification {
                        role: "essence",
                        ..
                    }
                ));
                assert!(cleanup.archive_removed);
                assert!(cleanup.work_dir_removed);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!archive.exists());
        assert!(!fixture.temp.path().join("work/noessence").exists());
        assert!(fixture.launcher.calls().is_empty());
        Ok(())
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn text(&self) -> String {
            self.0
                .lock()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        }
    }

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Ok(mut bytes) = self.0.lock() {
                bytes.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn failure_log_carries_exit_detail() {
        let captured = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();
        let outcome = UnitOutcome::Failed {
            stage: UnitStage::Launch,
            error: WatchError::SequencerFailed {
                program: PathBuf::from("/opt/bin/transform-file"),
                status: Some(3),
            },
            cleanup: CleanupReport {
                archive_removed: true,
                work_dir_removed: true,
            },
        };
        tracing::subscriber::with_default(subscriber, || log_outcome(&outcome));
        let text = captured.text();
        assert!(text.contains("stage=\"launch\""), "{text}");
        assert!(text.contains("Some(3)"), "{text}");
        assert!(text.contains("/opt/bin/transform-file"), "{text}");
    }

    #[tokio::test]
    async fn sequencer_failure_still_cleans_up() -> TestResult<()> {
        let fixture = Fixture::new(FakeLauncher::failing(3))?;
        let archive = fixture.incoming("restricted/bundle.zip");
        write_ingest_archive(&archive, "OR-x", "ab12")?;
        let outcome = process_archive(Fixture::event(&archive)?, &fixture.ctx).await;
        assert!(matches!(
            outcome,
            UnitOutcome::Failed {
                stage: UnitStage::Launch,
                error: WatchError::SequencerFailed {
                    status: Some(3),
                    ..
                },
                ..
            }
        ));
        assert!(!archive.exists());
        assert!(!fixture.temp.path().join("work/bundle").exists());
        assert_eq!(fixture.ctx.metrics.snapshot().units_failed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn missing_identifier_is_a_destination_failure() -> TestResult<()> {
        let fixture = Fixture::new(FakeLauncher::default())?;
        let archive = fixture.incoming("restricted/noid.zip");
        let sidecar = "<?xml version=\"1.0\"?><Sidecar><CP_id>OR-x</CP_id></Sidecar>";
        write_zip_archive(
            &archive,
            &[("essence.tif", TIFF_LE_HEADER), ("sidecar.xml", sidecar.as_bytes())],
        )?;
        let outcome = process_archive(Fixture::event(&archive)?, &fixture.ctx).await;
        assert!(matches!(
            outcome,
            UnitOutcome::Failed {
                stage: UnitStage::Destination,
                ..
            }
        ));
        assert!(!archive.exists());
        Ok(())
    }

    #[tokio::test]
    async fn stale_work_directory_is_replaced() -> TestResult<()> {
        let fixture = Fixture::new(FakeLauncher::default())?;
        let stale = fixture.temp.path().join("work/bundle");
        fs::create_dir_all(&stale)?;
        fs::write(stale.join("aaa-leftover.tif"), TIFF_LE_HEADER)?;
        let archive = fixture.incoming("restricted/bundle.zip");
        write_ingest_archive(&archive, "OR-x", "ab12")?;
        let outcome = process_archive(Fixture::event(&archive)?, &fixture.ctx).await;
        assert!(matches!(outcome, UnitOutcome::Completed { .. }));
        assert_eq!(
            fixture.launcher.calls()[0].essence,
            stale.join("essence.tif")
        );
        Ok(())
    }

    #[tokio::test]
    async fn profile_can_come_from_parent_directory() -> TestResult<()> {
        let mut fixture = Fixture::new(FakeLauncher::default())?;
        fixture.ctx.settings.profile_from_parent_dir = true;
        fixture.ctx.settings.size_class = Some("medium".into());
        let archive = fixture.incoming("public/newspaper/bundle.zip");
        write_ingest_archive(&archive, "OR-x", "ab12")?;
        let _ = process_archive(Fixture::event(&archive)?, &fixture.ctx).await;
        let calls = fixture.launcher.calls();
        assert_eq!(calls[0].profile.as_deref(), Some("newspaper"));
        assert_eq!(calls[0].size_class.as_deref(), Some("medium"));
        Ok(())
    }

    #[test]
    fn classification_picks_first_candidate_by_name() -> TestResult<()> {
        let temp = TempDir::new()?;
        let work = temp.path().join("bundle");
        fs::create_dir_all(&work)?;
        fs::write(work.join("b.tif"), TIFF_LE_HEADER)?;
        fs::write(work.join("a.tif"), TIFF_LE_HEADER)?;
        fs::write(work.join("meta.xml"), "<?xml version=\"1.0\"?><a/>")?;
        fs::write(work.join("readme.txt"), "x")?;
        let unit = WorkUnit::classify(
            Uuid::new_v4(),
            &temp.path().join("restricted/bundle.zip"),
            &work,
            &SignatureProbe,
        )?;
        assert_eq!(unit.essence, work.join("a.tif"));
        assert_eq!(unit.sidecar, work.join("meta.xml"));
        assert_eq!(unit.members.len(), 4);
        assert_eq!(unit.visibility, Visibility::Restricted);
        Ok(())
    }
}
