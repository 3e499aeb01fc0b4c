//! Ordered transformation pipeline for one master image.
//!
//! # Design
//! - Steps run strictly in order; the first failure aborts the chain.
//! - Cleanup of the preserved copy, its variants and intermediate outputs runs whether
//!   or not the chain succeeded; its failures are only logged.
//! - Crop and encode output land in a per-unit directory below the output directory,
//!   named after the directory holding the essence, so concurrent units never share
//!   an output path.
//! - Every step is logged on start, success and failure and counted in metrics.
//! - Collaborators (imaging, encoder, metadata copier, cropper) are trait objects so the
//!   pipeline can be exercised without the external toolchain.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use iiif_codec::{Encoder, ProfileStore};
use iiif_config::ProcessorConfig;
use iiif_fsops::{MoveOutcome, RemoveOutcome, RetryPolicy};
use iiif_telemetry::Metrics;
use tracing::{debug, info, warn};

use crate::crop::Cropper;
use crate::error::{TransformError, TransformResult};
use crate::imaging::ImageOps;
use crate::metadata::MetadataCopier;
use crate::resize::{SizeClass, target_dimensions};

const ICC_EXTENSION: &str = "icc";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepKind {
    Preserve,
    Crop,
    Inspect,
    Resize,
    ColourConvert,
    Encode,
    RestoreMetadata,
    Deliver,
    Cleanup,
}

impl StepKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Preserve => "preserve",
            Self::Crop => "crop",
            Self::Inspect => "inspect",
            Self::Resize => "resize",
            Self::ColourConvert => "colour_convert",
            Self::Encode => "encode",
            Self::RestoreMetadata => "restore_metadata",
            Self::Deliver => "deliver",
            Self::Cleanup => "cleanup",
        }
    }
}

enum StepOutcome {
    Completed(Option<String>),
    Skipped(Option<String>),
}

impl StepOutcome {
    const fn status(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Skipped(_) => "skipped",
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            Self::Completed(detail) | Self::Skipped(detail) => detail.as_deref(),
        }
    }
}

/// One sequencer invocation, as passed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    /// Essence file to transform.
    pub file_path: PathBuf,
    /// Final location of the encoded image; the encoded file stays in the output
    /// directory when absent.
    pub destination: Option<PathBuf>,
    /// Requested output size.
    pub size_class: Option<SizeClass>,
    /// Requested encoder profile.
    pub profile: Option<String>,
}

/// Facts accumulated while the chain runs. Fields are only ever filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformState {
    /// File named in the request.
    pub original: PathBuf,
    /// Per-unit directory below the configured output directory.
    pub unit_output_dir: PathBuf,
    /// Untouched copy kept for metadata restoration.
    pub preserved_copy: Option<PathBuf>,
    /// File the pixel steps operate on.
    pub working: Option<PathBuf>,
    /// Detector output, when cropping ran.
    pub cropped: Option<PathBuf>,
    /// ICC profile of the original.
    pub icc_profile: Option<Vec<u8>>,
    /// Dimensions before resizing.
    pub original_dimensions: Option<(u32, u32)>,
    /// Dimensions after resizing.
    pub target_dimensions: Option<(u32, u32)>,
    /// Encoder profile that was applied.
    pub profile: Option<String>,
    /// Encoded JPEG 2000 file in the output directory.
    pub encoded: Option<PathBuf>,
    /// Delivered file.
    pub delivered: Option<PathBuf>,
}

impl TransformState {
    fn new(original: &Path, output_root: &Path) -> Self {
        let unit_output_dir = original
            .parent()
            .and_then(Path::file_name)
            .or_else(|| original.file_stem())
            .map_or_else(|| output_root.to_path_buf(), |name| output_root.join(name));
        Self {
            original: original.to_path_buf(),
            unit_output_dir,
            ..Self::default()
        }
    }
}

fn required<'a, T>(value: Option<&'a T>, field: &'static str) -> TransformResult<&'a T> {
    value.ok_or(TransformError::MissingState { field })
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformReport {
    /// Encoded file before delivery.
    pub encoded: PathBuf,
    /// Delivered file, when a destination was requested.
    pub delivered: Option<PathBuf>,
    /// Dimensions before resizing.
    pub original_dimensions: (u32, u32),
    /// Dimensions after resizing.
    pub target_dimensions: (u32, u32),
    /// Encoder profile that was applied.
    pub profile: String,
}

/// Static sequencer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerSettings {
    /// Directory receiving encoded images and crop output.
    pub output_dir: PathBuf,
    /// Retry policy for delivery.
    pub delivery_retry: RetryPolicy,
}

impl SequencerSettings {
    /// Derive settings from the process configuration.
    #[must_use]
    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self {
            output_dir: config.transform.output_dir.clone(),
            delivery_retry: RetryPolicy {
                attempts: config.transform.move_attempts,
                base_delay: config.transform.move_base_delay(),
            },
        }
    }
}

/// Collaborators used by the sequencer.
#[derive(Clone)]
pub struct SequencerDeps {
    /// Pixel and colour operations.
    pub imaging: Arc<dyn ImageOps>,
    /// JPEG 2000 encoder.
    pub encoder: Arc<dyn Encoder>,
    /// Encoder option profiles.
    pub profiles: ProfileStore,
    /// Metadata copier.
    pub metadata: Arc<dyn MetadataCopier>,
    /// Cropper, when cropping is enabled.
    pub cropper: Option<Arc<dyn Cropper>>,
    /// Step counters.
    pub metrics: Metrics,
}

/// Runs the transformation chain.
#[derive(Clone)]
pub struct Sequencer {
    settings: SequencerSettings,
    deps: SequencerDeps,
}

impl Sequencer {
    /// Construct a sequencer.
    #[must_use]
    pub const fn new(settings: SequencerSettings, deps: SequencerDeps) -> Self {
        Self { settings, deps }
    }

    /// Transform `request.file_path` and deliver it.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step. Cleanup has run by the time the
    /// error is returned.
    pub fn run(&self, request: &TransformRequest) -> TransformResult<TransformReport> {
        let started = Instant::now();
        let mut state = TransformState::new(&request.file_path, &self.settings.output_dir);
        info!(
            file = %request.file_path.display(),
            destination = ?request.destination,
            size_class = ?request.size_class,
            profile = ?request.profile,
            "transformation started"
        );

        let result = self.execute_chain(request, &mut state);
        let _ = self.execute_step(StepKind::Cleanup, &mut state, |state| {
            let removed = self.cleanup(request, state);
            Ok(StepOutcome::Completed(Some(format!("removed {removed} files"))))
        });

        let elapsed_ms = started.elapsed().as_millis();
        match result {
            Ok(()) => {
                let report = Self::report(&state)?;
                info!(
                    encoded = %report.encoded.display(),
                    delivered = ?report.delivered,
                    elapsed_ms,
                    "transformation completed"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(error = %err, elapsed_ms, "transformation failed");
                Err(err)
            }
        }
    }

    fn execute_chain(
        &self,
        request: &TransformRequest,
        state: &mut TransformState,
    ) -> TransformResult<()> {
        self.execute_step(StepKind::Preserve, state, |state| {
            let copy = iiif_fsops::copy_file(&state.original)?;
            state.preserved_copy = Some(copy.clone());
            let stable_name = stable_file_name(&state.original)?;
            let working = iiif_fsops::rename_file(&state.original, &stable_name)?;
            state.working = Some(working);
            Ok(StepOutcome::Completed(Some(format!(
                "preserved as {}",
                copy.display()
            ))))
        })?;

        self.execute_step(StepKind::Crop, state, |state| {
            let Some(cropper) = self.deps.cropper.as_ref() else {
                return Ok(StepOutcome::Skipped(Some("crop disabled".into())));
            };
            let working = required(state.working.as_ref(), "working")?;
            ensure_dir(&state.unit_output_dir, "crop.output_dir")?;
            let cropped = cropper.crop(working, &state.unit_output_dir)?;
            state.cropped = Some(cropped.clone());
            state.working = Some(cropped);
            Ok(StepOutcome::Completed(None))
        })?;

        self.execute_step(StepKind::Inspect, state, |state| {
            let copy = required(state.preserved_copy.as_ref(), "preserved_copy")?;
            let working = required(state.working.as_ref(), "working")?;
            let original = self.deps.imaging.inspect(copy)?;
            let dimensions = if state.cropped.is_some() {
                let cropped = self.deps.imaging.inspect(working)?;
                (cropped.width, cropped.height)
            } else {
                (original.width, original.height)
            };
            let has_icc = original.icc_profile.is_some();
            state.icc_profile = original.icc_profile;
            state.original_dimensions = Some(dimensions);
            Ok(StepOutcome::Completed(Some(format!(
                "{}x{} icc={has_icc}",
                dimensions.0, dimensions.1
            ))))
        })?;

        self.execute_step(StepKind::Resize, state, |state| {
            let (width, height) = *required(state.original_dimensions.as_ref(), "dimensions")?;
            let target = target_dimensions(width, height, request.size_class);
            let working = required(state.working.as_ref(), "working")?;
            self.deps.imaging.resize(working, target)?;
            state.target_dimensions = Some(target);
            Ok(StepOutcome::Completed(Some(format!(
                "{width}x{height} -> {}x{}",
                target.0, target.1
            ))))
        })?;

        self.execute_step(StepKind::ColourConvert, state, |state| {
            let working = required(state.working.as_ref(), "working")?.clone();
            let icc_path = match state.icc_profile.as_deref() {
                Some(bytes) => {
                    let path = working.with_extension(ICC_EXTENSION);
                    fs::write(&path, bytes)
                        .map_err(|source| TransformError::io("colour.write_icc", &path, source))?;
                    Some(path)
                }
                None => None,
            };
            let result = self
                .deps
                .imaging
                .convert_to_srgb(&working, icc_path.as_deref());
            if let Some(path) = icc_path.as_deref() {
                let _ = iiif_fsops::remove_file(path);
            }
            result?;
            Ok(StepOutcome::Completed(None))
        })?;

        self.execute_step(StepKind::Encode, state, |state| {
            let working = required(state.working.as_ref(), "working")?.clone();
            let stem = working
                .file_stem()
                .ok_or(TransformError::MissingState { field: "working.stem" })?;
            ensure_dir(&state.unit_output_dir, "encode.output_dir")?;
            let mut output = state.unit_output_dir.join(stem);
            output.set_extension("jp2");

            let profile = self.deps.profiles.resolve(request.profile.as_deref())?;
            self.deps
                .encoder
                .encode(&[working], &output, profile.options())?;
            state.profile = Some(profile.name().to_string());
            state.encoded = Some(output.clone());
            Ok(StepOutcome::Completed(Some(format!(
                "{} with profile {}",
                output.display(),
                profile.name()
            ))))
        })?;

        self.execute_step(StepKind::RestoreMetadata, state, |state| {
            let copy = required(state.preserved_copy.as_ref(), "preserved_copy")?;
            let encoded = required(state.encoded.as_ref(), "encoded")?;
            self.deps.metadata.copy_metadata(copy, encoded)?;
            Ok(StepOutcome::Completed(None))
        })?;

        self.execute_step(StepKind::Deliver, state, |state| {
            let Some(destination) = request.destination.as_ref() else {
                return Ok(StepOutcome::Skipped(Some("no destination".into())));
            };
            let encoded = required(state.encoded.as_ref(), "encoded")?;
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)
                    .map_err(|source| TransformError::io("deliver.create_parent", parent, source))?;
            }
            match iiif_fsops::move_file(encoded, destination, self.settings.delivery_retry)? {
                MoveOutcome::Moved => {
                    state.delivered = Some(destination.clone());
                    Ok(StepOutcome::Completed(Some(
                        destination.display().to_string(),
                    )))
                }
                MoveOutcome::SourceMissing => Err(TransformError::MissingOutput {
                    operation: "deliver",
                    path: encoded.clone(),
                }),
            }
        })
    }

    fn cleanup(&self, request: &TransformRequest, state: &TransformState) -> usize {
        let mut removed = 0;
        if let Some(copy) = state.preserved_copy.as_deref() {
            removed += iiif_fsops::remove_prefixed_siblings(copy);
        }
        if let Some(cropped) = state.cropped.as_deref() {
            removed += removed_count(cropped);
            if let Some(run_dir) = cropped.parent() {
                remove_empty_dir(run_dir);
            }
        }
        if request.destination.is_some()
            && state.delivered.is_none()
            && let Some(encoded) = state.encoded.as_deref()
        {
            removed += removed_count(encoded);
        }
        remove_empty_dir(&state.unit_output_dir);
        debug!(
            removed,
            output_dir = %state.unit_output_dir.display(),
            "cleanup finished"
        );
        removed
    }

    fn report(state: &TransformState) -> TransformResult<TransformReport> {
        Ok(TransformReport {
            encoded: required(state.encoded.as_ref(), "encoded")?.clone(),
            delivered: state.delivered.clone(),
            original_dimensions: *required(state.original_dimensions.as_ref(), "dimensions")?,
            target_dimensions: *required(state.target_dimensions.as_ref(), "target_dimensions")?,
            profile: required(state.profile.as_ref(), "profile")?.clone(),
        })
    }

    fn execute_step<F>(
        &self,
        step: StepKind,
        state: &mut TransformState,
        op: F,
    ) -> TransformResult<()>
    where
        F: FnOnce(&mut TransformState) -> TransformResult<StepOutcome>,
    {
        debug!(step = step.as_str(), "step started");
        match op(state) {
            Ok(outcome) => {
                info!(
                    step = step.as_str(),
                    status = outcome.status(),
                    detail = outcome.detail().unwrap_or_default(),
                    "step finished"
                );
                self.deps
                    .metrics
                    .inc_transform_step(step.as_str(), outcome.status());
                Ok(())
            }
            Err(err) => {
                warn!(step = step.as_str(), error = %err, "step failed");
                self.deps.metrics.inc_transform_step(step.as_str(), "failed");
                Err(err)
            }
        }
    }
}

fn stable_file_name(path: &Path) -> TransformResult<String> {
    let stem = path
        .file_stem()
        .ok_or(TransformError::MissingState { field: "original.stem" })?
        .to_string_lossy();
    Ok(match path.extension() {
        Some(extension) => format!("{stem}.{}", extension.to_string_lossy()),
        None => stem.into_owned(),
    })
}

fn ensure_dir(dir: &Path, operation: &'static str) -> TransformResult<()> {
    fs::create_dir_all(dir).map_err(|source| TransformError::io(operation, dir, source))
}

fn remove_empty_dir(dir: &Path) {
    if let Err(err) = fs::remove_dir(dir) {
        debug!(error = %err, dir = %dir.display(), "output directory kept");
    }
}

fn removed_count(path: &Path) -> usize {
    match iiif_fsops::remove_file(path) {
        Ok(RemoveOutcome::Removed) => 1,
        Ok(RemoveOutcome::Missing) => 0,
        Err(err) => {
            warn!(error = %err, path = %path.display(), "cleanup removal failed");
            0
        }
    }
}
