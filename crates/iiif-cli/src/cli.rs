//! Argument parsing and sequencer wiring for `transform-file`.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use iiif_codec::{KakaduEncoder, ProfileStore};
use iiif_config::{CONFIG_PATH_ENV, ProcessorConfig};
use iiif_telemetry::{GlobalContextGuard, LoggingConfig, Metrics, init_logging};
use iiif_transform::{
    ColorcheckerCropper, Cropper, ExifTool, RasterOps, Sequencer, SequencerDeps, SequencerSettings,
    SizeClass, TransformReport, TransformRequest,
};
use tracing::{error, info};

use crate::error::{CliError, CliResult};

#[derive(Debug, Parser)]
#[command(
    name = "transform-file",
    about = "Transform one master image into a delivered JPEG 2000 file"
)]
struct Cli {
    /// Master image to transform.
    #[arg(long = "file_path", alias = "file-path", value_name = "PATH")]
    file_path: PathBuf,
    /// Final location of the encoded image.
    #[arg(long, value_name = "PATH")]
    destination: Option<PathBuf>,
    /// Size class: small, medium, large or full.
    #[arg(long = "max_size", alias = "max-size", value_name = "CLASS")]
    max_size: Option<String>,
    /// Encoder profile name.
    #[arg(long)]
    profile: Option<String>,
    /// Configuration file (YAML, or JSON by extension).
    #[arg(long, env = CONFIG_PATH_ENV, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Parses the process arguments, runs the sequencer and returns the process exit code.
#[must_use]
pub fn run() -> i32 {
    run_from(std::env::args_os())
}

/// Same as [`run`] with explicit arguments; the first item is the program name.
#[must_use]
pub fn run_from<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let code = err.exit_code();
            if let Err(print_err) = err.print() {
                eprintln!("error: {print_err}");
            }
            return code;
        }
    };

    match execute(&cli) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

fn execute(cli: &Cli) -> CliResult<TransformReport> {
    let config = ProcessorConfig::load(cli.config.as_deref())
        .context("failed to load configuration")
        .map_err(CliError::startup)?;
    install_logging(&config);
    let _context = GlobalContextGuard::new("transform");

    let request = build_request(cli)?;
    let sequencer = build_sequencer(&config)?;
    match sequencer.run(&request) {
        Ok(report) => {
            info!(
                encoded = %report.encoded.display(),
                profile = %report.profile,
                "transform-file finished"
            );
            Ok(report)
        }
        Err(err) => {
            error!(error = %err, file = %request.file_path.display(), "transform-file failed");
            Err(CliError::failure(
                anyhow::Error::new(err).context("transformation failed"),
            ))
        }
    }
}

fn install_logging(config: &ProcessorConfig) {
    let logging =
        LoggingConfig::from_settings(&config.logging.level, config.logging.format.as_deref());
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging unavailable: {err}");
    }
}

fn build_request(cli: &Cli) -> CliResult<TransformRequest> {
    if !cli.file_path.is_file() {
        return Err(CliError::validation(format!(
            "--file_path {} is not a file",
            cli.file_path.display()
        )));
    }
    if let Some(destination) = &cli.destination
        && (destination.file_name().is_none() || destination.is_dir())
    {
        return Err(CliError::validation(format!(
            "--destination {} must name a file",
            destination.display()
        )));
    }
    Ok(TransformRequest {
        file_path: cli.file_path.clone(),
        destination: cli.destination.clone(),
        size_class: SizeClass::from_token(cli.max_size.as_deref()),
        profile: cli
            .profile
            .as_ref()
            .map(|profile| profile.trim().to_string())
            .filter(|profile| !profile.is_empty()),
    })
}

fn build_sequencer(config: &ProcessorConfig) -> CliResult<Sequencer> {
    let encoder = KakaduEncoder::new(&config.codec.executable)
        .context("JPEG 2000 encoder unavailable")
        .map_err(CliError::startup)?;
    let metrics = Metrics::new()
        .context("failed to initialise metrics")
        .map_err(CliError::startup)?;
    let cropper = ColorcheckerCropper::from_config(&config.crop)
        .map(|cropper| Arc::new(cropper) as Arc<dyn Cropper>);

    let deps = SequencerDeps {
        imaging: Arc::new(RasterOps::new(&config.transform.convert_program)),
        encoder: Arc::new(encoder),
        profiles: ProfileStore::new(
            config.codec.profile_dir.clone(),
            config.codec.default_profile.clone(),
        ),
        metadata: Arc::new(ExifTool::new(&config.transform.metadata_program)),
        cropper,
        metrics,
    };
    Ok(Sequencer::new(SequencerSettings::from_config(config), deps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use iiif_test_support::fixtures::TIFF_LE_HEADER;
    use std::fs;
    use tempfile::TempDir;

    type TestResult<T> = anyhow::Result<T>;

    fn parse(args: &[&str]) -> TestResult<Cli> {
        Ok(Cli::try_parse_from(
            std::iter::once("transform-file").chain(args.iter().copied()),
        )?)
    }

    #[test]
    fn underscore_and_dash_flags_are_accepted() -> TestResult<()> {
        let cli = parse(&["--file_path", "/work/a.tif", "--max_size", "small"])?;
        assert_eq!(cli.file_path, PathBuf::from("/work/a.tif"));
        assert_eq!(cli.max_size.as_deref(), Some("small"));
        let cli = parse(&["--file-path", "/work/a.tif", "--max-size", "large"])?;
        assert_eq!(cli.max_size.as_deref(), Some("large"));
        Ok(())
    }

    #[test]
    fn file_path_is_required() {
        assert!(parse(&["--destination", "/export/a.jp2"]).is_err());
        assert_eq!(run_from(["transform-file", "--unknown"]), 2);
    }

    #[test]
    fn request_carries_parsed_options() -> TestResult<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("essence.tif");
        fs::write(&file, TIFF_LE_HEADER)?;
        let file_arg = file.to_string_lossy().into_owned();
        let cli = parse(&[
            "--file_path",
            &file_arg,
            "--destination",
            "/export/images/public/OR-x/ab/ab12.jp2",
            "--max_size",
            "Medium",
            "--profile",
            " newspaper ",
        ])?;
        let request = build_request(&cli).map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert_eq!(request.size_class, Some(SizeClass::Medium));
        assert_eq!(request.profile.as_deref(), Some("newspaper"));
        assert_eq!(
            request.destination,
            Some(PathBuf::from("/export/images/public/OR-x/ab/ab12.jp2"))
        );
        Ok(())
    }

    #[test]
    fn unknown_size_class_and_blank_profile_are_dropped() -> TestResult<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("essence.tif");
        fs::write(&file, TIFF_LE_HEADER)?;
        let file_arg = file.to_string_lossy().into_owned();
        let cli = parse(&["--file_path", &file_arg, "--max_size", "huge", "--profile", " "])?;
        let request = build_request(&cli).map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert_eq!(request.size_class, None);
        assert_eq!(request.profile, None);
        Ok(())
    }

    #[test]
    fn missing_input_is_a_validation_error() -> TestResult<()> {
        let temp = TempDir::new()?;
        let missing = temp.path().join("missing.tif");
        let missing_arg = missing.to_string_lossy().into_owned();
        let cli = parse(&["--file_path", &missing_arg])?;
        let err = build_request(&cli).err();
        assert!(matches!(err, Some(CliError::Validation(message)) if message.contains("missing.tif")));
        Ok(())
    }

    #[test]
    fn directory_destination_is_rejected() -> TestResult<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("essence.tif");
        fs::write(&file, TIFF_LE_HEADER)?;
        let file_arg = file.to_string_lossy().into_owned();
        let dir_arg = temp.path().to_string_lossy().into_owned();
        let cli = parse(&["--file_path", &file_arg, "--destination", &dir_arg])?;
        assert!(matches!(build_request(&cli), Err(CliError::Validation(_))));
        Ok(())
    }

    #[test]
    fn missing_encoder_exits_with_startup_code() -> TestResult<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("essence.tif");
        fs::write(&file, TIFF_LE_HEADER)?;
        let config = temp.path().join("config.yaml");
        fs::write(
            &config,
            format!(
                "codec:\n  executable: {}\n",
                temp.path().join("no-such-kdu_compress").display()
            ),
        )?;
        let file_arg = file.to_string_lossy().into_owned();
        let config_arg = config.to_string_lossy().into_owned();
        let code = run_from([
            "transform-file",
            "--file_path",
            file_arg.as_str(),
            "--config",
            config_arg.as_str(),
        ]);
        assert_eq!(code, 1);
        Ok(())
    }

    #[test]
    fn unreadable_configuration_exits_with_startup_code() -> TestResult<()> {
        let temp = TempDir::new()?;
        let config_arg = temp.path().join("absent.yaml").to_string_lossy().into_owned();
        let code = run_from([
            "transform-file",
            "--file_path",
            "/work/a.tif",
            "--config",
            config_arg.as_str(),
        ]);
        assert_eq!(code, 1);
        Ok(())
    }
}
