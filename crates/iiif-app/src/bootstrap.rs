use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use iiif_config::{CONFIG_PATH_ENV, ProcessorConfig};
use iiif_fsops::{FormatProbe, SignatureProbe};
use iiif_telemetry::{GlobalContextGuard, LoggingConfig, Metrics};
use iiif_watcher::{ProcessLauncher, UnitContext, UnitSettings, WatchService, WorkDirLocks};
use tracing::{info, warn};

/// Dependencies required to bootstrap the watcher.
pub(crate) struct BootstrapDependencies {
    config: ProcessorConfig,
    metrics: Metrics,
    launcher: ProcessLauncher,
    probe: Arc<dyn FormatProbe>,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let config = ProcessorConfig::load(path.as_deref())
            .map_err(|err| AppError::config("config.load", err))?;
        Self::from_config(config)
    }

    /// Construct dependencies from an already loaded configuration.
    pub(crate) fn from_config(config: ProcessorConfig) -> AppResult<Self> {
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let launcher =
            ProcessLauncher::from_config(&config.sequencer, config.watcher.transform_timeout());
        Ok(Self {
            config,
            metrics,
            launcher,
            probe: Arc::new(SignatureProbe),
        })
    }
}

/// Entry point for the watcher boot sequence.
///
/// # Errors
///
/// Returns an error if configuration loading, logging initialisation or watcher
/// startup fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    let logging = &dependencies.config.logging;
    iiif_telemetry::init_logging(&LoggingConfig::from_settings(
        &logging.level,
        logging.format.as_deref(),
    ))
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    run_app_with(dependencies, shutdown_signal()).await
}

/// Boot sequence that relies entirely on injected dependencies to simplify testing.
pub(crate) async fn run_app_with<F>(dependencies: BootstrapDependencies, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send,
{
    let _context = GlobalContextGuard::new("watcher");
    info!("IIIF image processor bootstrap starting");

    let BootstrapDependencies {
        config,
        metrics,
        launcher,
        probe,
    } = dependencies;

    let resolved = launcher
        .resolve()
        .map_err(|err| AppError::watch("sequencer.resolve", err))?;
    info!(sequencer = %resolved.display(), "sequencer executable found");

    fs::create_dir_all(&config.watcher.work_root).map_err(|source| AppError::Io {
        operation: "work_root.create",
        path: Some(config.watcher.work_root.clone()),
        source,
    })?;

    let ctx = UnitContext {
        settings: UnitSettings::from_config(&config),
        probe,
        launcher: Arc::new(launcher),
        metrics,
        locks: WorkDirLocks::new(),
    };
    let service = WatchService::new(
        config.watcher.watch_root.clone(),
        config.watcher.max_concurrent_units,
        ctx,
    );
    service
        .run(shutdown)
        .await
        .map_err(|err| AppError::watch("watch.run", err))?;
    info!("IIIF image processor shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => log_ctrl_c(result),
                    _ = terminate.recv() => info!("termination signal received"),
                }
                return;
            }
            Err(err) => warn!(error = %err, "failed to install SIGTERM handler"),
        }
    }
    log_ctrl_c(tokio::signal::ctrl_c().await);
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("interrupt received"),
        Err(err) => warn!(error = %err, "failed to listen for interrupt; stopping"),
    }
}
