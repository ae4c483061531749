//! Argument parsing, wiring, and exit-code mapping for the `lodestone` binary.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use lodestone_app::{
    DownloadOutcome, LifecycleController, LifecycleSettings, MetadataProbe, ProbeOutcome,
    ProbeReport,
};
use lodestone_config::{DownloaderSettings, SessionConfig, SessionConfigurator};
use lodestone_events::{EventSink, channel};
use lodestone_telemetry::{LogFormat, LoggingConfig, init_logging};
use lodestone_torrent_core::{MagnetRequest, format_bytes};
use lodestone_torrent_sim::{Scenario, SimulatedEngine};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::output::{render_probe_report, render_stream};

const EVENT_BUFFER: usize = 64;
const FORCE_QUIT_EXIT_CODE: i32 = 130;
const USAGE: &str = "Usage: lodestone <magnet-link> [download-path]\n\n\
Example:\n  lodestone \"magnet:?xt=urn:btih:...\" ./downloads";

/// Download the payload of a magnet link into a local directory.
#[derive(Debug, Parser)]
#[command(name = "lodestone", version)]
struct Cli {
    /// Magnet URI to download.
    #[arg(value_name = "MAGNET")]
    magnet: Option<String>,
    /// Directory receiving the payload (defaults to `LODESTONE_DOWNLOAD_DIR` or `./downloads`).
    #[arg(value_name = "DOWNLOAD_PATH")]
    destination: Option<PathBuf>,
    /// Resolve metadata and list files without downloading.
    #[arg(long)]
    info: bool,
    /// Output format for progress and results.
    #[arg(long, value_enum, env = "LODESTONE_OUTPUT", default_value_t = OutputFormat::Table)]
    format: OutputFormat,
    /// Give up on metadata after this many seconds.
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    metadata_timeout: Option<u64>,
    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

/// How events and reports are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable terminal output.
    Table,
    /// One JSON document per line.
    Json,
}

#[derive(Debug)]
enum CliError {
    Usage(String),
    Failure(anyhow::Error),
}

type CliResult<T> = Result<T, CliError>;

impl CliError {
    fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    const fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::Failure(_) => 1,
        }
    }

    fn display_message(&self) -> String {
        match self {
            Self::Usage(message) => message.clone(),
            Self::Failure(error) => format!("error: {error:#}"),
        }
    }
}

/// Parses arguments, runs the download (or probe), and returns the process exit code.
pub async fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let exit_code = i32::from(err.use_stderr());
            let _ = err.print();
            return exit_code;
        }
    };
    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", err.display_message());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let Some(magnet) = cli.magnet.clone() else {
        return Err(CliError::usage(USAGE));
    };
    let env_settings = DownloaderSettings::from_env().map_err(CliError::failure)?;
    let settings = resolve_settings(&cli, env_settings);
    let log_format =
        LogFormat::from_config(settings.log_format.as_deref()).map_err(CliError::failure)?;
    init_logging(&LoggingConfig {
        level: &settings.log_level,
        format: log_format,
        version: env!("CARGO_PKG_VERSION"),
    })
    .map_err(CliError::failure)?;

    let configurator = SessionConfigurator::with_tuning(&settings.tuning);
    for warning in configurator.warnings() {
        warn!(warning = %warning, "engine tuning adjusted");
    }
    let config = configurator.configure();
    let destination = cli
        .destination
        .clone()
        .unwrap_or_else(|| settings.download_dir.clone());
    let request = MagnetRequest::new(magnet, destination);
    let engine = Arc::new(SimulatedEngine::new(scenario_for(&request)));

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(watch_interrupt(cancel.clone()));
    let (sink, stream) = channel(EVENT_BUFFER);
    let renderer = tokio::spawn(render_stream(stream, cli.format));

    let lifecycle = LifecycleSettings::from(&settings);
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    let result = if cli.info {
        probe(engine, config, lifecycle, sink, cancel, &request, cli.format).await
    } else {
        download(engine, config, lifecycle, sink, cancel, &request)
            .await
            .map(|()| None)
    };
    interrupt.abort();

    match renderer.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "event output failed"),
        Err(err) => warn!(error = %err, "event renderer stopped unexpectedly"),
    }
    let report = result?;
    if let Some(report) = report {
        let mut stdout = io::stdout().lock();
        render_probe_report(&mut stdout, &report, cli.format).map_err(CliError::failure)?;
    }
    Ok(())
}

async fn download(
    engine: Arc<SimulatedEngine>,
    config: SessionConfig,
    settings: LifecycleSettings,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    request: &MagnetRequest,
) -> CliResult<()> {
    let mut controller =
        LifecycleController::new(engine, config, settings, sink).with_cancellation_token(cancel);
    let outcome = controller.start(request).await;
    controller.shutdown().await;
    match outcome.map_err(CliError::failure)? {
        DownloadOutcome::Completed(result) => {
            info!(
                session_id = %controller.session_id(),
                save_path = %result.save_path.display(),
                size = %format_bytes(result.total_size()),
                "download finished"
            );
        }
        DownloadOutcome::Cancelled => {
            info!(session_id = %controller.session_id(), "download cancelled by user");
        }
    }
    Ok(())
}

async fn probe(
    engine: Arc<SimulatedEngine>,
    config: SessionConfig,
    settings: LifecycleSettings,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    request: &MagnetRequest,
    format: OutputFormat,
) -> CliResult<Option<ProbeReport>> {
    let mut probe =
        MetadataProbe::new(engine, config, settings, sink).with_cancellation_token(cancel);
    match probe.run(request).await.map_err(CliError::failure)? {
        ProbeOutcome::Resolved(report) => Ok(Some(report)),
        ProbeOutcome::Cancelled => {
            if format == OutputFormat::Table {
                eprintln!("Probe cancelled by user");
            }
            Ok(None)
        }
    }
}

fn resolve_settings(cli: &Cli, mut settings: DownloaderSettings) -> DownloaderSettings {
    if let Some(secs) = cli.metadata_timeout {
        settings.metadata_timeout = Duration::from_secs(secs);
    }
    if let Some(level) = &cli.log_level {
        settings.log_level.clone_from(level);
    }
    settings
}

fn scenario_for(request: &MagnetRequest) -> Scenario {
    request
        .validate()
        .map_or_else(|_| Scenario::new("unresolved"), |link| Scenario::demo(&link))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptExit {
    Settled,
    ForceQuit,
}

async fn watch_interrupt(cancel: CancellationToken) {
    if watch_signals(cancel, tokio::signal::ctrl_c).await == InterruptExit::ForceQuit {
        std::process::exit(FORCE_QUIT_EXIT_CODE);
    }
}

/// First signal cancels the run; a second one during teardown asks for a force quit.
async fn watch_signals<F, Fut>(cancel: CancellationToken, mut next_signal: F) -> InterruptExit
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    tokio::select! {
        signal = next_signal() => match signal {
            Ok(()) => {
                info!("interrupt received; shutting down (press Ctrl-C again to force quit)");
                cancel.cancel();
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for interrupt");
                return InterruptExit::Settled;
            }
        },
        () = cancel.cancelled() => return InterruptExit::Settled,
    }
    match next_signal().await {
        Ok(()) => {
            warn!("second interrupt received; exiting without waiting for teardown");
            InterruptExit::ForceQuit
        }
        Err(err) => {
            warn!(error = %err, "failed to listen for interrupt");
            InterruptExit::Settled
        }
    }
}
