//! Pika - TCP reverse proxy and SOCKS5 server
//!
//! This is the main entry point for the Pika application.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pika::app::{build_runtime, build_service, run_service};
use pika::config::{
    load_config, Config, ControllerConfig, ExporterConfig, ModeConfig, Socks5Config,
};
use pika::RunOutcome;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Pika - expose a private TCP service through a public controller
#[derive(Parser, Debug)]
#[command(name = "pika")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,

    /// Mode to run, replacing the one in the config file
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Accept exporters and public clients
    Controller {
        /// Control listen endpoint
        #[arg(long)]
        listen: String,
    },
    /// Expose a local service through a controller
    Exporter {
        /// Local service endpoint
        #[arg(long)]
        export: String,
        /// Controller control endpoint
        #[arg(long)]
        controller: String,
        /// Endpoint the controller should listen on for public clients
        #[arg(long)]
        bind: String,
    },
    /// Run a SOCKS5 server
    Socks5 {
        /// Listen endpoint
        #[arg(long)]
        listen: String,
    },
}

impl From<Mode> for ModeConfig {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Controller { listen } => ModeConfig::Controller(ControllerConfig::new(listen)),
            Mode::Exporter {
                export,
                controller,
                bind,
            } => ModeConfig::Exporter(ExporterConfig {
                export,
                controller,
                bind,
            }),
            Mode::Socks5 { listen } => ModeConfig::Socks5(Socks5Config { listen }),
        }
    }
}

fn main() {
    let args = Args::parse();

    if let Err(e) = setup_logging(&args.log_level, args.json_log) {
        eprintln!("Failed to setup logging: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            info!("Configuration loaded from: {:?}", path);
            config
        }
        None => Config::default(),
    };
    let config = match args.mode {
        Some(mode) => config.with_mode(mode.into()),
        None => config,
    };

    info!("{} v{}", pika::NAME, pika::VERSION);

    let mut delay = Duration::ZERO;
    loop {
        // Fresh service state and a fresh runtime for every run
        let service = build_service(&config)?;
        let runtime = build_runtime(&config.runtime).context("Failed to build runtime")?;

        let outcome = runtime.block_on(async {
            let shutdown = CancellationToken::new();
            tokio::spawn(watch_signals(shutdown.clone()));
            run_service(service, delay, shutdown).await
        })?;
        runtime.shutdown_timeout(Duration::from_secs(1));

        match outcome {
            RunOutcome::Finished => {
                info!("Pika stopped");
                return Ok(());
            }
            RunOutcome::Restart(signal) => {
                warn!("Restart requested");
                delay = signal.delay();
            }
        }
    }
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down...");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down...");
                    }
                }
            }
            Err(e) => {
                warn!("Failed to setup SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        // On Windows, only handle Ctrl+C
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down...");
    }

    shutdown.cancel();
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        other => bail!("Unknown log level: {}", other),
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
