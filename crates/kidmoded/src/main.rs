//! kidmoded - The Kid Mode background service
//!
//! This is the main entry point for the kidmoded service.
//! It wires together:
//! - Configuration loading
//! - Logging
//! - The service (store, core arbiter, countdown scheduler, IPC server)
//! - Unix signal handling

use anyhow::{Context, Result};
use clap::Parser;
use kidmode_config::load_config_or_default;
use kidmode_util::{default_config_path, KIDMODE_DATA_DIR_ENV, KIDMODE_SOCKET_ENV};
use kidmoded::Service;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// kidmoded - Password-gated Kid Mode service
#[derive(Parser, Debug)]
#[command(name = "kidmoded")]
#[command(about = "Password-gated Kid Mode service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/kidmode/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override
    #[arg(short, long, env = KIDMODE_SOCKET_ENV)]
    socket: Option<PathBuf>,

    /// Data directory override
    #[arg(short, long, env = KIDMODE_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write JSON logs to kidmoded.log in the configured log directory
    /// instead of human-readable logs to stderr
    #[arg(long)]
    log_file: bool,
}

fn init_logging(args: &Args, log_dir: &std::path::Path) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.log_file {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
        let path = log_dir.join("kidmoded.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {:?}", path))?;

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    Ok(())
}

/// Resolves on SIGTERM, SIGINT or SIGHUP
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            _ = sighup.recv() => info!("Received SIGHUP, shutting down gracefully"),
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if let Some(socket) = &args.socket {
        settings.service.socket_path = socket.clone();
    }
    if let Some(data_dir) = &args.data_dir {
        settings.service.data_dir = data_dir.clone();
    }

    init_logging(&args, &settings.service.log_dir)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = %args.config.display(),
        socket_path = %settings.service.socket_path.display(),
        "kidmoded starting"
    );

    let shutdown = shutdown_signal()?;
    let service = Service::new(settings).await?;
    service.run(shutdown).await
}
