#![forbid(unsafe_code)]

use clap::Parser;
use muninn_gateway_lib::config::load_from_path;
use muninn_gateway_lib::telemetry::{init_metrics, init_tracing};
use muninn_gateway_lib::DataPlane;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Muninn gateway data plane (routing + rate limiting)")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config/gateway.toml")]
    config: PathBuf,

    /// How long background tasks get to stop after a signal, in seconds
    #[arg(long, default_value_t = 10)]
    shutdown_grace_secs: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration from {}: {err}", cli.config.display());
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing(&cfg.logging, &cfg.telemetry) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    info!(
        config = %cli.config.display(),
        route_channel = %cfg.invalidation.route_channel,
        rate_limit_channel = %cfg.invalidation.rate_limit_channel,
        fallback = cfg.rate_limit.fallback.enabled,
        "configuration loaded"
    );

    let metrics = match init_metrics() {
        Ok((metrics, _registry)) => Some(metrics),
        Err(err) => {
            warn!(%err, "metrics disabled");
            None
        }
    };

    let mut plane = match DataPlane::connect(cfg, metrics) {
        Ok(plane) => plane,
        Err(err) => {
            error!(%err, "invalid data plane backend configuration");
            std::process::exit(1);
        }
    };
    plane.start().await;
    info!("data plane running");

    if let Err(err) = wait_for_signal().await {
        error!(%err, "failed to install signal handlers");
    }

    plane.shutdown(Duration::from_secs(cli.shutdown_grace_secs)).await;
}

async fn wait_for_signal() -> std::io::Result<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }
    Ok(())
}
