#![forbid(unsafe_code)]

use clap::Parser;
use hitgate_lib::admission::{AdmissionConfig, AdmissionService};
use hitgate_lib::config::{load_from_path, validate, Config};
use hitgate_lib::server::{self, ReportHandler};
use hitgate_lib::telemetry::server::ReadinessProbe;
use hitgate_lib::telemetry::{init_metrics, init_tracing, start_observability_server};
use hitgate_lib::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "hitgate: per-key request admission over a trailing window")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", env = "HITGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Occurrences of a key allowed inside one window (overrides limiter.threshold)
    #[arg(value_name = "THRESHOLD")]
    threshold: Option<u64>,

    /// Window length in milliseconds (overrides limiter.window_ms)
    #[arg(value_name = "WINDOW_MS")]
    window_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            let defaults = Config::default();
            let _ = init_tracing(&defaults.logging.level, false, &defaults.telemetry.otel_log_level);
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(err) =
        init_tracing(&cfg.logging.level, cfg.logging.show_target, &cfg.telemetry.otel_log_level)
    {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    info!(?cfg.listen, threshold = cfg.limiter.threshold, window_ms = cfg.limiter.window_ms, "configuration loaded");

    if let Err(err) = run(cfg).await {
        error!(%err, "hitgate exited with error");
        std::process::exit(1);
    }
    info!("Bye Bye :)");
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => load_from_path(path)?,
        None => Config::default(),
    };
    if let Some(threshold) = cli.threshold {
        cfg.limiter.threshold = threshold;
    }
    if let Some(window_ms) = cli.window_ms {
        cfg.limiter.window_ms = window_ms;
    }
    validate(&cfg)?;
    Ok(cfg)
}

async fn run(cfg: Config) -> Result<()> {
    let shutdown = CancellationToken::new();

    let metrics = match cfg.telemetry.metrics_port {
        Some(_) => Some(init_metrics()?),
        None => None,
    };

    let mut service = AdmissionService::with_defaults(AdmissionConfig::from(&cfg.limiter));
    if let Some((m, _)) = &metrics {
        service = service.with_metrics(Arc::clone(m));
    }
    let service = Arc::new(service);
    service.start()?;

    if let (Some(port), Some((_, registry))) = (cfg.telemetry.metrics_port, &metrics) {
        let probe_service = Arc::clone(&service);
        let ready: ReadinessProbe = Arc::new(move || probe_service.is_running());
        let registry = registry.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = start_observability_server(port, registry, ready, shutdown).await {
                error!(%err, "observability server exited with error");
            }
        });
    }

    let signals = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = wait_for_signal().await {
            error!(%err, "failed to install signal handlers");
            return;
        }
        signals.cancel();
    });

    let handler = ReportHandler::new(
        Arc::clone(&service),
        cfg.timeout.request(),
        metrics.as_ref().map(|(m, _)| Arc::clone(m)),
    );
    let served = server::run(&cfg, handler, shutdown.clone()).await;

    shutdown.cancel();
    service.stop().await;
    served
}

async fn wait_for_signal() -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
        _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
    }
    Ok(())
}
