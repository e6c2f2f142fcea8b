//! dbprobe - database health and latency prober.
//!
//! Periodically connects to every configured database, runs a probe query,
//! and exposes the latest latency and status per host as Prometheus gauges.

mod config;
mod probe;
mod scheduler;
mod state;
mod web;

use config::MonitorConfig;
use probe::{PostgresConnector, Prober};
use scheduler::Scheduler;
use state::MetricState;
use web::Server;

use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dbprobe=info,tower_http=info".into()),
        )
        .init();

    // Configuration problems are fatal before anything starts.
    let cfg = match MonitorConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let hosts: Vec<&str> = cfg.targets().iter().map(|t| t.host.as_str()).collect();
    tracing::info!(
        hosts = ?hosts,
        interval_secs = cfg.pull_interval.as_secs(),
        listen = %cfg.listen_address,
        "Starting dbprobe"
    );

    let metrics = Arc::new(MetricState::new());
    let prober = Prober::new(Arc::new(PostgresConnector::new()), cfg.connect_timeout);
    let scheduler = Arc::new(Scheduler::new(
        prober,
        cfg.targets().to_vec(),
        cfg.query.clone(),
        cfg.pull_interval,
        metrics.clone(),
    ));

    let cancel = CancellationToken::new();

    // Installed before the first cycle so a signal during startup still
    // ends in a clean shutdown.
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received");
            cancel.cancel();
        }
    });

    // First cycle completes before the first scrape can be served.
    let scheduler_task = scheduler.start(cancel.clone()).await;
    tracing::info!(targets = metrics.len(), "Initial probe cycle complete");

    if cancel.is_cancelled() {
        if let Err(e) = scheduler_task.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }
        tracing::info!("Shutdown complete");
        return ExitCode::SUCCESS;
    }

    let listener = match TcpListener::bind(&cfg.listen_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %cfg.listen_address, error = %e, "Failed to bind listener");
            cancel.cancel();
            let _ = scheduler_task.await;
            return ExitCode::FAILURE;
        }
    };

    let server = Server::new(metrics);
    let served = server.serve(listener, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = scheduler_task.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }

    match served {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Web server failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
