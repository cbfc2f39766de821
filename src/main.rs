// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use kube::Client;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vmo::{
    config::OperatorConfig,
    constants::{DEFAULT_HEALTH_PORT, DEFAULT_METRICS_PORT, DEFAULT_WORKER_COUNT, RESYNC_INTERVAL_SECS},
    context::{Context, Stores},
    controller::{self, Operator, ReconcileTracker},
    metrics::MetricsRegistry,
    opensearch::OpenSearchClient,
    server::{health_router, metrics_router, serve},
};

/// Kubernetes operator for `VerrazzanoMonitoringInstance` resources.
#[derive(Debug, Parser)]
#[command(name = "verrazzano-monitoring-operator", version, about)]
struct Args {
    /// Watch a single namespace instead of the whole cluster
    #[arg(long, env = "VMO_NAMESPACE")]
    namespace: Option<String>,

    /// Operator configuration file (YAML)
    #[arg(long, env = "VMO_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum number of instances reconciled concurrently
    #[arg(long, default_value_t = DEFAULT_WORKER_COUNT)]
    workers: u16,

    #[arg(long, default_value_t = DEFAULT_HEALTH_PORT)]
    health_port: u16,

    #[arg(long, default_value_t = DEFAULT_METRICS_PORT)]
    metrics_port: u16,

    /// Version stamped into `status.currentVersion` of converged instances
    #[arg(long, env = "VMO_BUILD_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    build_version: String,

    /// Interval at which a converged instance is reconciled again
    #[arg(long, default_value_t = RESYNC_INTERVAL_SECS)]
    resync_seconds: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("vmo-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or `text`).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(args: Args) -> Result<()> {
    init_tracing();
    info!(
        version = %args.build_version,
        namespace = args.namespace.as_deref().unwrap_or("<all>"),
        workers = args.workers,
        "Starting Verrazzano monitoring operator"
    );

    let config = Arc::new(OperatorConfig::load(args.config.as_deref())?);

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let metrics = Arc::new(MetricsRegistry::new()?);
    metrics.spawn_retry_task();

    let ctx = Arc::new(Context {
        stores: Stores::from_client(&client),
        search: Arc::new(OpenSearchClient::new(&config)?),
        metrics: Arc::clone(&metrics),
        config,
        build_version: args.build_version.clone(),
    });

    let tracker = ReconcileTracker::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let health_addr = SocketAddr::from(([0, 0, 0, 0], args.health_port));
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], args.metrics_port));
    let health_server = tokio::spawn(serve(
        "health",
        health_addr,
        health_router(Arc::clone(&tracker)),
        wait_for_shutdown(shutdown_rx.clone()),
    ));
    let metrics_server = tokio::spawn(serve(
        "metrics",
        metrics_addr,
        metrics_router(Arc::clone(&metrics)),
        wait_for_shutdown(shutdown_rx),
    ));

    let operator = Arc::new(Operator {
        ctx,
        tracker,
        resync: Duration::from_secs(args.resync_seconds),
    });
    controller::run(client, args.namespace.as_deref(), args.workers, operator).await;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    for server in [health_server, metrics_server] {
        match server.await {
            Ok(Err(e)) => warn!(error = %format!("{e:#}"), "HTTP server failed"),
            Err(e) => warn!(error = %e, "HTTP server task ended abnormally"),
            Ok(Ok(())) => {}
        }
    }
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
