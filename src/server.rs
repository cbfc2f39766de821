// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Operator HTTP endpoints.
//!
//! `/health` and `/metrics` are served on separate listeners so the liveness
//! port can stay cluster-internal while metrics are scraped.

use anyhow::{Context as _, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::metrics::MetricsRegistry;
use crate::controller::ReconcileTracker;

/// `200 ok` unless a reconciliation pass has stalled, then `500`.
pub async fn health(State(tracker): State<Arc<ReconcileTracker>>) -> Response {
    if tracker.is_healthy() {
        (StatusCode::OK, "ok").into_response()
    } else {
        warn!(in_flight = tracker.in_flight(), "Health check failed: reconciliation stalled");
        (StatusCode::INTERNAL_SERVER_ERROR, "reconciliation stalled").into_response()
    }
}

/// Prometheus text exposition of every operator metric.
pub async fn metrics(State(registry): State<Arc<MetricsRegistry>>) -> Response {
    match registry.gather() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[must_use]
pub fn health_router(tracker: Arc<ReconcileTracker>) -> Router {
    Router::new().route("/health", get(health)).with_state(tracker)
}

#[must_use]
pub fn metrics_router(registry: Arc<MetricsRegistry>) -> Router {
    Router::new().route("/metrics", get(metrics)).with_state(registry)
}

/// Serve `router` on `addr` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve<S>(name: &str, addr: SocketAddr, router: Router, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {name} listener on {addr}"))?;
    info!(server = %name, address = %addr, "HTTP listener started");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .with_context(|| format!("{name} server failed"))
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
