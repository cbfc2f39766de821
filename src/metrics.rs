// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the monitoring operator.
//!
//! All metrics live in one [`MetricsRegistry`] built at startup and shared
//! through the reconciliation context. Metric names carry the prefix
//! `vmo_verrazzano_io_` (prometheus-safe version of "vmo.verrazzano.io").
//!
//! A collector whose registration fails is kept in a pending list and
//! retried by [`MetricsRegistry::spawn_retry_task`], so a transient
//! registration problem never blocks reconciliation.
//!
//! # Example
//!
//! ```rust
//! use vmo::metrics::MetricsRegistry;
//! use std::time::Duration;
//!
//! let metrics = MetricsRegistry::new().unwrap();
//! metrics.record_reconciliation_success(Duration::from_millis(10));
//! assert!(metrics.gather().unwrap().contains("reconciliations_total"));
//! ```

use prometheus::core::Collector;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::constants::METRICS_RETRY_INTERVAL_SECS;

/// Namespace prefix for all operator metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "vmo_verrazzano_io";

/// Resource type label used for instance-level metrics
const INSTANCE_RESOURCE: &str = "VerrazzanoMonitoringInstance";

/// Produces a fresh handle to a collector for each registration attempt.
type CollectorFactory = Box<dyn Fn() -> Box<dyn Collector> + Send + Sync>;

/// Registry owning every operator metric.
pub struct MetricsRegistry {
    registry: Registry,
    pending: Mutex<Vec<CollectorFactory>>,

    /// Reconciliations by resource type and status (`success`, `error`, `requeue`)
    pub reconciliations_total: CounterVec,
    /// Reconciliation duration by resource type
    pub reconciliation_duration_seconds: HistogramVec,
    /// Objects created, by kind
    pub resources_created_total: CounterVec,
    /// Objects updated in place or recreated, by kind
    pub resources_updated_total: CounterVec,
    /// Objects deleted, by kind
    pub resources_deleted_total: CounterVec,
    /// Errors by resource type and category
    pub errors_total: CounterVec,
    /// Reconciliation passes currently running
    pub reconciles_in_flight: Gauge,
}

impl MetricsRegistry {
    /// Build the metrics and register them.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric definition is invalid. Registration
    /// failures are not errors; those collectors are retried later.
    pub fn new() -> Result<Self, prometheus::Error> {
        let reconciliations_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_reconciliations_total"),
                "Total number of reconciliations by resource type and status",
            ),
            &["resource_type", "status"],
        )?;
        let reconciliation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
                "Duration of reconciliations in seconds by resource type",
            )
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["resource_type"],
        )?;
        let resources_created_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_resources_created_total"),
                "Total number of resources created by type",
            ),
            &["resource_type"],
        )?;
        let resources_updated_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_resources_updated_total"),
                "Total number of resources updated by type",
            ),
            &["resource_type"],
        )?;
        let resources_deleted_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_resources_deleted_total"),
                "Total number of resources deleted by type",
            ),
            &["resource_type"],
        )?;
        let errors_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_errors_total"),
                "Total number of errors by resource type and error category",
            ),
            &["resource_type", "error_type"],
        )?;
        let reconciles_in_flight = Gauge::with_opts(Opts::new(
            format!("{METRICS_NAMESPACE}_reconciles_in_flight"),
            "Number of reconciliation passes currently running",
        ))?;

        let metrics = Self {
            registry: Registry::new(),
            pending: Mutex::new(Vec::new()),
            reconciliations_total,
            reconciliation_duration_seconds,
            resources_created_total,
            resources_updated_total,
            resources_deleted_total,
            errors_total,
            reconciles_in_flight,
        };

        metrics.register(factory(metrics.reconciliations_total.clone()));
        metrics.register(factory(metrics.reconciliation_duration_seconds.clone()));
        metrics.register(factory(metrics.resources_created_total.clone()));
        metrics.register(factory(metrics.resources_updated_total.clone()));
        metrics.register(factory(metrics.resources_deleted_total.clone()));
        metrics.register(factory(metrics.errors_total.clone()));
        metrics.register(factory(metrics.reconciles_in_flight.clone()));

        Ok(metrics)
    }

    fn register(&self, factory: CollectorFactory) {
        if let Err(e) = self.registry.register(factory()) {
            warn!(error = %e, "Metric registration failed, will retry");
            if let Ok(mut pending) = self.pending.lock() {
                pending.push(factory);
            }
        }
    }

    /// Number of collectors still waiting to be registered.
    #[must_use]
    pub fn pending_registrations(&self) -> usize {
        self.pending.lock().map_or(0, |p| p.len())
    }

    /// Try to register every pending collector once.
    ///
    /// Returns the number of collectors still pending afterwards.
    pub fn retry_pending(&self) -> usize {
        let Ok(mut pending) = self.pending.lock() else {
            return 0;
        };
        let mut still_pending = Vec::new();
        for factory in pending.drain(..) {
            match self.registry.register(factory()) {
                Ok(()) => debug!("Registered previously failed metric"),
                Err(prometheus::Error::AlreadyReg) => {}
                Err(e) => {
                    debug!(error = %e, "Metric registration still failing");
                    still_pending.push(factory);
                }
            }
        }
        *pending = still_pending;
        pending.len()
    }

    /// Periodically retry failed registrations until none remain.
    pub fn spawn_retry_task(self: &Arc<Self>) -> JoinHandle<()> {
        let metrics = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(METRICS_RETRY_INTERVAL_SECS));
            loop {
                ticker.tick().await;
                if metrics.retry_pending() == 0 {
                    break;
                }
            }
        })
    }

    /// Record a clean reconciliation pass.
    pub fn record_reconciliation_success(&self, duration: Duration) {
        self.record_reconciliation(INSTANCE_RESOURCE, "success", duration);
    }

    /// Record a failed reconciliation pass.
    pub fn record_reconciliation_error(&self, duration: Duration) {
        self.record_reconciliation(INSTANCE_RESOURCE, "error", duration);
    }

    /// Record a pass that left a rollout pending.
    pub fn record_reconciliation_requeue(&self, duration: Duration) {
        self.record_reconciliation(INSTANCE_RESOURCE, "requeue", duration);
    }

    fn record_reconciliation(&self, resource_type: &str, status: &str, duration: Duration) {
        self.reconciliations_total
            .with_label_values(&[resource_type, status])
            .inc();
        self.reconciliation_duration_seconds
            .with_label_values(&[resource_type])
            .observe(duration.as_secs_f64());
    }

    pub fn record_resource_created(&self, resource_type: &str) {
        self.resources_created_total
            .with_label_values(&[resource_type])
            .inc();
    }

    pub fn record_resource_updated(&self, resource_type: &str) {
        self.resources_updated_total
            .with_label_values(&[resource_type])
            .inc();
    }

    pub fn record_resource_deleted(&self, resource_type: &str) {
        self.resources_deleted_total
            .with_label_values(&[resource_type])
            .inc();
    }

    /// Record an error
    ///
    /// # Arguments
    /// * `resource_type` - The kind of resource where error occurred
    /// * `error_type` - Category of error (e.g., `api_error`, `health_check`)
    pub fn record_error(&self, resource_type: &str, error_type: &str) {
        self.errors_total
            .with_label_values(&[resource_type, error_type])
            .inc();
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn set_in_flight(&self, passes: usize) {
        self.reconciles_in_flight.set(passes as f64);
    }

    /// Gather and encode all metrics in Prometheus text format
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
    }
}

fn factory<C>(collector: C) -> CollectorFactory
where
    C: Collector + Clone + 'static,
{
    Box::new(move || Box::new(collector.clone()))
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;
