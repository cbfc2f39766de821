// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! `VerrazzanoMonitoringInstance` controller.
//!
//! Event intake, per-object deduplication, bounded concurrency and delayed
//! requeues come from `kube::runtime::Controller`. Instances trigger passes
//! directly; operator-managed deployments and stateful sets trigger a pass
//! of the instance named in their controller owner reference.
//!
//! [`ReconcileTracker`] adds the two things the runtime does not expose:
//! a stall signal for `/health` and per-instance exponential backoff for
//! failed passes.

use futures::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::runtime::controller::{self, Action};
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, Resource, ResourceExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::constants::{
    PENDING_REQUEUE_SECS, RETRY_BASE_DELAY_MILLIS, RETRY_MAX_DELAY_SECS, STALL_THRESHOLD_SECS,
};
use crate::context::Context;
use crate::crd::VerrazzanoMonitoringInstance;
use crate::errors::ControllerError;
use crate::labels::{K8S_MANAGED_BY, MANAGED_BY_VMO};
use crate::reconcilers::{reconcile, PassOutcome};

/// State handed to every reconcile and error-policy call.
pub struct Operator {
    pub ctx: Arc<Context>,
    pub tracker: Arc<ReconcileTracker>,
    /// Requeue interval after a clean pass
    pub resync: Duration,
}

/// Progress and failure bookkeeping shared by the controller and `/health`.
pub struct ReconcileTracker {
    state: Mutex<TrackerState>,
    stall_threshold: Duration,
    base_delay: Duration,
    max_delay: Duration,
}

#[derive(Default)]
struct TrackerState {
    in_flight: usize,
    /// Start of the current busy period, reset whenever a pass finishes
    last_progress: Option<Instant>,
    failures: HashMap<String, u32>,
}

impl Default for ReconcileTracker {
    fn default() -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            stall_threshold: Duration::from_secs(STALL_THRESHOLD_SECS),
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MILLIS),
            max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
        }
    }
}

impl ReconcileTracker {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a pass as started. The pass counts as finished when the guard drops.
    #[must_use]
    pub fn begin(&self) -> InFlight<'_> {
        let mut state = self.lock();
        if state.in_flight == 0 {
            state.last_progress = Some(Instant::now());
        }
        state.in_flight += 1;
        InFlight { tracker: self }
    }

    fn finish(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.last_progress = (state.in_flight > 0).then(Instant::now);
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// False once passes are running and none has finished within the stall threshold.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.lock()
            .last_progress
            .is_none_or(|since| since.elapsed() <= self.stall_threshold)
    }

    /// Delay before retrying `key` after another failure.
    ///
    /// Doubles from the base delay on each consecutive failure up to the maximum.
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut state = self.lock();
        let failures = state.failures.entry(key.to_string()).or_insert(0);
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(*failures))
            .min(self.max_delay);
        *failures = failures.saturating_add(1);
        delay
    }

    /// Clear the failure history of `key` after a successful pass.
    pub fn forget(&self, key: &str) {
        self.lock().failures.remove(key);
    }
}

/// A running pass; dropping it records progress.
pub struct InFlight<'a> {
    tracker: &'a ReconcileTracker,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.tracker.finish();
    }
}

/// Requeue action for a finished pass.
#[must_use]
pub fn requeue_action(outcome: PassOutcome, resync: Duration) -> Action {
    match outcome {
        PassOutcome::Pending => Action::requeue(Duration::from_secs(PENDING_REQUEUE_SECS)),
        PassOutcome::Missing => Action::await_change(),
        PassOutcome::Locked | PassOutcome::Converged => Action::requeue(resync),
    }
}

fn instance_key(vmi: &VerrazzanoMonitoringInstance) -> (String, String) {
    (vmi.namespace().unwrap_or_default(), vmi.name_any())
}

/// Run one pass for the instance the controller scheduled.
///
/// # Errors
///
/// Returns the pass error; [`error_policy`] decides when to retry.
pub async fn reconcile_instance(
    vmi: Arc<VerrazzanoMonitoringInstance>,
    operator: Arc<Operator>,
) -> Result<Action, ControllerError> {
    let (namespace, name) = instance_key(&vmi);
    let metrics = &operator.ctx.metrics;

    let in_flight = operator.tracker.begin();
    metrics.set_in_flight(operator.tracker.in_flight());
    let start = std::time::Instant::now();
    info!(namespace = %namespace, name = %name, "Reconciling VerrazzanoMonitoringInstance");

    let result = reconcile(&operator.ctx, &namespace, &name).await;
    drop(in_flight);
    metrics.set_in_flight(operator.tracker.in_flight());

    match result {
        Ok(outcome) => {
            operator.tracker.forget(&format!("{namespace}/{name}"));
            if outcome == PassOutcome::Pending {
                metrics.record_reconciliation_requeue(start.elapsed());
            } else {
                metrics.record_reconciliation_success(start.elapsed());
            }
            debug!(namespace = %namespace, name = %name, outcome = ?outcome, "Pass finished");
            Ok(requeue_action(outcome, operator.resync))
        }
        Err(e) => {
            metrics.record_reconciliation_error(start.elapsed());
            error!(
                namespace = %namespace,
                name = %name,
                error = %format!("{e:#}"),
                "Failed to reconcile VerrazzanoMonitoringInstance"
            );
            Err(e.into())
        }
    }
}

/// Retry a failed instance with per-instance exponential backoff.
pub fn error_policy(
    vmi: Arc<VerrazzanoMonitoringInstance>,
    error: &ControllerError,
    operator: Arc<Operator>,
) -> Action {
    let (namespace, name) = instance_key(&vmi);
    let delay = operator.tracker.next_delay(&format!("{namespace}/{name}"));
    warn!(
        namespace = %namespace,
        name = %name,
        error = %error,
        retry_in = ?delay,
        "Reconciliation error - will retry"
    );
    Action::requeue(delay)
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Watch instances and their workloads until SIGINT or SIGTERM.
pub async fn run(client: Client, namespace: Option<&str>, workers: u16, operator: Arc<Operator>) {
    let instances: Api<VerrazzanoMonitoringInstance> = scoped_api(&client, namespace);
    let owned = watcher::Config::default().labels(&format!("{K8S_MANAGED_BY}={MANAGED_BY_VMO}"));

    info!(workers, "Starting VerrazzanoMonitoringInstance controller");

    Controller::new(instances, watcher::Config::default())
        .owns::<Deployment>(scoped_api(&client, namespace), owned.clone())
        .owns::<StatefulSet>(scoped_api(&client, namespace), owned)
        .with_config(controller::Config::default().concurrency(workers))
        .shutdown_on_signal()
        .run(reconcile_instance, error_policy, operator)
        .for_each(|result| {
            match result {
                Ok((object, _)) => debug!(instance = %object, "Reconciled"),
                Err(e) => debug!(error = %e, "Controller event failed"),
            }
            futures::future::ready(())
        })
        .await;

    info!("VerrazzanoMonitoringInstance controller stopped");
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
