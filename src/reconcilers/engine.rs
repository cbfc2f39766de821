// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! One reconciliation pass over a `VerrazzanoMonitoringInstance`.
//!
//! A pass loads the instance, fills in defaults and converges every owned
//! kind in a fixed order:
//!
//! 1. `RoleBinding`s
//! 2. `ConfigMap`s
//! 3. `Service`s
//! 4. `PersistentVolumeClaim`s (may rename claims in the spec)
//! 5. `StatefulSet`s
//! 6. `Deployment`s, skipped when an earlier kind failed
//! 7. `Ingress`es
//!
//! ISM policy setup and index auto-expand run as two background tasks
//! started before the fan-out and joined after it.
//!
//! Spec changes made during the pass are written back. Status is stamped
//! only after a pass that changed nothing and found the OpenSearch cluster
//! on the target version, so a second pass over a converged cluster makes
//! no API writes at all.

use anyhow::{Context as _, Result};
use chrono::Utc;
use kube::ResourceExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::defaults::initialize_defaults;
use super::{
    configmaps, deployments, ingresses, pvcs, rolebindings, services, statefulsets, status_changed,
};
use crate::constants::STATE_RUNNING;
use crate::context::Context;
use crate::crd::{VerrazzanoMonitoringInstance, VerrazzanoMonitoringInstanceStatus};
use crate::errors::{ReconcileError, SearchError};
use crate::opensearch::SearchCluster;
use crate::vmi_resources::{self, build_desired};

/// How a pass ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// The instance no longer exists
    Missing,
    /// `spec.lock` is set
    Locked,
    /// Something changed or is still rolling out; run again soon
    Pending,
    /// Nothing to do; status is current
    Converged,
}

/// Per-kind results collected during the fan-out.
#[derive(Debug, Default)]
struct Pass {
    dirty: bool,
    errors: Vec<String>,
}

impl Pass {
    fn record(&mut self, ctx: &Context, kind: &str, result: Result<bool>) {
        match result {
            Ok(changed) => self.dirty |= changed,
            Err(e) => self.fail(ctx, kind, &e),
        }
    }

    fn fail(&mut self, ctx: &Context, kind: &str, error: &anyhow::Error) {
        warn!(kind = %kind, error = %format!("{error:#}"), "Reconciliation step failed");
        ctx.metrics.record_error(kind, "reconcile");
        self.errors.push(format!("{kind}: {error:#}"));
    }
}

/// SHA-256 of the JSON form of `data`, hex encoded.
#[must_use]
pub fn calculate_spec_hash<T: Serialize>(data: &T) -> String {
    let json = serde_json::to_string(data).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn spawn_auxiliary<F, Fut>(
    search: &Arc<dyn SearchCluster>,
    vmi: &VerrazzanoMonitoringInstance,
    task: F,
) -> JoinHandle<Result<(), SearchError>>
where
    F: FnOnce(Arc<dyn SearchCluster>, VerrazzanoMonitoringInstance) -> Fut,
    Fut: std::future::Future<Output = Result<(), SearchError>> + Send + 'static,
{
    tokio::spawn(task(search.clone(), vmi.clone()))
}

async fn join_auxiliary(
    ctx: &Context,
    name: &str,
    task: String,
    handle: JoinHandle<Result<(), SearchError>>,
) {
    match handle.await {
        Ok(Ok(())) => debug!(name = %name, task = %task, "Auxiliary OpenSearch task finished"),
        Ok(Err(e)) => {
            warn!(name = %name, task = %task, error = %e, "Auxiliary OpenSearch task failed");
            ctx.metrics.record_error("OpenSearch", &task);
        }
        Err(e) => {
            warn!(name = %name, task = %task, error = %e, "Auxiliary OpenSearch task panicked");
            ctx.metrics.record_error("OpenSearch", &task);
        }
    }
}

/// Status the instance should carry after a converged pass.
fn converged_status(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
) -> VerrazzanoMonitoringInstanceStatus {
    let created_at = vmi
        .status
        .as_ref()
        .and_then(|s| s.created_at.clone())
        .unwrap_or_else(|| Utc::now().to_rfc3339());
    VerrazzanoMonitoringInstanceStatus {
        state: Some(STATE_RUNNING.to_string()),
        hash: Some(calculate_spec_hash(&vmi.spec)),
        current_version: Some(ctx.build_version.clone()),
        created_at: Some(created_at),
    }
}

/// Reconcile the instance `namespace/name`.
///
/// # Errors
///
/// Returns [`ReconcileError::PassFailed`] listing every kind that failed,
/// or an error if the instance cannot be read or written back.
pub async fn reconcile(ctx: &Context, namespace: &str, name: &str) -> Result<PassOutcome> {
    let Some(original) = ctx
        .stores
        .instances
        .get(namespace, name)
        .await
        .with_context(|| format!("Failed to load VerrazzanoMonitoringInstance {namespace}/{name}"))?
    else {
        debug!(namespace = %namespace, name = %name, "Instance is gone, nothing to do");
        return Ok(PassOutcome::Missing);
    };
    reconcile_instance(ctx, &original).await
}

/// Run one pass over an already loaded instance.
///
/// # Errors
///
/// See [`reconcile`].
pub async fn reconcile_instance(
    ctx: &Context,
    original: &VerrazzanoMonitoringInstance,
) -> Result<PassOutcome> {
    let namespace = original.namespace().unwrap_or_default();
    let name = original.name_any();

    if original.spec.lock {
        info!(namespace = %namespace, name = %name, "Instance is locked, skipping");
        return Ok(PassOutcome::Locked);
    }

    let mut working = original.clone();
    initialize_defaults(&mut working, &ctx.config);

    let auxiliary = if working.spec.opensearch.enabled {
        vec![
            (
                "configure_ism".to_string(),
                spawn_auxiliary(&ctx.search, &working, |search, vmi| async move {
                    search.configure_ism(&vmi).await
                }),
            ),
            (
                "set_auto_expand_indices".to_string(),
                spawn_auxiliary(&ctx.search, &working, |search, vmi| async move {
                    search.set_auto_expand_indices(&vmi).await
                }),
            ),
        ]
    } else {
        Vec::new()
    };

    let mut pass = Pass::default();
    match build_desired(&working, &ctx.config, &BTreeMap::new()) {
        Ok(desired) => {
            pass.record(
                ctx,
                "RoleBinding",
                rolebindings::reconcile(ctx, &working, &desired.role_bindings).await,
            );
            pass.record(
                ctx,
                "ConfigMap",
                configmaps::reconcile(ctx, &working, &desired.config_maps).await,
            );
            pass.record(
                ctx,
                "Service",
                services::reconcile(ctx, &working, &desired.services).await,
            );

            let mut claim_zones = BTreeMap::new();
            match pvcs::reconcile(ctx, &mut working).await {
                Ok(outcome) => {
                    pass.dirty |= outcome.dirty;
                    claim_zones = outcome.claim_zones;
                }
                Err(e) => pass.fail(ctx, "PersistentVolumeClaim", &e),
            }

            pass.record(
                ctx,
                "StatefulSet",
                statefulsets::reconcile(ctx, &working, &desired.stateful_sets).await,
            );

            if pass.errors.is_empty() {
                let result = match vmi_resources::deployments(&working, &ctx.config, &claim_zones) {
                    Ok(wanted) => deployments::reconcile(ctx, &working, &wanted).await,
                    Err(e) => Err(e),
                };
                pass.record(ctx, "Deployment", result);
            } else {
                info!(namespace = %namespace, name = %name, "Skipping Deployments after earlier failures");
            }

            pass.record(
                ctx,
                "Ingress",
                ingresses::reconcile(ctx, &working, &desired.ingresses).await,
            );
        }
        Err(e) => pass.fail(ctx, "DesiredState", &e),
    }

    for (task, handle) in auxiliary {
        join_auxiliary(ctx, &name, task, handle).await;
    }

    if working.spec != original.spec {
        info!(namespace = %namespace, name = %name, "Writing back instance spec");
        match ctx.stores.instances.replace(&namespace, &working).await {
            Ok(stored) => working.metadata = stored.metadata,
            Err(e) => pass.fail(ctx, "VerrazzanoMonitoringInstance", &e),
        }
    }

    if !pass.errors.is_empty() {
        return Err(ReconcileError::PassFailed {
            key: format!("{namespace}/{name}"),
            errors: pass.errors,
        }
        .into());
    }

    if pass.dirty {
        debug!(namespace = %namespace, name = %name, "Pass made changes, status left as is");
        return Ok(PassOutcome::Pending);
    }

    if let Err(e) = ctx.search.is_updated(&working).await {
        info!(namespace = %namespace, name = %name, reason = %e, "OpenSearch not on target version yet");
        return Ok(PassOutcome::Pending);
    }

    let status = Some(converged_status(ctx, &working));
    if status_changed(&working.status, &status) {
        ctx.stores
            .instances
            .patch_status(&namespace, &name, &serde_json::to_value(&status)?)
            .await?;
        info!(
            namespace = %namespace,
            name = %name,
            version = %ctx.build_version,
            "Instance converged"
        );
    }
    Ok(PassOutcome::Converged)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
