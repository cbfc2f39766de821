// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! `StatefulSet` reconciliation for the OpenSearch master tier.
//!
//! Masters hold cluster state, so every change waits for a green cluster and
//! at most one step is taken per pass:
//!
//! - scale-down removes exactly one replica
//! - any other change is applied and the pass returns immediately
//! - a `StatefulSet` no longer wanted is deleted only when the cluster is
//!   green and can lose nodes
//!
//! Once a `StatefulSet` is up to date, the claims created from its templates
//! get an owner reference to it.

use anyhow::Result;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, warn};

use super::resources::{apply, names_of, UpdateMode};
use crate::context::Context;
use crate::crd::VerrazzanoMonitoringInstance;
use crate::diff::diff;
use crate::errors::ReconcileError;
use crate::labels::owned_selector;

fn replicas_of(sts: &StatefulSet) -> i32 {
    sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1)
}

/// Give every claim created by `sts` an owner reference to it.
///
/// Returns the number of claims updated.
///
/// # Errors
///
/// Returns [`ReconcileError::PvcCountMismatch`] when some claims are unowned
/// and their number is not replicas × claim templates, or a cluster API error.
pub async fn update_owner_for_pvcs(ctx: &Context, namespace: &str, sts: &StatefulSet) -> Result<usize> {
    let Some(spec) = sts.spec.as_ref() else {
        return Ok(0);
    };
    let Some(selector) = spec.selector.match_labels.as_ref() else {
        return Ok(0);
    };
    let Some(owner) = sts.owner_ref(&()) else {
        return Ok(0);
    };

    let claims = ctx.stores.pvcs.list(namespace, selector).await?;
    let unowned: Vec<_> = claims
        .iter()
        .filter(|c| !c.owner_references().iter().any(|o| o.uid == owner.uid))
        .collect();
    if unowned.is_empty() {
        return Ok(0);
    }

    let templates = spec.volume_claim_templates.as_ref().map_or(0, Vec::len);
    let expected = usize::try_from(replicas_of(sts)).unwrap_or(0) * templates;
    if claims.len() != expected {
        return Err(ReconcileError::PvcCountMismatch {
            name: sts.name_any(),
            expected,
            found: claims.len(),
        }
        .into());
    }

    for claim in &unowned {
        let mut updated = (*claim).clone();
        updated
            .metadata
            .owner_references
            .get_or_insert_with(Vec::new)
            .push(owner.clone());
        ctx.stores.pvcs.replace(namespace, &updated).await?;
        ctx.metrics.record_resource_updated("PersistentVolumeClaim");
    }
    info!(
        namespace = %namespace,
        name = %sts.name_any(),
        count = unowned.len(),
        "Set StatefulSet owner on claims"
    );
    Ok(unowned.len())
}

/// Delete unwanted master `StatefulSet`s once the cluster can afford it.
async fn delete_unwanted(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
    namespace: &str,
    desired: &[StatefulSet],
) -> Result<bool> {
    let wanted = names_of(desired);
    let mut dirty = false;
    for existing in ctx
        .stores
        .stateful_sets
        .list(namespace, &owned_selector(&vmi.name_any()))
        .await?
    {
        let name = existing.name_any();
        if wanted.contains(&name) {
            continue;
        }
        dirty = true;
        if !ctx.search.is_healthy(vmi).await? {
            info!(namespace = %namespace, name = %name, "Cluster not green, keeping StatefulSet");
            continue;
        }
        if let Err(e) = ctx.search.is_resizable(vmi).await {
            info!(namespace = %namespace, name = %name, reason = %e, "Cluster not resizable, keeping StatefulSet");
            continue;
        }
        info!(namespace = %namespace, name = %name, "Deleting unwanted StatefulSet");
        ctx.stores.stateful_sets.delete(namespace, &name).await?;
        ctx.metrics.record_resource_deleted("StatefulSet");
    }
    Ok(dirty)
}

/// Converge the instance's `StatefulSet`s. Returns whether anything changed
/// or is waiting on cluster health.
///
/// # Errors
///
/// Returns an error if a cluster API call or health check fails.
pub async fn reconcile(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
    desired: &[StatefulSet],
) -> Result<bool> {
    let namespace = vmi.namespace().unwrap_or_default();
    let store = ctx.stores.stateful_sets.as_ref();
    let mut dirty = false;

    for sts in desired {
        let name = sts.name_any();
        let Some(existing) = store.get(&namespace, &name).await? else {
            apply(store, &ctx.metrics, &namespace, sts, UpdateMode::Replace).await?;
            dirty = true;
            continue;
        };

        let live_replicas = replicas_of(&existing);
        let wanted_replicas = replicas_of(sts);
        if live_replicas > wanted_replicas {
            if !ctx.search.is_healthy(vmi).await? {
                info!(namespace = %namespace, name = %name, "Cluster not green, holding scale-down");
                return Ok(true);
            }
            let mut step = sts.clone();
            if let Some(spec) = step.spec.as_mut() {
                spec.replicas = Some(live_replicas - 1);
            }
            step.meta_mut().resource_version = existing.resource_version();
            info!(
                namespace = %namespace,
                name = %name,
                from = live_replicas,
                to = live_replicas - 1,
                "Scaling down StatefulSet"
            );
            store.replace(&namespace, &step).await?;
            ctx.metrics.record_resource_updated("StatefulSet");
            return Ok(true);
        }

        if !diff(&existing, sts).is_empty() {
            if !ctx.search.is_healthy(vmi).await? {
                info!(namespace = %namespace, name = %name, "Cluster not green, holding update");
                return Ok(true);
            }
            apply(store, &ctx.metrics, &namespace, sts, UpdateMode::Replace).await?;
            return Ok(true);
        }

        match update_owner_for_pvcs(ctx, &namespace, &existing).await {
            Ok(0) => debug!(namespace = %namespace, name = %name, "Claims already owned"),
            Ok(_) => dirty = true,
            Err(e) => {
                warn!(namespace = %namespace, name = %name, error = %e, "Claim owner update skipped");
                ctx.metrics.record_error("StatefulSet", "pvc_owner");
            }
        }
    }

    dirty |= delete_unwanted(ctx, vmi, &namespace, desired).await?;
    Ok(dirty)
}

#[cfg(test)]
#[path = "statefulsets_tests.rs"]
mod statefulsets_tests;
