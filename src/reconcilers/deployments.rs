// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! `Deployment` reconciliation with rolling groups.
//!
//! Data and Prometheus replicas run as one `Deployment` each, labelled with a
//! rolling group. Within a group at most one member changes per pass, and the
//! walk only moves on once that member is fully available again:
//!
//! 1. Absent members are created.
//! 2. The first member whose spec differs is updated, then the walk stops.
//! 3. A member that matches but is not yet fully available stops the walk.
//!
//! Data tier updates additionally wait for a green cluster, and data
//! deployments that are no longer wanted are removed one per pass, only once
//! the cluster can afford to lose a node.

use anyhow::Result;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStrategy};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::resources::{apply, names_of, UpdateMode};
use crate::constants::{COMPONENT_ALERTMANAGER, COMPONENT_DASHBOARDS, COMPONENT_OPENSEARCH_DATA};
use crate::context::Context;
use crate::crd::VerrazzanoMonitoringInstance;
use crate::diff::diff;
use crate::labels::{owned_selector, K8S_COMPONENT, ROLLING_GROUP_LABEL};

/// `Recreate` when the image changes, `RollingUpdate` otherwise.
#[must_use]
pub fn get_update_strategy(new_image: Option<&str>, old_image: Option<&str>) -> DeploymentStrategy {
    let type_ = if new_image == old_image {
        "RollingUpdate"
    } else {
        "Recreate"
    };
    DeploymentStrategy {
        type_: Some(type_.to_string()),
        rolling_update: None,
    }
}

fn image_of(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()?
        .image
        .as_deref()
}

fn component_of(deployment: &Deployment) -> Option<&str> {
    deployment.labels().get(K8S_COMPONENT).map(String::as_str)
}

fn rolling_group_of(deployment: &Deployment) -> Option<&str> {
    deployment.labels().get(ROLLING_GROUP_LABEL).map(String::as_str)
}

/// Rolled out and serving every replica at the current generation.
#[must_use]
pub fn is_fully_available(deployment: &Deployment) -> bool {
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let Some(status) = deployment.status.as_ref() else {
        return false;
    };
    let generation_caught_up = match (status.observed_generation, deployment.metadata.generation) {
        (Some(observed), Some(generation)) => observed >= generation,
        (_, None) => true,
        (None, Some(_)) => false,
    };
    generation_caught_up
        && status.replicas.unwrap_or(0) == desired
        && status.available_replicas.unwrap_or(0) == desired
}

/// Converge a deployment outside any rolling group.
async fn apply_single(
    ctx: &Context,
    namespace: &str,
    desired: &Deployment,
) -> Result<bool> {
    let mut desired = desired.clone();
    let picks_strategy = matches!(
        component_of(&desired),
        Some(COMPONENT_DASHBOARDS | COMPONENT_ALERTMANAGER)
    );
    if picks_strategy {
        if let Some(existing) = ctx
            .stores
            .deployments
            .get(namespace, &desired.name_any())
            .await?
        {
            if !diff(&existing, &desired).is_empty() {
                let strategy = get_update_strategy(image_of(&desired), image_of(&existing));
                if let Some(spec) = desired.spec.as_mut() {
                    spec.strategy = Some(strategy);
                }
            }
        }
    }
    Ok(apply(
        ctx.stores.deployments.as_ref(),
        &ctx.metrics,
        namespace,
        &desired,
        UpdateMode::Replace,
    )
    .await?
    .is_dirty())
}

/// Walk one rolling group. Returns whether the group is still converging.
async fn rolling_update(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
    namespace: &str,
    group: &str,
    members: &[&Deployment],
) -> Result<bool> {
    let store = ctx.stores.deployments.as_ref();
    let mut live = Vec::with_capacity(members.len());
    let mut dirty = false;

    for desired in members.iter().copied() {
        match store.get(namespace, &desired.name_any()).await? {
            Some(existing) => live.push((desired, existing)),
            None => {
                apply(store, &ctx.metrics, namespace, desired, UpdateMode::Replace).await?;
                dirty = true;
            }
        }
    }

    for (desired, existing) in live {
        let name = desired.name_any();
        if !diff(&existing, desired).is_empty() {
            if group == COMPONENT_OPENSEARCH_DATA && !ctx.search.is_healthy(vmi).await? {
                info!(
                    namespace = %namespace,
                    name = %name,
                    "OpenSearch cluster is not green, holding data node update"
                );
                return Ok(true);
            }
            info!(namespace = %namespace, name = %name, group = %group, "Rolling update");
            apply(store, &ctx.metrics, namespace, desired, UpdateMode::Replace).await?;
            return Ok(true);
        }
        if !is_fully_available(&existing) {
            debug!(namespace = %namespace, name = %name, "Waiting for deployment to become available");
            return Ok(true);
        }
    }
    Ok(dirty)
}

/// Remove owned deployments that are no longer desired.
async fn delete_unwanted(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
    namespace: &str,
    desired: &[Deployment],
) -> Result<bool> {
    let wanted = names_of(desired);
    let store = ctx.stores.deployments.as_ref();
    let mut dirty = false;
    let mut data_node_removed = false;

    for existing in store.list(namespace, &owned_selector(&vmi.name_any())).await? {
        let name = existing.name_any();
        if wanted.contains(&name) {
            continue;
        }
        if component_of(&existing) == Some(COMPONENT_OPENSEARCH_DATA) {
            dirty = true;
            if data_node_removed {
                continue;
            }
            if let Err(e) = ctx.search.is_resizable(vmi).await {
                info!(namespace = %namespace, name = %name, reason = %e, "Holding data node removal");
                continue;
            }
            data_node_removed = true;
        }
        info!(namespace = %namespace, name = %name, "Deleting unwanted Deployment");
        store.delete(namespace, &name).await?;
        ctx.metrics.record_resource_deleted("Deployment");
        dirty = true;
    }
    Ok(dirty)
}

/// Converge the instance's deployments. Returns whether anything changed or
/// a rollout is still in progress.
///
/// # Errors
///
/// Returns an error if a cluster API call or health check fails.
pub async fn reconcile(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
    desired: &[Deployment],
) -> Result<bool> {
    let namespace = vmi.namespace().unwrap_or_default();
    let mut groups: BTreeMap<&str, Vec<&Deployment>> = BTreeMap::new();
    let mut dirty = false;

    for deployment in desired {
        match rolling_group_of(deployment) {
            Some(group) => groups.entry(group).or_default().push(deployment),
            None => dirty |= apply_single(ctx, &namespace, deployment).await?,
        }
    }
    for (group, members) in &groups {
        dirty |= rolling_update(ctx, vmi, &namespace, group, members).await?;
    }
    dirty |= delete_unwanted(ctx, vmi, &namespace, desired).await?;
    Ok(dirty)
}

#[cfg(test)]
#[path = "deployments_tests.rs"]
mod deployments_tests;
