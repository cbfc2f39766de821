// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Generic create/update/delete helpers shared by the per-kind reconcilers.
//!
//! # Update modes
//!
//! - **Replace**: in-place replace carrying the live `resourceVersion`
//! - **Recreate**: delete then create (Services, whose immutable fields make
//!   in-place updates fail)
//! - **`CreateOnly`**: create when absent, never touch afterwards
//!
//! # Example
//!
//! ```rust,no_run
//! use vmo::reconcilers::resources::{apply, UpdateMode};
//! use vmo::context::Context;
//! use k8s_openapi::api::core::v1::ConfigMap;
//! use anyhow::Result;
//!
//! async fn example(ctx: &Context, cm: ConfigMap) -> Result<()> {
//!     apply(ctx.stores.config_maps.as_ref(), &ctx.metrics, "verrazzano-system", &cm, UpdateMode::Replace).await?;
//!     Ok(())
//! }
//! ```

use anyhow::{Context as _, Result};
use kube::ResourceExt;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::diff::diff;
use crate::labels::owned_selector;
use crate::metrics::MetricsRegistry;
use crate::store::{ClusterObject, ObjectStore};

/// How an existing object that differs from its desired form is brought in line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMode {
    Replace,
    Recreate,
    CreateOnly,
}

/// What [`apply`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Created,
    Updated,
    /// The desired object had no name
    Skipped,
}

impl Outcome {
    /// Whether the cluster was changed.
    #[must_use]
    pub fn is_dirty(self) -> bool {
        matches!(self, Outcome::Created | Outcome::Updated)
    }
}

/// Converge one object towards `desired`.
///
/// # Errors
///
/// Returns an error if a cluster API call fails.
pub async fn apply<K: ClusterObject>(
    store: &dyn ObjectStore<K>,
    metrics: &MetricsRegistry,
    namespace: &str,
    desired: &K,
    mode: UpdateMode,
) -> Result<Outcome> {
    let kind = K::kind(&());
    let name = desired.meta().name.clone().unwrap_or_default();
    if name.is_empty() {
        warn!(namespace = %namespace, kind = %kind, "Desired object has no name, skipping");
        return Ok(Outcome::Skipped);
    }

    let Some(existing) = store.get(namespace, &name).await? else {
        info!(namespace = %namespace, name = %name, kind = %kind, "Creating");
        store.create(namespace, desired).await?;
        metrics.record_resource_created(&kind);
        return Ok(Outcome::Created);
    };

    if mode == UpdateMode::CreateOnly {
        debug!(namespace = %namespace, name = %name, kind = %kind, "Exists, create-only");
        return Ok(Outcome::Unchanged);
    }

    let changes = diff(&existing, desired);
    if changes.is_empty() {
        return Ok(Outcome::Unchanged);
    }
    info!(
        namespace = %namespace,
        name = %name,
        kind = %kind,
        changes = %changes,
        "Updating"
    );

    match mode {
        UpdateMode::Recreate => {
            store.delete(namespace, &name).await?;
            store
                .create(namespace, desired)
                .await
                .with_context(|| format!("Failed to recreate {kind} {namespace}/{name}"))?;
        }
        UpdateMode::Replace | UpdateMode::CreateOnly => {
            let mut updated = desired.clone();
            updated.meta_mut().resource_version = existing.resource_version();
            store.replace(namespace, &updated).await?;
        }
    }
    metrics.record_resource_updated(&kind);
    Ok(Outcome::Updated)
}

/// Names of the desired objects, skipping unnamed ones.
#[must_use]
pub fn names_of<K: ClusterObject>(objects: &[K]) -> BTreeSet<String> {
    objects
        .iter()
        .filter_map(|o| o.meta().name.clone())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Delete objects of kind `K` owned by the instance but not in `wanted`.
///
/// Returns the number of deleted objects.
///
/// # Errors
///
/// Returns an error if a cluster API call fails.
pub async fn delete_unwanted<K: ClusterObject>(
    store: &dyn ObjectStore<K>,
    metrics: &MetricsRegistry,
    namespace: &str,
    instance_name: &str,
    wanted: &BTreeSet<String>,
) -> Result<usize> {
    let kind = K::kind(&());
    let mut deleted = 0;
    for existing in store.list(namespace, &owned_selector(instance_name)).await? {
        let name = existing.name_any();
        if wanted.contains(&name) {
            continue;
        }
        info!(namespace = %namespace, name = %name, kind = %kind, "Deleting unwanted object");
        store.delete(namespace, &name).await?;
        metrics.record_resource_deleted(&kind);
        deleted += 1;
    }
    Ok(deleted)
}

/// Apply every desired object, then delete owned objects no longer desired.
///
/// Returns whether anything changed.
///
/// # Errors
///
/// Returns the first cluster API error; later objects are not attempted.
pub async fn reconcile_all<K: ClusterObject>(
    store: &dyn ObjectStore<K>,
    metrics: &MetricsRegistry,
    namespace: &str,
    instance_name: &str,
    desired: &[K],
    mode: impl Fn(&K) -> UpdateMode,
) -> Result<bool> {
    let mut dirty = false;
    for object in desired {
        dirty |= apply(store, metrics, namespace, object, mode(object))
            .await?
            .is_dirty();
    }
    let deleted =
        delete_unwanted(store, metrics, namespace, instance_name, &names_of(desired)).await?;
    Ok(dirty || deleted > 0)
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
