// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! `PersistentVolumeClaim` lifecycle for data and Prometheus replicas.
//!
//! Each pass:
//!
//! 1. Resolves the storage class (the instance's, else the cluster default)
//!    and whether it pins volumes to zones.
//! 2. Creates missing claims, placing each in the least-used zone of its
//!    component.
//! 3. Grows claims whose requested size went up. Shrinking is never done.
//!    Classes that allow expansion are resized in place; otherwise a new
//!    claim is created in the same zone and the instance's `pvcNames` entry
//!    is renamed to it through the [`StorageRegistry`].
//! 4. Deletes owned claims that nothing references any more.
//!
//! The resulting claim-to-zone map pins the pods mounting each claim.

use anyhow::{anyhow, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::defaults::suffixed_claim_name;
use crate::constants::{
    COMPONENT_OPENSEARCH_DATA, COMPONENT_PROMETHEUS, DEFAULT_STORAGE_CLASS_ANNOTATION,
    OCI_VOLUME_PROVISIONER, STORAGE_RESOURCE, ZONE_LABEL,
};
use crate::context::Context;
use crate::crd::{Storage, VerrazzanoMonitoringInstance, VerrazzanoMonitoringInstanceSpec};
use crate::diff::parse_quantity;
use crate::labels::{owned_selector, K8S_COMPONENT};
use crate::vmi_resources::{expected_claims, persistent_volume_claim, prefix_for, ExpectedClaim};
use crate::zones::{zones_from_nodes, AdCounter};

/// Where a claim name lives in the instance spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageLocation {
    pub component: &'static str,
    pub index: usize,
}

/// Index of every claim name referenced by an instance's storage sections.
///
/// Renames go through [`StorageRegistry::rename`] so the spec and the index
/// never disagree.
#[derive(Clone, Debug, Default)]
pub struct StorageRegistry {
    claims: BTreeMap<String, StorageLocation>,
}

impl StorageRegistry {
    #[must_use]
    pub fn from_spec(spec: &VerrazzanoMonitoringInstanceSpec) -> Self {
        let mut claims = BTreeMap::new();
        let sections = [
            (COMPONENT_OPENSEARCH_DATA, spec.opensearch.data_node.storage.as_ref()),
            (COMPONENT_PROMETHEUS, spec.prometheus.storage.as_ref()),
        ];
        for (component, storage) in sections {
            for (index, name) in storage.iter().flat_map(|s| s.pvc_names.iter()).enumerate() {
                claims.insert(name.clone(), StorageLocation { component, index });
            }
        }
        Self { claims }
    }

    #[must_use]
    pub fn location(&self, claim: &str) -> Option<StorageLocation> {
        self.claims.get(claim).copied()
    }

    #[must_use]
    pub fn contains(&self, claim: &str) -> bool {
        self.claims.contains_key(claim)
    }

    /// Point the spec entry holding `old` at `new`.
    ///
    /// # Errors
    ///
    /// Returns an error if `old` is not a known claim.
    pub fn rename(
        &mut self,
        spec: &mut VerrazzanoMonitoringInstanceSpec,
        old: &str,
        new: &str,
    ) -> Result<()> {
        let location = self
            .claims
            .remove(old)
            .ok_or_else(|| anyhow!("claim {old} is not referenced by the instance"))?;
        let storage = storage_mut(spec, location.component)
            .ok_or_else(|| anyhow!("no storage section for {}", location.component))?;
        let slot = storage
            .pvc_names
            .get_mut(location.index)
            .ok_or_else(|| anyhow!("claim index {} out of range", location.index))?;
        *slot = new.to_string();
        self.claims.insert(new.to_string(), location);
        Ok(())
    }
}

fn storage_mut<'a>(
    spec: &'a mut VerrazzanoMonitoringInstanceSpec,
    component: &str,
) -> Option<&'a mut Storage> {
    match component {
        COMPONENT_OPENSEARCH_DATA => spec.opensearch.data_node.storage.as_mut(),
        COMPONENT_PROMETHEUS => spec.prometheus.storage.as_mut(),
        _ => None,
    }
}

/// Result of a PVC pass.
#[derive(Clone, Debug, Default)]
pub struct PvcOutcome {
    pub dirty: bool,
    /// Claim name to zone, for claims pinned to a zone
    pub claim_zones: BTreeMap<String, String>,
}

fn requested_size(claim: &PersistentVolumeClaim) -> Option<&str> {
    claim
        .spec
        .as_ref()?
        .resources
        .as_ref()?
        .requests
        .as_ref()?
        .get(STORAGE_RESOURCE)
        .map(|q| q.0.as_str())
}

fn zone_of(claim: &PersistentVolumeClaim) -> Option<String> {
    claim
        .spec
        .as_ref()?
        .selector
        .as_ref()?
        .match_labels
        .as_ref()?
        .get(ZONE_LABEL)
        .cloned()
}

/// The instance's storage class, or the cluster default.
async fn resolve_storage_class(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
) -> Result<Option<StorageClass>> {
    if let Some(name) = vmi.spec.storage_class.as_deref().filter(|n| !n.is_empty()) {
        return ctx.stores.storage_classes.get(name).await;
    }
    Ok(ctx.stores.storage_classes.list().await?.into_iter().find(|sc| {
        sc.annotations()
            .get(DEFAULT_STORAGE_CLASS_ANNOTATION)
            .is_some_and(|v| v == "true")
    }))
}

/// Claims mounted by any owned deployment.
fn mounted_claims(deployments: &[Deployment]) -> BTreeSet<String> {
    deployments
        .iter()
        .filter_map(|d| d.spec.as_ref()?.template.spec.as_ref()?.volumes.as_ref())
        .flatten()
        .filter_map(|v| v.persistent_volume_claim.as_ref())
        .map(|pvc| pvc.claim_name.clone())
        .collect()
}

struct Placement {
    storage_class: Option<String>,
    allow_expansion: bool,
    counters: BTreeMap<&'static str, AdCounter>,
    zones: BTreeSet<String>,
}

impl Placement {
    fn zone_for(&mut self, component: &'static str) -> String {
        let counter = self
            .counters
            .entry(component)
            .or_insert_with(|| AdCounter::new(self.zones.iter().cloned()));
        let zone = counter.get_least_used_ad();
        counter.inc(&zone);
        zone
    }
}

/// Converge claims for `vmi`, renaming replaced claims in its spec.
///
/// # Errors
///
/// Returns an error if a cluster API call fails, or if a data claim needs
/// resizing while the OpenSearch cluster is not resizable.
pub async fn reconcile(ctx: &Context, vmi: &mut VerrazzanoMonitoringInstance) -> Result<PvcOutcome> {
    let namespace = vmi.namespace().unwrap_or_default();
    let store = ctx.stores.pvcs.as_ref();
    let mut outcome = PvcOutcome::default();

    let class = resolve_storage_class(ctx, vmi).await?;
    let zone_pinning = class
        .as_ref()
        .is_some_and(|c| c.provisioner == OCI_VOLUME_PROVISIONER);
    let zones = if zone_pinning {
        zones_from_nodes(&ctx.stores.nodes.list().await?)
    } else {
        BTreeSet::new()
    };
    let mut placement = Placement {
        storage_class: vmi
            .spec
            .storage_class
            .clone()
            .or_else(|| class.as_ref().map(ResourceExt::name_any)),
        allow_expansion: class
            .as_ref()
            .and_then(|c| c.allow_volume_expansion)
            .unwrap_or(false),
        counters: BTreeMap::new(),
        zones,
    };

    let owned = store.list(&namespace, &owned_selector(&vmi.name_any())).await?;
    if zone_pinning {
        for claim in &owned {
            let component = match claim.labels().get(K8S_COMPONENT).map(String::as_str) {
                Some(COMPONENT_OPENSEARCH_DATA) => COMPONENT_OPENSEARCH_DATA,
                Some(COMPONENT_PROMETHEUS) => COMPONENT_PROMETHEUS,
                _ => continue,
            };
            if let Some(zone) = zone_of(claim) {
                let zones = placement.zones.clone();
                placement
                    .counters
                    .entry(component)
                    .or_insert_with(|| AdCounter::new(zones))
                    .inc(&zone);
            }
        }
    }

    let mut registry = StorageRegistry::from_spec(&vmi.spec);
    for expected in expected_claims(vmi) {
        let existing = store.get(&namespace, &expected.name).await?;
        let Some(existing) = existing else {
            let zone = if zone_pinning {
                placement.zone_for(expected.component)
            } else {
                String::new()
            };
            create_claim(ctx, vmi, &namespace, &expected, &placement, &zone).await?;
            if !zone.is_empty() {
                outcome.claim_zones.insert(expected.name.clone(), zone);
            }
            outcome.dirty = true;
            continue;
        };

        let zone = zone_of(&existing).unwrap_or_default();
        if !zone.is_empty() {
            outcome.claim_zones.insert(expected.name.clone(), zone.clone());
        }

        let current = requested_size(&existing).and_then(parse_quantity);
        let wanted = parse_quantity(&expected.size);
        let grows = matches!((current, wanted), (Some(c), Some(w)) if w > c);
        if !grows {
            if let (Some(c), Some(w)) = (current, wanted) {
                if w < c {
                    debug!(namespace = %namespace, name = %expected.name, "Claims are never shrunk");
                }
            }
            continue;
        }

        if expected.component == COMPONENT_OPENSEARCH_DATA {
            ctx.search.is_resizable(vmi).await?;
        }

        if placement.allow_expansion {
            let mut resized = existing.clone();
            if let Some(requests) = resized
                .spec
                .as_mut()
                .and_then(|s| s.resources.as_mut())
                .and_then(|r| r.requests.as_mut())
            {
                requests.insert(STORAGE_RESOURCE.to_string(), Quantity(expected.size.clone()));
            }
            info!(namespace = %namespace, name = %expected.name, size = %expected.size, "Expanding claim");
            store.replace(&namespace, &resized).await?;
            ctx.metrics.record_resource_updated("PersistentVolumeClaim");
        } else {
            let base = format!("{}-{}-{}", prefix_for(&vmi.name_any()), expected.component, expected.index);
            let replacement = ExpectedClaim {
                name: suffixed_claim_name(&base),
                ..expected.clone()
            };
            info!(
                namespace = %namespace,
                old = %expected.name,
                new = %replacement.name,
                size = %expected.size,
                "Storage class cannot expand, replacing claim"
            );
            create_claim(ctx, vmi, &namespace, &replacement, &placement, &zone).await?;
            registry.rename(&mut vmi.spec, &expected.name, &replacement.name)?;
            outcome.claim_zones.remove(&expected.name);
            if !zone.is_empty() {
                outcome.claim_zones.insert(replacement.name.clone(), zone);
            }
        }
        outcome.dirty = true;
    }

    let deployments = ctx
        .stores
        .deployments
        .list(&namespace, &owned_selector(&vmi.name_any()))
        .await?;
    let mounted = mounted_claims(&deployments);
    for claim in owned {
        let name = claim.name_any();
        if registry.contains(&name) || mounted.contains(&name) {
            continue;
        }
        info!(namespace = %namespace, name = %name, "Deleting orphaned claim");
        store.delete(&namespace, &name).await?;
        ctx.metrics.record_resource_deleted("PersistentVolumeClaim");
        outcome.dirty = true;
    }

    Ok(outcome)
}

async fn create_claim(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
    namespace: &str,
    expected: &ExpectedClaim,
    placement: &Placement,
    zone: &str,
) -> Result<()> {
    let claim = persistent_volume_claim(vmi, expected, placement.storage_class.as_deref(), zone)?;
    info!(
        namespace = %namespace,
        name = %expected.name,
        zone = %zone,
        size = %expected.size,
        "Creating claim"
    );
    ctx.stores.pvcs.create(namespace, &claim).await?;
    ctx.metrics.record_resource_created("PersistentVolumeClaim");
    Ok(())
}

#[cfg(test)]
#[path = "pvcs_tests.rs"]
mod pvcs_tests;
