// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Kubernetes side of backup and restore: scaling workloads, readiness,
//! bootstrap reset and the restore marker.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Pod};
use kube::api::{
    ApiResource, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams,
};
use kube::{Api, Client};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

use crate::constants::{
    FIELD_MANAGER, OPENSEARCH_CLUSTER_GROUP, OPENSEARCH_CLUSTER_KIND, OPENSEARCH_CLUSTER_PLURAL,
    OPENSEARCH_CLUSTER_VERSION, RESTORE_MARKER_BACKUP_KEY, RESTORE_MARKER_CONFIGMAP,
    RESTORE_REPLICAS_ANNOTATION,
};
use crate::reconcilers::retry::is_not_found;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

/// A scalable workload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workload {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
}

impl Workload {
    #[must_use]
    pub fn deployment(namespace: &str, name: &str) -> Self {
        Self {
            kind: WorkloadKind::Deployment,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    #[must_use]
    pub fn stateful_set(namespace: &str, name: &str) -> Self {
        Self {
            kind: WorkloadKind::StatefulSet,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
        };
        write!(f, "{kind} {}/{}", self.namespace, self.name)
    }
}

/// Cluster operations the hook performs around OpenSearch.
#[async_trait]
pub trait Workloads: Send + Sync {
    /// `spec.replicas`, `None` when the workload does not exist.
    async fn replicas(&self, target: &Workload) -> Result<Option<i32>>;

    async fn scale(&self, target: &Workload, replicas: i32) -> Result<()>;

    /// Replica count saved before a scale-down.
    async fn saved_replicas(&self, target: &Workload) -> Result<Option<i32>>;

    /// Save `replicas` on the workload, or clear the saved value with `None`.
    async fn save_replicas(&self, target: &Workload, replicas: Option<i32>) -> Result<()>;

    /// Every desired replica is ready and the controller saw the latest spec.
    async fn is_ready(&self, target: &Workload) -> Result<bool>;

    async fn pod_ready(&self, namespace: &str, name: &str) -> Result<bool>;

    /// Delete a job and its pods. Deleting an absent job succeeds.
    async fn delete_job(&self, namespace: &str, name: &str) -> Result<()>;

    /// Mark the OpenSearch cluster as not yet initialized so the operator
    /// runs its security bootstrap again.
    async fn reset_cluster_initialization(&self, namespace: &str, cluster: &str) -> Result<()>;

    /// Backup named by the restore marker, if present.
    async fn restore_marker(&self, namespace: &str) -> Result<Option<String>>;

    async fn set_restore_marker(&self, namespace: &str, backup: &str) -> Result<()>;

    async fn clear_restore_marker(&self, namespace: &str) -> Result<()>;
}

/// [`Workloads`] backed by the Kubernetes API.
pub struct KubeWorkloads {
    client: Client,
}

impl KubeWorkloads {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn merge_patch(&self, target: &Workload, patch: serde_json::Value) -> Result<()> {
        let params = PatchParams::default();
        let result = match target.kind {
            WorkloadKind::Deployment => {
                Api::<Deployment>::namespaced(self.client.clone(), &target.namespace)
                    .patch(&target.name, &params, &Patch::Merge(&patch))
                    .await
                    .map(|_| ())
            }
            WorkloadKind::StatefulSet => {
                Api::<StatefulSet>::namespaced(self.client.clone(), &target.namespace)
                    .patch(&target.name, &params, &Patch::Merge(&patch))
                    .await
                    .map(|_| ())
            }
        };
        result.with_context(|| format!("Failed to patch {target}"))
    }

    /// Spec replicas, ready replicas, generation lag and annotations.
    async fn observe(&self, target: &Workload) -> Result<Option<Observed>> {
        let observed = match target.kind {
            WorkloadKind::Deployment => {
                Api::<Deployment>::namespaced(self.client.clone(), &target.namespace)
                    .get_opt(&target.name)
                    .await
                    .with_context(|| format!("Failed to read {target}"))?
                    .map(|d| {
                        let status = d.status.unwrap_or_default();
                        Observed {
                            replicas: d.spec.and_then(|s| s.replicas).unwrap_or(1),
                            ready: status.ready_replicas.unwrap_or(0),
                            current: status.observed_generation >= d.metadata.generation,
                            annotations: d.metadata.annotations.unwrap_or_default(),
                        }
                    })
            }
            WorkloadKind::StatefulSet => {
                Api::<StatefulSet>::namespaced(self.client.clone(), &target.namespace)
                    .get_opt(&target.name)
                    .await
                    .with_context(|| format!("Failed to read {target}"))?
                    .map(|s| {
                        let status = s.status.unwrap_or_default();
                        Observed {
                            replicas: s.spec.and_then(|s| s.replicas).unwrap_or(1),
                            ready: status.ready_replicas.unwrap_or(0),
                            current: status.observed_generation >= s.metadata.generation,
                            annotations: s.metadata.annotations.unwrap_or_default(),
                        }
                    })
            }
        };
        Ok(observed)
    }
}

struct Observed {
    replicas: i32,
    ready: i32,
    current: bool,
    annotations: BTreeMap<String, String>,
}

#[async_trait]
impl Workloads for KubeWorkloads {
    async fn replicas(&self, target: &Workload) -> Result<Option<i32>> {
        Ok(self.observe(target).await?.map(|o| o.replicas))
    }

    async fn scale(&self, target: &Workload, replicas: i32) -> Result<()> {
        self.merge_patch(target, json!({ "spec": { "replicas": replicas } }))
            .await?;
        info!(workload = %target, replicas = replicas, "Scaled workload");
        Ok(())
    }

    async fn saved_replicas(&self, target: &Workload) -> Result<Option<i32>> {
        Ok(self.observe(target).await?.and_then(|o| {
            o.annotations
                .get(RESTORE_REPLICAS_ANNOTATION)
                .and_then(|v| v.parse().ok())
        }))
    }

    async fn save_replicas(&self, target: &Workload, replicas: Option<i32>) -> Result<()> {
        let value = replicas.map(|r| r.to_string());
        self.merge_patch(
            target,
            json!({ "metadata": { "annotations": { RESTORE_REPLICAS_ANNOTATION: value } } }),
        )
        .await
    }

    async fn is_ready(&self, target: &Workload) -> Result<bool> {
        Ok(self
            .observe(target)
            .await?
            .is_some_and(|o| o.current && o.ready >= o.replicas))
    }

    async fn pod_ready(&self, namespace: &str, name: &str) -> Result<bool> {
        let pod = Api::<Pod>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to read pod {namespace}/{name}"))?;
        Ok(pod
            .and_then(|p| p.status)
            .and_then(|s| s.conditions)
            .is_some_and(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            }))
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<()> {
        let api = Api::<Job>::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::background()).await {
            Ok(_) => {
                info!(namespace = %namespace, job = %name, "Deleted job");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!(namespace = %namespace, job = %name, "Job already gone");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to delete job {namespace}/{name}")),
        }
    }

    async fn reset_cluster_initialization(&self, namespace: &str, cluster: &str) -> Result<()> {
        let gvk = GroupVersionKind::gvk(
            OPENSEARCH_CLUSTER_GROUP,
            OPENSEARCH_CLUSTER_VERSION,
            OPENSEARCH_CLUSTER_KIND,
        );
        let resource = ApiResource::from_gvk_with_plural(&gvk, OPENSEARCH_CLUSTER_PLURAL);
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &resource);
        api.patch_status(
            cluster,
            &PatchParams::default(),
            &Patch::Merge(json!({ "status": { "initialized": false } })),
        )
        .await
        .with_context(|| format!("Failed to reset initialization of {namespace}/{cluster}"))?;
        info!(namespace = %namespace, cluster = %cluster, "Reset OpenSearch cluster initialization");
        Ok(())
    }

    async fn restore_marker(&self, namespace: &str) -> Result<Option<String>> {
        let marker = Api::<ConfigMap>::namespaced(self.client.clone(), namespace)
            .get_opt(RESTORE_MARKER_CONFIGMAP)
            .await
            .with_context(|| format!("Failed to read restore marker in {namespace}"))?;
        Ok(marker
            .and_then(|cm| cm.data)
            .and_then(|mut data| data.remove(RESTORE_MARKER_BACKUP_KEY)))
    }

    async fn set_restore_marker(&self, namespace: &str, backup: &str) -> Result<()> {
        let marker = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": RESTORE_MARKER_CONFIGMAP, "namespace": namespace },
            "data": { RESTORE_MARKER_BACKUP_KEY: backup }
        });
        Api::<ConfigMap>::namespaced(self.client.clone(), namespace)
            .patch(
                RESTORE_MARKER_CONFIGMAP,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&marker),
            )
            .await
            .with_context(|| format!("Failed to write restore marker in {namespace}"))?;
        info!(namespace = %namespace, backup = %backup, "Restore marker written");
        Ok(())
    }

    async fn clear_restore_marker(&self, namespace: &str) -> Result<()> {
        let api = Api::<ConfigMap>::namespaced(self.client.clone(), namespace);
        match api
            .delete(RESTORE_MARKER_CONFIGMAP, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete restore marker in {namespace}")),
        }
    }
}
