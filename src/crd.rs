// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for the monitoring stack.
//!
//! A single namespaced resource, [`VerrazzanoMonitoringInstance`], describes an
//! OpenSearch cluster (master, ingest and data tiers), OpenSearch Dashboards,
//! Prometheus and Alertmanager. The operator converges the cluster towards it.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: verrazzano.io/v1
//! kind: VerrazzanoMonitoringInstance
//! metadata:
//!   name: system
//!   namespace: verrazzano-system
//! spec:
//!   uri: vmi.system.example.com
//!   opensearch:
//!     enabled: true
//!     masterNode:
//!       replicas: 3
//!     dataNode:
//!       replicas: 2
//!       storage:
//!         size: 50Gi
//!   prometheus:
//!     enabled: true
//!     storage:
//!       size: 50Gi
//! ```

use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Persistent storage for one tier.
///
/// `pvc_names` holds one claim name per replica. Names are generated on first
/// reconciliation and rewritten when a claim has to be replaced to grow it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    /// Requested capacity, e.g. `50Gi`. Empty means ephemeral storage.
    #[serde(default)]
    pub size: String,

    /// Claim name per replica, in replica order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pvc_names: Vec<String>,
}

/// Sizing for one OpenSearch node role.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(default)]
    #[schemars(range(min = 0, max = 100))]
    pub replicas: i32,

    /// Value for `OPENSEARCH_JAVA_OPTS`, e.g. `-Xms1g -Xmx1g`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_opts: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Storage>,
}

/// Index State Management policy rolled over and retained by the operator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexPolicy {
    /// Policy ID in OpenSearch.
    pub policy_name: String,

    /// Index pattern the policy is attached to, e.g. `verrazzano-system*`.
    pub index_pattern: String,

    /// Age after which indices are deleted, e.g. `7d`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_index_age: Option<String>,

    /// Rollover thresholds; all unset disables rollover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollover: Option<RolloverPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolloverPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_index_age: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_primary_shard_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_doc_count: Option<i64>,
}

/// OpenSearch cluster topology.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenSearchSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Version every node must report before the rollout counts as done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// `ConfigMap` holding `opensearch.yml` overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,

    #[serde(default)]
    pub master_node: NodeSpec,

    #[serde(default)]
    pub ingest_node: NodeSpec,

    #[serde(default)]
    pub data_node: NodeSpec,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<IndexPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardsSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub replicas: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub replicas: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Storage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// `ConfigMap` holding `prometheus.yml`. Unmanaged scrape jobs in it are preserved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions_config_map: Option<String>,

    /// `ConfigMap` holding alert rules. Created once, then owned by the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_config_map: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_versions_config_map: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub replicas: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// `ConfigMap` holding `alertmanager.yml`. Created once, then owned by the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions_config_map: Option<String>,
}

/// `VerrazzanoMonitoringInstance` declares one monitoring stack.
///
/// # Example
///
/// ```rust
/// use vmo::crd::{NodeSpec, OpenSearchSpec, VerrazzanoMonitoringInstanceSpec};
///
/// let spec = VerrazzanoMonitoringInstanceSpec {
///     opensearch: OpenSearchSpec {
///         enabled: true,
///         master_node: NodeSpec { replicas: 3, ..Default::default() },
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// assert!(!spec.lock);
/// ```
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "verrazzano.io",
    version = "v1",
    kind = "VerrazzanoMonitoringInstance",
    namespaced,
    shortname = "vmi",
    derive = "PartialEq",
    doc = "VerrazzanoMonitoringInstance declares an OpenSearch, OpenSearch Dashboards, Prometheus and Alertmanager stack reconciled by the Verrazzano monitoring operator."
)]
#[kube(status = "VerrazzanoMonitoringInstanceStatus")]
#[kube(printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#)]
#[kube(printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.currentVersion"}"#)]
#[serde(rename_all = "camelCase")]
pub struct VerrazzanoMonitoringInstanceSpec {
    /// Base DNS name; each UI gets an ingress host `<component>.<uri>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// When set, the operator leaves the instance and everything it owns alone.
    #[serde(default)]
    pub lock: bool,

    /// Storage class for claims. The cluster default class is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    #[serde(default)]
    pub opensearch: OpenSearchSpec,

    #[serde(default)]
    pub opensearch_dashboards: DashboardsSpec,

    #[serde(default)]
    pub prometheus: PrometheusSpec,

    #[serde(default)]
    pub alertmanager: AlertmanagerSpec,
}

/// Status written by the operator at the end of a clean pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerrazzanoMonitoringInstanceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// SHA-256 of the reconciled spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Operator build that last converged the instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,

    /// RFC 3339 timestamp of the first converged pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl VerrazzanoMonitoringInstanceSpec {
    /// Sum of OpenSearch node replicas across all roles.
    #[must_use]
    pub fn opensearch_node_count(&self) -> i32 {
        let os = &self.opensearch;
        os.master_node.replicas + os.ingest_node.replicas + os.data_node.replicas
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
