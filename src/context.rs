// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Shared context for the reconciliation workers.
//!
//! Every worker receives an `Arc<Context>` that contains:
//! - one [`ObjectStore`] per namespaced kind the operator manages
//! - [`ClusterReader`]s for `Node` and `StorageClass`
//! - the OpenSearch client used for health gating
//! - the metrics registry and the operator configuration
//!
//! Production stores wrap a `kube::Client`; tests swap in the in-memory fakes.

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Node, PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::RoleBinding;
use k8s_openapi::api::storage::v1::StorageClass;
use kube::Client;
use std::sync::Arc;

use crate::config::OperatorConfig;
use crate::crd::VerrazzanoMonitoringInstance;
use crate::metrics::MetricsRegistry;
use crate::opensearch::SearchCluster;
use crate::store::{ClusterReader, KubeClusterReader, KubeStore, ObjectStore};

/// Shared context passed to every reconciliation pass.
#[derive(Clone)]
pub struct Context {
    /// Cluster API access, per kind
    pub stores: Stores,

    /// Health checks and configuration of each instance's OpenSearch cluster
    pub search: Arc<dyn SearchCluster>,

    /// Metrics registry for observability
    pub metrics: Arc<MetricsRegistry>,

    pub config: Arc<OperatorConfig>,

    /// Stamped into `status.currentVersion` after a converged pass
    pub build_version: String,
}

/// Per-kind cluster access.
#[derive(Clone)]
pub struct Stores {
    pub instances: Arc<dyn ObjectStore<VerrazzanoMonitoringInstance>>,
    pub config_maps: Arc<dyn ObjectStore<ConfigMap>>,
    pub services: Arc<dyn ObjectStore<Service>>,
    pub deployments: Arc<dyn ObjectStore<Deployment>>,
    pub stateful_sets: Arc<dyn ObjectStore<StatefulSet>>,
    pub ingresses: Arc<dyn ObjectStore<Ingress>>,
    pub role_bindings: Arc<dyn ObjectStore<RoleBinding>>,
    pub pvcs: Arc<dyn ObjectStore<PersistentVolumeClaim>>,

    // Cluster-scoped, read only
    pub nodes: Arc<dyn ClusterReader<Node>>,
    pub storage_classes: Arc<dyn ClusterReader<StorageClass>>,
}

impl Stores {
    /// Stores backed by the Kubernetes API.
    #[must_use]
    pub fn from_client(client: &Client) -> Self {
        Self {
            instances: Arc::new(KubeStore::new(client.clone())),
            config_maps: Arc::new(KubeStore::new(client.clone())),
            services: Arc::new(KubeStore::new(client.clone())),
            deployments: Arc::new(KubeStore::new(client.clone())),
            stateful_sets: Arc::new(KubeStore::new(client.clone())),
            ingresses: Arc::new(KubeStore::new(client.clone())),
            role_bindings: Arc::new(KubeStore::new(client.clone())),
            pvcs: Arc::new(KubeStore::new(client.clone())),
            nodes: Arc::new(KubeClusterReader::new(client.clone())),
            storage_classes: Arc::new(KubeClusterReader::new(client.clone())),
        }
    }
}
