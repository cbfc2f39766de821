// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! In-memory [`ObjectStore`], [`ClusterReader`] and [`SearchCluster`] fakes.
//!
//! The fake store mimics the API server closely enough for the reconcilers:
//! creates collide, replaces need an existing object and bump `generation`,
//! status is preserved across replaces, and every call is logged so tests
//! can assert on exactly which mutations a pass issued.

use super::{ClusterObject, ClusterReader, ClusterScopedObject, ObjectStore};
use crate::config::OperatorConfig;
use crate::context::{Context, Stores};
use crate::crd::{VerrazzanoMonitoringInstance, VerrazzanoMonitoringInstanceSpec};
use crate::errors::SearchError;
use crate::metrics::MetricsRegistry;
use crate::opensearch::SearchCluster;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus, StatefulSet, StatefulSetStatus};
use k8s_openapi::api::core::v1::{ConfigMap, Node, PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::RoleBinding;
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Store operations, as recorded in the call log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Create,
    Replace,
    Delete,
    PatchStatus,
}

impl Verb {
    #[must_use]
    pub fn is_mutation(self) -> bool {
        !matches!(self, Verb::Get | Verb::List)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub verb: Verb,
    pub name: String,
}

/// In-memory [`ObjectStore`].
pub struct FakeStore<K> {
    objects: Mutex<BTreeMap<(String, String), K>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<Verb, String>>,
    next_version: AtomicU64,
}

impl<K> Default for FakeStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            next_version: AtomicU64::new(1),
        }
    }
}

impl<K: ClusterObject> FakeStore<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without logging a call.
    pub fn insert(&self, mut object: K) {
        let key = key_of(&object);
        let meta = object.meta_mut();
        if meta.resource_version.is_none() {
            meta.resource_version = Some(self.bump().to_string());
        }
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{}", key.1));
        }
        meta.generation.get_or_insert(1);
        self.objects.lock().unwrap().insert(key, object);
    }

    #[must_use]
    pub fn objects(&self) -> Vec<K> {
        self.objects.lock().unwrap().values().cloned().collect()
    }

    #[must_use]
    pub fn get_object(&self, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|((_, n), _)| n == name)
            .map(|(_, o)| o.clone())
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .map(|(_, n)| n.clone())
            .collect()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Logged calls that changed state.
    #[must_use]
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.verb.is_mutation())
            .collect()
    }

    #[must_use]
    pub fn count(&self, verb: Verb) -> usize {
        self.calls().iter().filter(|c| c.verb == verb).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make every later call with `verb` fail with `message`.
    pub fn fail(&self, verb: Verb, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(verb, message.to_string());
    }

    /// Mutate a stored object in place without logging a call.
    pub fn update(&self, name: &str, f: impl FnOnce(&mut K)) {
        let mut objects = self.objects.lock().unwrap();
        if let Some((_, object)) = objects.iter_mut().find(|((_, n), _)| n == name) {
            f(object);
        }
    }

    fn bump(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst)
    }

    fn record(&self, verb: Verb, name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Call {
            verb,
            name: name.to_string(),
        });
        match self.failures.lock().unwrap().get(&verb) {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

fn key_of<K: ClusterObject>(object: &K) -> (String, String) {
    (object.namespace().unwrap_or_default(), object.name_any())
}

fn labels_match<K: ClusterObject>(object: &K, selector: &BTreeMap<String, String>) -> bool {
    let labels = object.labels();
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

#[async_trait]
impl<K: ClusterObject> ObjectStore<K> for FakeStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        self.record(Verb::Get, name)?;
        let key = (namespace.to_string(), name.to_string());
        Ok(self.objects.lock().unwrap().get(&key).cloned())
    }

    async fn list(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Result<Vec<K>> {
        self.record(Verb::List, "")?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), o)| ns == namespace && labels_match(*o, selector))
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K> {
        let name = object.name_any();
        self.record(Verb::Create, &name)?;
        let key = (namespace.to_string(), name.clone());
        if self.objects.lock().unwrap().contains_key(&key) {
            bail!("{} {namespace}/{name} already exists", K::kind(&()));
        }
        let mut created = object.clone();
        let version = self.bump();
        let meta = created.meta_mut();
        meta.namespace = Some(namespace.to_string());
        meta.resource_version = Some(version.to_string());
        meta.uid = Some(format!("uid-{name}"));
        meta.generation = Some(1);
        self.objects.lock().unwrap().insert(key, created.clone());
        Ok(created)
    }

    async fn replace(&self, namespace: &str, object: &K) -> Result<K> {
        let name = object.name_any();
        self.record(Verb::Replace, &name)?;
        let key = (namespace.to_string(), name.clone());
        let mut objects = self.objects.lock().unwrap();
        let Some(existing) = objects.get(&key) else {
            bail!("{} {namespace}/{name} not found", K::kind(&()));
        };
        if let Some(rv) = object.resource_version() {
            if existing.resource_version().as_deref() != Some(rv.as_str()) {
                bail!("{} {namespace}/{name} conflict: stale resourceVersion", K::kind(&()));
            }
        }

        let mut replaced_json = serde_json::to_value(object)?;
        let existing_json = serde_json::to_value(existing)?;
        match existing_json.get("status") {
            Some(status) => replaced_json["status"] = status.clone(),
            None => {
                if let Some(map) = replaced_json.as_object_mut() {
                    map.remove("status");
                }
            }
        }
        let mut replaced: K = serde_json::from_value(replaced_json)?;
        let generation = existing.meta().generation.unwrap_or(1) + 1;
        let uid = existing.uid();
        let meta = replaced.meta_mut();
        meta.namespace = Some(namespace.to_string());
        meta.resource_version = Some(self.bump().to_string());
        meta.generation = Some(generation);
        meta.uid = uid;
        objects.insert(key, replaced.clone());
        Ok(replaced)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.record(Verb::Delete, name)?;
        self.objects
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<()> {
        self.record(Verb::PatchStatus, name)?;
        let key = (namespace.to_string(), name.to_string());
        let mut objects = self.objects.lock().unwrap();
        let Some(existing) = objects.get(&key) else {
            bail!("{} {namespace}/{name} not found", K::kind(&()));
        };
        let mut json = serde_json::to_value(existing)?;
        let merged = match (json.get("status").cloned(), status) {
            (Some(serde_json::Value::Object(mut current)), serde_json::Value::Object(patch)) => {
                for (k, v) in patch {
                    current.insert(k.clone(), v.clone());
                }
                serde_json::Value::Object(current)
            }
            _ => status.clone(),
        };
        json["status"] = merged;
        let patched: K = serde_json::from_value(json)?;
        objects.insert(key, patched);
        Ok(())
    }
}

/// In-memory [`ClusterReader`].
pub struct FakeReader<K> {
    objects: Mutex<Vec<K>>,
}

impl<K> Default for FakeReader<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
        }
    }
}

impl<K: ClusterScopedObject> FakeReader<K> {
    pub fn insert(&self, object: K) {
        self.objects.lock().unwrap().push(object);
    }
}

#[async_trait]
impl<K: ClusterScopedObject> ClusterReader<K> for FakeReader<K> {
    async fn get(&self, name: &str) -> Result<Option<K>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.name_any() == name)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<K>> {
        Ok(self.objects.lock().unwrap().clone())
    }
}

/// Scriptable [`SearchCluster`].
pub struct FakeSearch {
    pub healthy: AtomicBool,
    pub resizable: AtomicBool,
    pub updated: AtomicBool,
    pub health_error: AtomicBool,
    calls: Mutex<Vec<&'static str>>,
}

impl Default for FakeSearch {
    fn default() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            resizable: AtomicBool::new(true),
            updated: AtomicBool::new(true),
            health_error: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeSearch {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_resizable(&self, resizable: bool) {
        self.resizable.store(resizable, Ordering::SeqCst);
    }

    pub fn set_updated(&self, updated: bool) {
        self.updated.store(updated, Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SearchCluster for FakeSearch {
    async fn is_healthy(&self, _vmi: &VerrazzanoMonitoringInstance) -> Result<bool, SearchError> {
        self.record("is_healthy");
        if self.health_error.load(Ordering::SeqCst) {
            return Err(SearchError::Decode {
                url: "http://fake/_cluster/health".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.healthy.load(Ordering::SeqCst))
    }

    async fn is_updated(&self, _vmi: &VerrazzanoMonitoringInstance) -> Result<(), SearchError> {
        self.record("is_updated");
        if self.updated.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SearchError::VersionMismatch {
                node: "node-0".to_string(),
                actual: "2.2.0".to_string(),
                expected: "2.3.0".to_string(),
            })
        }
    }

    async fn is_resizable(&self, _vmi: &VerrazzanoMonitoringInstance) -> Result<(), SearchError> {
        self.record("is_resizable");
        if self.resizable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SearchError::NotGreen {
                status: "yellow".to_string(),
            })
        }
    }

    async fn configure_ism(&self, _vmi: &VerrazzanoMonitoringInstance) -> Result<(), SearchError> {
        self.record("configure_ism");
        Ok(())
    }

    async fn set_auto_expand_indices(
        &self,
        _vmi: &VerrazzanoMonitoringInstance,
    ) -> Result<(), SearchError> {
        self.record("set_auto_expand_indices");
        Ok(())
    }
}

/// A full set of fakes wired together.
#[derive(Default)]
pub struct FakeCluster {
    pub instances: Arc<FakeStore<VerrazzanoMonitoringInstance>>,
    pub config_maps: Arc<FakeStore<ConfigMap>>,
    pub services: Arc<FakeStore<Service>>,
    pub deployments: Arc<FakeStore<Deployment>>,
    pub stateful_sets: Arc<FakeStore<StatefulSet>>,
    pub ingresses: Arc<FakeStore<Ingress>>,
    pub role_bindings: Arc<FakeStore<RoleBinding>>,
    pub pvcs: Arc<FakeStore<PersistentVolumeClaim>>,
    pub nodes: Arc<FakeReader<Node>>,
    pub storage_classes: Arc<FakeReader<StorageClass>>,
}

impl FakeCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stores(&self) -> Stores {
        Stores {
            instances: self.instances.clone(),
            config_maps: self.config_maps.clone(),
            services: self.services.clone(),
            deployments: self.deployments.clone(),
            stateful_sets: self.stateful_sets.clone(),
            ingresses: self.ingresses.clone(),
            role_bindings: self.role_bindings.clone(),
            pvcs: self.pvcs.clone(),
            nodes: self.nodes.clone(),
            storage_classes: self.storage_classes.clone(),
        }
    }

    #[must_use]
    pub fn context(&self, search: Arc<FakeSearch>) -> Arc<Context> {
        Arc::new(Context {
            stores: self.stores(),
            search,
            metrics: Arc::new(MetricsRegistry::new().unwrap()),
            config: Arc::new(OperatorConfig::default()),
            build_version: "1.0.0-test".to_string(),
        })
    }

    /// Mutations logged across every store.
    #[must_use]
    pub fn total_mutations(&self) -> usize {
        self.instances.mutations().len()
            + self.config_maps.mutations().len()
            + self.services.mutations().len()
            + self.deployments.mutations().len()
            + self.stateful_sets.mutations().len()
            + self.ingresses.mutations().len()
            + self.role_bindings.mutations().len()
            + self.pvcs.mutations().len()
    }

    pub fn clear_calls(&self) {
        self.instances.clear_calls();
        self.config_maps.clear_calls();
        self.services.clear_calls();
        self.deployments.clear_calls();
        self.stateful_sets.clear_calls();
        self.ingresses.clear_calls();
        self.role_bindings.clear_calls();
        self.pvcs.clear_calls();
    }

    /// Report every workload as rolled out and fully available.
    pub fn mark_workloads_ready(&self) {
        for name in self.deployments.names() {
            self.deployments.update(&name, |d| {
                let replicas = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
                d.status = Some(DeploymentStatus {
                    replicas: Some(replicas),
                    available_replicas: Some(replicas),
                    ready_replicas: Some(replicas),
                    updated_replicas: Some(replicas),
                    observed_generation: d.metadata.generation,
                    ..Default::default()
                });
            });
        }
        for name in self.stateful_sets.names() {
            self.stateful_sets.update(&name, |s| {
                let replicas = s.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
                s.status = Some(StatefulSetStatus {
                    replicas,
                    available_replicas: Some(replicas),
                    ready_replicas: Some(replicas),
                    observed_generation: s.metadata.generation,
                    ..Default::default()
                });
            });
        }
    }
}

/// A persisted instance with nothing enabled.
#[must_use]
pub fn instance(name: &str) -> VerrazzanoMonitoringInstance {
    let mut vmi = VerrazzanoMonitoringInstance::new(name, VerrazzanoMonitoringInstanceSpec::default());
    vmi.metadata = ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some("verrazzano-system".to_string()),
        uid: Some(format!("uid-{name}")),
        resource_version: Some("1".to_string()),
        generation: Some(1),
        ..Default::default()
    };
    vmi
}

/// A node in `zone`.
#[must_use]
pub fn node(name: &str, zone: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                crate::constants::ZONE_LABEL.to_string(),
                zone.to_string(),
            )])),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A storage class, optionally the cluster default.
#[must_use]
pub fn storage_class(
    name: &str,
    provisioner: &str,
    allow_expansion: bool,
    default: bool,
) -> StorageClass {
    StorageClass {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            annotations: default.then(|| {
                BTreeMap::from([(
                    crate::constants::DEFAULT_STORAGE_CLASS_ANNOTATION.to_string(),
                    "true".to_string(),
                )])
            }),
            ..Default::default()
        },
        provisioner: provisioner.to_string(),
        allow_volume_expansion: Some(allow_expansion),
        ..Default::default()
    }
}
