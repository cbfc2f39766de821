// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Narrow, per-kind access to the cluster API.
//!
//! Reconcilers never hold a `kube::Client` directly. They go through
//! [`ObjectStore`] for namespaced kinds they manage and [`ClusterReader`]
//! for the cluster-scoped kinds they only read (`Node`, `StorageClass`).
//! The production implementations wrap `kube::Api` and retry transient
//! failures with [`retry_api_call`]; tests use the in-memory fakes.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;

use crate::constants::FIELD_MANAGER;
use crate::reconcilers::retry::{is_not_found, retry_api_call};

/// Namespaced object kinds the operator can manage.
pub trait ClusterObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> ClusterObject for T where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Cluster-scoped kinds the operator reads.
pub trait ClusterScopedObject:
    Resource<DynamicType = (), Scope = ClusterResourceScope>
    + Clone
    + Debug
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> ClusterScopedObject for T where
    T: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + Clone
        + Debug
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Read/write access to one namespaced kind.
#[async_trait]
pub trait ObjectStore<K: ClusterObject>: Send + Sync {
    /// Fetch an object, `None` when it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    /// List objects whose labels contain every pair in `selector`.
    async fn list(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Result<Vec<K>>;

    async fn create(&self, namespace: &str, object: &K) -> Result<K>;

    /// Replace an object. The caller carries the current `resourceVersion`.
    async fn replace(&self, namespace: &str, object: &K) -> Result<K>;

    /// Delete an object. Deleting an absent object succeeds.
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;

    /// Merge `status` into the object's status subresource.
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<()>;
}

/// Read access to one cluster-scoped kind.
#[async_trait]
pub trait ClusterReader<K: ClusterScopedObject>: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<K>>;

    async fn list(&self) -> Result<Vec<K>>;
}

/// Render a label map as a Kubernetes label selector string.
#[must_use]
pub fn selector_string(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// [`ObjectStore`] backed by the Kubernetes API.
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K: ClusterObject> KubeStore<K> {
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K: ClusterObject> ObjectStore<K> for KubeStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let api = &self.api(namespace);
        retry_api_call(move || api.get_opt(name), &format!("get {}", K::kind(&())))
            .await
            .with_context(|| format!("Failed to get {} {namespace}/{name}", K::kind(&())))
    }

    async fn list(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Result<Vec<K>> {
        let api = &self.api(namespace);
        let params = &ListParams::default().labels(&selector_string(selector));
        let list = retry_api_call(move || api.list(params), &format!("list {}", K::kind(&())))
            .await
            .with_context(|| format!("Failed to list {} in {namespace}", K::kind(&())))?;
        Ok(list.items)
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K> {
        let api = &self.api(namespace);
        let params = &PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        retry_api_call(
            move || api.create(params, object),
            &format!("create {}", K::kind(&())),
        )
        .await
        .with_context(|| format!("Failed to create {} in {namespace}", K::kind(&())))
    }

    async fn replace(&self, namespace: &str, object: &K) -> Result<K> {
        let name = object
            .meta()
            .name
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Resource must have a name"))?;
        let api = &self.api(namespace);
        let params = &PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        retry_api_call(
            move || api.replace(name, params, object),
            &format!("replace {}", K::kind(&())),
        )
        .await
        .with_context(|| format!("Failed to replace {} {namespace}/{name}", K::kind(&())))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let api = &self.api(namespace);
        retry_api_call(
            move || async move {
                match api.delete(name, &DeleteParams::background()).await {
                    Ok(_) => Ok(()),
                    Err(e) if is_not_found(&e) => Ok(()),
                    Err(e) => Err(e),
                }
            },
            &format!("delete {}", K::kind(&())),
        )
        .await
        .with_context(|| format!("Failed to delete {} {namespace}/{name}", K::kind(&())))
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<()> {
        let api = &self.api(namespace);
        let patch = &Patch::Merge(serde_json::json!({ "status": status }));
        let params = &PatchParams::default();
        retry_api_call(
            move || api.patch_status(name, params, patch),
            &format!("patch {} status", K::kind(&())),
        )
        .await
        .with_context(|| {
            format!(
                "Failed to patch status of {} {namespace}/{name}",
                K::kind(&())
            )
        })?;
        Ok(())
    }
}

/// [`ClusterReader`] backed by the Kubernetes API.
pub struct KubeClusterReader<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeClusterReader<K> {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K: ClusterScopedObject> ClusterReader<K> for KubeClusterReader<K> {
    async fn get(&self, name: &str) -> Result<Option<K>> {
        let api = &Api::<K>::all(self.client.clone());
        retry_api_call(move || api.get_opt(name), &format!("get {}", K::kind(&())))
            .await
            .with_context(|| format!("Failed to get {} {name}", K::kind(&())))
    }

    async fn list(&self) -> Result<Vec<K>> {
        let api = &Api::<K>::all(self.client.clone());
        let params = &ListParams::default();
        let list = retry_api_call(move || api.list(params), &format!("list {}", K::kind(&())))
            .await
            .with_context(|| format!("Failed to list {}", K::kind(&())))?;
        Ok(list.items)
    }
}

#[cfg(test)]
#[path = "store_fake.rs"]
pub mod fake;
