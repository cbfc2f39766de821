// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! OpenSearch health checks and cluster configuration.
//!
//! The reconciliation engine asks the search cluster three questions before
//! touching stateful tiers:
//!
//! - [`SearchCluster::is_healthy`]: `GET /_cluster/health` reports `green`
//! - [`SearchCluster::is_updated`]: every node from `GET /_nodes/settings`
//!   runs the target version and the node count matches the instance
//! - [`SearchCluster::is_resizable`]: the data tier can lose a node
//!
//! It also applies ISM policies and index replica auto-expansion.

pub mod http;
pub mod ism;

use async_trait::async_trait;
use kube::ResourceExt;
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use url::Url;

use crate::config::OperatorConfig;
use crate::constants::{
    COMPONENT_OPENSEARCH_MASTER, MIN_DATA_NODES_FOR_RESIZE, OPENSEARCH_HTTP_PORT,
    SINGLE_NODE_AUTO_EXPAND,
};
use crate::crd::VerrazzanoMonitoringInstance;
use crate::errors::SearchError;
use crate::vmi_resources::resource_prefix;

/// Health and configuration calls against an instance's OpenSearch cluster.
#[async_trait]
pub trait SearchCluster: Send + Sync {
    /// `true` only when cluster health is `green`. Always `true` when
    /// OpenSearch is disabled for the instance.
    async fn is_healthy(&self, vmi: &VerrazzanoMonitoringInstance) -> Result<bool, SearchError>;

    /// Succeeds when every node runs the target version and the node count
    /// equals the configured replica sum.
    async fn is_updated(&self, vmi: &VerrazzanoMonitoringInstance) -> Result<(), SearchError>;

    /// Succeeds when data nodes can be resized or removed without data loss.
    async fn is_resizable(&self, vmi: &VerrazzanoMonitoringInstance) -> Result<(), SearchError>;

    /// Create or update the instance's ISM policies and drop stale managed ones.
    async fn configure_ism(&self, vmi: &VerrazzanoMonitoringInstance) -> Result<(), SearchError>;

    /// Let index replicas shrink to fit a single-node cluster.
    async fn set_auto_expand_indices(
        &self,
        vmi: &VerrazzanoMonitoringInstance,
    ) -> Result<(), SearchError>;
}

#[derive(Debug, Deserialize)]
struct ClusterHealth {
    status: String,
}

#[derive(Debug, Deserialize)]
struct NodesSettings {
    #[serde(default)]
    nodes: BTreeMap<String, NodeInfo>,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
}

/// [`SearchCluster`] talking to the in-cluster OpenSearch HTTP service.
pub struct OpenSearchClient {
    http: HttpClient,
    url_override: Option<String>,
    default_version: String,
}

impl OpenSearchClient {
    /// Build a client with the configured timeout and optional fixed endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &OperatorConfig) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self::with_http(
            http,
            config.open_search_url.clone(),
            config.default_open_search_version.clone(),
        ))
    }

    #[must_use]
    pub fn with_http(
        http: HttpClient,
        url_override: Option<String>,
        default_version: String,
    ) -> Self {
        Self {
            http,
            url_override,
            default_version,
        }
    }

    /// Base URL for an instance's cluster.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidUrl`] if the address does not parse.
    pub fn base_url(&self, vmi: &VerrazzanoMonitoringInstance) -> Result<Url, SearchError> {
        let raw = match &self.url_override {
            Some(url) => url.clone(),
            None => format!(
                "http://{}-{COMPONENT_OPENSEARCH_MASTER}-http.{}.svc.cluster.local:{OPENSEARCH_HTTP_PORT}",
                resource_prefix(vmi),
                vmi.namespace().unwrap_or_default()
            ),
        };
        Url::parse(&raw).map_err(|e| SearchError::InvalidUrl {
            url: raw,
            reason: e.to_string(),
        })
    }

    fn target_version<'a>(&'a self, vmi: &'a VerrazzanoMonitoringInstance) -> &'a str {
        vmi.spec
            .opensearch
            .version
            .as_deref()
            .unwrap_or(&self.default_version)
    }

    async fn health_status(&self, vmi: &VerrazzanoMonitoringInstance) -> Result<String, SearchError> {
        let url = http::endpoint(&self.base_url(vmi)?, "_cluster/health")?;
        let health: ClusterHealth = http::get_json(&self.http, &url).await?;
        Ok(health.status)
    }

    async fn apply_policy(
        &self,
        base: &Url,
        policy: &crate::crd::IndexPolicy,
    ) -> Result<(), SearchError> {
        let url = http::endpoint(base, &format!("_plugins/_ism/policies/{}", policy.policy_name))?;
        let desired = ism::policy_document(policy);
        let body = json!({ "policy": desired });

        let response = http::send(&self.http, Method::GET, &url, None).await?;
        match response.0 {
            StatusCode::NOT_FOUND => {
                let created = http::send_with_retry(&self.http, Method::PUT, &url, Some(&body)).await?;
                http::expect_status(&Method::PUT, &url, created, &[StatusCode::OK, StatusCode::CREATED])?;
                info!(policy = %policy.policy_name, "Created ISM policy");
            }
            StatusCode::OK => {
                let live: ism::PolicyResponse = http::decode(&url, &response.1)?;
                if ism::policy_needs_update(&live.policy, &desired) {
                    let mut update_url = url.clone();
                    update_url
                        .query_pairs_mut()
                        .append_pair("if_seq_no", &live.seq_no.to_string())
                        .append_pair("if_primary_term", &live.primary_term.to_string());
                    let updated =
                        http::send_with_retry(&self.http, Method::PUT, &update_url, Some(&body)).await?;
                    http::expect_status(
                        &Method::PUT,
                        &update_url,
                        updated,
                        &[StatusCode::OK, StatusCode::CREATED],
                    )?;
                    info!(policy = %policy.policy_name, "Updated ISM policy");
                } else {
                    debug!(policy = %policy.policy_name, "ISM policy up to date");
                }
            }
            status => return Err(http::status_error(&Method::GET, &url, status, response.1)),
        }

        let add_url = http::endpoint(base, &format!("_plugins/_ism/add/{}", policy.index_pattern))?;
        let add_body = json!({ "policy_id": policy.policy_name });
        let added = http::send_with_retry(&self.http, Method::POST, &add_url, Some(&add_body)).await?;
        http::expect_status(&Method::POST, &add_url, added, &[StatusCode::OK])?;
        Ok(())
    }

    async fn remove_stale_policies(
        &self,
        base: &Url,
        wanted: &BTreeSet<&str>,
    ) -> Result<(), SearchError> {
        let list_url = http::endpoint(base, "_plugins/_ism/policies")?;
        let response = http::send(&self.http, Method::GET, &list_url, None).await?;
        if response.0 == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = http::expect_status(&Method::GET, &list_url, response, &[StatusCode::OK])?;
        let list: ism::PolicyList = http::decode(&list_url, &body)?;

        for entry in list.policies {
            if entry.is_managed() && !wanted.contains(entry.id.as_str()) {
                let url = http::endpoint(base, &format!("_plugins/_ism/policies/{}", entry.id))?;
                let deleted = http::send_with_retry(&self.http, Method::DELETE, &url, None).await?;
                http::expect_status(
                    &Method::DELETE,
                    &url,
                    deleted,
                    &[StatusCode::OK, StatusCode::NOT_FOUND],
                )?;
                info!(policy = %entry.id, "Deleted stale ISM policy");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SearchCluster for OpenSearchClient {
    async fn is_healthy(&self, vmi: &VerrazzanoMonitoringInstance) -> Result<bool, SearchError> {
        if !vmi.spec.opensearch.enabled {
            return Ok(true);
        }
        let status = self.health_status(vmi).await?;
        debug!(instance = %vmi.name_any(), status = %status, "OpenSearch cluster health");
        Ok(status == "green")
    }

    async fn is_updated(&self, vmi: &VerrazzanoMonitoringInstance) -> Result<(), SearchError> {
        if !vmi.spec.opensearch.enabled {
            return Ok(());
        }
        let url = http::endpoint(&self.base_url(vmi)?, "_nodes/settings")?;
        let settings: NodesSettings = http::get_json(&self.http, &url).await?;
        let expected = self.target_version(vmi);

        for (id, node) in &settings.nodes {
            if node.version != expected {
                let name = if node.name.is_empty() { id } else { &node.name };
                return Err(SearchError::VersionMismatch {
                    node: name.clone(),
                    actual: node.version.clone(),
                    expected: expected.to_string(),
                });
            }
        }

        let expected_nodes = usize::try_from(vmi.spec.opensearch_node_count()).unwrap_or(0);
        if settings.nodes.len() != expected_nodes {
            return Err(SearchError::NodeCountMismatch {
                actual: settings.nodes.len(),
                expected: expected_nodes,
            });
        }
        Ok(())
    }

    async fn is_resizable(&self, vmi: &VerrazzanoMonitoringInstance) -> Result<(), SearchError> {
        let replicas = vmi.spec.opensearch.data_node.replicas;
        if replicas < MIN_DATA_NODES_FOR_RESIZE {
            return Err(SearchError::NotResizable {
                replicas,
                minimum: MIN_DATA_NODES_FOR_RESIZE,
            });
        }
        let status = self.health_status(vmi).await?;
        if status != "green" {
            return Err(SearchError::NotGreen { status });
        }
        Ok(())
    }

    async fn configure_ism(&self, vmi: &VerrazzanoMonitoringInstance) -> Result<(), SearchError> {
        let base = self.base_url(vmi)?;
        for policy in &vmi.spec.opensearch.policies {
            self.apply_policy(&base, policy).await?;
        }
        let wanted: BTreeSet<&str> = vmi
            .spec
            .opensearch
            .policies
            .iter()
            .map(|p| p.policy_name.as_str())
            .collect();
        self.remove_stale_policies(&base, &wanted).await
    }

    async fn set_auto_expand_indices(
        &self,
        vmi: &VerrazzanoMonitoringInstance,
    ) -> Result<(), SearchError> {
        if vmi.spec.opensearch_node_count() > 1 {
            return Ok(());
        }
        let url = http::endpoint(&self.base_url(vmi)?, "*/_settings")?;
        let body = json!({ "index": { "auto_expand_replicas": SINGLE_NODE_AUTO_EXPAND } });
        let response = http::send_with_retry(&self.http, Method::PUT, &url, Some(&body)).await?;
        http::expect_status(&Method::PUT, &url, response, &[StatusCode::OK])?;
        debug!(instance = %vmi.name_any(), "Set index auto-expand for single-node cluster");
        Ok(())
    }
}
