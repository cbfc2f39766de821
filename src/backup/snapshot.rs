// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! OpenSearch snapshot, restore and data management calls used by the hook.
//!
//! Each call is a single attempt; the orchestrator owns retries so that every
//! wait counts against one global deadline.

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::connection::ConnectionData;
use crate::constants::SNAPSHOT_REPOSITORY;
use crate::errors::SearchError;
use crate::opensearch::http::{decode, endpoint, expect_status, send};

/// Snapshot progress as reported by `GET /_snapshot/<repo>/<name>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotState {
    NotFound,
    InProgress,
    Success,
    /// Any other state, carried verbatim
    Failure(String),
}

impl SnapshotState {
    fn parse(state: &str) -> Self {
        match state {
            "IN_PROGRESS" => Self::InProgress,
            "SUCCESS" => Self::Success,
            other => Self::Failure(other.to_string()),
        }
    }
}

/// Calls against the OpenSearch cluster being backed up or restored.
#[async_trait]
pub trait SnapshotApi: Send + Sync {
    /// `status` from `GET /_cluster/health`.
    async fn cluster_health(&self) -> Result<String, SearchError>;

    /// Reload keystore entries on every node.
    async fn reload_secure_settings(&self) -> Result<(), SearchError>;

    /// Register (or overwrite) the S3 snapshot repository.
    async fn register_repository(&self, connection: &ConnectionData) -> Result<(), SearchError>;

    async fn trigger_snapshot(&self, name: &str) -> Result<(), SearchError>;

    async fn snapshot_state(&self, name: &str) -> Result<SnapshotState, SearchError>;

    /// Delete every data stream and index.
    async fn delete_data(&self) -> Result<(), SearchError>;

    async fn trigger_restore(&self, name: &str) -> Result<(), SearchError>;

    /// `true` once every data stream recorded in `snapshot` exists and every
    /// live data stream reports `GREEN`.
    async fn data_streams_restored(&self, snapshot: &str) -> Result<bool, SearchError>;
}

#[derive(Debug, Deserialize)]
struct ClusterHealth {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ReloadResponse {
    #[serde(rename = "_nodes")]
    nodes: NodeCounts,
}

#[derive(Debug, Default, Deserialize)]
struct NodeCounts {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    successful: u64,
    #[serde(default)]
    failed: u64,
}

#[derive(Debug, Deserialize)]
struct SnapshotList {
    #[serde(default)]
    snapshots: Vec<SnapshotInfo>,
}

#[derive(Debug, Deserialize)]
struct SnapshotInfo {
    state: String,
    #[serde(default)]
    data_streams: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DataStreamList {
    #[serde(default)]
    data_streams: Vec<DataStream>,
}

#[derive(Debug, Deserialize)]
struct DataStream {
    name: String,
    status: String,
}

/// Repository registration body.
#[must_use]
pub fn repository_settings(connection: &ConnectionData) -> Value {
    json!({
        "type": "s3",
        "settings": {
            "bucket": connection.bucket,
            "region": connection.region,
            "client": "default",
            "endpoint": connection.endpoint,
            "path_style_access": true
        }
    })
}

/// [`SnapshotApi`] over HTTP.
pub struct HttpSnapshotApi {
    http: HttpClient,
    base: Url,
}

impl HttpSnapshotApi {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self::with_http(http, base))
    }

    #[must_use]
    pub fn with_http(http: HttpClient, base: Url) -> Self {
        Self { http, base }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        accepted: &[StatusCode],
    ) -> Result<(Url, String), SearchError> {
        let url = endpoint(&self.base, path)?;
        let response = send(&self.http, method.clone(), &url, body).await?;
        let body = expect_status(&method, &url, response, accepted)?;
        Ok((url, body))
    }
}

#[async_trait]
impl SnapshotApi for HttpSnapshotApi {
    async fn cluster_health(&self) -> Result<String, SearchError> {
        let (url, body) = self
            .call(Method::GET, "_cluster/health", None, &[StatusCode::OK])
            .await?;
        Ok(decode::<ClusterHealth>(&url, &body)?.status)
    }

    async fn reload_secure_settings(&self) -> Result<(), SearchError> {
        let (url, body) = self
            .call(
                Method::POST,
                "_nodes/reload_secure_settings",
                None,
                &[StatusCode::OK],
            )
            .await?;
        let nodes = decode::<ReloadResponse>(&url, &body)?.nodes;
        if nodes.failed != 0 || nodes.total != nodes.successful {
            return Err(SearchError::ReloadFailed {
                failed: nodes.failed.max(nodes.total.saturating_sub(nodes.successful)),
                total: nodes.total,
            });
        }
        debug!(nodes = nodes.total, "Secure settings reloaded");
        Ok(())
    }

    async fn register_repository(&self, connection: &ConnectionData) -> Result<(), SearchError> {
        self.call(
            Method::PUT,
            &format!("_snapshot/{SNAPSHOT_REPOSITORY}"),
            Some(&repository_settings(connection)),
            &[StatusCode::OK, StatusCode::CREATED],
        )
        .await?;
        info!(repository = SNAPSHOT_REPOSITORY, bucket = %connection.bucket, "Snapshot repository registered");
        Ok(())
    }

    async fn trigger_snapshot(&self, name: &str) -> Result<(), SearchError> {
        self.call(
            Method::POST,
            &format!("_snapshot/{SNAPSHOT_REPOSITORY}/{name}"),
            None,
            &[StatusCode::OK, StatusCode::CREATED, StatusCode::ACCEPTED],
        )
        .await?;
        info!(snapshot = %name, "Snapshot started");
        Ok(())
    }

    async fn snapshot_state(&self, name: &str) -> Result<SnapshotState, SearchError> {
        let url = endpoint(&self.base, &format!("_snapshot/{SNAPSHOT_REPOSITORY}/{name}"))?;
        let (status, body) = send(&self.http, Method::GET, &url, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(SnapshotState::NotFound);
        }
        let body = expect_status(&Method::GET, &url, (status, body), &[StatusCode::OK])?;
        let list = decode::<SnapshotList>(&url, &body)?;
        Ok(list
            .snapshots
            .first()
            .map_or(SnapshotState::NotFound, |s| SnapshotState::parse(&s.state)))
    }

    async fn delete_data(&self) -> Result<(), SearchError> {
        self.call(
            Method::DELETE,
            "_data_stream/*",
            None,
            &[StatusCode::OK, StatusCode::NOT_FOUND],
        )
        .await?;
        self.call(
            Method::DELETE,
            "*",
            None,
            &[StatusCode::OK, StatusCode::NOT_FOUND],
        )
        .await?;
        info!("Deleted all data streams and indices");
        Ok(())
    }

    async fn trigger_restore(&self, name: &str) -> Result<(), SearchError> {
        self.call(
            Method::POST,
            &format!("_snapshot/{SNAPSHOT_REPOSITORY}/{name}/_restore"),
            Some(&json!({ "indices": "*", "include_global_state": false })),
            &[StatusCode::OK, StatusCode::ACCEPTED],
        )
        .await?;
        info!(snapshot = %name, "Restore started");
        Ok(())
    }

    async fn data_streams_restored(&self, snapshot: &str) -> Result<bool, SearchError> {
        let (url, body) = self
            .call(
                Method::GET,
                &format!("_snapshot/{SNAPSHOT_REPOSITORY}/{snapshot}"),
                None,
                &[StatusCode::OK],
            )
            .await?;
        let expected = decode::<SnapshotList>(&url, &body)?
            .snapshots
            .into_iter()
            .next()
            .map(|s| s.data_streams)
            .unwrap_or_default();

        let (url, body) = self
            .call(Method::GET, "_data_stream", None, &[StatusCode::OK])
            .await?;
        let live = decode::<DataStreamList>(&url, &body)?.data_streams;

        let missing: Vec<&str> = expected
            .iter()
            .map(String::as_str)
            .filter(|name| !live.iter().any(|s| s.name == *name))
            .collect();
        let not_green: Vec<&str> = live
            .iter()
            .filter(|s| !s.status.eq_ignore_ascii_case("green"))
            .map(|s| s.name.as_str())
            .collect();
        if missing.is_empty() && not_green.is_empty() {
            return Ok(true);
        }
        debug!(missing = ?missing, not_green = ?not_green, "Data streams not restored yet");
        Ok(false)
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod snapshot_tests;
