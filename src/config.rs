// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Operator configuration file.
//!
//! The operator reads an optional YAML file (`--config`) holding the default
//! images and sizing applied to instances that leave them unset. Every field
//! has a default, so a missing file or a partial file is valid.
//!
//! ```yaml
//! defaultOpenSearchVersion: 2.3.0
//! defaultReplicas: 1
//! httpTimeoutSeconds: 30
//! images:
//!   opensearch: ghcr.io/verrazzano/opensearch:2.3.0
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::constants::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_OPENSEARCH_VERSION};

/// Container images used when an instance does not pin one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Images {
    pub opensearch: String,
    pub dashboards: String,
    pub prometheus: String,
    pub alertmanager: String,
}

impl Default for Images {
    fn default() -> Self {
        Self {
            opensearch: format!("ghcr.io/verrazzano/opensearch:{DEFAULT_OPENSEARCH_VERSION}"),
            dashboards: format!(
                "ghcr.io/verrazzano/opensearch-dashboards:{DEFAULT_OPENSEARCH_VERSION}"
            ),
            prometheus: "ghcr.io/verrazzano/prometheus:v2.38.0".to_string(),
            alertmanager: "ghcr.io/verrazzano/alertmanager:v0.24.0".to_string(),
        }
    }
}

/// Operator-wide defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorConfig {
    pub images: Images,

    /// Version assigned to instances that do not set `opensearch.version`
    pub default_open_search_version: String,

    /// Replicas assigned to enabled components that request zero
    pub default_replicas: i32,

    /// Storage size assigned to Prometheus when it has no storage section
    pub default_prometheus_storage: Option<String>,

    /// Fixed OpenSearch endpoint, bypassing the in-cluster service address
    pub open_search_url: Option<String>,

    /// Per-request timeout for OpenSearch calls
    pub http_timeout_seconds: u64,

    /// `ClusterRole` bound to the instance's pods by the pod-reader binding
    pub pod_reader_cluster_role: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            images: Images::default(),
            default_open_search_version: DEFAULT_OPENSEARCH_VERSION.to_string(),
            default_replicas: 1,
            default_prometheus_storage: None,
            open_search_url: None,
            http_timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECS,
            pod_reader_cluster_role: "vmi-pod-reader".to_string(),
        }
    }
}

impl OperatorConfig {
    /// Load the configuration, falling back to defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No operator config file given, using defaults");
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read operator config {}", path.display()))?;
        Self::from_yaml(&raw)
            .with_context(|| format!("Failed to parse operator config {}", path.display()))
    }

    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML for this schema.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
