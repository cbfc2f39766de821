// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Typed view of `prometheus.yml` and the merge of managed scrape jobs.
//!
//! The operator owns a fixed set of scrape jobs. Users (and other
//! controllers) add their own jobs to the same file, so the managed jobs are
//! merged into the live document by `job_name` instead of overwriting it.
//! Fields the operator does not model are carried through untouched.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Top level of `prometheus.yml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_files: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerting: Option<Value>,

    #[serde(default)]
    pub scrape_configs: Vec<ScrapeConfig>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One scrape job. Everything except `job_name` is opaque.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub job_name: String,

    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>,
}

impl ScrapeConfig {
    #[must_use]
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            settings: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.settings.insert(key.to_string(), value);
        self
    }
}

/// Merge `managed` into `live`.
///
/// Top-level settings and managed jobs come from `managed`. Jobs in `live`
/// whose `job_name` is not managed are kept, sorted by name after the managed
/// jobs so the output is stable across passes.
#[must_use]
pub fn merge_scrape_configs(live: &PrometheusConfig, managed: &PrometheusConfig) -> PrometheusConfig {
    let managed_names: BTreeSet<&str> = managed
        .scrape_configs
        .iter()
        .map(|s| s.job_name.as_str())
        .collect();

    let mut unmanaged: Vec<ScrapeConfig> = live
        .scrape_configs
        .iter()
        .filter(|s| !managed_names.contains(s.job_name.as_str()))
        .cloned()
        .collect();
    unmanaged.sort_by(|a, b| a.job_name.cmp(&b.job_name));
    unmanaged.dedup_by(|a, b| a.job_name == b.job_name);

    let mut merged = managed.clone();
    for (key, value) in &live.extra {
        merged.extra.entry(key.clone()).or_insert_with(|| value.clone());
    }
    merged.scrape_configs.extend(unmanaged);
    merged
}

/// Merge the managed document into the live YAML text.
///
/// A missing or unparsable live document is replaced by the managed one.
///
/// # Errors
///
/// Returns an error if the merged document cannot be serialized.
pub fn merge_config_yaml(live: Option<&str>, managed: &PrometheusConfig) -> Result<String> {
    let merged = match live.map(serde_yaml::from_str::<PrometheusConfig>) {
        Some(Ok(live)) => merge_scrape_configs(&live, managed),
        Some(Err(e)) => {
            warn!(error = %e, "Live Prometheus configuration is not valid, replacing it");
            managed.clone()
        }
        None => managed.clone(),
    };
    serde_yaml::to_string(&merged).context("Failed to serialize Prometheus configuration")
}

#[cfg(test)]
#[path = "scrape_config_tests.rs"]
mod scrape_config_tests;
