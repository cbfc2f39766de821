// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! `ConfigMap` reconciliation.
//!
//! Maps annotated create-only (alert rules, `alertmanager.yml`) are created
//! once and then belong to the user. The Prometheus configuration map is
//! merged with the live document so scrape jobs added by others survive.

use anyhow::Result;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use tracing::debug;

use super::resources::{reconcile_all, UpdateMode};
use crate::context::Context;
use crate::crd::VerrazzanoMonitoringInstance;
use crate::labels::CREATE_ONLY_ANNOTATION;
use crate::scrape_config::merge_config_yaml;
use crate::vmi_resources::managed_prometheus_config;

const PROMETHEUS_CONFIG_KEY: &str = "prometheus.yml";

fn update_mode(config_map: &ConfigMap) -> UpdateMode {
    if config_map
        .annotations()
        .get(CREATE_ONLY_ANNOTATION)
        .is_some_and(|v| v == "true")
    {
        UpdateMode::CreateOnly
    } else {
        UpdateMode::Replace
    }
}

/// Rewrite the desired Prometheus configuration as a merge into the live one.
async fn merge_prometheus_config(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
    namespace: &str,
    desired: &mut ConfigMap,
) -> Result<()> {
    let Some(name) = desired.metadata.name.clone().filter(|n| !n.is_empty()) else {
        return Ok(());
    };
    let live = ctx.stores.config_maps.get(namespace, &name).await?;
    let live_yaml = live
        .as_ref()
        .and_then(|cm| cm.data.as_ref())
        .and_then(|d| d.get(PROMETHEUS_CONFIG_KEY))
        .map(String::as_str);
    let merged = merge_config_yaml(live_yaml, &managed_prometheus_config(vmi))?;
    debug!(namespace = %namespace, name = %name, "Merged Prometheus scrape configuration");
    desired
        .data
        .get_or_insert_with(Default::default)
        .insert(PROMETHEUS_CONFIG_KEY.to_string(), merged);
    Ok(())
}

/// Converge the instance's config maps. Returns whether anything changed.
///
/// # Errors
///
/// Returns an error if a cluster API call fails.
pub async fn reconcile(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
    desired: &[ConfigMap],
) -> Result<bool> {
    let namespace = vmi.namespace().unwrap_or_default();
    let prometheus_map = vmi.spec.prometheus.config_map.as_deref();

    let mut maps = desired.to_vec();
    for map in &mut maps {
        let is_prometheus_config = prometheus_map.is_some()
            && map.metadata.name.as_deref() == prometheus_map
            && map
                .data
                .as_ref()
                .is_some_and(|d| d.contains_key(PROMETHEUS_CONFIG_KEY));
        if is_prometheus_config {
            merge_prometheus_config(ctx, vmi, &namespace, map).await?;
        }
    }

    reconcile_all(
        ctx.stores.config_maps.as_ref(),
        &ctx.metrics,
        &namespace,
        &vmi.name_any(),
        &maps,
        update_mode,
    )
    .await
}

#[cfg(test)]
#[path = "configmaps_tests.rs"]
mod configmaps_tests;
