// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Idempotent spec defaulting, run at the start of every pass.
//!
//! Fills in whatever the user left unset: OpenSearch version, replica
//! counts of enabled components, config map names, Prometheus storage and
//! one claim name per stateful replica. Running it on an already defaulted
//! spec changes nothing.

use kube::ResourceExt;
use rand::Rng;

use crate::config::OperatorConfig;
use crate::constants::{
    CLAIM_SUFFIX_LEN, COMPONENT_ALERTMANAGER, COMPONENT_DASHBOARDS, COMPONENT_OPENSEARCH_DATA,
    COMPONENT_PROMETHEUS,
};
use crate::crd::{Storage, VerrazzanoMonitoringInstance};
use crate::vmi_resources::prefix_for;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// `base` plus a short random suffix, e.g. `vmi-system-os-data-0-x7k2p`.
#[must_use]
pub fn suffixed_claim_name(base: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..CLAIM_SUFFIX_LEN)
        .map(|_| char::from(SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())]))
        .collect();
    format!("{base}-{suffix}")
}

fn default_name(field: &mut Option<String>, name: String) {
    if field.as_deref().is_none_or(str::is_empty) {
        *field = Some(name);
    }
}

fn default_replicas(replicas: &mut i32, default: i32) {
    if *replicas == 0 {
        *replicas = default;
    }
}

/// One claim name per replica. Names beyond `replicas` are dropped.
fn default_claim_names(storage: &mut Storage, replicas: i32, base: &str) {
    if storage.size.is_empty() {
        return;
    }
    let replicas = usize::try_from(replicas).unwrap_or(0);
    storage.pvc_names.truncate(replicas);
    while storage.pvc_names.len() < replicas {
        let candidate = format!("{base}-{}", storage.pvc_names.len());
        let name = if storage.pvc_names.contains(&candidate) {
            suffixed_claim_name(&candidate)
        } else {
            candidate
        };
        storage.pvc_names.push(name);
    }
}

/// Fill unset spec fields in place.
pub fn initialize_defaults(vmi: &mut VerrazzanoMonitoringInstance, config: &OperatorConfig) {
    let prefix = prefix_for(&vmi.name_any());
    let spec = &mut vmi.spec;

    let os = &mut spec.opensearch;
    if os.enabled {
        default_name(&mut os.version, config.default_open_search_version.clone());
        default_name(&mut os.config_map, format!("{prefix}-os-config"));
        if os.master_node.replicas == 0 && os.ingest_node.replicas == 0 && os.data_node.replicas == 0
        {
            os.master_node.replicas = config.default_replicas;
        }
        if let Some(storage) = os.data_node.storage.as_mut() {
            default_claim_names(
                storage,
                os.data_node.replicas,
                &format!("{prefix}-{COMPONENT_OPENSEARCH_DATA}"),
            );
        }
    }

    let osd = &mut spec.opensearch_dashboards;
    if osd.enabled {
        default_replicas(&mut osd.replicas, config.default_replicas);
        default_name(&mut osd.config_map, format!("{prefix}-{COMPONENT_DASHBOARDS}-config"));
    }

    let prom = &mut spec.prometheus;
    if prom.enabled {
        default_replicas(&mut prom.replicas, config.default_replicas);
        default_name(&mut prom.config_map, format!("{prefix}-{COMPONENT_PROMETHEUS}-config"));
        default_name(
            &mut prom.versions_config_map,
            format!("{prefix}-{COMPONENT_PROMETHEUS}-versions"),
        );
        default_name(
            &mut prom.rules_config_map,
            format!("{prefix}-{COMPONENT_PROMETHEUS}-rules"),
        );
        default_name(
            &mut prom.rules_versions_config_map,
            format!("{prefix}-{COMPONENT_PROMETHEUS}-rules-versions"),
        );
        if prom.storage.is_none() {
            if let Some(size) = &config.default_prometheus_storage {
                prom.storage = Some(Storage {
                    size: size.clone(),
                    pvc_names: Vec::new(),
                });
            }
        }
        if let Some(storage) = prom.storage.as_mut() {
            default_claim_names(storage, prom.replicas, &format!("{prefix}-{COMPONENT_PROMETHEUS}"));
        }
    }

    let am = &mut spec.alertmanager;
    if am.enabled {
        default_replicas(&mut am.replicas, config.default_replicas);
        default_name(&mut am.config_map, format!("{prefix}-{COMPONENT_ALERTMANAGER}-config"));
        default_name(
            &mut am.versions_config_map,
            format!("{prefix}-{COMPONENT_ALERTMANAGER}-versions"),
        );
    }
}

#[cfg(test)]
#[path = "defaults_tests.rs"]
mod defaults_tests;
