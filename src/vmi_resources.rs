// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Desired Kubernetes objects for a `VerrazzanoMonitoringInstance`.
//!
//! Every function here is pure: the same instance and configuration always
//! produce the same objects, so the reconcilers can diff them against the
//! cluster on every pass.
//!
//! # Naming
//!
//! All objects are named `vmi-<instance>-<component>`:
//!
//! | Object | Name |
//! |---|---|
//! | Master `StatefulSet` | `vmi-<i>-os-master` |
//! | Ingest `Deployment` | `vmi-<i>-os-ingest` |
//! | Data `Deployment`s | `vmi-<i>-os-data-<n>` |
//! | Dashboards `Deployment` | `vmi-<i>-osd` |
//! | Prometheus `Deployment`s | `vmi-<i>-prometheus-<n>` |
//! | Alertmanager `Deployment` | `vmi-<i>-alertmanager` |

use anyhow::{anyhow, Result};
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, StatefulSet, StatefulSetSpec,
};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource,
    PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec, Volume,
    VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use serde_json::json;
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;

use crate::config::OperatorConfig;
use crate::constants::{
    ALERTMANAGER_CLUSTER_PORT, ALERTMANAGER_PORT, COMPONENT_ALERTMANAGER, COMPONENT_DASHBOARDS,
    COMPONENT_OPENSEARCH_DATA, COMPONENT_OPENSEARCH_INGEST, COMPONENT_OPENSEARCH_MASTER,
    COMPONENT_PROMETHEUS, DASHBOARDS_PORT, OPENSEARCH_DATA_PATH, OPENSEARCH_HTTP_PORT,
    OPENSEARCH_TRANSPORT_PORT, PROMETHEUS_DATA_PATH, PROMETHEUS_PORT, RESOURCE_NAME_PREFIX,
    STORAGE_RESOURCE, ZONE_LABEL,
};
use crate::crd::{NodeSpec, Storage, VerrazzanoMonitoringInstance};
use crate::labels::{
    APP_LABEL, CREATE_ONLY_ANNOTATION, K8S_COMPONENT, K8S_INSTANCE, K8S_MANAGED_BY, K8S_PART_OF,
    MANAGED_BY_VMO, PART_OF_VERRAZZANO, PROMETHEUS_CONFIG_VERSION_ANNOTATION, ROLLING_GROUP_LABEL,
    VMI_LABEL,
};
use crate::scrape_config::{PrometheusConfig, ScrapeConfig};

/// Schema version of the generated configuration files
pub const CONFIG_SCHEMA_VERSION: &str = "1";

const PROMETHEUS_CONFIG_FILE: &str = "prometheus.yml";
const ALERTMANAGER_CONFIG_FILE: &str = "alertmanager.yml";
const DATA_VOLUME: &str = "data";
const CONFIG_VOLUME: &str = "config";
const RULES_VOLUME: &str = "rules";

/// Every object the operator wants to exist for one instance, by kind.
#[derive(Clone, Debug, Default)]
pub struct DesiredObjects {
    pub role_bindings: Vec<RoleBinding>,
    pub config_maps: Vec<ConfigMap>,
    pub services: Vec<Service>,
    pub stateful_sets: Vec<StatefulSet>,
    pub deployments: Vec<Deployment>,
    pub ingresses: Vec<Ingress>,
}

/// A claim backing one replica of a `Deployment`-based tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectedClaim {
    pub name: String,
    pub component: &'static str,
    pub index: usize,
    pub size: String,
}

/// `vmi-<instance>`
#[must_use]
pub fn resource_prefix(vmi: &VerrazzanoMonitoringInstance) -> String {
    prefix_for(&vmi.name_any())
}

/// `vmi-<name>`
#[must_use]
pub fn prefix_for(instance_name: &str) -> String {
    format!("{RESOURCE_NAME_PREFIX}-{instance_name}")
}

/// `vmi-<instance>-<suffix>`
#[must_use]
pub fn object_name(vmi: &VerrazzanoMonitoringInstance, suffix: &str) -> String {
    format!("{}-{suffix}", resource_prefix(vmi))
}

/// Labels stamped on every object and pod of `component`.
#[must_use]
pub fn instance_labels(
    vmi: &VerrazzanoMonitoringInstance,
    app: &str,
    component: &str,
) -> BTreeMap<String, String> {
    let name = vmi.name_any();
    BTreeMap::from([
        (APP_LABEL.to_string(), app.to_string()),
        (VMI_LABEL.to_string(), name.clone()),
        (K8S_COMPONENT.to_string(), component.to_string()),
        (K8S_INSTANCE.to_string(), name),
        (K8S_MANAGED_BY.to_string(), MANAGED_BY_VMO.to_string()),
        (K8S_PART_OF.to_string(), PART_OF_VERRAZZANO.to_string()),
    ])
}

/// Selector for the pods of one workload.
#[must_use]
pub fn app_selector(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), app.to_string())])
}

/// Selector for every pod of a component, across workloads.
fn component_selector(vmi: &VerrazzanoMonitoringInstance, component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (VMI_LABEL.to_string(), vmi.name_any()),
        (K8S_COMPONENT.to_string(), component.to_string()),
    ])
}

/// Controller owner reference pointing at the instance.
///
/// # Errors
///
/// Returns an error if the instance has not been persisted (no UID).
pub fn owner_reference(vmi: &VerrazzanoMonitoringInstance) -> Result<OwnerReference> {
    vmi.controller_owner_ref(&())
        .ok_or_else(|| anyhow!("VerrazzanoMonitoringInstance {} has no uid", vmi.name_any()))
}

fn object_meta(
    vmi: &VerrazzanoMonitoringInstance,
    name: String,
    app: &str,
    component: &str,
) -> Result<ObjectMeta> {
    Ok(ObjectMeta {
        name: Some(name),
        namespace: vmi.namespace(),
        labels: Some(instance_labels(vmi, app, component)),
        owner_references: Some(vec![owner_reference(vmi)?]),
        ..Default::default()
    })
}

/// Build the full desired object set.
///
/// `claim_zones` maps claim names to the zone their volume lives in; pods
/// mounting a zone-pinned claim are scheduled into that zone.
///
/// # Errors
///
/// Returns an error if the instance has no UID.
pub fn build_desired(
    vmi: &VerrazzanoMonitoringInstance,
    config: &OperatorConfig,
    claim_zones: &BTreeMap<String, String>,
) -> Result<DesiredObjects> {
    Ok(DesiredObjects {
        role_bindings: vec![role_binding(vmi, config)?],
        config_maps: config_maps(vmi)?,
        services: services(vmi)?,
        stateful_sets: stateful_sets(vmi, config)?,
        deployments: deployments(vmi, config, claim_zones)?,
        ingresses: ingresses(vmi)?,
    })
}

// ============================================================================
// RoleBinding
// ============================================================================

/// Binds the namespace's default service account to the pod reader role.
///
/// # Errors
///
/// Returns an error if the instance has no UID.
pub fn role_binding(vmi: &VerrazzanoMonitoringInstance, config: &OperatorConfig) -> Result<RoleBinding> {
    let name = object_name(vmi, "pod-reader");
    Ok(RoleBinding {
        metadata: object_meta(vmi, name.clone(), &name, "pod-reader")?,
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: config.pod_reader_cluster_role.clone(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: "default".to_string(),
            namespace: vmi.namespace(),
            api_group: None,
        }]),
    })
}

// ============================================================================
// ConfigMaps
// ============================================================================

/// Prometheus configuration the operator manages inside `prometheus.yml`.
#[must_use]
pub fn managed_prometheus_config(vmi: &VerrazzanoMonitoringInstance) -> PrometheusConfig {
    let mut global = serde_yaml::Mapping::new();
    global.insert("scrape_interval".into(), "20s".into());
    global.insert("evaluation_interval".into(), "30s".into());

    let alerting = vmi.spec.alertmanager.enabled.then(|| {
        let target = format!(
            "{}:{ALERTMANAGER_PORT}",
            object_name(vmi, COMPONENT_ALERTMANAGER)
        );
        yaml_from_json(&json!({
            "alertmanagers": [ { "static_configs": [ { "targets": [target] } ] } ]
        }))
    });

    let namespace = vmi.namespace().unwrap_or_default();
    PrometheusConfig {
        global: Some(YamlValue::Mapping(global)),
        rule_files: vec!["/etc/prometheus/rules/*.rules".to_string()],
        alerting,
        scrape_configs: vec![
            ScrapeConfig::new("prometheus").with(
                "static_configs",
                yaml_from_json(&json!([{ "targets": [format!("localhost:{PROMETHEUS_PORT}")] }])),
            ),
            ScrapeConfig::new("kubernetes-pods")
                .with(
                    "kubernetes_sd_configs",
                    yaml_from_json(&json!([{ "role": "pod", "namespaces": { "names": [namespace] } }])),
                )
                .with(
                    "relabel_configs",
                    yaml_from_json(&json!([{
                        "source_labels": ["__meta_kubernetes_pod_annotation_prometheus_io_scrape"],
                        "action": "keep",
                        "regex": "true"
                    }])),
                ),
        ],
        extra: BTreeMap::new(),
    }
}

fn yaml_from_json(value: &serde_json::Value) -> YamlValue {
    serde_yaml::to_value(value).unwrap_or(YamlValue::Null)
}

fn config_map(
    vmi: &VerrazzanoMonitoringInstance,
    name: Option<&String>,
    component: &str,
    data: BTreeMap<String, String>,
    create_only: bool,
) -> Result<ConfigMap> {
    let name = name.cloned().unwrap_or_default();
    let mut metadata = object_meta(vmi, name, &object_name(vmi, component), component)?;
    if create_only {
        metadata.annotations = Some(BTreeMap::from([(
            CREATE_ONLY_ANNOTATION.to_string(),
            "true".to_string(),
        )]));
    }
    Ok(ConfigMap {
        metadata,
        data: Some(data),
        ..Default::default()
    })
}

fn versions_data() -> BTreeMap<String, String> {
    BTreeMap::from([("version".to_string(), CONFIG_SCHEMA_VERSION.to_string())])
}

/// Config maps for every enabled component.
///
/// Names come from the instance spec; an unset name yields an unnamed object
/// that the reconciler skips.
///
/// # Errors
///
/// Returns an error if the instance has no UID or the Prometheus
/// configuration cannot be rendered.
pub fn config_maps(vmi: &VerrazzanoMonitoringInstance) -> Result<Vec<ConfigMap>> {
    let spec = &vmi.spec;
    let prefix = resource_prefix(vmi);
    let mut maps = Vec::new();

    if spec.opensearch.enabled {
        let yml = format!("cluster.name: {prefix}\nnetwork.host: 0.0.0.0\n");
        maps.push(config_map(
            vmi,
            spec.opensearch.config_map.as_ref(),
            COMPONENT_OPENSEARCH_MASTER,
            BTreeMap::from([("opensearch.yml".to_string(), yml)]),
            false,
        )?);
    }

    if spec.opensearch_dashboards.enabled {
        let yml = format!(
            "server.host: 0.0.0.0\nopensearch.hosts: [\"{}\"]\n",
            opensearch_http_url(vmi)
        );
        maps.push(config_map(
            vmi,
            spec.opensearch_dashboards.config_map.as_ref(),
            COMPONENT_DASHBOARDS,
            BTreeMap::from([("opensearch_dashboards.yml".to_string(), yml)]),
            false,
        )?);
    }

    if spec.prometheus.enabled {
        let rendered = serde_yaml::to_string(&managed_prometheus_config(vmi))?;
        let mut prometheus = config_map(
            vmi,
            spec.prometheus.config_map.as_ref(),
            COMPONENT_PROMETHEUS,
            BTreeMap::from([(PROMETHEUS_CONFIG_FILE.to_string(), rendered)]),
            false,
        )?;
        prometheus.metadata.annotations = Some(BTreeMap::from([(
            PROMETHEUS_CONFIG_VERSION_ANNOTATION.to_string(),
            CONFIG_SCHEMA_VERSION.to_string(),
        )]));
        maps.push(prometheus);
        maps.push(config_map(
            vmi,
            spec.prometheus.versions_config_map.as_ref(),
            COMPONENT_PROMETHEUS,
            versions_data(),
            false,
        )?);
        maps.push(config_map(
            vmi,
            spec.prometheus.rules_config_map.as_ref(),
            COMPONENT_PROMETHEUS,
            BTreeMap::from([("default.rules".to_string(), "groups: []\n".to_string())]),
            true,
        )?);
        maps.push(config_map(
            vmi,
            spec.prometheus.rules_versions_config_map.as_ref(),
            COMPONENT_PROMETHEUS,
            versions_data(),
            false,
        )?);
    }

    if spec.alertmanager.enabled {
        let yml = "route:\n  receiver: default\nreceivers:\n  - name: default\n".to_string();
        maps.push(config_map(
            vmi,
            spec.alertmanager.config_map.as_ref(),
            COMPONENT_ALERTMANAGER,
            BTreeMap::from([(ALERTMANAGER_CONFIG_FILE.to_string(), yml)]),
            true,
        )?);
        maps.push(config_map(
            vmi,
            spec.alertmanager.versions_config_map.as_ref(),
            COMPONENT_ALERTMANAGER,
            versions_data(),
            false,
        )?);
    }

    Ok(maps)
}

// ============================================================================
// Services
// ============================================================================

fn service(
    vmi: &VerrazzanoMonitoringInstance,
    name: String,
    component: &str,
    port_name: &str,
    port: i32,
    headless: bool,
) -> Result<Service> {
    let app = object_name(vmi, component);
    Ok(Service {
        metadata: object_meta(vmi, name, &app, component)?,
        spec: Some(ServiceSpec {
            selector: Some(component_selector(vmi, component)),
            ports: Some(vec![ServicePort {
                name: Some(port_name.to_string()),
                port,
                target_port: Some(IntOrString::Int(port)),
                ..Default::default()
            }]),
            cluster_ip: headless.then(|| "None".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// In-cluster URL of the OpenSearch REST endpoint dashboards should use.
fn opensearch_http_url(vmi: &VerrazzanoMonitoringInstance) -> String {
    let host = if vmi.spec.opensearch.ingest_node.replicas > 0 {
        object_name(vmi, COMPONENT_OPENSEARCH_INGEST)
    } else {
        format!("{}-http", object_name(vmi, COMPONENT_OPENSEARCH_MASTER))
    };
    format!("http://{host}:{OPENSEARCH_HTTP_PORT}")
}

/// Services for every enabled component.
///
/// # Errors
///
/// Returns an error if the instance has no UID.
pub fn services(vmi: &VerrazzanoMonitoringInstance) -> Result<Vec<Service>> {
    let spec = &vmi.spec;
    let mut out = Vec::new();

    if spec.opensearch.enabled {
        let master = object_name(vmi, COMPONENT_OPENSEARCH_MASTER);
        out.push(service(
            vmi,
            master.clone(),
            COMPONENT_OPENSEARCH_MASTER,
            "transport",
            OPENSEARCH_TRANSPORT_PORT,
            true,
        )?);
        out.push(service(
            vmi,
            format!("{master}-http"),
            COMPONENT_OPENSEARCH_MASTER,
            "http",
            OPENSEARCH_HTTP_PORT,
            false,
        )?);
        if spec.opensearch.ingest_node.replicas > 0 {
            out.push(service(
                vmi,
                object_name(vmi, COMPONENT_OPENSEARCH_INGEST),
                COMPONENT_OPENSEARCH_INGEST,
                "http",
                OPENSEARCH_HTTP_PORT,
                false,
            )?);
        }
    }
    if spec.opensearch_dashboards.enabled {
        out.push(service(
            vmi,
            object_name(vmi, COMPONENT_DASHBOARDS),
            COMPONENT_DASHBOARDS,
            "http",
            DASHBOARDS_PORT,
            false,
        )?);
    }
    if spec.prometheus.enabled {
        out.push(service(
            vmi,
            object_name(vmi, COMPONENT_PROMETHEUS),
            COMPONENT_PROMETHEUS,
            "http",
            PROMETHEUS_PORT,
            false,
        )?);
    }
    if spec.alertmanager.enabled {
        let name = object_name(vmi, COMPONENT_ALERTMANAGER);
        out.push(service(
            vmi,
            name.clone(),
            COMPONENT_ALERTMANAGER,
            "http",
            ALERTMANAGER_PORT,
            false,
        )?);
        out.push(service(
            vmi,
            format!("{name}-cluster"),
            COMPONENT_ALERTMANAGER,
            "cluster",
            ALERTMANAGER_CLUSTER_PORT,
            true,
        )?);
    }
    Ok(out)
}

// ============================================================================
// Workloads
// ============================================================================

fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn port(name: &str, container_port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port,
        ..Default::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn config_map_volume(name: &str, config_map: Option<&String>) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map.cloned().unwrap_or_default(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Volume for a replica's data: its claim when it has one, else scratch space.
fn data_volume(claim: Option<&str>) -> Volume {
    match claim {
        Some(claim_name) => Volume {
            name: DATA_VOLUME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim_name.to_string(),
                read_only: None,
            }),
            ..Default::default()
        },
        None => Volume {
            name: DATA_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    }
}

fn image_or(image: Option<&String>, default: &str) -> String {
    image.cloned().unwrap_or_else(|| default.to_string())
}

fn opensearch_container(
    vmi: &VerrazzanoMonitoringInstance,
    config: &OperatorConfig,
    node: &NodeSpec,
    role: &str,
    component: &str,
) -> Container {
    let master = object_name(vmi, COMPONENT_OPENSEARCH_MASTER);
    let mut env_vars = vec![
        env("cluster.name", resource_prefix(vmi)),
        env("node.roles", role),
        env("network.host", "0.0.0.0"),
        env("discovery.seed_hosts", master.clone()),
    ];
    if component == COMPONENT_OPENSEARCH_MASTER {
        let initial: Vec<String> = (0..vmi.spec.opensearch.master_node.replicas)
            .map(|i| format!("{master}-{i}"))
            .collect();
        env_vars.push(env("cluster.initial_cluster_manager_nodes", initial.join(",")));
    }
    if let Some(java_opts) = &node.java_opts {
        env_vars.push(env("OPENSEARCH_JAVA_OPTS", java_opts.clone()));
    }

    Container {
        name: component.to_string(),
        image: Some(image_or(
            vmi.spec.opensearch.image.as_ref(),
            &config.images.opensearch,
        )),
        env: Some(env_vars),
        ports: Some(vec![
            port("http", OPENSEARCH_HTTP_PORT),
            port("transport", OPENSEARCH_TRANSPORT_PORT),
        ]),
        resources: node.resources.clone(),
        volume_mounts: Some(vec![
            mount(DATA_VOLUME, OPENSEARCH_DATA_PATH),
            mount(CONFIG_VOLUME, "/usr/share/opensearch/config/vmo"),
        ]),
        ..Default::default()
    }
}

struct WorkloadParts {
    name: String,
    app: String,
    component: &'static str,
    replicas: i32,
    containers: Vec<Container>,
    volumes: Vec<Volume>,
    zone: Option<String>,
    rolling_group: bool,
    recreate: bool,
}

fn deployment(vmi: &VerrazzanoMonitoringInstance, parts: WorkloadParts) -> Result<Deployment> {
    let mut metadata = object_meta(vmi, parts.name, &parts.app, parts.component)?;
    if parts.rolling_group {
        if let Some(labels) = metadata.labels.as_mut() {
            labels.insert(ROLLING_GROUP_LABEL.to_string(), parts.component.to_string());
        }
    }
    let node_selector = parts
        .zone
        .filter(|z| !z.is_empty())
        .map(|z| BTreeMap::from([(ZONE_LABEL.to_string(), z)]));

    Ok(Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(parts.replicas),
            selector: LabelSelector {
                match_labels: Some(app_selector(&parts.app)),
                ..Default::default()
            },
            strategy: parts.recreate.then(|| DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                rolling_update: None,
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(instance_labels(vmi, &parts.app, parts.component)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: parts.containers,
                    volumes: Some(parts.volumes),
                    node_selector,
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Claim name for replica `index` of a storage section, if it has storage.
fn claim_for(storage: Option<&Storage>, index: usize) -> Option<&str> {
    storage
        .filter(|s| !s.size.is_empty())
        .and_then(|s| s.pvc_names.get(index))
        .map(String::as_str)
}

/// Deployments for every enabled component.
///
/// Data and Prometheus replicas are one single-replica `Deployment` each, so
/// every replica keeps its own claim. They form rolling groups.
///
/// # Errors
///
/// Returns an error if the instance has no UID.
#[allow(clippy::too_many_lines)]
pub fn deployments(
    vmi: &VerrazzanoMonitoringInstance,
    config: &OperatorConfig,
    claim_zones: &BTreeMap<String, String>,
) -> Result<Vec<Deployment>> {
    let spec = &vmi.spec;
    let mut out = Vec::new();
    let zone_of = |claim: Option<&str>| claim.and_then(|c| claim_zones.get(c).cloned());

    if spec.opensearch.enabled {
        let os = &spec.opensearch;
        if os.ingest_node.replicas > 0 {
            let app = object_name(vmi, COMPONENT_OPENSEARCH_INGEST);
            out.push(deployment(
                vmi,
                WorkloadParts {
                    name: app.clone(),
                    app,
                    component: COMPONENT_OPENSEARCH_INGEST,
                    replicas: os.ingest_node.replicas,
                    containers: vec![opensearch_container(
                        vmi,
                        config,
                        &os.ingest_node,
                        "ingest",
                        COMPONENT_OPENSEARCH_INGEST,
                    )],
                    volumes: vec![
                        data_volume(None),
                        config_map_volume(CONFIG_VOLUME, os.config_map.as_ref()),
                    ],
                    zone: None,
                    rolling_group: false,
                    recreate: false,
                },
            )?);
        }

        for i in 0..usize::try_from(os.data_node.replicas).unwrap_or(0) {
            let name = format!("{}-{i}", object_name(vmi, COMPONENT_OPENSEARCH_DATA));
            let claim = claim_for(os.data_node.storage.as_ref(), i);
            out.push(deployment(
                vmi,
                WorkloadParts {
                    name: name.clone(),
                    app: name,
                    component: COMPONENT_OPENSEARCH_DATA,
                    replicas: 1,
                    containers: vec![opensearch_container(
                        vmi,
                        config,
                        &os.data_node,
                        "data",
                        COMPONENT_OPENSEARCH_DATA,
                    )],
                    volumes: vec![
                        data_volume(claim),
                        config_map_volume(CONFIG_VOLUME, os.config_map.as_ref()),
                    ],
                    zone: zone_of(claim),
                    rolling_group: true,
                    recreate: true,
                },
            )?);
        }
    }

    if spec.opensearch_dashboards.enabled {
        let osd = &spec.opensearch_dashboards;
        let app = object_name(vmi, COMPONENT_DASHBOARDS);
        out.push(deployment(
            vmi,
            WorkloadParts {
                name: app.clone(),
                app,
                component: COMPONENT_DASHBOARDS,
                replicas: osd.replicas,
                containers: vec![Container {
                    name: COMPONENT_DASHBOARDS.to_string(),
                    image: Some(image_or(osd.image.as_ref(), &config.images.dashboards)),
                    env: Some(vec![env("OPENSEARCH_HOSTS", opensearch_http_url(vmi))]),
                    ports: Some(vec![port("http", DASHBOARDS_PORT)]),
                    resources: osd.resources.clone(),
                    volume_mounts: Some(vec![mount(
                        CONFIG_VOLUME,
                        "/usr/share/opensearch-dashboards/config/vmo",
                    )]),
                    ..Default::default()
                }],
                volumes: vec![config_map_volume(CONFIG_VOLUME, osd.config_map.as_ref())],
                zone: None,
                rolling_group: false,
                recreate: false,
            },
        )?);
    }

    if spec.prometheus.enabled {
        let prom = &spec.prometheus;
        for i in 0..usize::try_from(prom.replicas).unwrap_or(0) {
            let name = format!("{}-{i}", object_name(vmi, COMPONENT_PROMETHEUS));
            let claim = claim_for(prom.storage.as_ref(), i);
            out.push(deployment(
                vmi,
                WorkloadParts {
                    name: name.clone(),
                    app: name,
                    component: COMPONENT_PROMETHEUS,
                    replicas: 1,
                    containers: vec![Container {
                        name: COMPONENT_PROMETHEUS.to_string(),
                        image: Some(image_or(prom.image.as_ref(), &config.images.prometheus)),
                        args: Some(vec![
                            format!("--config.file=/etc/prometheus/config/{PROMETHEUS_CONFIG_FILE}"),
                            format!("--storage.tsdb.path={PROMETHEUS_DATA_PATH}"),
                            "--web.enable-lifecycle".to_string(),
                        ]),
                        ports: Some(vec![port("http", PROMETHEUS_PORT)]),
                        resources: prom.resources.clone(),
                        volume_mounts: Some(vec![
                            mount(DATA_VOLUME, PROMETHEUS_DATA_PATH),
                            mount(CONFIG_VOLUME, "/etc/prometheus/config"),
                            mount(RULES_VOLUME, "/etc/prometheus/rules"),
                        ]),
                        ..Default::default()
                    }],
                    volumes: vec![
                        data_volume(claim),
                        config_map_volume(CONFIG_VOLUME, prom.config_map.as_ref()),
                        config_map_volume(RULES_VOLUME, prom.rules_config_map.as_ref()),
                    ],
                    zone: zone_of(claim),
                    rolling_group: true,
                    recreate: claim.is_some(),
                },
            )?);
        }
    }

    if spec.alertmanager.enabled {
        let am = &spec.alertmanager;
        let app = object_name(vmi, COMPONENT_ALERTMANAGER);
        let mut args = vec![
            format!("--config.file=/etc/alertmanager/config/{ALERTMANAGER_CONFIG_FILE}"),
            format!("--cluster.listen-address=0.0.0.0:{ALERTMANAGER_CLUSTER_PORT}"),
        ];
        if am.replicas > 1 {
            args.push(format!(
                "--cluster.peer={app}-cluster:{ALERTMANAGER_CLUSTER_PORT}"
            ));
        }
        out.push(deployment(
            vmi,
            WorkloadParts {
                name: app.clone(),
                app,
                component: COMPONENT_ALERTMANAGER,
                replicas: am.replicas,
                containers: vec![Container {
                    name: COMPONENT_ALERTMANAGER.to_string(),
                    image: Some(image_or(am.image.as_ref(), &config.images.alertmanager)),
                    args: Some(args),
                    ports: Some(vec![
                        port("http", ALERTMANAGER_PORT),
                        port("cluster", ALERTMANAGER_CLUSTER_PORT),
                    ]),
                    volume_mounts: Some(vec![mount(CONFIG_VOLUME, "/etc/alertmanager/config")]),
                    ..Default::default()
                }],
                volumes: vec![config_map_volume(CONFIG_VOLUME, am.config_map.as_ref())],
                zone: None,
                rolling_group: false,
                recreate: false,
            },
        )?);
    }

    Ok(out)
}

fn claim_template(size: &str, storage_class: Option<&String>, app: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(DATA_VOLUME.to_string()),
            labels: Some(app_selector(app)),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: storage_class.cloned(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    STORAGE_RESOURCE.to_string(),
                    Quantity(size.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The master tier `StatefulSet`, absent when it has no replicas.
///
/// Its selector and claim templates carry only the `app` label so the claims
/// it creates can be found again by selector.
///
/// # Errors
///
/// Returns an error if the instance has no UID.
pub fn stateful_sets(
    vmi: &VerrazzanoMonitoringInstance,
    config: &OperatorConfig,
) -> Result<Vec<StatefulSet>> {
    let os = &vmi.spec.opensearch;
    if !os.enabled || os.master_node.replicas == 0 {
        return Ok(Vec::new());
    }

    let name = object_name(vmi, COMPONENT_OPENSEARCH_MASTER);
    let storage = os.master_node.storage.as_ref().filter(|s| !s.size.is_empty());
    let mut volumes = vec![config_map_volume(CONFIG_VOLUME, os.config_map.as_ref())];
    let claim_templates = match storage {
        Some(storage) => Some(vec![claim_template(
            &storage.size,
            vmi.spec.storage_class.as_ref(),
            &name,
        )]),
        None => {
            volumes.push(data_volume(None));
            None
        }
    };

    let mut spec: StatefulSetSpec = serde_json::from_value(json!({
        "serviceName": name,
        "podManagementPolicy": "Parallel",
        "selector": { "matchLabels": app_selector(&name) },
        "template": {}
    }))?;
    spec.replicas = Some(os.master_node.replicas);
    spec.volume_claim_templates = claim_templates;
    spec.template = PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(instance_labels(vmi, &name, COMPONENT_OPENSEARCH_MASTER)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![opensearch_container(
                vmi,
                config,
                &os.master_node,
                "cluster_manager",
                COMPONENT_OPENSEARCH_MASTER,
            )],
            volumes: Some(volumes),
            ..Default::default()
        }),
    };

    Ok(vec![StatefulSet {
        metadata: object_meta(vmi, name.clone(), &name, COMPONENT_OPENSEARCH_MASTER)?,
        spec: Some(spec),
        ..Default::default()
    }])
}

// ============================================================================
// Ingresses
// ============================================================================

fn ingress(
    vmi: &VerrazzanoMonitoringInstance,
    uri: &str,
    host_prefix: &str,
    component: &str,
    service: String,
    service_port: i32,
) -> Result<Ingress> {
    let name = object_name(vmi, component);
    Ok(Ingress {
        metadata: object_meta(vmi, name.clone(), &name, component)?,
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some(format!("{host_prefix}.{uri}")),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: service,
                                port: Some(ServiceBackendPort {
                                    number: Some(service_port),
                                    name: None,
                                }),
                            }),
                            resource: None,
                        },
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// One ingress per enabled UI, when the instance has a `uri`.
///
/// # Errors
///
/// Returns an error if the instance has no UID.
pub fn ingresses(vmi: &VerrazzanoMonitoringInstance) -> Result<Vec<Ingress>> {
    let spec = &vmi.spec;
    let Some(uri) = spec.uri.as_deref().filter(|u| !u.is_empty()) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();

    if spec.opensearch.enabled {
        let backend = if spec.opensearch.ingest_node.replicas > 0 {
            object_name(vmi, COMPONENT_OPENSEARCH_INGEST)
        } else {
            format!("{}-http", object_name(vmi, COMPONENT_OPENSEARCH_MASTER))
        };
        out.push(ingress(
            vmi,
            uri,
            "opensearch",
            COMPONENT_OPENSEARCH_INGEST,
            backend,
            OPENSEARCH_HTTP_PORT,
        )?);
    }
    if spec.opensearch_dashboards.enabled {
        out.push(ingress(
            vmi,
            uri,
            "osd",
            COMPONENT_DASHBOARDS,
            object_name(vmi, COMPONENT_DASHBOARDS),
            DASHBOARDS_PORT,
        )?);
    }
    if spec.prometheus.enabled {
        out.push(ingress(
            vmi,
            uri,
            "prometheus",
            COMPONENT_PROMETHEUS,
            object_name(vmi, COMPONENT_PROMETHEUS),
            PROMETHEUS_PORT,
        )?);
    }
    if spec.alertmanager.enabled {
        out.push(ingress(
            vmi,
            uri,
            "alertmanager",
            COMPONENT_ALERTMANAGER,
            object_name(vmi, COMPONENT_ALERTMANAGER),
            ALERTMANAGER_PORT,
        )?);
    }
    Ok(out)
}

// ============================================================================
// PersistentVolumeClaims
// ============================================================================

/// Claims backing data and Prometheus replicas, in replica order.
#[must_use]
pub fn expected_claims(vmi: &VerrazzanoMonitoringInstance) -> Vec<ExpectedClaim> {
    let spec = &vmi.spec;
    let mut out = Vec::new();
    let mut collect = |storage: Option<&Storage>, replicas: i32, component: &'static str| {
        let Some(storage) = storage.filter(|s| !s.size.is_empty()) else {
            return;
        };
        let replicas = usize::try_from(replicas).unwrap_or(0);
        for (index, name) in storage.pvc_names.iter().take(replicas).enumerate() {
            out.push(ExpectedClaim {
                name: name.clone(),
                component,
                index,
                size: storage.size.clone(),
            });
        }
    };

    if spec.opensearch.enabled {
        collect(
            spec.opensearch.data_node.storage.as_ref(),
            spec.opensearch.data_node.replicas,
            COMPONENT_OPENSEARCH_DATA,
        );
    }
    if spec.prometheus.enabled {
        collect(
            spec.prometheus.storage.as_ref(),
            spec.prometheus.replicas,
            COMPONENT_PROMETHEUS,
        );
    }
    out
}

/// A claim for `expected`, pinned to `zone` unless it is empty.
///
/// # Errors
///
/// Returns an error if the instance has no UID.
pub fn persistent_volume_claim(
    vmi: &VerrazzanoMonitoringInstance,
    expected: &ExpectedClaim,
    storage_class: Option<&str>,
    zone: &str,
) -> Result<PersistentVolumeClaim> {
    let app = object_name(vmi, expected.component);
    let selector = (!zone.is_empty()).then(|| LabelSelector {
        match_labels: Some(BTreeMap::from([(ZONE_LABEL.to_string(), zone.to_string())])),
        ..Default::default()
    });
    Ok(PersistentVolumeClaim {
        metadata: object_meta(vmi, expected.name.clone(), &app, expected.component)?,
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: storage_class.map(str::to_string),
            selector,
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    STORAGE_RESOURCE.to_string(),
                    Quantity(expected.size.clone()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

#[cfg(test)]
#[path = "vmi_resources_tests.rs"]
mod vmi_resources_tests;
