// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Integration tests for the monitoring operator against a live cluster.
//!
//! The `VerrazzanoMonitoringInstance` CRD must be installed first
//! (`cargo run --bin crdgen && kubectl apply -f deploy/crds/`).
//!
//! Run with: cargo test --test cluster_integration -- --ignored

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::client::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use vmo::config::OperatorConfig;
use vmo::context::{Context, Stores};
use vmo::crd::{
    PrometheusSpec, VerrazzanoMonitoringInstance, VerrazzanoMonitoringInstanceSpec,
};
use vmo::labels::{K8S_MANAGED_BY, MANAGED_BY_VMO};
use vmo::metrics::MetricsRegistry;
use vmo::opensearch::OpenSearchClient;
use vmo::reconcilers::{reconcile, PassOutcome};

const TEST_NAMESPACE: &str = "vmo-integration-test";

async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("⊘ Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

async fn create_test_namespace(client: &Client, name: &str) -> Result<(), kube::Error> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                "test".to_string(),
                "integration".to_string(),
            )])),
            ..Default::default()
        },
        ..Default::default()
    };
    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
        Err(e) => Err(e),
    }
}

async fn delete_test_namespace(client: &Client, name: &str) {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    if let Err(e) = namespaces.delete(name, &DeleteParams::default()).await {
        eprintln!("Failed to delete test namespace {name}: {e}");
    }
}

fn context(client: &Client) -> Context {
    let config = OperatorConfig::default();
    Context {
        stores: Stores::from_client(client),
        search: Arc::new(OpenSearchClient::new(&config).unwrap()),
        metrics: Arc::new(MetricsRegistry::new().unwrap()),
        config: Arc::new(config),
        build_version: "integration".to_string(),
    }
}

#[tokio::test]
#[ignore = "requires a Kubernetes cluster with the VMI CRD installed"]
async fn test_reconcile_prometheus_only_instance() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    create_test_namespace(&client, TEST_NAMESPACE).await.unwrap();

    let instances: Api<VerrazzanoMonitoringInstance> =
        Api::namespaced(client.clone(), TEST_NAMESPACE);
    let vmi = VerrazzanoMonitoringInstance::new(
        "system",
        VerrazzanoMonitoringInstanceSpec {
            prometheus: PrometheusSpec {
                enabled: true,
                replicas: 1,
                ..PrometheusSpec::default()
            },
            ..VerrazzanoMonitoringInstanceSpec::default()
        },
    );
    match instances.create(&PostParams::default(), &vmi).await {
        Ok(_) => {}
        Err(kube::Error::Api(ae)) if ae.code == 409 => {}
        Err(e) => panic!("Failed to create instance: {e}"),
    }

    let ctx = context(&client);
    let first = reconcile(&ctx, TEST_NAMESPACE, "system").await.unwrap();
    assert_ne!(first, PassOutcome::Missing);

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    assert!(deployments.get_opt("vmi-system-prometheus-0").await.unwrap().is_some());
    let services: Api<Service> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    assert!(services.get_opt("vmi-system-prometheus").await.unwrap().is_some());
    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let listed = config_maps
        .list(&ListParams::default().labels(&format!("{K8S_MANAGED_BY}={MANAGED_BY_VMO}")))
        .await
        .unwrap();
    assert!(!listed.items.is_empty());

    instances
        .delete("system", &DeleteParams::default())
        .await
        .unwrap();
    assert_eq!(
        reconcile(&ctx, TEST_NAMESPACE, "system").await.unwrap(),
        PassOutcome::Missing
    );

    delete_test_namespace(&client, TEST_NAMESPACE).await;
}
