// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `services.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::store::fake::{instance, FakeCluster, FakeSearch, Verb};
    use crate::vmi_resources::services;
    use k8s_openapi::api::core::v1::ServicePort;

    fn vmi() -> VerrazzanoMonitoringInstance {
        let mut vmi = instance("system");
        vmi.spec.opensearch.enabled = true;
        vmi.spec.opensearch.master_node.replicas = 3;
        vmi.spec.prometheus.enabled = true;
        vmi
    }

    #[tokio::test]
    async fn test_changed_service_is_recreated() {
        let cluster = FakeCluster::new();
        let ctx = cluster.context(FakeSearch::new());
        let vmi = vmi();
        let mut desired = services(&vmi).unwrap();
        reconcile(&ctx, &vmi, &desired).await.unwrap();
        cluster.clear_calls();

        let prometheus = desired
            .iter_mut()
            .find(|s| s.name_any() == "vmi-system-prometheus")
            .unwrap();
        prometheus.spec.as_mut().unwrap().ports = Some(vec![ServicePort {
            name: Some("http".to_string()),
            port: 19090,
            ..Default::default()
        }]);

        assert!(reconcile(&ctx, &vmi, &desired).await.unwrap());
        let mutations = cluster.services.mutations();
        assert_eq!(mutations.len(), 2);
        assert_eq!(mutations[0].verb, Verb::Delete);
        assert_eq!(mutations[1].verb, Verb::Create);
        assert_eq!(mutations[1].name, "vmi-system-prometheus");
    }

    #[tokio::test]
    async fn test_disabled_component_service_is_removed() {
        let cluster = FakeCluster::new();
        let ctx = cluster.context(FakeSearch::new());
        let mut vmi = vmi();
        reconcile(&ctx, &vmi, &services(&vmi).unwrap()).await.unwrap();

        vmi.spec.prometheus.enabled = false;
        reconcile(&ctx, &vmi, &services(&vmi).unwrap()).await.unwrap();
        assert!(cluster.services.get_object("vmi-system-prometheus").is_none());
        assert!(cluster.services.get_object("vmi-system-os-master").is_some());
    }

    #[tokio::test]
    async fn test_server_assigned_cluster_ip_is_not_a_difference() {
        let cluster = FakeCluster::new();
        let ctx = cluster.context(FakeSearch::new());
        let vmi = vmi();
        let desired = services(&vmi).unwrap();
        reconcile(&ctx, &vmi, &desired).await.unwrap();
        cluster.services.update("vmi-system-prometheus", |s| {
            let spec = s.spec.as_mut().unwrap();
            spec.cluster_ip = Some("10.96.0.42".to_string());
            spec.type_ = Some("ClusterIP".to_string());
        });
        cluster.clear_calls();

        assert!(!reconcile(&ctx, &vmi, &desired).await.unwrap());
        assert!(cluster.services.mutations().is_empty());
    }
}
