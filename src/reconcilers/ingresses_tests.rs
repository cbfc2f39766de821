// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `ingresses.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::store::fake::{instance, FakeCluster, FakeSearch, Verb};
    use crate::vmi_resources::ingresses;

    fn vmi() -> VerrazzanoMonitoringInstance {
        let mut vmi = instance("system");
        vmi.spec.uri = Some("vmi.system.example.com".to_string());
        vmi.spec.prometheus.enabled = true;
        vmi.spec.alertmanager.enabled = true;
        vmi
    }

    #[tokio::test]
    async fn test_ingresses_created_once() {
        let cluster = FakeCluster::new();
        let ctx = cluster.context(FakeSearch::new());
        let vmi = vmi();
        let desired = ingresses(&vmi).unwrap();

        assert!(reconcile(&ctx, &vmi, &desired).await.unwrap());
        assert_eq!(cluster.ingresses.count(Verb::Create), 2);
        cluster.clear_calls();

        assert!(!reconcile(&ctx, &vmi, &desired).await.unwrap());
        assert!(cluster.ingresses.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_cleared_uri_removes_ingresses() {
        let cluster = FakeCluster::new();
        let ctx = cluster.context(FakeSearch::new());
        let mut vmi = vmi();
        reconcile(&ctx, &vmi, &ingresses(&vmi).unwrap()).await.unwrap();

        vmi.spec.uri = None;
        let desired = ingresses(&vmi).unwrap();
        assert!(desired.is_empty());
        assert!(reconcile(&ctx, &vmi, &desired).await.unwrap());
        assert!(cluster.ingresses.names().is_empty());
    }

    #[tokio::test]
    async fn test_changed_host_is_replaced_in_place() {
        let cluster = FakeCluster::new();
        let ctx = cluster.context(FakeSearch::new());
        let mut vmi = vmi();
        reconcile(&ctx, &vmi, &ingresses(&vmi).unwrap()).await.unwrap();
        cluster.clear_calls();

        vmi.spec.uri = Some("monitoring.example.com".to_string());
        assert!(reconcile(&ctx, &vmi, &ingresses(&vmi).unwrap()).await.unwrap());
        assert_eq!(cluster.ingresses.count(Verb::Replace), 2);
        assert_eq!(cluster.ingresses.count(Verb::Delete), 0);

        let live = cluster.ingresses.get_object("vmi-system-prometheus").unwrap();
        let host = live.spec.unwrap().rules.unwrap()[0].host.clone();
        assert_eq!(host.as_deref(), Some("prometheus.monitoring.example.com"));
    }
}
