// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `statefulsets.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::OperatorConfig;
    use crate::crd::Storage;
    use crate::errors::ReconcileError;
    use crate::store::fake::{instance, FakeCluster, FakeSearch, Verb};
    use crate::vmi_resources::{app_selector, stateful_sets};
    use k8s_openapi::api::core::v1::PersistentVolumeClaim;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::sync::Arc;

    const MASTER: &str = "vmi-system-os-master";

    fn master_vmi(replicas: i32) -> VerrazzanoMonitoringInstance {
        let mut vmi = instance("system");
        vmi.spec.opensearch.enabled = true;
        vmi.spec.opensearch.master_node.replicas = replicas;
        vmi.spec.opensearch.master_node.storage = Some(Storage {
            size: "10Gi".to_string(),
            pvc_names: Vec::new(),
        });
        vmi
    }

    fn desired(vmi: &VerrazzanoMonitoringInstance) -> Vec<StatefulSet> {
        stateful_sets(vmi, &OperatorConfig::default()).unwrap()
    }

    async fn converged(
        vmi: &VerrazzanoMonitoringInstance,
    ) -> (FakeCluster, Arc<FakeSearch>, Arc<Context>) {
        let cluster = FakeCluster::new();
        let search = FakeSearch::new();
        let ctx = cluster.context(search.clone());
        reconcile(&ctx, vmi, &desired(vmi)).await.unwrap();
        cluster.mark_workloads_ready();
        cluster.clear_calls();
        (cluster, search, ctx)
    }

    fn claim(index: usize) -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(format!("data-{MASTER}-{index}")),
                namespace: Some("verrazzano-system".to_string()),
                labels: Some(app_selector(MASTER)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn live_replicas(cluster: &FakeCluster) -> i32 {
        cluster
            .stateful_sets
            .get_object(MASTER)
            .and_then(|s| s.spec)
            .and_then(|s| s.replicas)
            .unwrap()
    }

    #[tokio::test]
    async fn test_absent_statefulset_is_created() {
        let cluster = FakeCluster::new();
        let ctx = cluster.context(FakeSearch::new());
        let vmi = master_vmi(3);
        assert!(reconcile(&ctx, &vmi, &desired(&vmi)).await.unwrap());
        assert_eq!(cluster.stateful_sets.count(Verb::Create), 1);
    }

    #[tokio::test]
    async fn test_zero_replicas_produces_no_statefulset() {
        assert!(desired(&master_vmi(0)).is_empty());
    }

    #[tokio::test]
    async fn test_scale_down_is_one_replica_per_pass() {
        let (cluster, _, ctx) = converged(&master_vmi(3)).await;
        let smaller = master_vmi(1);

        assert!(reconcile(&ctx, &smaller, &desired(&smaller)).await.unwrap());
        assert_eq!(live_replicas(&cluster), 2);

        assert!(reconcile(&ctx, &smaller, &desired(&smaller)).await.unwrap());
        assert_eq!(live_replicas(&cluster), 1);

        cluster.clear_calls();
        reconcile(&ctx, &smaller, &desired(&smaller)).await.unwrap();
        assert_eq!(cluster.stateful_sets.count(Verb::Replace), 0);
    }

    #[tokio::test]
    async fn test_scale_down_waits_for_green() {
        let (cluster, search, ctx) = converged(&master_vmi(3)).await;
        search.set_healthy(false);
        let smaller = master_vmi(2);

        assert!(reconcile(&ctx, &smaller, &desired(&smaller)).await.unwrap());
        assert_eq!(live_replicas(&cluster), 3);
        assert!(cluster.stateful_sets.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_update_waits_for_green_then_applies() {
        let mut vmi = master_vmi(3);
        let (cluster, search, ctx) = converged(&vmi).await;
        vmi.spec.opensearch.master_node.java_opts = Some("-Xmx1g".to_string());

        search.set_healthy(false);
        assert!(reconcile(&ctx, &vmi, &desired(&vmi)).await.unwrap());
        assert_eq!(cluster.stateful_sets.count(Verb::Replace), 0);

        search.set_healthy(true);
        assert!(reconcile(&ctx, &vmi, &desired(&vmi)).await.unwrap());
        assert_eq!(cluster.stateful_sets.count(Verb::Replace), 1);
    }

    #[tokio::test]
    async fn test_claims_get_statefulset_owner() {
        let vmi = master_vmi(3);
        let (cluster, _, ctx) = converged(&vmi).await;
        for i in 0..3 {
            cluster.pvcs.insert(claim(i));
        }

        assert!(reconcile(&ctx, &vmi, &desired(&vmi)).await.unwrap());
        for claim in cluster.pvcs.objects() {
            let owners = claim.metadata.owner_references.unwrap();
            assert_eq!(owners.len(), 1);
            assert_eq!(owners[0].kind, "StatefulSet");
            assert_eq!(owners[0].name, MASTER);
        }

        cluster.clear_calls();
        assert!(!reconcile(&ctx, &vmi, &desired(&vmi)).await.unwrap());
        assert!(cluster.pvcs.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_claim_count_mismatch_is_reported() {
        let vmi = master_vmi(3);
        let (cluster, _, ctx) = converged(&vmi).await;
        cluster.pvcs.insert(claim(0));
        cluster.pvcs.insert(claim(1));

        let sts = cluster.stateful_sets.get_object(MASTER).unwrap();
        let err = update_owner_for_pvcs(&ctx, "verrazzano-system", &sts)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReconcileError>(),
            Some(ReconcileError::PvcCountMismatch {
                expected: 3,
                found: 2,
                ..
            })
        ));
        assert!(cluster.pvcs.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_unwanted_statefulset_needs_green_and_resizable() {
        let (cluster, search, ctx) = converged(&master_vmi(3)).await;
        let none = master_vmi(0);

        search.set_resizable(false);
        assert!(reconcile(&ctx, &none, &desired(&none)).await.unwrap());
        assert!(cluster.stateful_sets.get_object(MASTER).is_some());

        search.set_resizable(true);
        reconcile(&ctx, &none, &desired(&none)).await.unwrap();
        assert!(cluster.stateful_sets.get_object(MASTER).is_none());
    }
}
