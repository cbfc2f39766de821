// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `engine.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::constants::OCI_VOLUME_PROVISIONER;
    use crate::crd::Storage;
    use crate::store::fake::{instance, node, storage_class, FakeCluster, FakeSearch, Verb};

    const NS: &str = "verrazzano-system";

    fn full_instance() -> VerrazzanoMonitoringInstance {
        let mut vmi = instance("system");
        vmi.spec.uri = Some("vmi.system.example.com".to_string());
        vmi.spec.opensearch.enabled = true;
        vmi.spec.opensearch.master_node.replicas = 3;
        vmi.spec.opensearch.data_node.replicas = 2;
        vmi.spec.opensearch.data_node.storage = Some(Storage {
            size: "50Gi".to_string(),
            pvc_names: Vec::new(),
        });
        vmi.spec.opensearch_dashboards.enabled = true;
        vmi.spec.prometheus.enabled = true;
        vmi.spec.alertmanager.enabled = true;
        vmi
    }

    fn cluster_with(vmi: VerrazzanoMonitoringInstance) -> (FakeCluster, Arc<FakeSearch>, Arc<Context>) {
        let cluster = FakeCluster::new();
        cluster
            .storage_classes
            .insert(storage_class("oci-bv", OCI_VOLUME_PROVISIONER, true, true));
        cluster.nodes.insert(node("n1", "ad-1"));
        cluster.nodes.insert(node("n2", "ad-2"));
        cluster.instances.insert(vmi);
        let search = FakeSearch::new();
        let ctx = cluster.context(search.clone());
        (cluster, search, ctx)
    }

    fn stored(cluster: &FakeCluster) -> VerrazzanoMonitoringInstance {
        cluster.instances.get_object("system").unwrap()
    }

    #[test]
    fn test_spec_hash_is_stable_hex() {
        let vmi = full_instance();
        let hash = calculate_spec_hash(&vmi.spec);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, calculate_spec_hash(&vmi.spec));

        let mut changed = vmi.spec.clone();
        changed.opensearch.data_node.replicas = 3;
        assert_ne!(hash, calculate_spec_hash(&changed));
    }

    #[tokio::test]
    async fn test_missing_instance_is_a_no_op() {
        let cluster = FakeCluster::new();
        let ctx = cluster.context(FakeSearch::new());
        let outcome = reconcile(&ctx, NS, "absent").await.unwrap();
        assert_eq!(outcome, PassOutcome::Missing);
        assert_eq!(cluster.total_mutations(), 0);
    }

    #[tokio::test]
    async fn test_locked_instance_is_left_alone() {
        let mut vmi = full_instance();
        vmi.spec.lock = true;
        let (cluster, search, ctx) = cluster_with(vmi);

        let outcome = reconcile(&ctx, NS, "system").await.unwrap();
        assert_eq!(outcome, PassOutcome::Locked);
        assert_eq!(cluster.total_mutations(), 0);
        assert!(search.calls().is_empty());
    }

    #[tokio::test]
    async fn test_first_pass_creates_stack_and_persists_defaults() {
        let (cluster, search, ctx) = cluster_with(full_instance());

        let outcome = reconcile(&ctx, NS, "system").await.unwrap();
        assert_eq!(outcome, PassOutcome::Pending);

        assert_eq!(cluster.role_bindings.count(Verb::Create), 1);
        assert_eq!(cluster.config_maps.count(Verb::Create), 8);
        assert_eq!(cluster.stateful_sets.count(Verb::Create), 1);
        assert_eq!(cluster.pvcs.count(Verb::Create), 2);
        assert_eq!(cluster.ingresses.count(Verb::Create), 4);
        assert!(cluster.deployments.count(Verb::Create) >= 5);

        let persisted = stored(&cluster);
        assert_eq!(
            persisted.spec.opensearch.data_node.storage.unwrap().pvc_names,
            vec!["vmi-system-os-data-0", "vmi-system-os-data-1"]
        );
        assert!(persisted.status.is_none(), "status waits for a clean pass");

        let calls = search.calls();
        assert!(calls.contains(&"configure_ism"));
        assert!(calls.contains(&"set_auto_expand_indices"));
    }

    #[tokio::test]
    async fn test_converged_cluster_sees_no_writes() {
        let (cluster, _, ctx) = cluster_with(full_instance());
        reconcile(&ctx, NS, "system").await.unwrap();
        cluster.mark_workloads_ready();

        let outcome = reconcile(&ctx, NS, "system").await.unwrap();
        assert_eq!(outcome, PassOutcome::Converged);
        let status = stored(&cluster).status.unwrap();
        assert_eq!(status.state.as_deref(), Some(STATE_RUNNING));
        assert_eq!(status.current_version.as_deref(), Some("1.0.0-test"));
        assert_eq!(
            status.hash.as_deref(),
            Some(calculate_spec_hash(&stored(&cluster).spec).as_str())
        );

        cluster.clear_calls();
        let outcome = reconcile(&ctx, NS, "system").await.unwrap();
        assert_eq!(outcome, PassOutcome::Converged);
        assert_eq!(cluster.total_mutations(), 0);
    }

    #[tokio::test]
    async fn test_status_waits_for_target_version() {
        let (cluster, search, ctx) = cluster_with(full_instance());
        reconcile(&ctx, NS, "system").await.unwrap();
        cluster.mark_workloads_ready();
        search.set_updated(false);

        let outcome = reconcile(&ctx, NS, "system").await.unwrap();
        assert_eq!(outcome, PassOutcome::Pending);
        assert!(stored(&cluster).status.is_none());
        assert_eq!(cluster.instances.count(Verb::PatchStatus), 0);
    }

    #[tokio::test]
    async fn test_created_at_survives_later_passes() {
        let (cluster, _, ctx) = cluster_with(full_instance());
        reconcile(&ctx, NS, "system").await.unwrap();
        cluster.mark_workloads_ready();
        reconcile(&ctx, NS, "system").await.unwrap();
        let first = stored(&cluster).status.unwrap().created_at;

        cluster.instances.update("system", |vmi| {
            vmi.spec.prometheus.replicas = 2;
            vmi.spec.prometheus.config_map = None;
        });
        reconcile(&ctx, NS, "system").await.unwrap();
        cluster.mark_workloads_ready();
        reconcile(&ctx, NS, "system").await.unwrap();

        assert_eq!(stored(&cluster).status.unwrap().created_at, first);
    }

    #[tokio::test]
    async fn test_failure_skips_deployments_but_not_ingresses() {
        let (cluster, _, ctx) = cluster_with(full_instance());
        cluster.services.fail(Verb::Create, "quota exceeded");

        let err = reconcile(&ctx, NS, "system").await.unwrap_err();
        let failed = err.downcast_ref::<ReconcileError>().unwrap();
        assert!(matches!(failed, ReconcileError::PassFailed { errors, .. } if errors.len() == 1));
        assert!(err.to_string().contains("quota exceeded"));

        assert_eq!(cluster.deployments.count(Verb::Create), 0);
        assert_eq!(cluster.ingresses.count(Verb::Create), 4);
        assert_eq!(cluster.config_maps.count(Verb::Create), 8);
    }

    #[tokio::test]
    async fn test_spec_is_persisted_even_when_a_kind_fails() {
        let (cluster, _, ctx) = cluster_with(full_instance());
        cluster.ingresses.fail(Verb::Create, "admission webhook denied");

        assert!(reconcile(&ctx, NS, "system").await.is_err());
        assert_eq!(cluster.instances.count(Verb::Replace), 1);
        assert!(stored(&cluster).spec.opensearch.config_map.is_some());
    }

    #[tokio::test]
    async fn test_data_rollout_pauses_until_green() {
        let (cluster, search, ctx) = cluster_with(full_instance());
        reconcile(&ctx, NS, "system").await.unwrap();
        cluster.mark_workloads_ready();
        reconcile(&ctx, NS, "system").await.unwrap();

        cluster.instances.update("system", |vmi| {
            vmi.spec.opensearch.data_node.java_opts = Some("-Xmx2g".to_string());
        });
        search.set_healthy(false);
        cluster.clear_calls();

        let outcome = reconcile(&ctx, NS, "system").await.unwrap();
        assert_eq!(outcome, PassOutcome::Pending);
        assert_eq!(cluster.deployments.count(Verb::Replace), 0);
        assert_eq!(cluster.instances.count(Verb::PatchStatus), 0);
    }
}
