// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `deployments.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::OperatorConfig;
    use crate::store::fake::{instance, FakeCluster, FakeSearch, Verb};
    use crate::vmi_resources::deployments;
    use std::sync::Arc;

    fn data_vmi(replicas: i32) -> VerrazzanoMonitoringInstance {
        let mut vmi = instance("system");
        vmi.spec.opensearch.enabled = true;
        vmi.spec.opensearch.master_node.replicas = 3;
        vmi.spec.opensearch.data_node.replicas = replicas;
        vmi.spec.opensearch_dashboards.enabled = true;
        vmi.spec.opensearch_dashboards.replicas = 1;
        vmi
    }

    fn desired(vmi: &VerrazzanoMonitoringInstance) -> Vec<Deployment> {
        deployments(vmi, &OperatorConfig::default(), &BTreeMap::new()).unwrap()
    }

    /// Create everything, mark it ready and forget the calls.
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

    fn replaced(cluster: &FakeCluster) -> Vec<String> {
        cluster
            .deployments
            .mutations()
            .into_iter()
            .filter(|c| c.verb == Verb::Replace)
            .map(|c| c.name)
            .collect()
    }

    #[test]
    fn test_update_strategy_selection() {
        let same = get_update_strategy(Some("osd:2.3.0"), Some("osd:2.3.0"));
        assert_eq!(same.type_.as_deref(), Some("RollingUpdate"));
        let changed = get_update_strategy(Some("osd:2.4.0"), Some("osd:2.3.0"));
        assert_eq!(changed.type_.as_deref(), Some("Recreate"));
    }

    #[tokio::test]
    async fn test_converged_group_is_clean() {
        let vmi = data_vmi(3);
        let (cluster, _, ctx) = converged(&vmi).await;
        assert!(!reconcile(&ctx, &vmi, &desired(&vmi)).await.unwrap());
        assert_eq!(cluster.total_mutations(), 0);
    }

    #[tokio::test]
    async fn test_rolling_update_changes_one_member_per_pass() {
        let mut vmi = data_vmi(3);
        let (cluster, _, ctx) = converged(&vmi).await;
        vmi.spec.opensearch.data_node.java_opts = Some("-Xms2g -Xmx2g".to_string());

        assert!(reconcile(&ctx, &vmi, &desired(&vmi)).await.unwrap());
        assert_eq!(replaced(&cluster), vec!["vmi-system-os-data-0".to_string()]);

        // data-0 has not rolled out yet: nothing else moves.
        cluster.clear_calls();
        assert!(reconcile(&ctx, &vmi, &desired(&vmi)).await.unwrap());
        assert!(replaced(&cluster).is_empty());

        cluster.mark_workloads_ready();
        cluster.clear_calls();
        assert!(reconcile(&ctx, &vmi, &desired(&vmi)).await.unwrap());
        assert_eq!(replaced(&cluster), vec!["vmi-system-os-data-1".to_string()]);
    }

    #[tokio::test]
    async fn test_data_update_waits_for_green() {
        let mut vmi = data_vmi(2);
        let (cluster, search, ctx) = converged(&vmi).await;
        search.set_healthy(false);
        vmi.spec.opensearch.data_node.java_opts = Some("-Xmx4g".to_string());

        assert!(reconcile(&ctx, &vmi, &desired(&vmi)).await.unwrap());
        assert!(replaced(&cluster).is_empty());
        assert!(search.calls().contains(&"is_healthy"));
    }

    #[tokio::test]
    async fn test_data_scale_down_removes_one_node_per_pass() {
        let vmi = data_vmi(3);
        let (cluster, _, ctx) = converged(&vmi).await;
        let smaller = data_vmi(1);

        assert!(reconcile(&ctx, &smaller, &desired(&smaller)).await.unwrap());
        assert_eq!(cluster.deployments.count(Verb::Delete), 1);

        cluster.clear_calls();
        reconcile(&ctx, &smaller, &desired(&smaller)).await.unwrap();
        assert_eq!(cluster.deployments.count(Verb::Delete), 1);
        assert!(cluster.deployments.get_object("vmi-system-os-data-0").is_some());
        assert!(cluster.deployments.get_object("vmi-system-os-data-1").is_none());
        assert!(cluster.deployments.get_object("vmi-system-os-data-2").is_none());
    }

    #[tokio::test]
    async fn test_data_scale_down_waits_until_resizable() {
        let vmi = data_vmi(3);
        let (cluster, search, ctx) = converged(&vmi).await;
        search.set_resizable(false);
        let smaller = data_vmi(2);

        assert!(reconcile(&ctx, &smaller, &desired(&smaller)).await.unwrap());
        assert_eq!(cluster.deployments.count(Verb::Delete), 0);
    }

    #[tokio::test]
    async fn test_dashboards_image_change_recreates_pods() {
        let mut vmi = data_vmi(1);
        let (cluster, _, ctx) = converged(&vmi).await;
        vmi.spec.opensearch_dashboards.image = Some("osd:9.9.9".to_string());

        reconcile(&ctx, &vmi, &desired(&vmi)).await.unwrap();
        let dashboards = cluster.deployments.get_object("vmi-system-osd").unwrap();
        assert_eq!(
            dashboards.spec.unwrap().strategy.unwrap().type_.as_deref(),
            Some("Recreate")
        );
    }

    #[test]
    fn test_availability_requires_observed_generation() {
        let vmi = data_vmi(1);
        let mut deployment = desired(&vmi).remove(0);
        deployment.metadata.generation = Some(2);
        deployment.status = Some(k8s_openapi::api::apps::v1::DeploymentStatus {
            replicas: Some(1),
            available_replicas: Some(1),
            observed_generation: Some(1),
            ..Default::default()
        });
        assert!(!is_fully_available(&deployment));
        deployment.status.as_mut().unwrap().observed_generation = Some(2);
        assert!(is_fully_available(&deployment));
    }
}
