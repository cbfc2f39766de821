// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `rolebindings.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::OperatorConfig;
    use crate::store::fake::{instance, FakeCluster, FakeSearch, Verb};
    use crate::vmi_resources::role_binding;

    #[tokio::test]
    async fn test_pod_reader_binding_created() {
        let cluster = FakeCluster::new();
        let ctx = cluster.context(FakeSearch::new());
        let vmi = instance("system");
        let desired = vec![role_binding(&vmi, &ctx.config).unwrap()];

        assert!(reconcile(&ctx, &vmi, &desired).await.unwrap());
        let live = cluster
            .role_bindings
            .get_object("vmi-system-pod-reader")
            .unwrap();
        assert_eq!(live.role_ref.name, "vmi-pod-reader");
        assert_eq!(live.subjects.unwrap()[0].name, "default");
    }

    #[tokio::test]
    async fn test_changed_cluster_role_is_replaced() {
        let cluster = FakeCluster::new();
        let ctx = cluster.context(FakeSearch::new());
        let vmi = instance("system");
        reconcile(&ctx, &vmi, &[role_binding(&vmi, &ctx.config).unwrap()])
            .await
            .unwrap();
        cluster.clear_calls();

        let config = OperatorConfig {
            pod_reader_cluster_role: "custom-reader".to_string(),
            ..OperatorConfig::default()
        };
        assert!(reconcile(&ctx, &vmi, &[role_binding(&vmi, &config).unwrap()])
            .await
            .unwrap());
        assert_eq!(cluster.role_bindings.count(Verb::Replace), 1);
        let live = cluster
            .role_bindings
            .get_object("vmi-system-pod-reader")
            .unwrap();
        assert_eq!(live.role_ref.name, "custom-reader");
    }
}
