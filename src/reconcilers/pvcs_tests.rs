// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `pvcs.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::OperatorConfig;
    use crate::reconcilers::defaults::initialize_defaults;
    use crate::store::fake::{instance, node, storage_class, FakeCluster, FakeSearch, Verb};
    use crate::vmi_resources::deployments;
    use std::sync::Arc;

    const OCI_CLASS: &str = "oci-bv";

    fn data_vmi(replicas: i32, size: &str) -> VerrazzanoMonitoringInstance {
        let mut vmi = instance("system");
        vmi.spec.opensearch.enabled = true;
        vmi.spec.opensearch.master_node.replicas = 1;
        vmi.spec.opensearch.data_node.replicas = replicas;
        vmi.spec.opensearch.data_node.storage = Some(Storage {
            size: size.to_string(),
            pvc_names: Vec::new(),
        });
        initialize_defaults(&mut vmi, &OperatorConfig::default());
        vmi
    }

    fn oci_cluster(allow_expansion: bool) -> FakeCluster {
        let cluster = FakeCluster::new();
        cluster.storage_classes.insert(storage_class(
            OCI_CLASS,
            OCI_VOLUME_PROVISIONER,
            allow_expansion,
            true,
        ));
        for (name, zone) in [("n1", "ad-1"), ("n2", "ad-2"), ("n3", "ad-3"), ("n4", "ad-1")] {
            cluster.nodes.insert(node(name, zone));
        }
        cluster
    }

    fn context(cluster: &FakeCluster) -> (Arc<FakeSearch>, Arc<Context>) {
        let search = FakeSearch::new();
        let ctx = cluster.context(search.clone());
        (search, ctx)
    }

    fn size_of(claim: &PersistentVolumeClaim) -> String {
        requested_size(claim).unwrap().to_string()
    }

    #[test]
    fn test_storage_registry_rename_updates_spec() {
        let mut vmi = data_vmi(2, "50Gi");
        let mut registry = StorageRegistry::from_spec(&vmi.spec);
        assert_eq!(
            registry.location("vmi-system-os-data-1"),
            Some(StorageLocation {
                component: COMPONENT_OPENSEARCH_DATA,
                index: 1
            })
        );

        registry
            .rename(&mut vmi.spec, "vmi-system-os-data-1", "vmi-system-os-data-1-abcde")
            .unwrap();
        assert!(registry.contains("vmi-system-os-data-1-abcde"));
        assert!(!registry.contains("vmi-system-os-data-1"));
        assert_eq!(
            vmi.spec.opensearch.data_node.storage.unwrap().pvc_names[1],
            "vmi-system-os-data-1-abcde"
        );
    }

    #[test]
    fn test_storage_registry_rejects_unknown_claim() {
        let mut vmi = data_vmi(1, "50Gi");
        let mut registry = StorageRegistry::from_spec(&vmi.spec);
        assert!(registry.rename(&mut vmi.spec, "nope", "new").is_err());
    }

    #[tokio::test]
    async fn test_claims_are_spread_across_zones() {
        let cluster = oci_cluster(true);
        let (_, ctx) = context(&cluster);
        let mut vmi = data_vmi(3, "50Gi");

        let outcome = reconcile(&ctx, &mut vmi).await.unwrap();
        assert!(outcome.dirty);
        assert_eq!(cluster.pvcs.count(Verb::Create), 3);

        let zones: BTreeSet<&String> = outcome.claim_zones.values().collect();
        assert_eq!(zones.len(), 3, "one claim per zone: {:?}", outcome.claim_zones);
        for claim in cluster.pvcs.objects() {
            let zone = zone_of(&claim).unwrap();
            assert_eq!(outcome.claim_zones[&claim.name_any()], zone);
            assert_eq!(
                claim.spec.unwrap().storage_class_name.as_deref(),
                Some(OCI_CLASS)
            );
        }
    }

    #[tokio::test]
    async fn test_second_pass_is_clean_and_keeps_zones() {
        let cluster = oci_cluster(true);
        let (_, ctx) = context(&cluster);
        let mut vmi = data_vmi(3, "50Gi");
        let first = reconcile(&ctx, &mut vmi).await.unwrap();
        cluster.clear_calls();

        let second = reconcile(&ctx, &mut vmi).await.unwrap();
        assert!(!second.dirty);
        assert!(cluster.pvcs.mutations().is_empty());
        assert_eq!(first.claim_zones, second.claim_zones);
    }

    #[tokio::test]
    async fn test_non_zonal_class_assigns_no_zone() {
        let cluster = FakeCluster::new();
        cluster
            .storage_classes
            .insert(storage_class("standard", "rancher.io/local-path", false, true));
        cluster.nodes.insert(node("n1", "ad-1"));
        let (_, ctx) = context(&cluster);
        let mut vmi = data_vmi(2, "50Gi");

        let outcome = reconcile(&ctx, &mut vmi).await.unwrap();
        assert!(outcome.claim_zones.is_empty());
        for claim in cluster.pvcs.objects() {
            assert!(claim.spec.unwrap().selector.is_none());
        }
    }

    #[tokio::test]
    async fn test_expandable_class_resizes_in_place() {
        let cluster = oci_cluster(true);
        let (_, ctx) = context(&cluster);
        let mut vmi = data_vmi(2, "50Gi");
        reconcile(&ctx, &mut vmi).await.unwrap();
        cluster.clear_calls();

        vmi.spec.opensearch.data_node.storage.as_mut().unwrap().size = "100Gi".to_string();
        let before = vmi.spec.clone();
        let outcome = reconcile(&ctx, &mut vmi).await.unwrap();

        assert!(outcome.dirty);
        assert_eq!(cluster.pvcs.count(Verb::Replace), 2);
        assert_eq!(cluster.pvcs.count(Verb::Create), 0);
        assert_eq!(vmi.spec, before);
        for claim in cluster.pvcs.objects() {
            assert_eq!(size_of(&claim), "100Gi");
        }
    }

    #[tokio::test]
    async fn test_claims_are_never_shrunk() {
        let cluster = oci_cluster(true);
        let (_, ctx) = context(&cluster);
        let mut vmi = data_vmi(1, "100Gi");
        reconcile(&ctx, &mut vmi).await.unwrap();
        cluster.clear_calls();

        vmi.spec.opensearch.data_node.storage.as_mut().unwrap().size = "10Gi".to_string();
        let outcome = reconcile(&ctx, &mut vmi).await.unwrap();
        assert!(!outcome.dirty);
        assert!(cluster.pvcs.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_fixed_size_class_replaces_claim_in_same_zone() {
        let cluster = oci_cluster(false);
        let (_, ctx) = context(&cluster);
        let mut vmi = data_vmi(2, "50Gi");
        let first = reconcile(&ctx, &mut vmi).await.unwrap();
        for deployment in deployments(&vmi, &OperatorConfig::default(), &first.claim_zones).unwrap() {
            cluster.deployments.insert(deployment);
        }
        cluster.clear_calls();

        vmi.spec.opensearch.data_node.storage.as_mut().unwrap().size = "100Gi".to_string();
        let outcome = reconcile(&ctx, &mut vmi).await.unwrap();

        let names = vmi.spec.opensearch.data_node.storage.clone().unwrap().pvc_names;
        assert!(names[0].starts_with("vmi-system-os-data-0-"));
        assert!(names[1].starts_with("vmi-system-os-data-1-"));
        assert_eq!(cluster.pvcs.count(Verb::Create), 2);
        assert_eq!(cluster.pvcs.count(Verb::Delete), 0, "old claims are still mounted");
        assert_eq!(
            outcome.claim_zones[&names[0]],
            first.claim_zones["vmi-system-os-data-0"]
        );
        let replacement = cluster.pvcs.get_object(&names[0]).unwrap();
        assert_eq!(size_of(&replacement), "100Gi");
    }

    #[tokio::test]
    async fn test_data_resize_requires_resizable_cluster() {
        let cluster = oci_cluster(true);
        let (search, ctx) = context(&cluster);
        let mut vmi = data_vmi(2, "50Gi");
        reconcile(&ctx, &mut vmi).await.unwrap();
        cluster.clear_calls();

        search.set_resizable(false);
        vmi.spec.opensearch.data_node.storage.as_mut().unwrap().size = "100Gi".to_string();
        assert!(reconcile(&ctx, &mut vmi).await.is_err());
        assert_eq!(cluster.pvcs.count(Verb::Replace), 0);
    }

    #[tokio::test]
    async fn test_unreferenced_claims_are_deleted() {
        let cluster = oci_cluster(true);
        let (_, ctx) = context(&cluster);
        let mut vmi = data_vmi(3, "50Gi");
        reconcile(&ctx, &mut vmi).await.unwrap();
        cluster.clear_calls();

        vmi.spec.opensearch.data_node.replicas = 1;
        initialize_defaults(&mut vmi, &OperatorConfig::default());
        let outcome = reconcile(&ctx, &mut vmi).await.unwrap();

        assert!(outcome.dirty);
        assert_eq!(cluster.pvcs.names(), vec!["vmi-system-os-data-0".to_string()]);
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let cluster = oci_cluster(true);
        let (_, ctx) = context(&cluster);
        cluster.pvcs.fail(Verb::List, "apiserver timeout");
        let mut vmi = data_vmi(1, "50Gi");
        let err = reconcile(&ctx, &mut vmi).await.unwrap_err();
        assert!(err.to_string().contains("apiserver timeout"));
    }
}
