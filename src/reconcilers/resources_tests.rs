// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::labels::VMI_LABEL;
    use crate::store::fake::{FakeStore, Verb};
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    const NS: &str = "verrazzano-system";

    fn config_map(name: &str, value: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NS.to_string()),
                labels: Some(BTreeMap::from([(VMI_LABEL.to_string(), "system".to_string())])),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("key".to_string(), value.to_string())])),
            ..Default::default()
        }
    }

    fn metrics() -> MetricsRegistry {
        MetricsRegistry::new().unwrap()
    }

    #[tokio::test]
    async fn test_absent_object_is_created() {
        let store = FakeStore::<ConfigMap>::new();
        let outcome = apply(&store, &metrics(), NS, &config_map("a", "1"), UpdateMode::Replace)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Created);
        assert_eq!(store.count(Verb::Create), 1);
    }

    #[tokio::test]
    async fn test_identical_object_is_left_alone() {
        let store = FakeStore::<ConfigMap>::new();
        store.insert(config_map("a", "1"));
        let outcome = apply(&store, &metrics(), NS, &config_map("a", "1"), UpdateMode::Replace)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_changed_object_is_replaced_with_live_resource_version() {
        let store = FakeStore::<ConfigMap>::new();
        store.insert(config_map("a", "1"));
        let outcome = apply(&store, &metrics(), NS, &config_map("a", "2"), UpdateMode::Replace)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(store.count(Verb::Replace), 1);
        let live = store.get_object("a").unwrap();
        assert_eq!(live.data.unwrap()["key"], "2");
        assert_eq!(live.metadata.generation, Some(2));
    }

    #[tokio::test]
    async fn test_recreate_mode_deletes_then_creates() {
        let store = FakeStore::<ConfigMap>::new();
        store.insert(config_map("a", "1"));
        apply(&store, &metrics(), NS, &config_map("a", "2"), UpdateMode::Recreate)
            .await
            .unwrap();
        let verbs: Vec<Verb> = store.mutations().iter().map(|c| c.verb).collect();
        assert_eq!(verbs, vec![Verb::Delete, Verb::Create]);
    }

    #[tokio::test]
    async fn test_create_only_never_overwrites() {
        let store = FakeStore::<ConfigMap>::new();
        store.insert(config_map("rules", "user-edited"));
        let outcome = apply(
            &store,
            &metrics(),
            NS,
            &config_map("rules", "default"),
            UpdateMode::CreateOnly,
        )
        .await
        .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(store.get_object("rules").unwrap().data.unwrap()["key"], "user-edited");
    }

    #[tokio::test]
    async fn test_unnamed_object_is_skipped() {
        let store = FakeStore::<ConfigMap>::new();
        let mut unnamed = config_map("x", "1");
        unnamed.metadata.name = None;
        let outcome = apply(&store, &metrics(), NS, &unnamed, UpdateMode::Replace)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_api_error_propagates() {
        let store = FakeStore::<ConfigMap>::new();
        store.fail(Verb::Create, "etcd unavailable");
        let err = apply(&store, &metrics(), NS, &config_map("a", "1"), UpdateMode::Replace)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("etcd unavailable"));
    }

    #[tokio::test]
    async fn test_reconcile_all_deletes_only_owned_leftovers() {
        let store = FakeStore::<ConfigMap>::new();
        store.insert(config_map("keep", "1"));
        store.insert(config_map("stale", "1"));
        let mut foreign = config_map("foreign", "1");
        foreign.metadata.labels = None;
        store.insert(foreign);

        let dirty = reconcile_all(
            &store,
            &metrics(),
            NS,
            "system",
            &[config_map("keep", "1")],
            |_| UpdateMode::Replace,
        )
        .await
        .unwrap();

        assert!(dirty);
        assert_eq!(store.names(), vec!["foreign".to_string(), "keep".to_string()]);
    }

    #[tokio::test]
    async fn test_reconcile_all_converged_is_clean() {
        let store = FakeStore::<ConfigMap>::new();
        store.insert(config_map("keep", "1"));
        let dirty = reconcile_all(
            &store,
            &metrics(),
            NS,
            "system",
            &[config_map("keep", "1")],
            |_| UpdateMode::Replace,
        )
        .await
        .unwrap();
        assert!(!dirty);
        assert!(store.mutations().is_empty());
    }
}
