// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `diff.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use k8s_openapi::api::core::v1::{ConfigMap, Service, ServicePort, ServiceSpec};
    use kube::api::ObjectMeta;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn config_map(data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("vmi-system-os-config".to_string()),
                namespace: Some("verrazzano-system".to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_objects_have_no_diff() {
        let cm = config_map(&[("a", "1")]);
        assert_eq!(diff(&cm, &cm), "");
    }

    #[test]
    fn test_server_metadata_is_ignored() {
        let desired = config_map(&[("a", "1")]);
        let mut live = desired.clone();
        live.metadata.resource_version = Some("42".to_string());
        live.metadata.uid = Some("1234".to_string());
        live.metadata.generation = Some(7);
        assert_eq!(diff(&live, &desired), "");
    }

    #[test]
    fn test_changed_data_is_reported() {
        let live = config_map(&[("a", "1")]);
        let desired = config_map(&[("a", "2")]);
        assert_eq!(diff(&live, &desired), r#"data.a: "1" -> "2""#);
    }

    #[test]
    fn test_server_defaults_are_ignored() {
        let desired = Service {
            metadata: ObjectMeta {
                name: Some("vmi-system-prometheus".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                ports: Some(vec![ServicePort {
                    name: Some("http".to_string()),
                    port: 9090,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut live = desired.clone();
        if let Some(spec) = live.spec.as_mut() {
            spec.cluster_ip = Some("10.0.0.12".to_string());
            spec.type_ = Some("ClusterIP".to_string());
            if let Some(ports) = spec.ports.as_mut() {
                ports[0].protocol = Some("TCP".to_string());
            }
        }
        assert_eq!(diff(&live, &desired), "");
    }

    #[test]
    fn test_array_length_change_is_reported() {
        let live = json!({"spec": {"ports": [{"port": 1}]}});
        let desired = json!({"spec": {"ports": [{"port": 1}, {"port": 2}]}});
        assert!(diff_values(&live, &desired).starts_with("spec.ports:"));
    }

    #[test]
    fn test_empty_desired_collections_match_absent_fields() {
        let live = json!({"metadata": {"name": "x"}});
        let desired = json!({"metadata": {"name": "x", "labels": {}}, "items": []});
        assert_eq!(diff_values(&live, &desired), "");
    }

    #[test]
    fn test_multiple_changes_one_per_line() {
        let live = json!({"spec": {"replicas": 1, "image": "a"}});
        let desired = json!({"spec": {"replicas": 2, "image": "b"}});
        let report = diff_values(&live, &desired);
        assert_eq!(report.lines().count(), 2);
        assert!(report.contains("spec.replicas: 1 -> 2"));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("1Ki"), Some(1024.0));
        assert_eq!(parse_quantity("2Gi"), Some(2.0 * 1_073_741_824.0));
        assert_eq!(parse_quantity("1.5G"), Some(1.5e9));
        assert_eq!(parse_quantity("100"), Some(100.0));
        assert!(parse_quantity("100Gi").unwrap() > parse_quantity("50Gi").unwrap());
        assert!(parse_quantity("1Ti").unwrap() > parse_quantity("1000Gi").unwrap());
        assert_eq!(parse_quantity("lots"), None);
    }

    #[test]
    fn test_canonicalized_quantities_are_not_drift() {
        let live = json!({"spec": {"containers": [{"resources": {
            "requests": {"cpu": "1", "memory": "1Gi"},
            "limits": {"memory": "2Gi"}
        }}]}});
        let desired = json!({"spec": {"containers": [{"resources": {
            "requests": {"cpu": "1000m", "memory": "1024Mi"},
            "limits": {"memory": "2048Mi"}
        }}]}});
        assert_eq!(diff_values(&live, &desired), "");
    }

    #[test]
    fn test_changed_quantity_is_reported() {
        let live = json!({"spec": {"resources": {"requests": {"cpu": "1", "storage": "50Gi"}}}});
        let desired = json!({"spec": {"resources": {"requests": {"cpu": "2", "storage": "51200Mi"}}}});
        assert_eq!(
            diff_values(&live, &desired),
            r#"spec.resources.requests.cpu: "1" -> "2""#
        );
    }

    #[test]
    fn test_quantity_equivalence_only_applies_to_quantity_fields() {
        let live = json!({"data": {"heap": "1Gi"}});
        let desired = json!({"data": {"heap": "1024Mi"}});
        assert_eq!(diff_values(&live, &desired), r#"data.heap: "1Gi" -> "1024Mi""#);
    }

    #[test]
    fn test_typed_claim_with_server_form_quantity_matches() {
        use k8s_openapi::api::core::v1::{
            PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
        };
        use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

        let claim = |size: &str| PersistentVolumeClaim {
            spec: Some(PersistentVolumeClaimSpec {
                resources: Some(VolumeResourceRequirements {
                    requests: Some(BTreeMap::from([(
                        "storage".to_string(),
                        Quantity(size.to_string()),
                    )])),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(diff(&claim("1Ti"), &claim("1024Gi")), "");
        assert!(!diff(&claim("1Ti"), &claim("2Ti")).is_empty());
    }

    #[test]
    fn test_status_differences_are_ignored() {
        let live = json!({"status": {"readyReplicas": 1}});
        let desired = json!({"status": {"readyReplicas": 3}});
        assert_eq!(diff_values(&live, &desired), "");
    }
}
