// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_spec_deserializes_camel_case() {
        let yaml = r"
uri: vmi.example.com
storageClass: oci-bv
opensearch:
  enabled: true
  masterNode:
    replicas: 3
  dataNode:
    replicas: 2
    javaOpts: -Xmx1g
    storage:
      size: 50Gi
      pvcNames: [a, b]
  policies:
    - policyName: vz-system
      indexPattern: verrazzano-system*
      minIndexAge: 7d
prometheus:
  enabled: true
  rulesConfigMap: my-rules
";
        let spec: VerrazzanoMonitoringInstanceSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.uri.as_deref(), Some("vmi.example.com"));
        assert_eq!(spec.storage_class.as_deref(), Some("oci-bv"));
        assert_eq!(spec.opensearch.master_node.replicas, 3);
        assert_eq!(spec.opensearch.data_node.java_opts.as_deref(), Some("-Xmx1g"));
        let storage = spec.opensearch.data_node.storage.as_ref().unwrap();
        assert_eq!(storage.pvc_names, vec!["a", "b"]);
        assert_eq!(spec.opensearch.policies[0].index_pattern, "verrazzano-system*");
        assert_eq!(spec.prometheus.rules_config_map.as_deref(), Some("my-rules"));
        assert!(!spec.lock);
        assert!(!spec.alertmanager.enabled);
    }

    #[test]
    fn test_node_count_sums_all_roles() {
        let mut spec = VerrazzanoMonitoringInstanceSpec::default();
        spec.opensearch.master_node.replicas = 3;
        spec.opensearch.ingest_node.replicas = 1;
        spec.opensearch.data_node.replicas = 2;
        assert_eq!(spec.opensearch_node_count(), 6);
    }

    #[test]
    fn test_crd_metadata() {
        let crd = VerrazzanoMonitoringInstance::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("verrazzanomonitoringinstances.verrazzano.io")
        );
        assert_eq!(crd.spec.group, "verrazzano.io");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(
            crd.spec.names.short_names,
            Some(vec!["vmi".to_string()])
        );
        assert_eq!(crd.spec.versions[0].name, "v1");
    }

    #[test]
    fn test_empty_status_serializes_to_empty_object() {
        let status = VerrazzanoMonitoringInstanceStatus::default();
        assert_eq!(serde_json::to_value(&status).unwrap(), serde_json::json!({}));
    }
}
