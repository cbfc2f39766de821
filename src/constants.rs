// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Global constants for the monitoring operator and the backup hook.
//!
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `VerrazzanoMonitoringInstance` CRD
pub const API_GROUP: &str = "verrazzano.io";

/// API version for the `VerrazzanoMonitoringInstance` CRD
pub const API_VERSION: &str = "v1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "verrazzano.io/v1";

/// Prefix applied to every object generated for an instance (`vmi-<name>-...`)
pub const RESOURCE_NAME_PREFIX: &str = "vmi";

/// Field manager used for patches issued by the operator
pub const FIELD_MANAGER: &str = "verrazzano-monitoring-operator";

// ============================================================================
// Component Names
// ============================================================================

pub const COMPONENT_OPENSEARCH_MASTER: &str = "os-master";
pub const COMPONENT_OPENSEARCH_INGEST: &str = "os-ingest";
pub const COMPONENT_OPENSEARCH_DATA: &str = "os-data";
pub const COMPONENT_DASHBOARDS: &str = "osd";
pub const COMPONENT_PROMETHEUS: &str = "prometheus";
pub const COMPONENT_ALERTMANAGER: &str = "alertmanager";

// ============================================================================
// Ports
// ============================================================================

/// OpenSearch REST port
pub const OPENSEARCH_HTTP_PORT: i32 = 9200;

/// OpenSearch node-to-node transport port
pub const OPENSEARCH_TRANSPORT_PORT: i32 = 9300;

/// OpenSearch Dashboards UI port
pub const DASHBOARDS_PORT: i32 = 5601;

/// Prometheus server port
pub const PROMETHEUS_PORT: i32 = 9090;

/// Alertmanager web port
pub const ALERTMANAGER_PORT: i32 = 9093;

/// Alertmanager gossip port used by the headless cluster service
pub const ALERTMANAGER_CLUSTER_PORT: i32 = 9094;

// ============================================================================
// Storage
// ============================================================================

/// Node label carrying the availability domain / zone of a node
pub const ZONE_LABEL: &str = "topology.kubernetes.io/zone";

/// Annotation marking the cluster default `StorageClass`
pub const DEFAULT_STORAGE_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

/// Provisioner that honours a zone label selector on claims
pub const OCI_VOLUME_PROVISIONER: &str = "oracle.com/oci";

/// Key of the storage request on a `PersistentVolumeClaim`
pub const STORAGE_RESOURCE: &str = "storage";

/// Mount path of OpenSearch data volumes
pub const OPENSEARCH_DATA_PATH: &str = "/usr/share/opensearch/data";

/// Mount path of Prometheus TSDB volumes
pub const PROMETHEUS_DATA_PATH: &str = "/prometheus";

/// Minimum number of data nodes before data volumes may be resized or removed
pub const MIN_DATA_NODES_FOR_RESIZE: i32 = 2;

/// Length of the random suffix appended to replacement claim names
pub const CLAIM_SUFFIX_LEN: usize = 5;

// ============================================================================
// Reconciliation
// ============================================================================

/// Requeue interval after a clean reconciliation pass (5 minutes)
pub const RESYNC_INTERVAL_SECS: u64 = 300;

/// Requeue interval while a pass is still rolling changes out
pub const PENDING_REQUEUE_SECS: u64 = 10;

/// Default number of concurrent reconciliation passes
pub const DEFAULT_WORKER_COUNT: u16 = 5;

/// A running pass must finish within this window for the operator to report healthy
pub const STALL_THRESHOLD_SECS: u64 = 60;

/// Initial per-instance retry delay after a failed pass
pub const RETRY_BASE_DELAY_MILLIS: u64 = 5;

/// Maximum per-instance retry delay after repeated failures
pub const RETRY_MAX_DELAY_SECS: u64 = 300;

/// Interval at which failed metric registrations are retried
pub const METRICS_RETRY_INTERVAL_SECS: u64 = 30;

/// Instance state written once a pass completes cleanly
pub const STATE_RUNNING: &str = "Running";

/// Port serving `/health`
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Port serving `/metrics`
pub const DEFAULT_METRICS_PORT: u16 = 9100;

// ============================================================================
// OpenSearch
// ============================================================================

/// Default OpenSearch version targeted when the instance does not set one
pub const DEFAULT_OPENSEARCH_VERSION: &str = "2.3.0";

/// Per-request timeout for OpenSearch HTTP calls
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Description stamped on ISM policies owned by the operator
pub const MANAGED_POLICY_DESCRIPTION: &str = "ISM policy managed by the Verrazzano monitoring operator";

/// Replica auto-expansion applied to indices on single-node clusters
pub const SINGLE_NODE_AUTO_EXPAND: &str = "0-1";

// ============================================================================
// Backup Hook
// ============================================================================

/// Namespace Velero runs in by default
pub const DEFAULT_BACKUP_NAMESPACE: &str = "verrazzano-backup";

/// Namespace of the operator-managed OpenSearch cluster
pub const LOGGING_NAMESPACE: &str = "verrazzano-logging";

/// OpenSearch operator deployment scaled around a restore
pub const OPENSEARCH_OPERATOR_DEPLOYMENT: &str = "opensearch-operator-controller-manager";

/// Name of the operator-managed `OpenSearchCluster`
pub const OPENSEARCH_CLUSTER_NAME: &str = "opensearch";

/// Ingest tier scaled down during restore
pub const OPENSEARCH_INGEST_STATEFULSET: &str = "opensearch-es-ingest";

/// Dashboards deployment scaled down during restore
pub const OPENSEARCH_DASHBOARDS_DEPLOYMENT: &str = "opensearch-dashboards";

/// Security setup job left behind by a previous bootstrap
pub const SECURITY_CONFIG_JOB: &str = "opensearch-securityconfig-update";

/// Snapshot repository registered for Verrazzano backups
pub const SNAPSHOT_REPOSITORY: &str = "verrazzano-backup";

/// OpenSearch endpoint seen by the hook (it runs inside the OpenSearch pod)
pub const DEFAULT_HOOK_OPENSEARCH_URL: &str = "http://127.0.0.1:9200";

/// Marker written by pre-restore and required by restore
pub const RESTORE_MARKER_CONFIGMAP: &str = "verrazzano-opensearch-restore-marker";

/// Data key in the restore marker holding the backup name
pub const RESTORE_MARKER_BACKUP_KEY: &str = "backup";

/// Annotation recording a workload's replica count before restore scaled it down
pub const RESTORE_REPLICAS_ANNOTATION: &str = "verrazzano.io/restore-replicas";

/// Timeout used when the Velero backup does not carry one (10 minutes)
pub const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 600;

/// Lower bound of the hook's jittered retry delay
pub const HOOK_RETRY_MIN_SECS: u64 = 5;

/// Upper bound of the hook's jittered retry delay
pub const HOOK_RETRY_MAX_SECS: u64 = 20;

/// Pod that runs the security bootstrap after the cluster is reset
pub const OPENSEARCH_BOOTSTRAP_POD: &str = "opensearch-bootstrap-0";

/// Group, version and plural of the OpenSearch operator's cluster resource
pub const OPENSEARCH_CLUSTER_GROUP: &str = "opensearch.opster.io";
pub const OPENSEARCH_CLUSTER_VERSION: &str = "v1";
pub const OPENSEARCH_CLUSTER_KIND: &str = "OpenSearchCluster";
pub const OPENSEARCH_CLUSTER_PLURAL: &str = "opensearchclusters";

/// Secret and key Velero reads credentials from when the location names none
pub const DEFAULT_CREDENTIALS_SECRET: &str = "cloud-credentials";
pub const DEFAULT_CREDENTIALS_KEY: &str = "cloud";

/// `opensearch-keystore` inside the OpenSearch container
pub const KEYSTORE_BINARY: &str = "/usr/share/opensearch/bin/opensearch-keystore";

/// Keystore entries read by the `default` S3 client
pub const S3_ACCESS_KEY_SETTING: &str = "s3.client.default.access_key";
pub const S3_SECRET_KEY_SETTING: &str = "s3.client.default.secret_key";
