// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! The subset of Velero's `Backup` and `BackupStorageLocation` resources the
//! hook reads. Velero owns these CRDs; they are never generated by `crdgen`.

use k8s_openapi::api::core::v1::SecretKeySelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Velero backup. Only the storage location and timeouts matter here.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(group = "velero.io", version = "v1", kind = "Backup", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    /// Name of the `BackupStorageLocation` the backup is written to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<String>,

    /// Go duration bounding asynchronous item operations, e.g. `4h0m0s`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_operation_timeout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csi_snapshot_timeout: Option<String>,
}

/// Velero object-store target.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "BackupStorageLocation",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorageLocationSpec {
    #[serde(default)]
    pub provider: String,

    #[serde(default)]
    pub object_storage: ObjectStorageLocation,

    /// Provider settings: `region`, `s3Url`, `s3ForcePathStyle`
    #[serde(default)]
    pub config: BTreeMap<String, String>,

    /// Secret holding an AWS-style credentials file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<SecretKeySelector>,

    #[serde(default)]
    pub default: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStorageLocation {
    #[serde(default)]
    pub bucket: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}
