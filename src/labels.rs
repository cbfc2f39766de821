// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! Every object the operator creates for an instance carries the standard
//! Kubernetes labels plus [`VMI_LABEL`], which is what orphan cleanup selects on.

use std::collections::BTreeMap;

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture (e.g., "os-data")
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of`
pub const PART_OF_VERRAZZANO: &str = "verrazzano";

/// Value for `app.kubernetes.io/managed-by`
pub const MANAGED_BY_VMO: &str = "verrazzano-monitoring-operator";

// ============================================================================
// Operator-Specific Labels
// ============================================================================

/// Pod selector label, `vmi-<instance>-<component>`
pub const APP_LABEL: &str = "app";

/// Label naming the owning `VerrazzanoMonitoringInstance`
pub const VMI_LABEL: &str = "verrazzano.io/vmi";

/// Label grouping Deployments that must be rolled one at a time
pub const ROLLING_GROUP_LABEL: &str = "verrazzano.io/rolling-group";

// ============================================================================
// Annotations
// ============================================================================

/// Marks a `ConfigMap` the operator creates once and never overwrites
pub const CREATE_ONLY_ANNOTATION: &str = "verrazzano.io/create-only";

/// Schema version of the managed Prometheus configuration
pub const PROMETHEUS_CONFIG_VERSION_ANNOTATION: &str = "verrazzano.io/prometheus-config-version";

/// Selector matching every object owned by an instance.
#[must_use]
pub fn owned_selector(instance_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(VMI_LABEL.to_string(), instance_name.to_string())])
}
