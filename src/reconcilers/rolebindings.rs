// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! `RoleBinding` reconciliation.

use anyhow::Result;
use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::ResourceExt;

use super::resources::{reconcile_all, UpdateMode};
use crate::context::Context;
use crate::crd::VerrazzanoMonitoringInstance;

/// Converge the instance's role bindings. Returns whether anything changed.
///
/// # Errors
///
/// Returns an error if a cluster API call fails.
pub async fn reconcile(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
    desired: &[RoleBinding],
) -> Result<bool> {
    reconcile_all(
        ctx.stores.role_bindings.as_ref(),
        &ctx.metrics,
        &vmi.namespace().unwrap_or_default(),
        &vmi.name_any(),
        desired,
        |_| UpdateMode::Replace,
    )
    .await
}

#[cfg(test)]
#[path = "rolebindings_tests.rs"]
mod rolebindings_tests;
