// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! `Ingress` reconciliation. Ingresses left over after `uri` is cleared or a
//! component is disabled are deleted.

use anyhow::Result;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;

use super::resources::{reconcile_all, UpdateMode};
use crate::context::Context;
use crate::crd::VerrazzanoMonitoringInstance;

/// Converge the instance's ingresses. Returns whether anything changed.
///
/// # Errors
///
/// Returns an error if a cluster API call fails.
pub async fn reconcile(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
    desired: &[Ingress],
) -> Result<bool> {
    reconcile_all(
        ctx.stores.ingresses.as_ref(),
        &ctx.metrics,
        &vmi.namespace().unwrap_or_default(),
        &vmi.name_any(),
        desired,
        |_| UpdateMode::Replace,
    )
    .await
}

#[cfg(test)]
#[path = "ingresses_tests.rs"]
mod ingresses_tests;
