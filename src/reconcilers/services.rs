// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! `Service` reconciliation. Changed services are deleted and recreated,
//! since fields such as `clusterIP` cannot be updated in place.

use anyhow::Result;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;

use super::resources::{reconcile_all, UpdateMode};
use crate::context::Context;
use crate::crd::VerrazzanoMonitoringInstance;

/// Converge the instance's services. Returns whether anything changed.
///
/// # Errors
///
/// Returns an error if a cluster API call fails.
pub async fn reconcile(
    ctx: &Context,
    vmi: &VerrazzanoMonitoringInstance,
    desired: &[Service],
) -> Result<bool> {
    reconcile_all(
        ctx.stores.services.as_ref(),
        &ctx.metrics,
        &vmi.namespace().unwrap_or_default(),
        &vmi.name_any(),
        desired,
        |_| UpdateMode::Recreate,
    )
    .await
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod services_tests;
