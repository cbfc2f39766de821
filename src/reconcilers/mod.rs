// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Reconciliation of `VerrazzanoMonitoringInstance` resources.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the level-triggered Kubernetes controller pattern:
//!
//! 1. **Watch** - [`crate::controller`] schedules a pass when an instance or
//!    one of its workloads changes
//! 2. **Reconcile** - [`engine::reconcile`] builds the desired objects and
//!    hands each kind to its reconciler
//! 3. **Converge** - Each reconciler diffs desired against live objects and
//!    creates, updates or deletes as needed
//! 4. **Status** - A pass that changed nothing stamps the instance status
//!
//! # Reconcilers
//!
//! - [`rolebindings`], [`configmaps`], [`services`], [`ingresses`] - plain
//!   desired-vs-live convergence through [`resources`]
//! - [`pvcs`] - claim placement across zones, growth and orphan cleanup
//! - [`statefulsets`] - the OpenSearch master tier, one health-gated step
//!   per pass
//! - [`deployments`] - single workloads and rolling groups, one member per
//!   pass
//!
//! # Example
//!
//! ```rust,no_run
//! use vmo::context::Context;
//! use vmo::reconcilers::engine::{reconcile, PassOutcome};
//!
//! async fn run_once(ctx: &Context) -> anyhow::Result<bool> {
//!     let outcome = reconcile(ctx, "verrazzano-system", "system").await?;
//!     Ok(outcome == PassOutcome::Converged)
//! }
//! ```

pub mod configmaps;
pub mod defaults;
pub mod deployments;
pub mod engine;
pub mod ingresses;
pub mod pvcs;
pub mod resources;
pub mod retry;
pub mod rolebindings;
pub mod services;
pub mod statefulsets;

pub use engine::{reconcile, PassOutcome};

/// Check if a status value has actually changed compared to the current status.
///
/// Writing an unchanged status still produces a watch event, so callers only
/// patch when this returns `true`.
#[must_use]
pub fn status_changed<T: PartialEq>(current_value: &Option<T>, new_value: &Option<T>) -> bool {
    current_value != new_value
}
