// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # VMO - Verrazzano Monitoring Operator
//!
//! A Kubernetes operator that converges `VerrazzanoMonitoringInstance`
//! resources into the workloads of a monitoring stack: an OpenSearch
//! cluster (master, ingest and data tiers), OpenSearch Dashboards,
//! Prometheus and Alertmanager, with their config maps, services, ingresses,
//! role bindings and persistent volume claims.
//!
//! The same crate ships the OpenSearch backup/restore hook invoked by Velero.
//!
//! ## Modules
//!
//! - [`crd`] - `VerrazzanoMonitoringInstance` custom resource
//! - [`reconcilers`] - one reconciliation pass and the per-kind reconcilers
//! - [`vmi_resources`] - desired objects for an instance
//! - [`diff`] - field-level comparison of live and desired objects
//! - [`store`] - narrow per-kind cluster access, with in-memory fakes
//! - [`opensearch`] - health gating, ISM policies and index settings
//! - [`controller`] - `kube` controller wiring, stall tracking and retry backoff
//! - [`server`] - `/health` and `/metrics` endpoints
//! - [`backup`] - OpenSearch snapshot backup and restore orchestration
//!
//! ## Example
//!
//! ```rust,no_run
//! use vmo::crd::{OpenSearchSpec, VerrazzanoMonitoringInstanceSpec};
//!
//! let spec = VerrazzanoMonitoringInstanceSpec {
//!     uri: Some("vmi.system.example.com".to_string()),
//!     opensearch: OpenSearchSpec {
//!         enabled: true,
//!         ..OpenSearchSpec::default()
//!     },
//!     ..VerrazzanoMonitoringInstanceSpec::default()
//! };
//! ```

pub mod backup;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod diff;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod opensearch;
pub mod reconcilers;
pub mod scrape_config;
pub mod server;
pub mod store;
pub mod vmi_resources;
pub mod zones;
