// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Structured error types for OpenSearch calls, reconciliation and the backup hook.
//!
//! Control flow code returns `anyhow::Result`; these enums are the typed leaves
//! that callers match on (health gating, retry classification, exit codes).

use reqwest::StatusCode;
use thiserror::Error;

use crate::reconcilers::retry::is_retryable_http_status;

/// Errors returned by the OpenSearch REST client.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Connection, TLS or timeout failure before a response arrived
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Any response outside the expected status codes
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: StatusCode,
        body: String,
    },

    /// Response body did not match the expected JSON shape
    #[error("unable to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// Cluster health is not `green`
    #[error("OpenSearch cluster health is {status}, expected green")]
    NotGreen { status: String },

    /// At least one node runs a different version than the instance targets
    #[error("OpenSearch node {node} runs version {actual}, expected {expected}")]
    VersionMismatch {
        node: String,
        actual: String,
        expected: String,
    },

    /// Number of nodes reporting settings differs from the configured replicas
    #[error("OpenSearch reports {actual} nodes, expected {expected}")]
    NodeCountMismatch { actual: usize, expected: usize },

    /// Data tier too small to move shards off a node
    #[error("OpenSearch data tier has {replicas} nodes, at least {minimum} are needed to resize")]
    NotResizable { replicas: i32, minimum: i32 },

    /// `_nodes/reload_secure_settings` reported a failure on some node
    #[error("reloading secure settings failed on {failed} of {total} nodes")]
    ReloadFailed { failed: u64, total: u64 },

    /// Endpoint could not be built from configuration
    #[error("invalid OpenSearch URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl SearchError {
    /// Whether a retry with backoff may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::NotGreen { .. } => true,
            Self::Status { status, .. } => is_retryable_http_status(*status),
            _ => false,
        }
    }

    /// HTTP status of the failed call, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised by the reconciliation engine itself.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A gated step needs a green cluster
    #[error("OpenSearch cluster for {instance} is not healthy")]
    ClusterNotHealthy { instance: String },

    /// Claims selected by a StatefulSet do not match replicas x claim templates
    #[error("StatefulSet {name} selects {found} claims, expected {expected}")]
    PvcCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// One or more resource kinds failed during a pass
    #[error("reconciliation of {key} failed: {}", .errors.join("; "))]
    PassFailed { key: String, errors: Vec<String> },
}

/// Failure of a controller-driven pass, as handed to the error policy.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct ControllerError(#[from] anyhow::Error);

/// Errors that terminate the backup hook with a non-zero exit code.
#[derive(Error, Debug)]
pub enum HookError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Kube(#[from] kube::Error),

    /// The global deadline elapsed while waiting on `what`
    #[error("timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    /// Snapshot or restore reached a terminal state other than success
    #[error("snapshot {snapshot} ended in state {state}")]
    SnapshotFailed { snapshot: String, state: String },

    /// Credentials secret or profile missing from the backup storage location
    #[error("no usable credentials: {0}")]
    MissingCredentials(String),

    /// Velero objects lack fields the hook depends on
    #[error("invalid backup configuration: {0}")]
    InvalidConfig(String),

    /// Restore was invoked without a matching pre-restore marker
    #[error("restore of backup {backup} was not prepared by pre-restore")]
    RestoreNotPrepared { backup: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
