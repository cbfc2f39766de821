// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! OpenSearch backup and restore, run as a Velero hook.
//!
//! Three operations, each a separate process invocation:
//!
//! - **backup**: register the S3 repository, take a snapshot named after the
//!   Velero backup and wait for it to succeed.
//! - **pre-restore**: reset the OpenSearch operator's bootstrap so the
//!   security index is recreated, then leave the operator scaled down. Writes
//!   a marker naming the backup.
//! - **restore**: refuses to run without a matching marker. Scales ingest and
//!   dashboards down, wipes every index, restores the snapshot, waits for all
//!   data streams to turn green and scales back up.
//!
//! Every step is retried on transient errors with a jittered delay. All waits
//! share one deadline derived from the Velero backup's timeout.

pub mod connection;
pub mod keystore;
pub mod snapshot;
pub mod velero;
pub mod workloads;

use anyhow::Result;
use kube::{Api, Client};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, HOOK_RETRY_MAX_SECS, HOOK_RETRY_MIN_SECS, LOGGING_NAMESPACE,
    OPENSEARCH_BOOTSTRAP_POD, OPENSEARCH_CLUSTER_NAME, OPENSEARCH_DASHBOARDS_DEPLOYMENT,
    OPENSEARCH_INGEST_STATEFULSET, OPENSEARCH_OPERATOR_DEPLOYMENT, S3_ACCESS_KEY_SETTING,
    S3_SECRET_KEY_SETTING, SECURITY_CONFIG_JOB,
};
use crate::errors::{HookError, SearchError};
use crate::reconcilers::retry::{is_retryable_error, poll_until, Deadline};
use connection::{backup_timeout, ConnectionData};
use keystore::{KeystoreCommand, SecureSettings};
use snapshot::{HttpSnapshotApi, SnapshotApi, SnapshotState};
use velero::Backup;
use workloads::{KubeWorkloads, Workload, Workloads};

/// Component the hook knows how to back up.
pub const SUPPORTED_COMPONENT: &str = "opensearch";

/// Hook operation selected on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Operation {
    Backup,
    PreRestore,
    Restore,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::PreRestore => "pre-restore",
            Self::Restore => "restore",
        }
    }
}

/// Everything one hook invocation needs.
#[derive(Clone, Debug)]
pub struct HookOptions {
    pub backup_name: String,
    pub component: String,
    pub operation: Operation,
    pub profile: String,
    /// Namespace holding the Velero objects and the restore marker
    pub namespace: String,
    pub opensearch_url: Url,
}

/// Whether retrying the step that produced `error` may succeed.
fn is_transient(error: &anyhow::Error) -> bool {
    if let Some(e) = error.downcast_ref::<SearchError>() {
        return e.is_transient();
    }
    if let Some(e) = error.downcast_ref::<kube::Error>() {
        return is_retryable_error(e);
    }
    false
}

/// Sequences backup and restore steps against one deadline.
pub struct Orchestrator<'a> {
    search: &'a dyn SnapshotApi,
    workloads: &'a dyn Workloads,
    settings: &'a dyn SecureSettings,
    marker_namespace: String,
    deadline: Deadline,
    retry_min: Duration,
    retry_max: Duration,
}

impl<'a> Orchestrator<'a> {
    #[must_use]
    pub fn new(
        search: &'a dyn SnapshotApi,
        workloads: &'a dyn Workloads,
        settings: &'a dyn SecureSettings,
        marker_namespace: &str,
        budget: Duration,
    ) -> Self {
        Self {
            search,
            workloads,
            settings,
            marker_namespace: marker_namespace.to_string(),
            deadline: Deadline::after(budget),
            retry_min: Duration::from_secs(HOOK_RETRY_MIN_SECS),
            retry_max: Duration::from_secs(HOOK_RETRY_MAX_SECS),
        }
    }

    /// Override the jittered retry delay bounds.
    #[must_use]
    pub fn with_retry_delays(mut self, min: Duration, max: Duration) -> Self {
        self.retry_min = min;
        self.retry_max = max;
        self
    }

    /// Run `step` until it succeeds, fails permanently or the deadline passes.
    async fn retry<T, F, Fut>(&self, what: &str, mut step: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        poll_until(&self.deadline, self.retry_min, self.retry_max, what, || {
            let attempt = step();
            async move {
                match attempt.await {
                    Ok(value) => Ok(Some(value)),
                    Err(e) if is_transient(&e) => {
                        warn!(step = %what, error = %format!("{e:#}"), "Transient failure, retrying");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
        })
        .await
    }

    /// Wait until the cluster answers with a usable health status.
    async fn wait_for_cluster(&self) -> Result<()> {
        let search = self.search;
        poll_until(&self.deadline, self.retry_min, self.retry_max, "OpenSearch cluster", || async move {
            match search.cluster_health().await {
                Ok(status) if status == "green" || status == "yellow" => Ok(Some(())),
                Ok(status) => {
                    debug!(status = %status, "OpenSearch cluster not ready");
                    Ok(None)
                }
                Err(e) if e.is_transient() => {
                    debug!(error = %e, "OpenSearch not reachable yet");
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await?;
        info!("OpenSearch cluster is reachable");
        Ok(())
    }

    /// Put the S3 keys in the keystore and make every node reload them.
    async fn configure_credentials(&self, connection: &ConnectionData) -> Result<()> {
        self.settings
            .put(S3_ACCESS_KEY_SETTING, &connection.access_key)
            .await?;
        self.settings
            .put(S3_SECRET_KEY_SETTING, &connection.secret_key)
            .await?;
        let search = self.search;
        self.retry("reload secure settings", || async move {
            Ok(search.reload_secure_settings().await?)
        })
        .await
    }

    async fn register_repository(&self, connection: &ConnectionData) -> Result<()> {
        let search = self.search;
        self.retry("register snapshot repository", || async move {
            Ok(search.register_repository(connection).await?)
        })
        .await
    }

    /// Take a snapshot named after the Velero backup.
    ///
    /// # Errors
    ///
    /// Fails on any snapshot state other than in progress or success, on a
    /// permanent API error, or when the deadline passes.
    pub async fn backup(&self, connection: &ConnectionData) -> Result<()> {
        let name = connection.backup_name.as_str();
        info!(backup = %name, "Starting OpenSearch backup");
        self.wait_for_cluster().await?;
        self.configure_credentials(connection).await?;
        self.register_repository(connection).await?;

        let search = self.search;
        self.retry("trigger snapshot", || async move {
            Ok(search.trigger_snapshot(name).await?)
        })
        .await?;

        poll_until(&self.deadline, self.retry_min, self.retry_max, "snapshot", || async move {
            match search.snapshot_state(name).await {
                Ok(SnapshotState::Success) => Ok(Some(())),
                Ok(SnapshotState::InProgress) => Ok(None),
                Ok(SnapshotState::NotFound) => Err(HookError::SnapshotFailed {
                    snapshot: name.to_string(),
                    state: "NOT_FOUND".to_string(),
                }
                .into()),
                Ok(SnapshotState::Failure(state)) => Err(HookError::SnapshotFailed {
                    snapshot: name.to_string(),
                    state,
                }
                .into()),
                Err(e) if e.is_transient() => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await?;
        info!(backup = %name, "OpenSearch backup completed");
        Ok(())
    }

    /// Reset the operator-managed cluster so the security bootstrap runs
    /// again, leaving the operator scaled down for the restore.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails permanently or the deadline passes.
    pub async fn pre_restore(&self, backup_name: &str) -> Result<()> {
        info!(backup = %backup_name, "Preparing OpenSearch for restore");
        let workloads = self.workloads;
        let operator = &Workload::deployment(LOGGING_NAMESPACE, OPENSEARCH_OPERATOR_DEPLOYMENT);

        self.retry("scale OpenSearch operator down", || async move {
            workloads.scale(operator, 0).await
        })
        .await?;
        self.retry("reset cluster initialization", || async move {
            workloads
                .reset_cluster_initialization(LOGGING_NAMESPACE, OPENSEARCH_CLUSTER_NAME)
                .await
        })
        .await?;
        self.retry("delete security config job", || async move {
            workloads
                .delete_job(LOGGING_NAMESPACE, SECURITY_CONFIG_JOB)
                .await
        })
        .await?;
        self.retry("scale OpenSearch operator up", || async move {
            workloads.scale(operator, 1).await
        })
        .await?;

        poll_until(&self.deadline, self.retry_min, self.retry_max, "bootstrap pod", || async move {
            match workloads.pod_ready(LOGGING_NAMESPACE, OPENSEARCH_BOOTSTRAP_POD).await {
                Ok(true) => Ok(Some(())),
                Ok(false) => Ok(None),
                Err(e) if is_transient(&e) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await?;
        info!("Bootstrap pod is ready");

        self.retry("scale OpenSearch operator down", || async move {
            workloads.scale(operator, 0).await
        })
        .await?;

        let namespace = self.marker_namespace.as_str();
        self.retry("write restore marker", || async move {
            workloads.set_restore_marker(namespace, backup_name).await
        })
        .await?;
        info!(backup = %backup_name, "OpenSearch prepared for restore");
        Ok(())
    }

    /// Replace every index with the contents of the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::RestoreNotPrepared`] unless pre-restore ran for
    /// the same backup, or an error if any step fails.
    pub async fn restore(&self, connection: &ConnectionData) -> Result<()> {
        let name = connection.backup_name.as_str();
        let workloads = self.workloads;
        let search = self.search;
        let namespace = self.marker_namespace.as_str();

        let marker = self
            .retry("read restore marker", || async move {
                workloads.restore_marker(namespace).await
            })
            .await?;
        if marker.as_deref() != Some(name) {
            warn!(backup = %name, marker = ?marker, "Restore marker missing or for another backup");
            return Err(HookError::RestoreNotPrepared {
                backup: name.to_string(),
            }
            .into());
        }

        info!(backup = %name, "Starting OpenSearch restore");
        let targets = [
            Workload::stateful_set(LOGGING_NAMESPACE, OPENSEARCH_INGEST_STATEFULSET),
            Workload::deployment(LOGGING_NAMESPACE, OPENSEARCH_DASHBOARDS_DEPLOYMENT),
        ];
        for target in &targets {
            self.scale_down(target).await?;
        }

        self.wait_for_cluster().await?;
        self.configure_credentials(connection).await?;
        self.register_repository(connection).await?;
        self.retry("delete data", || async move { Ok(search.delete_data().await?) })
            .await?;
        self.retry("trigger restore", || async move {
            Ok(search.trigger_restore(name).await?)
        })
        .await?;

        poll_until(&self.deadline, self.retry_min, self.retry_max, "data streams", || async move {
            match search.data_streams_restored(name).await {
                Ok(true) => Ok(Some(())),
                Ok(false) => Ok(None),
                Err(e) if e.is_transient() => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await?;
        info!("All data streams are green");

        for target in &targets {
            self.scale_up(target).await?;
        }
        for target in &targets {
            poll_until(&self.deadline, self.retry_min, self.retry_max, "workload readiness", || async move {
                match workloads.is_ready(target).await {
                    Ok(true) => Ok(Some(())),
                    Ok(false) => Ok(None),
                    Err(e) if is_transient(&e) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await?;
            info!(workload = %target, "Workload ready");
        }

        self.retry("clear restore marker", || async move {
            workloads.clear_restore_marker(namespace).await
        })
        .await?;
        info!(backup = %name, "OpenSearch restore completed");
        Ok(())
    }

    /// Scale `target` to zero, remembering its replica count on the object.
    async fn scale_down(&self, target: &Workload) -> Result<()> {
        let workloads = self.workloads;
        let Some(current) = self
            .retry("read replicas", || async move { workloads.replicas(target).await })
            .await?
        else {
            warn!(workload = %target, "Workload not found, not scaling down");
            return Ok(());
        };
        let saved = self
            .retry("read saved replicas", || async move {
                workloads.saved_replicas(target).await
            })
            .await?;
        if saved.is_none() && current > 0 {
            self.retry("save replicas", || async move {
                workloads.save_replicas(target, Some(current)).await
            })
            .await?;
        }
        self.retry("scale down", || async move { workloads.scale(target, 0).await })
            .await
    }

    /// Scale `target` back to its saved replica count.
    async fn scale_up(&self, target: &Workload) -> Result<()> {
        let workloads = self.workloads;
        if self
            .retry("read replicas", || async move { workloads.replicas(target).await })
            .await?
            .is_none()
        {
            warn!(workload = %target, "Workload not found, not scaling up");
            return Ok(());
        }
        let replicas = self
            .retry("read saved replicas", || async move {
                workloads.saved_replicas(target).await
            })
            .await?
            .unwrap_or(1);
        self.retry("scale up", || async move {
            workloads.scale(target, replicas).await
        })
        .await?;
        self.retry("clear saved replicas", || async move {
            workloads.save_replicas(target, None).await
        })
        .await
    }
}

/// Run one hook operation against the cluster.
///
/// # Errors
///
/// Returns an error for an unsupported component or when the operation fails.
pub async fn run(client: Client, options: &HookOptions) -> Result<()> {
    if options.component != SUPPORTED_COMPONENT {
        return Err(HookError::InvalidConfig(format!(
            "unsupported component '{}', only '{SUPPORTED_COMPONENT}' can be backed up",
            options.component
        ))
        .into());
    }

    let search = HttpSnapshotApi::new(
        options.opensearch_url.clone(),
        Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
    )?;
    let workloads = KubeWorkloads::new(client.clone());
    let settings = KeystoreCommand::default();

    match options.operation {
        Operation::PreRestore => {
            let backup = Api::<Backup>::namespaced(client, &options.namespace)
                .get(&options.backup_name)
                .await?;
            Orchestrator::new(
                &search,
                &workloads,
                &settings,
                &options.namespace,
                backup_timeout(&backup),
            )
            .pre_restore(&options.backup_name)
            .await
        }
        Operation::Backup | Operation::Restore => {
            let connection = ConnectionData::gather(
                &client,
                &options.namespace,
                &options.backup_name,
                &options.profile,
            )
            .await?;
            let orchestrator = Orchestrator::new(
                &search,
                &workloads,
                &settings,
                &options.namespace,
                connection.timeout,
            );
            if options.operation == Operation::Backup {
                orchestrator.backup(&connection).await
            } else {
                orchestrator.restore(&connection).await
            }
        }
    }
}
