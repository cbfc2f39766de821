// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Object-store connection details gathered once per hook run.
//!
//! Everything comes from one Velero `Backup`, the `BackupStorageLocation` it
//! names, and the credentials secret that location points at. Nothing here is
//! persisted.

use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use super::velero::{Backup, BackupStorageLocation};
use crate::constants::{DEFAULT_CREDENTIALS_KEY, DEFAULT_CREDENTIALS_SECRET, DEFAULT_HOOK_TIMEOUT_SECS};
use crate::errors::HookError;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_LOCATION: &str = "default";

/// Credentials and target of the snapshot repository.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionData {
    pub backup_name: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub endpoint: String,

    /// Global budget for every wait in this hook run
    pub timeout: Duration,
}

impl fmt::Debug for ConnectionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionData")
            .field("backup_name", &self.backup_name)
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ConnectionData {
    /// Build the connection from already fetched Velero objects and the
    /// credentials file stored in the location's secret.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::MissingCredentials`] if `profile` is absent or
    /// incomplete, and [`HookError::InvalidConfig`] if the location has no bucket.
    pub fn from_velero(
        backup: &Backup,
        location: &BackupStorageLocation,
        credentials: &str,
        profile: &str,
    ) -> Result<Self, HookError> {
        let bucket = location.spec.object_storage.bucket.trim();
        if bucket.is_empty() {
            return Err(HookError::InvalidConfig(
                "backup storage location has no bucket".to_string(),
            ));
        }

        let (access_key, secret_key) = parse_credentials(credentials, profile)?;
        let region = location
            .spec
            .config
            .get("region")
            .filter(|r| !r.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = location
            .spec
            .config
            .get("s3Url")
            .filter(|u| !u.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("https://s3.{region}.amazonaws.com"));

        Ok(Self {
            backup_name: backup.metadata.name.clone().unwrap_or_default(),
            access_key,
            secret_key,
            bucket: bucket.to_string(),
            region,
            endpoint,
            timeout: backup_timeout(backup),
        })
    }

    /// Read the Velero backup, its storage location and credentials secret.
    ///
    /// # Errors
    ///
    /// Returns an error if any object is missing or unusable.
    pub async fn gather(
        client: &Client,
        namespace: &str,
        backup_name: &str,
        profile: &str,
    ) -> Result<Self> {
        let backups: Api<Backup> = Api::namespaced(client.clone(), namespace);
        let backup = backups
            .get(backup_name)
            .await
            .with_context(|| format!("Failed to read Velero backup {namespace}/{backup_name}"))?;

        let location_name = backup
            .spec
            .storage_location
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        let locations: Api<BackupStorageLocation> = Api::namespaced(client.clone(), namespace);
        let location = locations.get(&location_name).await.with_context(|| {
            format!("Failed to read BackupStorageLocation {namespace}/{location_name}")
        })?;

        let (secret_name, secret_key) = location.spec.credential.as_ref().map_or_else(
            || {
                (
                    DEFAULT_CREDENTIALS_SECRET.to_string(),
                    DEFAULT_CREDENTIALS_KEY.to_string(),
                )
            },
            |c| (c.name.clone(), c.key.clone()),
        );
        debug!(secret = %secret_name, key = %secret_key, "Reading object store credentials");

        let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
        let secret = secrets
            .get(&secret_name)
            .await
            .with_context(|| format!("Failed to read credentials secret {namespace}/{secret_name}"))?;
        let raw = secret
            .data
            .as_ref()
            .and_then(|data| data.get(&secret_key))
            .ok_or_else(|| {
                HookError::MissingCredentials(format!("secret {secret_name} has no key {secret_key}"))
            })?;
        let credentials = String::from_utf8(raw.0.clone()).map_err(|_| {
            HookError::MissingCredentials(format!("secret {secret_name}/{secret_key} is not UTF-8"))
        })?;

        let connection = Self::from_velero(&backup, &location, &credentials, profile)?;
        info!(
            backup = %connection.backup_name,
            bucket = %connection.bucket,
            region = %connection.region,
            endpoint = %connection.endpoint,
            timeout = ?connection.timeout,
            "Object store connection resolved"
        );
        Ok(connection)
    }
}

/// Extract `aws_access_key_id` and `aws_secret_access_key` for `profile`
/// from an AWS-style credentials file.
///
/// # Errors
///
/// Returns [`HookError::MissingCredentials`] if the profile or either key is missing.
pub fn parse_credentials(file: &str, profile: &str) -> Result<(String, String), HookError> {
    let mut in_profile = false;
    let mut found_profile = false;
    let mut access_key = None;
    let mut secret_key = None;

    for line in file.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile = section.trim() == profile;
            found_profile |= in_profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "aws_access_key_id" => access_key = Some(value.trim().to_string()),
                "aws_secret_access_key" => secret_key = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    if !found_profile {
        return Err(HookError::MissingCredentials(format!(
            "profile '{profile}' not found in credentials file"
        )));
    }
    match (access_key, secret_key) {
        (Some(a), Some(s)) if !a.is_empty() && !s.is_empty() => Ok((a, s)),
        _ => Err(HookError::MissingCredentials(format!(
            "profile '{profile}' lacks aws_access_key_id or aws_secret_access_key"
        ))),
    }
}

/// Parse a Go duration string such as `4h0m0s`, `90s` or `1.5h`.
///
/// Values too large for a [`Duration`] are rejected like any other malformed input.
#[must_use]
pub fn parse_go_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw == "0" {
        return Some(Duration::ZERO);
    }
    if raw.is_empty() {
        return None;
    }

    let mut total = 0.0_f64;
    let mut rest = raw;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 1e-3,
            "us" | "µs" => 1e-6,
            "ns" => 1e-9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * seconds_per_unit;
    }
    Duration::try_from_secs_f64(total).ok()
}

/// Hook budget derived from the backup, falling back to the default.
#[must_use]
pub fn backup_timeout(backup: &Backup) -> Duration {
    [
        backup.spec.item_operation_timeout.as_deref(),
        backup.spec.csi_snapshot_timeout.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter_map(parse_go_duration)
    .find(|d| !d.is_zero())
    .unwrap_or(Duration::from_secs(DEFAULT_HOOK_TIMEOUT_SECS))
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod connection_tests;
