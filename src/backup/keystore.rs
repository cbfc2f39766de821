// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Writes object-store credentials into the OpenSearch keystore.

use anyhow::{bail, Context as _, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::constants::KEYSTORE_BINARY;

/// Destination for secure settings such as S3 keys.
#[async_trait]
pub trait SecureSettings: Send + Sync {
    /// Add or overwrite `key`.
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// [`SecureSettings`] backed by the `opensearch-keystore` tool.
pub struct KeystoreCommand {
    binary: PathBuf,
}

impl Default for KeystoreCommand {
    fn default() -> Self {
        Self::new(KEYSTORE_BINARY)
    }
}

impl KeystoreCommand {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl SecureSettings for KeystoreCommand {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut child = Command::new(&self.binary)
            .args(["add", "--stdin", "--force", key])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(value.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            bail!(
                "{} add {key} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        debug!(key = %key, "Keystore entry written");
        Ok(())
    }
}
