// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Velero hook that backs up and restores the Verrazzano OpenSearch cluster.
//!
//! Usage:
//!   verrazzano-backup-hook --velero-backup-name nightly --operation backup
//!
//! Logs go to stdout and to `verrazzano-<operation>-hook-*.log` in the
//! temporary directory, which Velero collects with the pod. Both use the
//! `RUST_LOG_FORMAT` format, compact text unless it is `json`.

use anyhow::{Context as _, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;
use vmo::backup::{run, HookOptions, Operation, SUPPORTED_COMPONENT};
use vmo::constants::{DEFAULT_BACKUP_NAMESPACE, DEFAULT_HOOK_OPENSEARCH_URL};

#[derive(Debug, Parser)]
#[command(name = "verrazzano-backup-hook", version, about)]
struct Args {
    /// Name of the Velero backup being taken or restored
    #[arg(long)]
    velero_backup_name: String,

    /// Component to back up
    #[arg(long, default_value = SUPPORTED_COMPONENT)]
    component: String,

    #[arg(long, value_enum)]
    operation: Operation,

    /// Profile in the object-store credentials file
    #[arg(long, default_value = "default")]
    profile: String,

    /// Namespace of the Velero backup objects
    #[arg(long, default_value = DEFAULT_BACKUP_NAMESPACE)]
    namespace: String,

    #[arg(long, default_value = DEFAULT_HOOK_OPENSEARCH_URL)]
    opensearch_url: Url,
}

impl Args {
    fn options(&self) -> HookOptions {
        HookOptions {
            backup_name: self.velero_backup_name.clone(),
            component: self.component.clone(),
            operation: self.operation,
            profile: self.profile.clone(),
            namespace: self.namespace.clone(),
            opensearch_url: self.opensearch_url.clone(),
        }
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
        Err(e) => {
            // --help and --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let log_path = match init_tracing(args.operation) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Unable to set up logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .thread_name("vmo-hook")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Unable to start runtime");
            return ExitCode::FAILURE;
        }
    };

    let options = args.options();
    match runtime.block_on(async_main(&options)) {
        Ok(()) => {
            info!(operation = options.operation.as_str(), log = %log_path.display(), "Hook finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(
                operation = options.operation.as_str(),
                backup = %options.backup_name,
                error = %format!("{e:#}"),
                "Hook failed"
            );
            ExitCode::FAILURE
        }
    }
}

async fn async_main(options: &HookOptions) -> Result<()> {
    info!(
        operation = options.operation.as_str(),
        backup = %options.backup_name,
        component = %options.component,
        namespace = %options.namespace,
        "Starting hook"
    );
    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    run(client, options).await
}

/// Whether `RUST_LOG_FORMAT` asks for JSON rather than compact text.
fn json_format(log_format: Option<&str>) -> bool {
    log_format.is_some_and(|f| f.eq_ignore_ascii_case("json"))
}

/// Log to stdout and to a kept temporary file named after the operation.
///
/// Both sinks use the format selected by `RUST_LOG_FORMAT` (`json` or `text`).
fn init_tracing(operation: Operation) -> Result<std::path::PathBuf> {
    let file = tempfile::Builder::new()
        .prefix(&format!("verrazzano-{}-hook-", operation.as_str()))
        .suffix(".log")
        .tempfile()
        .context("Failed to create log file")?;
    let (file, path) = file.keep().context("Failed to keep log file")?;
    let file = Mutex::new(file);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json_format(std::env::var("RUST_LOG_FORMAT").ok().as_deref()) {
        registry
            .with(fmt::layer().with_target(false).json())
            .with(fmt::layer().with_target(false).with_ansi(false).json().with_writer(file))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).compact())
            .with(fmt::layer().with_target(false).with_ansi(false).compact().with_writer(file))
            .init();
    }
    Ok(path)
}
