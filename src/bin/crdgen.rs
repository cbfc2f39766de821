// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates the `VerrazzanoMonitoringInstance` CRD from the Rust types in
//! src/crd.rs so deploy/crds/ never drifts from the code.
//!
//! Usage:
//!   cargo run --bin crdgen            # writes deploy/crds/
//!   cargo run --bin crdgen -- -       # prints to stdout

use kube::CustomResourceExt;
use std::fs;
use std::path::Path;
use vmo::crd::VerrazzanoMonitoringInstance;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let yaml = serde_yaml::to_string(&VerrazzanoMonitoringInstance::crd())?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    if std::env::args().nth(1).as_deref() == Some("-") {
        print!("{content}");
        return Ok(());
    }

    let output_dir = Path::new("deploy/crds");
    fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join("verrazzanomonitoringinstances.crd.yaml");
    fs::write(&output_path, content)?;
    println!("✓ Generated {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_names_package_authors() {
        let first = COPYRIGHT_HEADER.lines().next().unwrap();
        assert!(first.ends_with(env!("CARGO_PKG_AUTHORS")), "{first}");
        assert!(COPYRIGHT_HEADER.contains("SPDX-License-Identifier: MIT"));
    }
}
