// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Semantic comparison of a live object against its desired form.
//!
//! Only fields the desired object sets are compared. Anything the API server
//! fills in (defaults, `clusterIP`, `status`, bookkeeping metadata) is left
//! out, so a freshly created object compares equal to the desired object it
//! was created from.
//!
//! Resource quantities compare by value: the API server returns `1Gi` for a
//! requested `1024Mi` and `1` for `1000m`, and neither counts as drift.
//!
//! ```rust
//! use vmo::diff::diff_values;
//! use serde_json::json;
//!
//! let live = json!({"spec": {"replicas": 2, "revisionHistoryLimit": 10}});
//! let desired = json!({"spec": {"replicas": 3}});
//! assert_eq!(diff_values(&live, &desired), "spec.replicas: 2 -> 3");
//! ```

use serde::Serialize;
use serde_json::Value;

/// Paths written by the server that never count as a difference.
const IGNORED_PATHS: &[&str] = &[
    "status",
    "metadata.resourceVersion",
    "metadata.uid",
    "metadata.creationTimestamp",
    "metadata.generation",
    "metadata.managedFields",
    "metadata.selfLink",
    "metadata.generateName",
];

/// Describe how `existing` differs from `desired`, one change per line.
///
/// An empty string means no meaningful difference. Objects that cannot be
/// serialized produce a non-empty report so the caller reapplies them.
#[must_use]
pub fn diff<K: Serialize>(existing: &K, desired: &K) -> String {
    match (serde_json::to_value(existing), serde_json::to_value(desired)) {
        (Ok(existing), Ok(desired)) => diff_values(&existing, &desired),
        (Err(e), _) | (_, Err(e)) => format!("<unable to compare: {e}>"),
    }
}

/// [`diff`] over already-serialized values.
#[must_use]
pub fn diff_values(existing: &Value, desired: &Value) -> String {
    let mut changes = Vec::new();
    compare("", existing, desired, &mut changes);
    changes.join("\n")
}

fn compare(path: &str, existing: &Value, desired: &Value, changes: &mut Vec<String>) {
    if IGNORED_PATHS.contains(&path) {
        return;
    }

    match desired {
        Value::Null => {}
        Value::Object(wanted) => match existing {
            Value::Object(actual) => {
                for (key, value) in wanted {
                    let child = join(path, key);
                    compare(&child, actual.get(key).unwrap_or(&Value::Null), value, changes);
                }
            }
            Value::Null if wanted.is_empty() => {}
            _ => changes.push(format!("{}: {existing} -> {desired}", display(path))),
        },
        Value::Array(wanted) => match existing {
            Value::Array(actual) if actual.len() == wanted.len() => {
                for (i, (a, w)) in actual.iter().zip(wanted).enumerate() {
                    compare(&format!("{path}[{i}]"), a, w, changes);
                }
            }
            Value::Null if wanted.is_empty() => {}
            _ => changes.push(format!("{}: {existing} -> {desired}", display(path))),
        },
        scalar => {
            if existing != scalar && !(is_quantity_path(path) && same_quantity(existing, scalar)) {
                changes.push(format!("{}: {existing} -> {scalar}", display(path)));
            }
        }
    }
}

/// Parse a Kubernetes quantity (`50Gi`, `1.5T`, `500M`, `1e9`) to bytes.
#[must_use]
pub fn parse_quantity(quantity: &str) -> Option<f64> {
    const SUFFIXES: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1_048_576.0),
        ("Gi", 1_073_741_824.0),
        ("Ti", 1_099_511_627_776.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ei", 1_152_921_504_606_846_976.0),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
        ("m", 1e-3),
    ];
    let quantity = quantity.trim();
    for (suffix, factor) in SUFFIXES {
        if let Some(number) = quantity.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|n| n * factor);
        }
    }
    quantity.parse::<f64>().ok()
}

/// Fields holding a `resource.Quantity`.
fn is_quantity_path(path: &str) -> bool {
    let mut segments = path.rsplit('.');
    let leaf = segments.next().unwrap_or_default();
    let parent = segments.next().unwrap_or_default();
    matches!(parent, "requests" | "limits" | "capacity" | "allocatable") || leaf == "sizeLimit"
}

fn same_quantity(existing: &Value, desired: &Value) -> bool {
    let (Some(existing), Some(desired)) = (
        existing.as_str().and_then(parse_quantity),
        desired.as_str().and_then(parse_quantity),
    ) else {
        return false;
    };
    (existing - desired).abs() <= 1e-9 * existing.abs().max(desired.abs())
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn display(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
