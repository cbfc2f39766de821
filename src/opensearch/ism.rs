// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Index State Management policy documents.
//!
//! Each [`IndexPolicy`] becomes a two-state policy: indices sit in `ingest`
//! (optionally rolling over) until they reach `minIndexAge`, then move to
//! `delete`. Policies are tagged with a fixed description so stale ones the
//! operator created can be told apart from user policies.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::constants::MANAGED_POLICY_DESCRIPTION;
use crate::crd::IndexPolicy;
use crate::diff::diff_values;

/// Default retention when the policy does not set `minIndexAge`
const DEFAULT_MIN_INDEX_AGE: &str = "7d";

/// `GET _plugins/_ism/policies/<id>` response.
#[derive(Debug, Deserialize)]
pub struct PolicyResponse {
    #[serde(rename = "_seq_no")]
    pub seq_no: i64,
    #[serde(rename = "_primary_term")]
    pub primary_term: i64,
    #[serde(default)]
    pub policy: Value,
}

/// `GET _plugins/_ism/policies` response.
#[derive(Debug, Deserialize)]
pub struct PolicyList {
    #[serde(default)]
    pub policies: Vec<PolicyListEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyListEntry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub policy: Value,
}

impl PolicyListEntry {
    /// Whether the operator created this policy.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.policy.get("description").and_then(Value::as_str) == Some(MANAGED_POLICY_DESCRIPTION)
    }
}

/// The `policy` object sent to `PUT _plugins/_ism/policies/<id>`.
#[must_use]
pub fn policy_document(policy: &IndexPolicy) -> Value {
    let min_age = policy
        .min_index_age
        .as_deref()
        .unwrap_or(DEFAULT_MIN_INDEX_AGE);

    let mut ingest_actions = Vec::new();
    if let Some(rollover) = &policy.rollover {
        let mut conditions = Map::new();
        if let Some(age) = &rollover.min_index_age {
            conditions.insert("min_index_age".to_string(), json!(age));
        }
        if let Some(size) = &rollover.min_primary_shard_size {
            conditions.insert("min_primary_shard_size".to_string(), json!(size));
        }
        if let Some(docs) = rollover.min_doc_count {
            conditions.insert("min_doc_count".to_string(), json!(docs));
        }
        if !conditions.is_empty() {
            ingest_actions.push(json!({ "rollover": conditions }));
        }
    }

    json!({
        "description": MANAGED_POLICY_DESCRIPTION,
        "default_state": "ingest",
        "states": [
            {
                "name": "ingest",
                "actions": ingest_actions,
                "transitions": [
                    { "state_name": "delete", "conditions": { "min_index_age": min_age } }
                ]
            },
            {
                "name": "delete",
                "actions": [ { "delete": {} } ],
                "transitions": []
            }
        ],
        "ism_template": [
            { "index_patterns": [policy.index_pattern], "priority": 1 }
        ]
    })
}

/// Whether the live policy needs to be overwritten with `desired`.
///
/// The server adds fields (retry settings, timestamps) to stored policies,
/// so only fields present in the desired document are compared.
#[must_use]
pub fn policy_needs_update(live: &Value, desired: &Value) -> bool {
    !diff_values(live, desired).is_empty()
}

#[cfg(test)]
#[path = "ism_tests.rs"]
mod ism_tests;
