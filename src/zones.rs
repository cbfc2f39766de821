// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Availability-domain (zone) balancing for persistent volume claims.
//!
//! An [`AdCounter`] is built per component for each pass: it starts with the
//! zones that have schedulable nodes, counts the claims already pinned to
//! each, and hands out the least-used zone for the next claim.

use k8s_openapi::api::core::v1::Node;
use rand::seq::IndexedRandom;
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::ZONE_LABEL;

/// Zone usage counter.
#[derive(Clone, Debug, Default)]
pub struct AdCounter {
    known: BTreeSet<String>,
    counts: BTreeMap<String, usize>,
}

impl AdCounter {
    /// Counter over the zones new claims may be placed in.
    #[must_use]
    pub fn new<I, S>(zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let known: BTreeSet<String> = zones
            .into_iter()
            .map(Into::into)
            .filter(|z| !z.is_empty())
            .collect();
        let counts = known.iter().map(|z| (z.clone(), 0)).collect();
        Self { known, counts }
    }

    /// Count one claim pinned to `zone`. Zones without nodes are counted but
    /// never handed out.
    pub fn inc(&mut self, zone: &str) {
        if zone.is_empty() {
            return;
        }
        *self.counts.entry(zone.to_string()).or_insert(0) += 1;
    }

    /// Claims counted in `zone`.
    #[must_use]
    pub fn count(&self, zone: &str) -> usize {
        self.counts.get(zone).copied().unwrap_or(0)
    }

    /// Claims counted across all zones.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// A zone with the fewest claims, ties broken uniformly at random.
    /// Empty when no zones are known.
    #[must_use]
    pub fn get_least_used_ad(&self) -> String {
        let Some(min) = self.known.iter().map(|z| self.count(z)).min() else {
            return String::new();
        };
        let candidates: Vec<&String> = self
            .known
            .iter()
            .filter(|z| self.count(z) == min)
            .collect();
        candidates
            .choose(&mut rand::rng())
            .map(|z| (*z).clone())
            .unwrap_or_default()
    }
}

/// Distinct zone labels across `nodes`.
#[must_use]
pub fn zones_from_nodes(nodes: &[Node]) -> BTreeSet<String> {
    nodes
        .iter()
        .filter_map(|n| n.metadata.labels.as_ref()?.get(ZONE_LABEL).cloned())
        .filter(|z| !z.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "zones_tests.rs"]
mod zones_tests;
