// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `zones.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use kube::api::ObjectMeta;

    #[test]
    fn test_no_zones_yields_empty_string() {
        let counter = AdCounter::new(Vec::<String>::new());
        assert_eq!(counter.get_least_used_ad(), "");
    }

    #[test]
    fn test_least_used_zone_is_chosen() {
        let mut counter = AdCounter::new(["ad-1", "ad-2", "ad-3"]);
        counter.inc("ad-1");
        counter.inc("ad-1");
        counter.inc("ad-3");
        assert_eq!(counter.get_least_used_ad(), "ad-2");
    }

    #[test]
    fn test_choice_always_has_minimum_count() {
        let mut counter = AdCounter::new(["ad-1", "ad-2", "ad-3"]);
        for _ in 0..30 {
            let zone = counter.get_least_used_ad();
            let min = ["ad-1", "ad-2", "ad-3"]
                .iter()
                .map(|z| counter.count(z))
                .min()
                .unwrap();
            assert_eq!(counter.count(&zone), min);
            counter.inc(&zone);
        }
        assert_eq!(counter.count("ad-1"), 10);
        assert_eq!(counter.count("ad-2"), 10);
        assert_eq!(counter.count("ad-3"), 10);
    }

    #[test]
    fn test_total_counts_every_pinned_claim() {
        let mut counter = AdCounter::new(["ad-1"]);
        counter.inc("ad-1");
        counter.inc("retired-ad");
        counter.inc("");
        assert_eq!(counter.total(), 2);
        assert_eq!(counter.get_least_used_ad(), "ad-1");
    }

    #[test]
    fn test_zones_from_node_labels() {
        let node = |zone: Option<&str>| Node {
            metadata: ObjectMeta {
                labels: zone.map(|z| [(ZONE_LABEL.to_string(), z.to_string())].into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let zones = zones_from_nodes(&[
            node(Some("ad-1")),
            node(Some("ad-2")),
            node(Some("ad-1")),
            node(None),
        ]);
        assert_eq!(
            zones.into_iter().collect::<Vec<_>>(),
            vec!["ad-1".to_string(), "ad-2".to_string()]
        );
    }
}
