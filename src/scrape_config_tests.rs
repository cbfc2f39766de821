// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! Unit tests for `scrape_config.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    fn managed() -> PrometheusConfig {
        PrometheusConfig {
            global: Some(serde_yaml::from_str("scrape_interval: 20s").unwrap()),
            scrape_configs: vec![
                ScrapeConfig::new("prometheus").with(
                    "static_configs",
                    serde_yaml::from_str("[{targets: ['localhost:9090']}]").unwrap(),
                ),
                ScrapeConfig::new("opensearch"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_unmanaged_jobs_survive_merge() {
        let live: PrometheusConfig = serde_yaml::from_str(
            r"
scrape_configs:
  - job_name: zeta-app
    metrics_path: /m
  - job_name: prometheus
    scrape_interval: 5s
  - job_name: alpha-app
",
        )
        .unwrap();

        let merged = merge_scrape_configs(&live, &managed());
        let names: Vec<&str> = merged
            .scrape_configs
            .iter()
            .map(|s| s.job_name.as_str())
            .collect();
        assert_eq!(names, vec!["prometheus", "opensearch", "alpha-app", "zeta-app"]);

        let prometheus = &merged.scrape_configs[0];
        assert!(!prometheus.settings.contains_key("scrape_interval"));
        assert_eq!(
            merged.scrape_configs[3].settings.get("metrics_path"),
            Some(&Value::from("/m"))
        );
    }

    #[test]
    fn test_merge_is_stable() {
        let live_yaml = "scrape_configs:\n  - job_name: custom\n    honor_labels: true\n";
        let first = merge_config_yaml(Some(live_yaml), &managed()).unwrap();
        let second = merge_config_yaml(Some(&first), &managed()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_or_invalid_live_document_uses_managed() {
        let expected = serde_yaml::to_string(&managed()).unwrap();
        assert_eq!(merge_config_yaml(None, &managed()).unwrap(), expected);
        assert_eq!(
            merge_config_yaml(Some("scrape_configs: {not: [a list"), &managed()).unwrap(),
            expected
        );
    }

    #[test]
    fn test_unknown_top_level_keys_are_kept() {
        let live_yaml = "remote_write:\n  - url: http://thanos:19291/api/v1/receive\nscrape_configs: []\n";
        let merged = merge_config_yaml(Some(live_yaml), &managed()).unwrap();
        assert!(merged.contains("remote_write"));
        assert!(merged.contains("thanos"));
    }
}
