use clap::Parser;

/// CLI surface (spec 6 "CLI surface"). Doubles as the runtime configuration
/// object the builder (F) consumes directly — there is no separate top-level
/// YAML application config; only the custom-resource engine's own
/// configuration (`custom_resource_state_config`) is YAML (spec 6
/// "Configuration file format for the custom-resource engine").
#[derive(Parser, Debug, Clone)]
#[command(name = "ksm-server", about = "Kubernetes cluster-state metrics exporter")]
pub struct Options {
    /// Path to a kubeconfig file; unset uses in-cluster config or the default
    /// kubeconfig resolution order.
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Override the API server URL (bypasses kubeconfig context selection).
    #[arg(long)]
    pub apiserver: Option<String>,

    /// Namespaces to watch. Empty means all namespaces.
    #[arg(long, value_delimiter = ',')]
    pub namespaces: Vec<String>,

    /// Enabled built-in resource kinds. Empty means every kind `ksm-resources`
    /// supports.
    #[arg(long, value_delimiter = ',')]
    pub resources: Vec<String>,

    /// Family name allowlist (spec 4.B). Empty means every family passes.
    #[arg(long = "metric-allowlist", value_delimiter = ',')]
    pub metric_allowlist: Vec<String>,

    /// Family name denylist (spec 4.B).
    #[arg(long = "metric-denylist", value_delimiter = ',')]
    pub metric_denylist: Vec<String>,

    /// Per-kind label projection (spec 4.C). `*` means every label; otherwise a
    /// comma-separated allowlist shared across all enabled kinds.
    #[arg(long = "metric-labels-allowlist", value_delimiter = ',')]
    pub metric_labels_allowlist: Vec<String>,

    /// Per-kind annotation projection (spec 4.C), same shape as
    /// `metric_labels_allowlist`.
    #[arg(long = "metric-annotations-allowlist", value_delimiter = ',')]
    pub metric_annotations_allowlist: Vec<String>,

    /// This process's shard index (spec 4.I). Ignored when `auto_sharding` is set.
    #[arg(long, default_value_t = 0)]
    pub shard: i32,

    /// Total shard count (spec 4.I). `<= 1` disables sharding.
    #[arg(long = "total-shards", default_value_t = 1)]
    pub total_shards: i32,

    /// Derive `shard`/`total_shards` from this pod's ordinal and its owning
    /// workload's replica count (spec 4.I "Auto-sharding").
    #[arg(long = "auto-sharding", default_value_t = false)]
    pub auto_sharding: bool,

    /// Path to the custom-resource engine's YAML configuration (spec 4.G, 6).
    #[arg(long = "custom-resource-state-config")]
    pub custom_resource_state_config: Option<String>,

    /// Honor `Accept-Encoding: gzip` on `/metrics` (spec 4.H step 3). Off by
    /// default.
    #[arg(long = "enable-gzip-encoding", default_value_t = false)]
    pub enable_gzip_encoding: bool,

    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    #[arg(long = "telemetry-host", default_value = "0.0.0.0")]
    pub telemetry_host: String,

    #[arg(long = "telemetry-port", default_value_t = 8081)]
    pub telemetry_port: u16,

    #[arg(short, long, default_value = "info")]
    pub verbosity: String,
}

impl Options {
    pub fn label_allow(&self) -> ksm_metrics::KeyAllowList {
        key_allow_list(&self.metric_labels_allowlist)
    }

    pub fn annotation_allow(&self) -> ksm_metrics::KeyAllowList {
        key_allow_list(&self.metric_annotations_allowlist)
    }
}

fn key_allow_list(raw: &[String]) -> ksm_metrics::KeyAllowList {
    if raw.iter().any(|s| s == "*") {
        ksm_metrics::KeyAllowList::All
    } else {
        ksm_metrics::KeyAllowList::Only(raw.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_parses_minimal_args() {
        let opts = Options::parse_from(["ksm-server"]);
        assert_eq!(opts.port, 8080);
        assert_eq!(opts.total_shards, 1);
        assert!(opts.namespaces.is_empty());
    }

    #[rstest]
    fn test_comma_delimited_lists() {
        let opts = Options::parse_from(["ksm-server", "--namespaces", "ns1,ns2", "--resources", "pod,node"]);
        assert_eq!(opts.namespaces, vec!["ns1".to_string(), "ns2".to_string()]);
        assert_eq!(opts.resources, vec!["pod".to_string(), "node".to_string()]);
    }

    #[rstest]
    fn test_wildcard_label_allowlist() {
        let opts = Options::parse_from(["ksm-server", "--metric-labels-allowlist", "*"]);
        assert!(matches!(opts.label_allow(), ksm_metrics::KeyAllowList::All));
    }
}
