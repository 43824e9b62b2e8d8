// Well-known labels/annotations used to name Prometheus labels on *_labels/*_annotations families
pub const KUBERNETES_IO_METADATA_NAME_KEY: &str = "kubernetes.io/metadata.name";
pub const APP_KUBERNETES_IO_NAME_KEY: &str = "app.kubernetes.io/name";
pub const APP_KUBERNETES_IO_COMPONENT_KEY: &str = "app.kubernetes.io/component";

// Retry/backoff tuning for the watch/list driver (spec 4.E)
pub const WATCH_BACKOFF_BASE_SECONDS: u64 = 1;
pub const WATCH_BACKOFF_CAP_SECONDS: u64 = 30;

// Defaults for the custom-resource engine (spec 4.G)
pub const DEFAULT_CUSTOMRESOURCE_METRIC_PREFIX: &str = "kube_customresource";

#[cfg(feature = "testutils")]
mod test_constants {
    pub const TEST_NAMESPACE: &str = "test";
    pub const TEST_POD_NAME: &str = "test-pod";
    pub const TEST_NODE_NAME: &str = "test-node";
}

#[cfg(feature = "testutils")]
pub use test_constants::*;
