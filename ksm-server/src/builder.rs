use std::fmt::Debug;
use std::sync::Arc;

use kube::api::{Api, DynamicObject};
use kube::{Client, Resource};
use ksm_core::k8s::{ApiSet, GVK};
use ksm_customresource::ResourceConfig;
use ksm_metrics::{Family, KindCache, NameFilter, ReadyTx, ShardConfig};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::config::Options;
use crate::registry::{Registry, StoreHandle, TypedStore};

pub struct BuildResult {
    pub registry: Registry,
    pub tasks: JoinSet<()>,
    pub ready_rx: mpsc::Receiver<()>,
    pub expected_ready: usize,
}

/// Instantiates one cache (D) + one driver per (kind, namespace) (E) for every
/// enabled kind — built-in and custom-resource alike — and returns a registry
/// addressable by kind (spec 4.F). Kinds the cluster doesn't support are logged
/// and dropped rather than failing startup (spec 7 "Permanent API errors").
pub async fn build(opts: &Options, client: Client, shard: ShardConfig, cancel: CancellationToken) -> anyhow::Result<BuildResult> {
    let filter = NameFilter::new(&opts.metric_allowlist, &opts.metric_denylist)?;
    let label_allow = opts.label_allow();
    let annotation_allow = opts.annotation_allow();
    let namespaces = namespace_targets(&opts.namespaces);

    let mut apiset = ApiSet::new(client.clone());
    let mut stores: Vec<Arc<dyn StoreHandle>> = vec![];
    let mut tasks = JoinSet::new();
    let (ready_tx, ready_rx) = mpsc::channel(256);
    let mut expected_ready = 0usize;

    macro_rules! builtin {
        ($name:literal, $gvk:expr, $families:expr) => {
            if enabled($name, &opts.resources) {
                let gvk = $gvk;
                if apiset.server_supports(&gvk).await {
                    let apis = namespaces.iter().map(|ns| match ns {
                        Some(ns) => Api::namespaced(client.clone(), ns),
                        None => Api::all(client.clone()),
                    });
                    let store = spawn_kind(
                        $name,
                        $families,
                        &filter,
                        apis.collect(),
                        shard,
                        ready_tx.clone(),
                        cancel.clone(),
                        &mut tasks,
                    );
                    expected_ready += namespaces.len();
                    stores.push(store);
                } else {
                    warn!("cluster does not support {}, skipping", $name);
                }
            }
        };
    }

    builtin!("pod", GVK::new("", "v1", "Pod"), ksm_resources::pod::families(label_allow.clone(), annotation_allow.clone()));
    builtin!("node", GVK::new("", "v1", "Node"), ksm_resources::node::families(label_allow.clone(), annotation_allow.clone()));
    builtin!(
        "namespace",
        GVK::new("", "v1", "Namespace"),
        ksm_resources::namespace::families(label_allow.clone(), annotation_allow.clone())
    );
    builtin!(
        "deployment",
        GVK::new("apps", "v1", "Deployment"),
        ksm_resources::deployment::families(label_allow.clone(), annotation_allow.clone())
    );
    builtin!(
        "statefulset",
        GVK::new("apps", "v1", "StatefulSet"),
        ksm_resources::statefulset::families(label_allow.clone(), annotation_allow.clone())
    );
    builtin!(
        "service",
        GVK::new("", "v1", "Service"),
        ksm_resources::service::families(label_allow.clone(), annotation_allow.clone())
    );
    builtin!(
        "configmap",
        GVK::new("", "v1", "ConfigMap"),
        ksm_resources::configmap::families(label_allow.clone(), annotation_allow.clone())
    );
    builtin!(
        "secret",
        GVK::new("", "v1", "Secret"),
        ksm_resources::secret::families(label_allow.clone(), annotation_allow.clone())
    );

    if let Some(path) = &opts.custom_resource_state_config {
        let config = ksm_customresource::load_file(path)?;
        for resource in &config.spec.resources {
            match build_custom_resource_store(
                resource,
                &filter,
                &mut apiset,
                &namespaces,
                shard,
                ready_tx.clone(),
                cancel.clone(),
                &mut tasks,
            )
            .await
            {
                Ok(Some(store)) => {
                    expected_ready += namespaces.len();
                    stores.push(store);
                },
                Ok(None) => warn!("cluster does not support {}, skipping", resource.group_version_kind.kind),
                Err(err) => return Err(err),
            }
        }
    }

    drop(ready_tx);
    Ok(BuildResult { registry: Registry::new(stores), tasks, ready_rx, expected_ready })
}

fn enabled(name: &str, resources: &[String]) -> bool {
    resources.is_empty() || resources.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// `[""]` ("all namespaces" sentinel, spec 4.E) and an empty list are equivalent
/// and both map to a single cluster-scoped driver.
fn namespace_targets(namespaces: &[String]) -> Vec<Option<String>> {
    let real: Vec<&String> = namespaces.iter().filter(|ns| !ns.is_empty()).collect();
    if real.is_empty() { vec![None] } else { real.into_iter().cloned().map(Some).collect() }
}

#[allow(clippy::too_many_arguments)]
fn spawn_kind<T>(
    kind_name: &str,
    families: Vec<Family<T>>,
    filter: &NameFilter,
    apis: Vec<Api<T>>,
    shard: ShardConfig,
    ready_tx: ReadyTx,
    cancel: CancellationToken,
    tasks: &mut JoinSet<()>,
) -> Arc<dyn StoreHandle>
where
    T: Resource + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
{
    let filtered: Vec<Family<T>> = families.into_iter().filter(|f| filter.passes(&f.name)).collect();
    let cache = Arc::new(KindCache::new(filtered, kind_name.to_string()));

    for api in apis {
        let cache = cache.clone();
        let ready_tx = ready_tx.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            ksm_metrics::watcher::run(api, cache, shard, ready_tx, cancel).await;
        });
    }

    Arc::new(TypedStore::new(kind_name.to_string(), cache)) as Arc<dyn StoreHandle>
}

#[allow(clippy::too_many_arguments)]
async fn build_custom_resource_store(
    resource: &ResourceConfig,
    filter: &NameFilter,
    apiset: &mut ApiSet,
    namespaces: &[Option<String>],
    shard: ShardConfig,
    ready_tx: ReadyTx,
    cancel: CancellationToken,
    tasks: &mut JoinSet<()>,
) -> anyhow::Result<Option<Arc<dyn StoreHandle>>> {
    let gvk = GVK::new(&resource.group_version_kind.group, &resource.group_version_kind.version, &resource.group_version_kind.kind);

    if !apiset.server_supports(&gvk).await {
        return Ok(None);
    }

    let families = ksm_customresource::compile_resource(resource)?;
    let filtered: Vec<Family<DynamicObject>> = families.into_iter().filter(|f| filter.passes(&f.name)).collect();
    let kind_name = resource.group_version_kind.kind.to_ascii_lowercase();
    let cache = Arc::new(KindCache::new(filtered, kind_name.clone()));

    for ns in namespaces {
        let api = match ns {
            Some(ns) => apiset.namespaced_api_for(&gvk, ns.clone()).await?.clone(),
            None => apiset.api_for(&gvk).await?.0.clone(),
        };
        let cache = cache.clone();
        let ready_tx = ready_tx.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            ksm_metrics::watcher::run(api, cache, shard, ready_tx, cancel).await;
        });
    }

    let store = Arc::new(TypedStore::new(kind_name, cache)) as Arc<dyn StoreHandle>;
    Ok(Some(store))
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_enabled_empty_means_all() {
        assert!(enabled("pod", &[]));
    }

    #[rstest]
    fn test_enabled_case_insensitive() {
        assert!(enabled("pod", &["Pod".to_string()]));
        assert!(!enabled("node", &["Pod".to_string()]));
    }

    #[rstest]
    fn test_namespace_targets_empty_is_all() {
        assert_eq!(namespace_targets(&[]), vec![None]);
        assert_eq!(namespace_targets(&["".to_string()]), vec![None]);
    }

    #[rstest]
    fn test_namespace_targets_explicit_list() {
        assert_eq!(namespace_targets(&["ns1".to_string(), "ns2".to_string()]), vec![Some("ns1".to_string()), Some("ns2".to_string())]);
    }
}
