use std::sync::Arc;

use bytes::Bytes;
use kube::ResourceExt;
use ksm_metrics::{Family, KindCache, MetricType};

/// Declaration-order metadata for one family, enough for the scrape handler (H)
/// to write `# HELP`/`# TYPE` without needing the family's generator or the
/// object type it was built against (spec 4.H).
#[derive(Debug, Clone)]
pub struct FamilyMeta {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
}

/// Type-erased view of a [`KindCache`] (spec 3 "Kind store"). The builder (F)
/// produces one heterogeneous collection of these — Pod, Node, Deployment, and
/// every custom-resource GVK all share this boundary — so the scrape handler (H)
/// and the registry don't need to be generic over the object type.
pub trait StoreHandle: Send + Sync {
    fn kind_name(&self) -> &str;
    fn families(&self) -> &[FamilyMeta];
    fn snapshot(&self, family_index: usize) -> Vec<Bytes>;
    fn object_count(&self) -> usize;
}

pub struct TypedStore<T> {
    kind_name: String,
    cache: Arc<KindCache<T>>,
    meta: Vec<FamilyMeta>,
}

impl<T: ResourceExt> TypedStore<T> {
    pub fn new(kind_name: impl Into<String>, cache: Arc<KindCache<T>>) -> TypedStore<T> {
        let meta = cache
            .families()
            .iter()
            .map(|f: &Family<T>| FamilyMeta { name: f.name.clone(), help: f.help.clone(), metric_type: f.metric_type })
            .collect();
        TypedStore { kind_name: kind_name.into(), cache, meta }
    }

    pub fn cache(&self) -> &Arc<KindCache<T>> {
        &self.cache
    }
}

impl<T: ResourceExt + Send + Sync> StoreHandle for TypedStore<T> {
    fn kind_name(&self) -> &str {
        &self.kind_name
    }

    fn families(&self) -> &[FamilyMeta] {
        &self.meta
    }

    fn snapshot(&self, family_index: usize) -> Vec<Bytes> {
        self.cache.snapshot(family_index)
    }

    fn object_count(&self) -> usize {
        self.cache.object_count()
    }
}

/// The live set of stores addressable by kind (spec 4.F). Stores are kept sorted
/// by kind name so the scrape handler can iterate in the spec-mandated
/// deterministic order (spec 4.H step 2: "kind name ascending") without
/// re-sorting on every request.
pub struct Registry {
    stores: Vec<Arc<dyn StoreHandle>>,
}

impl Registry {
    pub fn new(mut stores: Vec<Arc<dyn StoreHandle>>) -> Registry {
        stores.sort_by(|a, b| a.kind_name().cmp(b.kind_name()));
        Registry { stores }
    }

    pub fn stores(&self) -> &[Arc<dyn StoreHandle>] {
        &self.stores
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::Pod;
    use ksm_metrics::Sample;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_registry_sorts_by_kind_name() {
        let cache_z: Arc<KindCache<Pod>> = Arc::new(KindCache::new(vec![], "zpod"));
        let cache_a: Arc<KindCache<Pod>> = Arc::new(KindCache::new(vec![], "apod"));
        let registry = Registry::new(vec![
            Arc::new(TypedStore::new("zeta", cache_z)),
            Arc::new(TypedStore::new("alpha", cache_a)),
        ]);
        let names: Vec<&str> = registry.stores().iter().map(|s| s.kind_name()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[rstest]
    fn test_family_meta_mirrors_cache_families() {
        let family = Family::new("kube_pod_info", "help text", MetricType::Info, vec![], |_: &Pod| vec![Sample::new(vec![], 1.0)]);
        let cache = Arc::new(KindCache::new(vec![family], "pod"));
        let store = TypedStore::new("pod", cache);
        assert_eq!(store.families().len(), 1);
        assert_eq!(store.families()[0].name, "kube_pod_info");
        assert_eq!(store.families()[0].metric_type, MetricType::Info);
    }
}
