use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use kube::ResourceExt;

use crate::family::Family;
use crate::render::render_family;

/// Maintains a mapping from object UID to a pre-rendered byte blob per family
/// (spec 3 "Store entry", 4.D). Event handlers (`on_add`/`on_update`/`on_delete`)
/// never suspend: they take the write lock briefly to swap one entry. Scrapes take
/// the read lock only long enough to copy the UID list for one family before
/// streaming bytes, so a long scrape never starves event handlers (spec 5).
pub struct KindCache<T> {
    families: Vec<Family<T>>,
    name_label: String,
    entries: RwLock<HashMap<String, Vec<Bytes>>>,
}

impl<T: ResourceExt> KindCache<T> {
    pub fn new(families: Vec<Family<T>>, name_label: impl Into<String>) -> KindCache<T> {
        KindCache { families, name_label: name_label.into(), entries: RwLock::new(HashMap::new()) }
    }

    pub fn families(&self) -> &[Family<T>] {
        &self.families
    }

    pub fn name_label(&self) -> &str {
        &self.name_label
    }

    /// Identical to `on_add`: re-renders every family and overwrites the prior
    /// slices for this UID (spec 4.D). Idempotent: calling it twice with the same
    /// object produces the same stored bytes.
    pub fn on_update(&self, obj: &T) {
        let Some(uid) = obj.uid() else { return };
        let rendered = self.render(obj);
        self.entries.write().expect("cache lock poisoned").insert(uid, rendered);
    }

    pub fn on_add(&self, obj: &T) {
        self.on_update(obj);
    }

    /// No-op on an absent UID (spec 3 "Kind store" invariants).
    pub fn on_delete_by_uid(&self, uid: &str) {
        self.entries.write().expect("cache lock poisoned").remove(uid);
    }

    pub fn on_delete(&self, obj: &T) {
        if let Some(uid) = obj.uid() {
            self.on_delete_by_uid(&uid);
        }
    }

    /// True iff the store currently holds an entry for `uid`. Used by the watch
    /// driver's re-list step to distinguish a carry-over add from a true add.
    pub fn has_uid(&self, uid: &str) -> bool {
        self.entries.read().expect("cache lock poisoned").contains_key(uid)
    }

    pub fn uids(&self) -> Vec<String> {
        self.entries.read().expect("cache lock poisoned").keys().cloned().collect()
    }

    pub fn object_count(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    /// Yields, in stable order for the duration of one scrape, the non-empty byte
    /// slice of family `family_index` for every present entry (spec 4.D). The
    /// returned `Vec` is a snapshot taken now; it does not reflect concurrent
    /// mutations made after this call returns.
    pub fn snapshot(&self, family_index: usize) -> Vec<Bytes> {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .values()
            .filter_map(|families| families.get(family_index))
            .filter(|b| !b.is_empty())
            .cloned()
            .collect()
    }

    fn render(&self, obj: &T) -> Vec<Bytes> {
        let base = self.base_labels(obj);
        self.families.iter().map(|f| render_family(f, obj, &base)).collect()
    }

    fn base_labels(&self, obj: &T) -> Vec<(String, String)> {
        let mut labels = Vec::with_capacity(2);
        if let Some(ns) = obj.namespace() {
            labels.push(("namespace".to_string(), ns));
        }
        labels.push((self.name_label.clone(), obj.name_any()));
        labels
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::Pod;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use rstest::*;

    use super::*;
    use crate::family::{MetricType, Sample};

    fn pod(uid: &str, ns: &str, name: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                uid: Some(uid.into()),
                namespace: Some(ns.into()),
                name: Some(name.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn test_cache() -> KindCache<Pod> {
        let family = Family::new("kube_pod_info", "info", MetricType::Info, vec![], |_: &Pod| vec![Sample::new(vec![], 1.0)]);
        KindCache::new(vec![family], "pod")
    }

    #[rstest]
    fn test_add_then_snapshot() {
        let cache = test_cache();
        cache.on_add(&pod("u1", "ns1", "p1"));
        let snap = cache.snapshot(0);
        assert_eq!(snap.len(), 1);
        assert_eq!(String::from_utf8(snap[0].to_vec()).unwrap(), "kube_pod_info{namespace=\"ns1\",pod=\"p1\"} 1\n");
    }

    #[rstest]
    fn test_add_is_idempotent() {
        let cache = test_cache();
        cache.on_add(&pod("u1", "ns1", "p1"));
        cache.on_add(&pod("u1", "ns1", "p1"));
        assert_eq!(cache.object_count(), 1);
    }

    #[rstest]
    fn test_delete_absent_uid_is_noop() {
        let cache = test_cache();
        cache.on_delete_by_uid("missing");
        assert_eq!(cache.object_count(), 0);
    }

    #[rstest]
    fn test_delete_then_add_then_delete() {
        let cache = test_cache();
        cache.on_add(&pod("u1", "ns1", "p1"));
        cache.on_delete_by_uid("u1");
        cache.on_delete_by_uid("u1");
        assert_eq!(cache.object_count(), 0);
    }

    #[rstest]
    fn test_uid_tracking() {
        let cache = test_cache();
        assert!(!cache.has_uid("u1"));
        cache.on_add(&pod("u1", "ns1", "p1"));
        assert!(cache.has_uid("u1"));
        assert_eq!(cache.uids(), vec!["u1".to_string()]);
    }
}
