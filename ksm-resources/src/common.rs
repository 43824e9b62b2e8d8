use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use ksm_metrics::{Family, KeyAllowList, MetricType, Sample};

/// Builds the `<kind>_labels` family shared by every built-in kind: one `info`-style
/// line per object, value 1, with the allow-listed label keys/values as the only
/// dynamic labels (spec 4.C).
pub fn labels_family<T, F>(kind: &str, allow: KeyAllowList, get_labels: F) -> Family<T>
where
    T: 'static,
    F: Fn(&T) -> std::collections::BTreeMap<String, String> + Send + Sync + 'static,
{
    Family::new(format!("kube_{kind}_labels"), format!("Kubernetes labels converted to Prometheus labels on {kind}."), MetricType::Info, vec![], move |obj: &T| {
        let projected = allow.project(&get_labels(obj));
        vec![Sample::new(vec![], 1.0).with_dynamic(projected)]
    })
}

/// Same as [`labels_family`] but for annotations.
pub fn annotations_family<T, F>(kind: &str, allow: KeyAllowList, get_annotations: F) -> Family<T>
where
    T: 'static,
    F: Fn(&T) -> std::collections::BTreeMap<String, String> + Send + Sync + 'static,
{
    Family::new(
        format!("kube_{kind}_annotations"),
        format!("Kubernetes annotations converted to Prometheus labels on {kind}."),
        MetricType::Info,
        vec![],
        move |obj: &T| {
            let projected = allow.project(&get_annotations(obj));
            vec![Sample::new(vec![], 1.0).with_dynamic(projected)]
        },
    )
}

/// Flattens owner-reference metadata into literal labels on the dependent object's
/// own lines, per spec 9 ("owner information is flattened into `*_owner` families
/// as literal label sets... so no graph walker is needed at generation time").
pub fn owner_family<T, F>(kind: &str, get_owners: F) -> Family<T>
where
    T: 'static,
    F: Fn(&T) -> Vec<OwnerReference> + Send + Sync + 'static,
{
    Family::new(format!("kube_{kind}_owner"), format!("Owner references for {kind}."), MetricType::Info, vec![], move |obj: &T| {
        get_owners(obj)
            .into_iter()
            .map(|owner| {
                Sample::new(vec![], 1.0).with_dynamic(vec![
                    ("owner_kind".to_string(), owner.kind),
                    ("owner_name".to_string(), owner.name),
                    ("owner_is_controller".to_string(), owner.controller.unwrap_or(false).to_string()),
                ])
            })
            .collect()
    })
}
