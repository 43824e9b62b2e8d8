use k8s_openapi::api::core::v1::ConfigMap;
use ksm_metrics::{Family, KeyAllowList, MetricType, Sample};

use crate::common::{annotations_family, labels_family, owner_family};

pub fn families(label_allow: KeyAllowList, annotation_allow: KeyAllowList) -> Vec<Family<ConfigMap>> {
    vec![
        info(),
        labels_family("configmap", label_allow, |c: &ConfigMap| c.metadata.labels.clone().unwrap_or_default()),
        annotations_family("configmap", annotation_allow, |c: &ConfigMap| c.metadata.annotations.clone().unwrap_or_default()),
        owner_family("configmap", |c: &ConfigMap| c.metadata.owner_references.clone().unwrap_or_default()),
    ]
}

/// `kube_configmap_info`: one `info`-type line per ConfigMap (spec 4.A "info").
fn info() -> Family<ConfigMap> {
    Family::new("kube_configmap_info", "Information about configmap.", MetricType::Info, vec![], |_: &ConfigMap| {
        vec![Sample::new(vec![], 1.0)]
    })
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_info_always_one() {
        let cm = ConfigMap { metadata: ObjectMeta { name: Some("c".into()), ..Default::default() }, ..Default::default() };
        assert_eq!(info().generate(&cm)[0].value, 1.0);
    }
}
