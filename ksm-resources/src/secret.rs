use k8s_openapi::api::core::v1::Secret;
use ksm_metrics::{Family, KeyAllowList, MetricType, Sample};

use crate::common::{annotations_family, labels_family, owner_family};

pub fn families(label_allow: KeyAllowList, annotation_allow: KeyAllowList) -> Vec<Family<Secret>> {
    vec![
        info(),
        typ(),
        labels_family("secret", label_allow, |s: &Secret| s.metadata.labels.clone().unwrap_or_default()),
        annotations_family("secret", annotation_allow, |s: &Secret| s.metadata.annotations.clone().unwrap_or_default()),
        owner_family("secret", |s: &Secret| s.metadata.owner_references.clone().unwrap_or_default()),
    ]
}

/// `kube_secret_info`: one `info`-type line per Secret. Never surfaces secret
/// contents, only its identity (spec 4.A "info"; spec 9 "duck typing" note does
/// not apply here, Secret is a statically-known built-in kind).
fn info() -> Family<Secret> {
    Family::new("kube_secret_info", "Information about secret.", MetricType::Info, vec![], |_: &Secret| vec![Sample::new(vec![], 1.0)])
}

/// `kube_secret_type`: info line carrying the Secret's `type` field (e.g.
/// `kubernetes.io/tls`, `Opaque`) as a label, not a stateset, since the set of
/// types is open-ended (custom types are legal).
fn typ() -> Family<Secret> {
    Family::new("kube_secret_type", "Type about secret.", MetricType::Info, vec!["type".into()], |s: &Secret| {
        vec![Sample::new(vec![s.type_.clone().unwrap_or_else(|| "Opaque".to_string())], 1.0)]
    })
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_type_defaults_to_opaque() {
        let s = Secret { metadata: ObjectMeta { name: Some("s".into()), ..Default::default() }, ..Default::default() };
        assert_eq!(typ().generate(&s)[0].label_values, vec!["Opaque"]);
    }

    #[rstest]
    fn test_type_tls() {
        let s = Secret { type_: Some("kubernetes.io/tls".into()), ..Default::default() };
        assert_eq!(typ().generate(&s)[0].label_values, vec!["kubernetes.io/tls"]);
    }
}
