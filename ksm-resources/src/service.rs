use k8s_openapi::api::core::v1::Service;
use ksm_metrics::{Family, KeyAllowList, MetricType, Sample};

use crate::common::{annotations_family, labels_family};

const SERVICE_TYPES: &[&str] = &["ClusterIP", "NodePort", "LoadBalancer", "ExternalName"];

pub fn families(label_allow: KeyAllowList, annotation_allow: KeyAllowList) -> Vec<Family<Service>> {
    vec![
        info(),
        spec_type(),
        labels_family("service", label_allow, |s: &Service| s.metadata.labels.clone().unwrap_or_default()),
        annotations_family("service", annotation_allow, |s: &Service| s.metadata.annotations.clone().unwrap_or_default()),
    ]
}

fn info() -> Family<Service> {
    Family::new("kube_service_info", "Information about service.", MetricType::Info, vec!["cluster_ip".into()], |svc: &Service| {
        vec![Sample::new(vec![svc.spec.as_ref().and_then(|s| s.cluster_ip.clone()).unwrap_or_default()], 1.0)]
    })
}

fn spec_type() -> Family<Service> {
    Family::new("kube_service_spec_type", "Type about service.", MetricType::StateSet, vec!["type".into()], |svc: &Service| {
        let actual = svc.spec.as_ref().and_then(|s| s.type_.clone()).unwrap_or_else(|| "ClusterIP".to_string());
        SERVICE_TYPES.iter().map(|t| Sample::new(vec![t.to_string()], if *t == actual { 1.0 } else { 0.0 })).collect()
    })
}
