use k8s_openapi::api::apps::v1::StatefulSet;
use ksm_metrics::{Family, KeyAllowList, MetricType, Sample};

use crate::common::{annotations_family, labels_family, owner_family};

pub fn families(label_allow: KeyAllowList, annotation_allow: KeyAllowList) -> Vec<Family<StatefulSet>> {
    vec![
        spec_replicas(),
        status_replicas_ready(),
        status_replicas_current(),
        labels_family("statefulset", label_allow, |s: &StatefulSet| s.metadata.labels.clone().unwrap_or_default()),
        annotations_family("statefulset", annotation_allow, |s: &StatefulSet| s.metadata.annotations.clone().unwrap_or_default()),
        owner_family("statefulset", |s: &StatefulSet| s.metadata.owner_references.clone().unwrap_or_default()),
    ]
}

fn spec_replicas() -> Family<StatefulSet> {
    Family::new("kube_statefulset_replicas", "Number of desired pods for a StatefulSet.", MetricType::Gauge, vec![], |s: &StatefulSet| {
        vec![Sample::new(vec![], s.spec.as_ref().and_then(|spec| spec.replicas).unwrap_or(0) as f64)]
    })
}

fn status_replicas_ready() -> Family<StatefulSet> {
    Family::new(
        "kube_statefulset_status_replicas_ready",
        "The number of ready replicas per StatefulSet.",
        MetricType::Gauge,
        vec![],
        |s: &StatefulSet| vec![Sample::new(vec![], s.status.as_ref().and_then(|st| st.ready_replicas).unwrap_or(0) as f64)],
    )
}

fn status_replicas_current() -> Family<StatefulSet> {
    Family::new(
        "kube_statefulset_status_replicas_current",
        "The number of current replicas per StatefulSet.",
        MetricType::Gauge,
        vec![],
        |s: &StatefulSet| vec![Sample::new(vec![], s.status.as_ref().and_then(|st| st.current_replicas).unwrap_or(0) as f64)],
    )
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::apps::v1::StatefulSetSpec;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_spec_replicas_default_zero() {
        assert_eq!(spec_replicas().generate(&StatefulSet::default())[0].value, 0.0);
    }

    #[rstest]
    fn test_spec_replicas() {
        let s = StatefulSet {
            spec: Some(StatefulSetSpec { replicas: Some(5), ..Default::default() }),
            ..Default::default()
        };
        assert_eq!(spec_replicas().generate(&s)[0].value, 5.0);
    }
}
