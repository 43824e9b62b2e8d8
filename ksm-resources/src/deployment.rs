use k8s_openapi::api::apps::v1::Deployment;
use ksm_metrics::{Family, KeyAllowList, MetricType, Sample};

use crate::common::{annotations_family, labels_family, owner_family};

pub fn families(label_allow: KeyAllowList, annotation_allow: KeyAllowList) -> Vec<Family<Deployment>> {
    vec![
        spec_replicas(),
        status_replicas(),
        status_replicas_available(),
        status_replicas_unavailable(),
        labels_family("deployment", label_allow, |d: &Deployment| d.metadata.labels.clone().unwrap_or_default()),
        annotations_family("deployment", annotation_allow, |d: &Deployment| d.metadata.annotations.clone().unwrap_or_default()),
        owner_family("deployment", |d: &Deployment| d.metadata.owner_references.clone().unwrap_or_default()),
    ]
}

fn spec_replicas() -> Family<Deployment> {
    Family::new("kube_deployment_spec_replicas", "Number of desired pods for a deployment.", MetricType::Gauge, vec![], |d: &Deployment| {
        vec![Sample::new(vec![], d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0) as f64)]
    })
}

fn status_replicas() -> Family<Deployment> {
    Family::new("kube_deployment_status_replicas", "The number of replicas per deployment.", MetricType::Gauge, vec![], |d: &Deployment| {
        vec![Sample::new(vec![], d.status.as_ref().and_then(|s| s.replicas).unwrap_or(0) as f64)]
    })
}

fn status_replicas_available() -> Family<Deployment> {
    Family::new(
        "kube_deployment_status_replicas_available",
        "The number of available replicas per deployment.",
        MetricType::Gauge,
        vec![],
        |d: &Deployment| vec![Sample::new(vec![], d.status.as_ref().and_then(|s| s.available_replicas).unwrap_or(0) as f64)],
    )
}

fn status_replicas_unavailable() -> Family<Deployment> {
    Family::new(
        "kube_deployment_status_replicas_unavailable",
        "The number of unavailable replicas per deployment.",
        MetricType::Gauge,
        vec![],
        |d: &Deployment| vec![Sample::new(vec![], d.status.as_ref().and_then(|s| s.unavailable_replicas).unwrap_or(0) as f64)],
    )
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_spec_replicas() {
        let d = Deployment { spec: Some(DeploymentSpec { replicas: Some(3), ..Default::default() }), ..Default::default() };
        assert_eq!(spec_replicas().generate(&d)[0].value, 3.0);
    }

    #[rstest]
    fn test_status_replicas_defaults_to_zero() {
        let d = Deployment { status: Some(DeploymentStatus::default()), ..Default::default() };
        assert_eq!(status_replicas().generate(&d)[0].value, 0.0);
    }
}
