use k8s_openapi::api::core::v1::Pod;
use ksm_core::quantity::parse_quantity;
use ksm_metrics::{Family, KeyAllowList, MetricType, Sample};

use crate::common::{annotations_family, labels_family, owner_family};

const PHASES: &[&str] = &["Pending", "Running", "Succeeded", "Failed", "Unknown"];

/// Builds the full set of `kube_pod_*` families (spec 8, scenario S1).
pub fn families(label_allow: KeyAllowList, annotation_allow: KeyAllowList) -> Vec<Family<Pod>> {
    vec![
        info(),
        status_phase(),
        container_status_restarts(),
        container_resource_requests_cpu(),
        labels_family("pod", label_allow, |p: &Pod| p.metadata.labels.clone().unwrap_or_default()),
        annotations_family("pod", annotation_allow, |p: &Pod| p.metadata.annotations.clone().unwrap_or_default()),
        owner_family("pod", |p: &Pod| p.metadata.owner_references.clone().unwrap_or_default()),
    ]
}

/// `kube_pod_info`: one `info`-type line joining the pod's network identity (spec
/// 8, S1: exact expected output for `{namespace="ns1",pod="p1", ...}`).
fn info() -> Family<Pod> {
    Family::new("kube_pod_info", "Information about pod.", MetricType::Info, vec!["host_ip".into(), "pod_ip".into()], |pod: &Pod| {
        let status = pod.status.clone().unwrap_or_default();
        vec![Sample::new(vec![status.host_ip.unwrap_or_default(), status.pod_ip.unwrap_or_default()], 1.0)]
    })
}

/// `kube_pod_status_phase`: stateset over the five pod phases (spec 8, S1).
fn status_phase() -> Family<Pod> {
    Family::new("kube_pod_status_phase", "The pod's current phase.", MetricType::StateSet, vec!["phase".into()], |pod: &Pod| {
        let phase = pod.status.as_ref().and_then(|s| s.phase.clone()).unwrap_or_else(|| "Unknown".to_string());
        PHASES
            .iter()
            .map(|state| Sample::new(vec![state.to_string()], if *state == phase { 1.0 } else { 0.0 }))
            .collect()
    })
}

/// `kube_pod_container_status_restarts_total`: counter, one line per container
/// (monotonically non-decreasing for the lifetime of the pod's UID, spec 4.A).
fn container_status_restarts() -> Family<Pod> {
    Family::new(
        "kube_pod_container_status_restarts_total",
        "The number of container restarts per container.",
        MetricType::Counter,
        vec!["container".into()],
        |pod: &Pod| {
            pod.status
                .as_ref()
                .and_then(|s| s.container_statuses.as_ref())
                .map(|statuses| {
                    statuses.iter().map(|cs| Sample::new(vec![cs.name.clone()], cs.restart_count as f64)).collect()
                })
                .unwrap_or_default()
        },
    )
}

/// `kube_pod_container_resource_requests_cpu_cores`: histogram distributing the
/// CPU-core requests across the pod's own containers. Pure with respect to the
/// object (no clock, no I/O): each container's request is one observation.
fn container_resource_requests_cpu() -> Family<Pod> {
    const BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0];

    Family::new(
        "kube_pod_container_resource_requests_cpu_cores",
        "Distribution of CPU core requests across this pod's containers.",
        MetricType::Histogram,
        vec![],
        |pod: &Pod| {
            let requests: Vec<f64> = pod
                .spec
                .as_ref()
                .map(|spec| {
                    spec.containers
                        .iter()
                        .filter_map(|c| c.resources.as_ref()?.requests.as_ref()?.get("cpu"))
                        .filter_map(|q| parse_quantity(&q.0).ok())
                        .collect()
                })
                .unwrap_or_default();

            if requests.is_empty() {
                return vec![];
            }

            let mut samples = Vec::with_capacity(BUCKETS.len() + 3);
            let mut cumulative = 0u64;
            for bound in BUCKETS {
                cumulative += requests.iter().filter(|&&v| v <= *bound).count() as u64;
                samples.push(
                    Sample::new(vec![], cumulative as f64).with_suffix("_bucket").with_extra_label("le", bound.to_string()),
                );
            }
            samples.push(Sample::new(vec![], requests.len() as f64).with_suffix("_bucket").with_extra_label("le", "+Inf"));
            samples.push(Sample::new(vec![], requests.iter().sum::<f64>()).with_suffix("_sum"));
            samples.push(Sample::new(vec![], requests.len() as f64).with_suffix("_count"));
            samples
        },
    )
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{Container, PodSpec, PodStatus, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use rstest::*;

    use super::*;

    fn pod_with_phase(phase: &str) -> Pod {
        Pod { status: Some(PodStatus { phase: Some(phase.to_string()), ..Default::default() }), ..Default::default() }
    }

    #[rstest]
    fn test_info_family() {
        let pod = Pod {
            status: Some(PodStatus {
                host_ip: Some("1.1.1.1".into()),
                pod_ip: Some("1.2.3.4".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let samples = info().generate(&pod);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 1.0);
        assert_eq!(samples[0].label_values, vec!["1.1.1.1", "1.2.3.4"]);
    }

    #[rstest]
    fn test_status_phase_exactly_one_active_state() {
        let pod = pod_with_phase("Running");
        let samples = status_phase().generate(&pod);
        assert_eq!(samples.len(), PHASES.len());
        let active: Vec<_> = samples.iter().filter(|s| s.value == 1.0).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].label_values, vec!["Running"]);
    }

    #[rstest]
    fn test_restarts_counter_one_line_per_container() {
        use k8s_openapi::api::core::v1::ContainerStatus;
        let pod = Pod {
            status: Some(PodStatus {
                container_statuses: Some(vec![
                    ContainerStatus { name: "app".into(), restart_count: 3, ..Default::default() },
                    ContainerStatus { name: "sidecar".into(), restart_count: 0, ..Default::default() },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let samples = container_status_restarts().generate(&pod);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, 3.0);
    }

    #[rstest]
    fn test_cpu_histogram_bucket_cumulative() {
        let pod = Pod {
            spec: Some(PodSpec {
                containers: vec![
                    Container {
                        name: "a".into(),
                        resources: Some(ResourceRequirements {
                            requests: Some([("cpu".to_string(), Quantity("250m".into()))].into()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    Container {
                        name: "b".into(),
                        resources: Some(ResourceRequirements {
                            requests: Some([("cpu".to_string(), Quantity("2".into()))].into()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
            ..Default::default()
        };
        let samples = container_resource_requests_cpu().generate(&pod);
        let count = samples.iter().find(|s| s.name_suffix == "_count").unwrap();
        assert_eq!(count.value, 2.0);
        let sum = samples.iter().find(|s| s.name_suffix == "_sum").unwrap();
        assert_eq!(sum.value, 2.25);
    }

    #[rstest]
    fn test_histogram_empty_without_containers() {
        assert!(container_resource_requests_cpu().generate(&Pod::default()).is_empty());
    }
}
