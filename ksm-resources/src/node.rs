use k8s_openapi::api::core::v1::Node;
use ksm_core::quantity::parse_quantity;
use ksm_metrics::{Family, KeyAllowList, MetricType, Sample};

use crate::common::{annotations_family, labels_family};

const CONDITION_TYPES: &[&str] = &["Ready", "MemoryPressure", "DiskPressure", "PIDPressure", "NetworkUnavailable"];
const CONDITION_STATUSES: &[&str] = &["True", "False", "Unknown"];

pub fn families(label_allow: KeyAllowList, annotation_allow: KeyAllowList) -> Vec<Family<Node>> {
    vec![
        info(),
        status_capacity(),
        status_allocatable(),
        status_condition(),
        labels_family("node", label_allow, |n: &Node| n.metadata.labels.clone().unwrap_or_default()),
        annotations_family("node", annotation_allow, |n: &Node| n.metadata.annotations.clone().unwrap_or_default()),
    ]
}

fn info() -> Family<Node> {
    Family::new(
        "kube_node_info",
        "Information about a cluster node.",
        MetricType::Info,
        vec!["kernel_version".into(), "os_image".into(), "kubelet_version".into()],
        |node: &Node| {
            let info = node.status.as_ref().and_then(|s| s.node_info.clone()).unwrap_or_default();
            vec![Sample::new(vec![info.kernel_version, info.os_image, info.kubelet_version], 1.0)]
        },
    )
}

/// `kube_node_status_capacity`: gauge, one line per resource name (spec 4.A gauge).
fn status_capacity() -> Family<Node> {
    resource_gauge("kube_node_status_capacity", "The total resources of a node.", |node| {
        node.status.as_ref().and_then(|s| s.capacity.clone()).unwrap_or_default()
    })
}

fn status_allocatable() -> Family<Node> {
    resource_gauge("kube_node_status_allocatable", "The allocatable resources of a node.", |node| {
        node.status.as_ref().and_then(|s| s.allocatable.clone()).unwrap_or_default()
    })
}

fn resource_gauge(
    name: &'static str,
    help: &'static str,
    get: impl Fn(&Node) -> std::collections::BTreeMap<String, k8s_openapi::apimachinery::pkg::api::resource::Quantity>
        + Send
        + Sync
        + 'static,
) -> Family<Node> {
    Family::new(name, help, MetricType::Gauge, vec!["resource".into()], move |node: &Node| {
        get(node)
            .into_iter()
            .filter_map(|(resource, q)| parse_quantity(&q.0).ok().map(|v| Sample::new(vec![resource], v)))
            .collect()
    })
}

/// `kube_node_status_condition`: stateset crossed with condition type (spec 4.A).
fn status_condition() -> Family<Node> {
    Family::new(
        "kube_node_status_condition",
        "The condition of a cluster node.",
        MetricType::StateSet,
        vec!["condition".into(), "status".into()],
        |node: &Node| {
            let conditions = node.status.as_ref().and_then(|s| s.conditions.clone()).unwrap_or_default();
            CONDITION_TYPES
                .iter()
                .flat_map(|cond_type| {
                    let actual = conditions
                        .iter()
                        .find(|c| c.type_ == *cond_type)
                        .map(|c| c.status.clone())
                        .unwrap_or_else(|| "Unknown".to_string());
                    CONDITION_STATUSES.iter().map(move |status| {
                        Sample::new(
                            vec![cond_type.to_string(), status.to_string()],
                            if *status == actual { 1.0 } else { 0.0 },
                        )
                    })
                })
                .collect()
        },
    )
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_capacity_gauge() {
        let node = Node {
            status: Some(NodeStatus {
                capacity: Some([("cpu".to_string(), Quantity("4".into()))].into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let samples = status_capacity().generate(&node);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 4.0);
    }

    #[rstest]
    fn test_condition_exactly_one_true_per_type() {
        let node = Node {
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition { type_: "Ready".into(), status: "True".into(), ..Default::default() }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let samples = status_condition().generate(&node);
        assert_eq!(samples.len(), CONDITION_TYPES.len() * CONDITION_STATUSES.len());
        let ready_true = samples.iter().find(|s| s.label_values == vec!["Ready", "True"]).unwrap();
        assert_eq!(ready_true.value, 1.0);
    }
}
