use k8s_openapi::api::core::v1::Namespace;
use ksm_metrics::{Family, KeyAllowList, MetricType, Sample};

use crate::common::{annotations_family, labels_family};

const PHASES: &[&str] = &["Active", "Terminating"];

pub fn families(label_allow: KeyAllowList, annotation_allow: KeyAllowList) -> Vec<Family<Namespace>> {
    vec![
        status_phase(),
        labels_family("namespace", label_allow, |n: &Namespace| n.metadata.labels.clone().unwrap_or_default()),
        annotations_family("namespace", annotation_allow, |n: &Namespace| n.metadata.annotations.clone().unwrap_or_default()),
    ]
}

fn status_phase() -> Family<Namespace> {
    Family::new("kube_namespace_status_phase", "Kubernetes namespace status phase.", MetricType::StateSet, vec!["phase".into()], |ns: &Namespace| {
        let phase = ns.status.as_ref().and_then(|s| s.phase.clone()).unwrap_or_else(|| "Active".to_string());
        PHASES.iter().map(|state| Sample::new(vec![state.to_string()], if *state == phase { 1.0 } else { 0.0 })).collect()
    })
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::NamespaceStatus;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_phase_defaults_to_active() {
        let samples = status_phase().generate(&Namespace::default());
        let active = samples.iter().find(|s| s.label_values == vec!["Active"]).unwrap();
        assert_eq!(active.value, 1.0);
    }

    #[rstest]
    fn test_phase_terminating() {
        let ns = Namespace { status: Some(NamespaceStatus { phase: Some("Terminating".into()), ..Default::default() }), ..Default::default() };
        let samples = status_phase().generate(&ns);
        let terminating = samples.iter().find(|s| s.label_values == vec!["Terminating"]).unwrap();
        assert_eq!(terminating.value, 1.0);
    }
}
