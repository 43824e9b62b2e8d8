use std::collections::BTreeMap;

use kube::api::Resource;

use super::*;
use crate::errors::*;

pub fn split_namespaced_name(name: &str) -> (String, String) {
    match name.split_once('/') {
        Some((namespace, name)) => (namespace.into(), name.into()),
        None => ("".into(), name.into()),
    }
}

impl<T: Resource> KubeResourceExt for T {
    fn namespaced_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}", ns, self.name_any()),
            None => self.name_any().clone(),
        }
    }

    fn matches(&self, sel: &metav1::LabelSelector) -> anyhow::Result<bool> {
        if let Some(exprs) = &sel.match_expressions {
            for expr in exprs {
                if !label_expr_match(self.labels(), expr)? {
                    return Ok(false);
                }
            }
        }

        if let Some(labels) = &sel.match_labels {
            for (k, v) in labels {
                if self.labels().get(k) != Some(v) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

// The meanings of these operators is explained here:
// https://kubernetes.io/docs/concepts/overview/working-with-objects/labels/#set-based-requirement
pub(super) const OPERATOR_IN: &str = "In";
pub(super) const OPERATOR_NOT_IN: &str = "NotIn";
pub(super) const OPERATOR_EXISTS: &str = "Exists";
pub(super) const OPERATOR_DOES_NOT_EXIST: &str = "DoesNotExist";

fn label_expr_match(
    obj_labels: &BTreeMap<String, String>,
    expr: &metav1::LabelSelectorRequirement,
) -> anyhow::Result<bool> {
    // LabelSelectorRequirement is considered invalid if the Operator is "In" or NotIn"
    // and there are no values; conversely for "Exists" and "DoesNotExist".
    match expr.operator.as_str() {
        OPERATOR_IN => match obj_labels.get(&expr.key) {
            Some(v) => match &expr.values {
                Some(values) if !values.is_empty() => Ok(values.contains(v)),
                _ => bail!(KubernetesError::malformed_label_selector(expr)),
            },
            None => Ok(false),
        },
        OPERATOR_NOT_IN => match obj_labels.get(&expr.key) {
            Some(v) => match &expr.values {
                Some(values) if !values.is_empty() => Ok(!values.contains(v)),
                _ => bail!(KubernetesError::malformed_label_selector(expr)),
            },
            None => Ok(true),
        },
        OPERATOR_EXISTS => match &expr.values {
            Some(values) if !values.is_empty() => bail!(KubernetesError::malformed_label_selector(expr)),
            _ => Ok(obj_labels.contains_key(&expr.key)),
        },
        OPERATOR_DOES_NOT_EXIST => match &expr.values {
            Some(values) if !values.is_empty() => {
                bail!(KubernetesError::malformed_label_selector(expr));
            },
            _ => Ok(!obj_labels.contains_key(&expr.key)),
        },
        _ => bail!("malformed label selector expression: {:?}", expr),
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;
    use crate::prelude::*;

    fn pod_with_labels(labels: &[(&str, &str)]) -> corev1::Pod {
        corev1::Pod {
            metadata: metav1::ObjectMeta {
                name: Some("p".into()),
                labels: Some(labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[rstest]
    fn test_namespaced_name_with_namespace() {
        let pod = corev1::Pod {
            metadata: metav1::ObjectMeta { name: Some("p".into()), namespace: Some("ns".into()), ..Default::default() },
            ..Default::default()
        };
        assert_eq!(pod.namespaced_name(), "ns/p");
    }

    #[rstest]
    fn test_namespaced_name_without_namespace() {
        let pod = corev1::Pod {
            metadata: metav1::ObjectMeta { name: Some("p".into()), ..Default::default() },
            ..Default::default()
        };
        assert_eq!(pod.namespaced_name(), "p");
    }

    #[rstest]
    fn test_matches_labels() {
        let pod = pod_with_labels(&[("app", "foo")]);
        let sel = metav1::LabelSelector {
            match_labels: Some([("app".to_string(), "foo".to_string())].into()),
            ..Default::default()
        };
        assert!(pod.matches(&sel).unwrap());
    }

    #[rstest]
    fn test_matches_labels_mismatch() {
        let pod = pod_with_labels(&[("app", "foo")]);
        let sel = metav1::LabelSelector {
            match_labels: Some([("app".to_string(), "bar".to_string())].into()),
            ..Default::default()
        };
        assert!(!pod.matches(&sel).unwrap());
    }

    #[rstest]
    fn test_matches_expr_in() {
        let pod = pod_with_labels(&[("app", "foo")]);
        let sel = metav1::LabelSelector {
            match_expressions: Some(vec![metav1::LabelSelectorRequirement {
                key: "app".into(),
                operator: OPERATOR_IN.into(),
                values: Some(vec!["foo".into(), "bar".into()]),
            }]),
            ..Default::default()
        };
        assert!(pod.matches(&sel).unwrap());
    }

    #[rstest]
    fn test_matches_expr_exists() {
        let pod = pod_with_labels(&[("app", "foo")]);
        let sel = metav1::LabelSelector {
            match_expressions: Some(vec![metav1::LabelSelectorRequirement {
                key: "missing".into(),
                operator: OPERATOR_EXISTS.into(),
                values: None,
            }]),
            ..Default::default()
        };
        assert!(!pod.matches(&sel).unwrap());
    }

    #[rstest]
    fn test_split_namespaced_name() {
        assert_eq!(split_namespaced_name("ns/name"), ("ns".into(), "name".into()));
        assert_eq!(split_namespaced_name("name"), ("".into(), "name".into()));
    }
}
