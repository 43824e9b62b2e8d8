use std::collections::HashMap;
use std::fs;

use serde::Deserialize;

use crate::errors::*;

err_impl! {ConfigError,
    #[error("failed to read custom-resource config file {0:?}")]
    ReadFailed(String),

    #[error("failed to parse custom-resource config: {0}")]
    ParseFailed(String),
}

/// Top-level custom-resource engine configuration (spec 4.G, spec 6 "Configuration
/// file format"): `spec.resources` is a list of per-GVK family declarations.
#[derive(Debug, Clone, Deserialize)]
pub struct TopLevelConfig {
    pub spec: SpecConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecConfig {
    pub resources: Vec<ResourceConfig>,
}

fn default_metric_name_prefix() -> Option<String> {
    Some(ksm_core::constants::DEFAULT_CUSTOMRESOURCE_METRIC_PREFIX.to_string())
}

/// One `Resource` entry (spec 4.G).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    pub group_version_kind: GvkConfig,
    #[serde(default = "default_metric_name_prefix")]
    pub metric_name_prefix: Option<String>,
    #[serde(default)]
    pub labels_from_path: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub common_labels: HashMap<String, String>,
    pub metrics: Vec<GeneratorConfig>,
}

impl ResourceConfig {
    /// Empty string suppresses the prefix entirely; unset defaults to
    /// `kube_customresource` (spec 4.G "metricNamePrefix").
    pub fn prefix(&self) -> &str {
        self.metric_name_prefix.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GvkConfig {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

/// One `Generator` (spec 4.G): family identity plus a type-specific body.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub name: String,
    pub help: String,
    pub each: EachConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EachConfig {
    #[serde(rename = "type")]
    pub each_type: EachType,
    #[serde(default)]
    pub gauge: Option<FieldSpec>,
    #[serde(default)]
    pub info: Option<FieldSpec>,
    #[serde(default)]
    pub stateset: Option<StateSetSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EachType {
    Gauge,
    Info,
    #[serde(alias = "StateSet")]
    Stateset,
}

/// The body of a `gauge` or `info` generator (spec 4.G: "`path`, `valueFrom` ...,
/// optional `labelFromKey` ..., `labelsFromPath` ..., `nilIsZero`").
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub value_from: Option<ValueFromConfig>,
    #[serde(default)]
    pub label_from_key: Option<String>,
    #[serde(default)]
    pub labels_from_path: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub nil_is_zero: bool,
}

/// The body of a `stateset` generator (spec 4.G: "`list` is the closed set of
/// states; `labelName` is the label key used").
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSetSpec {
    #[serde(default)]
    pub path: Vec<String>,
    pub label_name: String,
    pub list: Vec<String>,
}

/// `valueFrom` accepts either a string list (path) or an object
/// `{path: [...], expression: "…"}`, mutually exclusive between the two forms
/// (spec 6). `#[serde(untagged)]` enforces the shape at parse time: a bare array
/// is a path, an object must carry both fields or parsing fails.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ValueFromConfig {
    Path(Vec<String>),
    Expression { path: Vec<String>, expression: String },
}

/// Loads and parses a custom-resource engine configuration from a YAML file on
/// disk (spec 6: "path or inline text of the custom-resource engine
/// configuration"). Any failure here is a configuration error, fatal at startup
/// (spec 7).
pub fn load_file(path: &str) -> anyhow::Result<TopLevelConfig> {
    let contents = fs::read_to_string(path).map_err(|_| ConfigError::read_failed(path))?;
    load_str(&contents)
}

pub fn load_str(contents: &str) -> anyhow::Result<TopLevelConfig> {
    serde_yaml::from_str(contents).map_err(|e| ConfigError::parse_failed(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    const EXAMPLE: &str = r#"
spec:
  resources:
    - groupVersionKind:
        group: example.com
        version: v1
        kind: Widget
      metricNamePrefix: kube_widget
      commonLabels:
        team: platform
      metrics:
        - name: active
          help: Whether the widget is active.
          each:
            type: Gauge
            gauge:
              path: ["status", "active"]
              valueFrom: ["status", "active"]
        - name: conditions
          help: Widget conditions.
          each:
            type: Gauge
            gauge:
              path: ["status", "conditions"]
              labelsFromPath:
                type: ["type"]
              valueFrom: ["status"]
        - name: phase
          help: Widget phase.
          each:
            type: Stateset
            stateset:
              path: ["status", "phase"]
              labelName: phase
              list: ["Pending", "Ready", "Failed"]
"#;

    #[rstest]
    fn test_parses_example_config() {
        let config = load_str(EXAMPLE).unwrap();
        assert_eq!(config.spec.resources.len(), 1);
        let resource = &config.spec.resources[0];
        assert_eq!(resource.group_version_kind.kind, "Widget");
        assert_eq!(resource.metrics.len(), 3);
    }

    #[rstest]
    fn test_value_from_path_form() {
        let config = load_str(EXAMPLE).unwrap();
        let gauge = config.spec.resources[0].metrics[0].each.gauge.as_ref().unwrap();
        match gauge.value_from.as_ref().unwrap() {
            ValueFromConfig::Path(p) => assert_eq!(p, &vec!["status".to_string(), "active".to_string()]),
            other => panic!("expected a path form, got {other:?}"),
        }
    }

    #[rstest]
    fn test_value_from_expression_form() {
        let yaml = r#"
spec:
  resources:
    - groupVersionKind: {version: v1, kind: Widget}
      metrics:
        - name: x
          help: h
          each:
            type: Gauge
            gauge:
              valueFrom:
                path: ["status", "count"]
                expression: "value * 2"
"#;
        let config = load_str(yaml).unwrap();
        let gauge = config.spec.resources[0].metrics[0].each.gauge.as_ref().unwrap();
        match gauge.value_from.as_ref().unwrap() {
            ValueFromConfig::Expression { expression, .. } => assert_eq!(expression, "value * 2"),
            other => panic!("expected an expression form, got {other:?}"),
        }
    }

    #[rstest]
    fn test_default_prefix() {
        let config = load_str(EXAMPLE).unwrap();
        assert_eq!(config.spec.resources[0].prefix(), "kube_widget");
    }

    #[rstest]
    fn test_empty_prefix_suppressed() {
        let yaml = r#"
spec:
  resources:
    - groupVersionKind: {version: v1, kind: Widget}
      metricNamePrefix: ""
      metrics: []
"#;
        let config = load_str(yaml).unwrap();
        assert_eq!(config.spec.resources[0].prefix(), "");
    }

    #[rstest]
    fn test_malformed_yaml_is_an_error() {
        assert!(load_str("not: [valid").is_err());
    }
}
