use std::collections::{BTreeMap, HashMap, HashSet};

use kube::api::DynamicObject;
use ksm_core::jsonutils::ValuePath;
use ksm_metrics::{Family, MetricType, Sample};
use serde_json::Value;

use crate::coerce::coerce_leaf;
use crate::config::{EachType, FieldSpec, GeneratorConfig, ResourceConfig, StateSetSpec, ValueFromConfig};
use crate::errors::*;
use crate::expr::CompiledExpr;

err_impl! {CompileError,
    #[error("generator {0:?} is missing its type-specific body")]
    MissingBody(String),
}

/// Compiles one `Resource` entry's `metrics` list into family generators over
/// untyped objects (spec 4.G). Each generator is a pure function of the object's
/// JSON tree, equivalent in shape to the built-in family generators in
/// `ksm-resources` but produced from declarative configuration instead of Rust
/// source.
pub fn compile_resource(cfg: &ResourceConfig) -> anyhow::Result<Vec<Family<DynamicObject>>> {
    let gvk_labels = vec![
        ("customresource_group".to_string(), cfg.group_version_kind.group.clone()),
        ("customresource_version".to_string(), cfg.group_version_kind.version.clone()),
        ("customresource_kind".to_string(), cfg.group_version_kind.kind.clone()),
    ];
    let resource_labels = compile_label_paths(&cfg.labels_from_path)?;
    let common_labels: Vec<(String, String)> = cfg.common_labels.clone().into_iter().collect();
    let prefix = cfg.prefix().to_string();

    cfg.metrics
        .iter()
        .map(|generator| compile_generator(generator, &prefix, &gvk_labels, &resource_labels, &common_labels))
        .collect()
}

fn compile_generator(
    generator: &GeneratorConfig,
    prefix: &str,
    gvk_labels: &[(String, String)],
    resource_labels: &[(String, ValuePath)],
    common_labels: &[(String, String)],
) -> anyhow::Result<Family<DynamicObject>> {
    let name = family_name(prefix, &generator.name);

    match generator.each.each_type {
        EachType::Gauge => {
            let spec = generator.each.gauge.as_ref().ok_or_else(|| CompileError::missing_body(&generator.name))?;
            compile_field_generator(name, generator.help.clone(), MetricType::Gauge, spec, gvk_labels, resource_labels, common_labels)
        },
        EachType::Info => {
            let spec = generator.each.info.as_ref().ok_or_else(|| CompileError::missing_body(&generator.name))?;
            compile_field_generator(name, generator.help.clone(), MetricType::Info, spec, gvk_labels, resource_labels, common_labels)
        },
        EachType::Stateset => {
            let spec = generator.each.stateset.as_ref().ok_or_else(|| CompileError::missing_body(&generator.name))?;
            compile_stateset_generator(name, generator.help.clone(), spec, gvk_labels, resource_labels, common_labels)
        },
    }
}

fn family_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() { name.to_string() } else { format!("{prefix}_{name}") }
}

fn compile_label_paths(map: &HashMap<String, Vec<String>>) -> anyhow::Result<Vec<(String, ValuePath)>> {
    map.iter().map(|(label, steps)| Ok((label.clone(), ValuePath::compile(steps)?))).collect()
}

/// The `value` half of `valueFrom` is either a compiled relative path or a
/// compiled expression bound to the subtree at the expression's own `path` (spec
/// 3 "Compiled expression program", spec 4.G).
enum CompiledValueFrom {
    Path(ValuePath),
    Expression { path: ValuePath, program: CompiledExpr },
}

impl CompiledValueFrom {
    fn compile(cfg: &ValueFromConfig) -> anyhow::Result<CompiledValueFrom> {
        Ok(match cfg {
            ValueFromConfig::Path(steps) => CompiledValueFrom::Path(ValuePath::compile(steps)?),
            ValueFromConfig::Expression { path, expression } => {
                CompiledValueFrom::Expression { path: ValuePath::compile(path)?, program: CompiledExpr::compile(expression)? }
            },
        })
    }

    /// Resolves against `item` (the per-line anchor: the object itself, or one
    /// array element, or one object value when iterating by key). Returns the
    /// coerced numeric value plus any expression-contributed labels.
    fn resolve(&self, item: &Value) -> Option<(f64, Vec<(String, String)>)> {
        match self {
            CompiledValueFrom::Path(path) => {
                let leaf = if path.is_empty() { Some(item) } else { path.evaluate(item) };
                leaf.and_then(coerce_leaf).map(|v| (v, vec![]))
            },
            CompiledValueFrom::Expression { path, program } => {
                let binding = if path.is_empty() { Some(item) } else { path.evaluate(item) };
                let binding = binding?;
                let result = program.evaluate(binding).ok()?;
                let value = coerce_leaf(result.scalar())?;
                Some((value, result.labels().to_vec()))
            },
        }
    }
}

struct CompiledFieldSpec {
    path: ValuePath,
    value_from: Option<CompiledValueFrom>,
    label_from_key: Option<String>,
    labels_from_path: Vec<(String, ValuePath)>,
    nil_is_zero: bool,
}

impl CompiledFieldSpec {
    fn compile(spec: &FieldSpec) -> anyhow::Result<CompiledFieldSpec> {
        Ok(CompiledFieldSpec {
            path: ValuePath::compile(&spec.path)?,
            value_from: spec.value_from.as_ref().map(CompiledValueFrom::compile).transpose()?,
            label_from_key: spec.label_from_key.clone(),
            labels_from_path: compile_label_paths(&spec.labels_from_path)?,
            nil_is_zero: spec.nil_is_zero,
        })
    }
}

fn compile_field_generator(
    name: String,
    help: String,
    metric_type: MetricType,
    spec: &FieldSpec,
    gvk_labels: &[(String, String)],
    resource_labels: &[(String, ValuePath)],
    common_labels: &[(String, String)],
) -> anyhow::Result<Family<DynamicObject>> {
    let compiled = CompiledFieldSpec::compile(spec)?;
    let gvk_labels = gvk_labels.to_vec();
    let resource_labels = resource_labels.to_vec();
    let common_labels = common_labels.to_vec();
    let protected: HashSet<String> = gvk_labels.iter().map(|(k, _)| k.clone()).collect();
    let family_name_for_errors = name.clone();

    Ok(Family::new(name, help, metric_type, vec![], move |obj: &DynamicObject| {
        let root = &obj.data;
        let anchor = if compiled.path.is_empty() { Some(root) } else { compiled.path.evaluate(root) };

        let Some(anchor) = anchor else {
            return nil_sample(&compiled, root, &gvk_labels, &resource_labels, &common_labels, &protected);
        };

        let entries: Vec<(Option<String>, &Value)> = match anchor {
            Value::Object(map) if compiled.label_from_key.is_some() => {
                map.iter().map(|(k, v)| (Some(k.clone()), v)).collect()
            },
            Value::Array(items) => items.iter().map(|v| (None, v)).collect(),
            other => vec![(None, other)],
        };

        entries
            .into_iter()
            .filter_map(|(key, item)| {
                build_sample(
                    &compiled,
                    root,
                    item,
                    key.as_deref(),
                    &gvk_labels,
                    &resource_labels,
                    &common_labels,
                    &protected,
                )
                .or_else(|| {
                    metrics::counter!("ksm_customresource_errors_total", "family" => family_name_for_errors.clone())
                        .increment(1);
                    None
                })
            })
            .collect()
    }))
}

fn nil_sample(
    compiled: &CompiledFieldSpec,
    root: &Value,
    gvk_labels: &[(String, String)],
    resource_labels: &[(String, ValuePath)],
    common_labels: &[(String, String)],
    protected: &HashSet<String>,
) -> Vec<Sample> {
    if !compiled.nil_is_zero {
        return vec![];
    }
    let labels = merge_labels(gvk_labels, common_labels, resource_labels, root, &[], root, None, &[], protected);
    vec![Sample::new(vec![], 0.0).with_dynamic(labels)]
}

fn build_sample(
    compiled: &CompiledFieldSpec,
    root: &Value,
    item: &Value,
    key: Option<&str>,
    gvk_labels: &[(String, String)],
    resource_labels: &[(String, ValuePath)],
    common_labels: &[(String, String)],
    protected: &HashSet<String>,
) -> Option<Sample> {
    let (value, expr_labels) = match &compiled.value_from {
        Some(vf) => vf.resolve(item)?,
        None => (coerce_leaf(item)?, vec![]),
    };

    let labels = merge_labels(
        gvk_labels,
        common_labels,
        resource_labels,
        root,
        &compiled.labels_from_path,
        item,
        compiled.label_from_key.as_deref().zip(key),
        &expr_labels,
        protected,
    );

    Some(Sample::new(vec![], value).with_dynamic(labels))
}

#[allow(clippy::too_many_arguments)]
fn merge_labels(
    gvk_labels: &[(String, String)],
    common_labels: &[(String, String)],
    resource_labels: &[(String, ValuePath)],
    root: &Value,
    generator_labels: &[(String, ValuePath)],
    item: &Value,
    label_from_key: Option<(&str, &str)>,
    expr_labels: &[(String, String)],
    protected: &HashSet<String>,
) -> Vec<(String, String)> {
    // Label precedence, lowest to highest (spec 4.G "Label precedence"): GVK labels
    // are non-overridable (spec 9 open question resolution), so every later write
    // here is rejected for a key already present from `gvk_labels`.
    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    for (k, v) in gvk_labels {
        labels.insert(k.clone(), v.clone());
    }
    for (k, v) in common_labels {
        insert_unprotected(&mut labels, protected, k.clone(), v.clone());
    }
    for (k, v) in resolve_label_paths(resource_labels, root) {
        insert_unprotected(&mut labels, protected, k, v);
    }
    for (k, v) in resolve_label_paths(generator_labels, item) {
        insert_unprotected(&mut labels, protected, k, v);
    }
    if let Some((name, key)) = label_from_key {
        insert_unprotected(&mut labels, protected, name.to_string(), key.to_string());
    }
    for (k, v) in expr_labels {
        insert_unprotected(&mut labels, protected, k.clone(), v.clone());
    }
    labels.into_iter().collect()
}

fn insert_unprotected(labels: &mut BTreeMap<String, String>, protected: &HashSet<String>, key: String, value: String) {
    if !protected.contains(&key) {
        labels.insert(key, value);
    }
}

fn resolve_label_paths(paths: &[(String, ValuePath)], root: &Value) -> Vec<(String, String)> {
    paths.iter().filter_map(|(label, path)| path.evaluate(root).map(|v| (label.clone(), json_to_label_string(v)))).collect()
}

fn json_to_label_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compile_stateset_generator(
    name: String,
    help: String,
    spec: &StateSetSpec,
    gvk_labels: &[(String, String)],
    resource_labels: &[(String, ValuePath)],
    common_labels: &[(String, String)],
) -> anyhow::Result<Family<DynamicObject>> {
    let path = ValuePath::compile(&spec.path)?;
    let label_name = spec.label_name.clone();
    let states = spec.list.clone();
    let gvk_labels = gvk_labels.to_vec();
    let resource_labels = resource_labels.to_vec();
    let common_labels = common_labels.to_vec();
    let protected: HashSet<String> = gvk_labels.iter().map(|(k, _)| k.clone()).collect();

    Ok(Family::new(name, help, MetricType::StateSet, vec![label_name.clone()], move |obj: &DynamicObject| {
        let root = &obj.data;
        let anchor = if path.is_empty() { Some(root) } else { path.evaluate(root) };
        // An unresolved or non-string leaf is an "unknown state value": every
        // state gets 0.0, not an error (spec 4.G "Stateset").
        let actual = anchor.and_then(|v| v.as_str());

        let labels = merge_labels(&gvk_labels, &common_labels, &resource_labels, root, &[], root, None, &[], &protected);

        states
            .iter()
            .map(|state| {
                let value = if Some(state.as_str()) == actual { 1.0 } else { 0.0 };
                Sample::new(vec![state.clone()], value).with_dynamic(labels.clone())
            })
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use serde_json::json;

    use super::*;
    use crate::config::{GvkConfig, load_str};

    fn widget(data: Value) -> DynamicObject {
        DynamicObject { types: None, metadata: Default::default(), data }
    }

    fn gvk() -> GvkConfig {
        GvkConfig { group: "example.com".into(), version: "v1".into(), kind: "Widget".into() }
    }

    #[rstest]
    fn test_info_family_single_line() {
        let cfg = ResourceConfig {
            group_version_kind: gvk(),
            metric_name_prefix: Some("kube_widget".into()),
            labels_from_path: Default::default(),
            common_labels: Default::default(),
            metrics: vec![],
        };
        let families = compile_resource(&cfg).unwrap();
        assert!(families.is_empty());
    }

    #[rstest]
    fn test_scenario_s2_condition_projection() {
        // spec 8, S2: a gauge whose path anchors on an array of conditions and
        // projects `type` as a label, value from `status`.
        let yaml = r#"
spec:
  resources:
    - groupVersionKind: {group: example.com, version: v1, kind: Widget}
      metricNamePrefix: ""
      metrics:
        - name: widget_condition
          help: h
          each:
            type: Gauge
            gauge:
              path: ["status", "conditions"]
              labelsFromPath:
                type: ["type"]
              valueFrom: ["status"]
"#;
        let config = load_str(yaml).unwrap();
        let families = compile_resource(&config.spec.resources[0]).unwrap();
        let family = &families[0];
        assert_eq!(family.name, "widget_condition");

        let obj = widget(json!({
            "status": {
                "conditions": [
                    {"type": "Ready", "status": "True"},
                    {"type": "Provisioned", "status": "False"},
                ]
            }
        }));
        let mut samples = family.generate(&obj);
        samples.sort_by(|a, b| a.dynamic_labels.cmp(&b.dynamic_labels));

        // Every line also carries the resource's non-overridable GVK labels
        // (spec 4.G "Label precedence"), ahead of the per-condition `type` label.
        let type_of = |s: &Sample| s.dynamic_labels.iter().find(|(k, _)| k == "type").unwrap().1.clone();

        assert_eq!(samples.len(), 2);
        assert_eq!(type_of(&samples[0]), "Provisioned");
        assert_eq!(samples[0].value, 0.0);
        assert_eq!(type_of(&samples[1]), "Ready");
        assert_eq!(samples[1].value, 1.0);
        for sample in &samples {
            assert!(sample.dynamic_labels.contains(&("customresource_kind".to_string(), "Widget".to_string())));
        }
    }

    #[rstest]
    fn test_stateset_generator() {
        let yaml = r#"
spec:
  resources:
    - groupVersionKind: {version: v1, kind: Widget}
      metrics:
        - name: phase
          help: h
          each:
            type: Stateset
            stateset:
              path: ["status", "phase"]
              labelName: phase
              list: ["Pending", "Ready", "Failed"]
"#;
        let config = load_str(yaml).unwrap();
        let families = compile_resource(&config.spec.resources[0]).unwrap();
        let family = &families[0];

        let obj = widget(json!({"status": {"phase": "Ready"}}));
        let samples = family.generate(&obj);
        assert_eq!(samples.len(), 3);
        let active: Vec<_> = samples.iter().filter(|s| s.value == 1.0).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].label_values, vec!["Ready"]);
    }

    #[rstest]
    fn test_stateset_unknown_value_is_all_zero() {
        let yaml = r#"
spec:
  resources:
    - groupVersionKind: {version: v1, kind: Widget}
      metrics:
        - name: phase
          help: h
          each:
            type: Stateset
            stateset:
              path: ["status", "phase"]
              labelName: phase
              list: ["Pending", "Ready"]
"#;
        let config = load_str(yaml).unwrap();
        let families = compile_resource(&config.spec.resources[0]).unwrap();
        let obj = widget(json!({"status": {"phase": "SomethingElse"}}));
        let samples = families[0].generate(&obj);
        assert!(samples.iter().all(|s| s.value == 0.0));
    }

    #[rstest]
    fn test_nil_is_zero() {
        let yaml = r#"
spec:
  resources:
    - groupVersionKind: {version: v1, kind: Widget}
      metrics:
        - name: missing
          help: h
          each:
            type: Gauge
            gauge:
              path: ["status", "absent"]
              nilIsZero: true
"#;
        let config = load_str(yaml).unwrap();
        let families = compile_resource(&config.spec.resources[0]).unwrap();
        let obj = widget(json!({"status": {}}));
        let samples = families[0].generate(&obj);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 0.0);
    }

    #[rstest]
    fn test_without_nil_is_zero_produces_no_line() {
        let yaml = r#"
spec:
  resources:
    - groupVersionKind: {version: v1, kind: Widget}
      metrics:
        - name: missing
          help: h
          each:
            type: Gauge
            gauge:
              path: ["status", "absent"]
"#;
        let config = load_str(yaml).unwrap();
        let families = compile_resource(&config.spec.resources[0]).unwrap();
        let obj = widget(json!({"status": {}}));
        assert!(families[0].generate(&obj).is_empty());
    }

    #[rstest]
    fn test_gvk_labels_are_not_overridable() {
        let yaml = r#"
spec:
  resources:
    - groupVersionKind: {group: example.com, version: v1, kind: Widget}
      commonLabels:
        customresource_kind: should-not-win
      metrics:
        - name: info
          help: h
          each:
            type: Info
            info:
              path: []
"#;
        let config = load_str(yaml).unwrap();
        let families = compile_resource(&config.spec.resources[0]).unwrap();
        let obj = widget(json!({}));
        let samples = families[0].generate(&obj);
        let kind_label = samples[0].dynamic_labels.iter().find(|(k, _)| k == "customresource_kind").unwrap();
        assert_eq!(kind_label.1, "Widget");
    }

    #[rstest]
    fn test_expression_value_from() {
        let yaml = r#"
spec:
  resources:
    - groupVersionKind: {version: v1, kind: Widget}
      metrics:
        - name: doubled
          help: h
          each:
            type: Gauge
            gauge:
              valueFrom:
                path: ["spec", "count"]
                expression: "value * 2"
"#;
        let config = load_str(yaml).unwrap();
        let families = compile_resource(&config.spec.resources[0]).unwrap();
        let obj = widget(json!({"spec": {"count": 21}}));
        let samples = families[0].generate(&obj);
        assert_eq!(samples[0].value, 42.0);
    }
}
