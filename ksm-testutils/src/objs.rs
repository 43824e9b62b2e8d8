use kube::api::{
    DynamicObject,
    ObjectMeta,
    TypeMeta,
};
use kube::discovery::ApiResource;
use rstest::fixture;
use serde_json::json;

use crate::constants::*;

#[fixture]
pub fn test_deployment(#[default(TEST_DEPLOYMENT)] name: &str) -> DynamicObject {
    DynamicObject::new(name, &ApiResource::from_gvk(&DEPL_GVK))
        .within(TEST_NAMESPACE)
        .data(json!({"spec": {"replicas": 3}}))
}

#[fixture]
pub fn test_daemonset(#[default(TEST_DAEMONSET)] name: &str) -> DynamicObject {
    DynamicObject::new(name, &ApiResource::from_gvk(&DS_GVK))
        .within(TEST_NAMESPACE)
        .data(json!({"spec": {"updateStrategy": {"type": "OnDelete"}}}))
}

#[fixture]
pub fn test_statefulset(#[default(TEST_STATEFULSET)] name: &str) -> DynamicObject {
    DynamicObject::new(name, &ApiResource::from_gvk(&STS_GVK))
        .within(TEST_NAMESPACE)
        .data(json!({"spec": {"replicas": 2}}))
}

#[fixture]
pub fn test_service_account(#[default(TEST_SERVICE_ACCOUNT)] name: &str) -> DynamicObject {
    DynamicObject::new(name, &ApiResource::from_gvk(&SVC_ACCOUNT_GVK)).within(TEST_NAMESPACE)
}

/// A sample custom-resource object used to exercise the config-driven metric
/// compiler against something other than a built-in kind.
#[fixture]
pub fn test_widget(#[default("the-widget".into())] name: String) -> DynamicObject {
    DynamicObject {
        types: Some(TypeMeta {
            api_version: format!("{TEST_CUSTOM_RESOURCE_GROUP}/{TEST_CUSTOM_RESOURCE_VERSION}"),
            kind: TEST_CUSTOM_RESOURCE_KIND.into(),
        }),
        metadata: ObjectMeta {
            namespace: Some(TEST_NAMESPACE.into()),
            name: Some(name),
            uid: Some("widget-uid-1".into()),
            labels: Some([("team".to_string(), "platform".to_string())].into()),
            ..Default::default()
        },
        data: json!({
            "spec": {"replicas": 3},
            "status": {
                "phase": "Ready",
                "conditions": [{"type": "Available", "status": "True"}],
            },
        }),
    }
}
