use ksm_core::k8s::GVK;
use lazy_static::lazy_static;

pub const TEST_NAMESPACE: &str = "ns1";
pub const TEST_DEPLOYMENT: &str = "test-deployment";
pub const TEST_DAEMONSET: &str = "test-daemonset";
pub const TEST_STATEFULSET: &str = "test-statefulset";
pub const TEST_SERVICE_ACCOUNT: &str = "test-service-account";
pub const TEST_POD: &str = "test-pod";
pub const TEST_CUSTOM_RESOURCE_KIND: &str = "Widget";
pub const TEST_CUSTOM_RESOURCE_GROUP: &str = "example.com";
pub const TEST_CUSTOM_RESOURCE_VERSION: &str = "v1";

lazy_static! {
    pub static ref DEPL_GVK: GVK = GVK::new("apps", "v1", "Deployment");
    pub static ref DS_GVK: GVK = GVK::new("apps", "v1", "DaemonSet");
    pub static ref STS_GVK: GVK = GVK::new("apps", "v1", "StatefulSet");
    pub static ref SVC_ACCOUNT_GVK: GVK = GVK::new("", "v1", "ServiceAccount");
    pub static ref WIDGET_GVK: GVK = GVK::new(TEST_CUSTOM_RESOURCE_GROUP, TEST_CUSTOM_RESOURCE_VERSION, TEST_CUSTOM_RESOURCE_KIND);
}
