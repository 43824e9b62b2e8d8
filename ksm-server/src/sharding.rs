use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::Client;
use kube::api::Api;
use ksm_metrics::ShardConfig;

/// Derives `shard_index` from this pod's ordinal and `shard_count` from the
/// owning workload's replica count (spec 4.I "Auto-sharding"). The pod name
/// is read from `POD_NAME` (downward API convention), and its ordinal is the
/// integer suffix after the last `-`. The owning workload is found by
/// namespace + name prefix: a `StatefulSet` sharing the pod name's prefix
/// (StatefulSet pod names are `<name>-<ordinal>`), falling back to the
/// `Deployment` that owns this pod's ReplicaSet.
pub async fn derive(client: &Client, namespace: &str) -> anyhow::Result<ShardConfig> {
    let pod_name = std::env::var("POD_NAME").map_err(|_| anyhow::anyhow!("POD_NAME is required for auto-sharding"))?;
    let (workload_name, index) = split_ordinal(&pod_name)?;

    let count = replica_count(client, namespace, &workload_name).await?;
    Ok(ShardConfig { index, count })
}

fn split_ordinal(pod_name: &str) -> anyhow::Result<(String, i32)> {
    let (prefix, suffix) = pod_name.rsplit_once('-').ok_or_else(|| anyhow::anyhow!("pod name {pod_name:?} has no ordinal suffix"))?;
    let index: i32 = suffix.parse().map_err(|_| anyhow::anyhow!("pod name {pod_name:?} has no ordinal suffix"))?;
    Ok((prefix.to_string(), index))
}

async fn replica_count(client: &Client, namespace: &str, workload_name: &str) -> anyhow::Result<i32> {
    let statefulsets: Api<StatefulSet> = Api::namespaced(client.clone(), namespace);
    if let Ok(sts) = statefulsets.get(workload_name).await {
        return Ok(sts.spec.and_then(|s| s.replicas).unwrap_or(1));
    }

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let deploy = deployments.get(workload_name).await?;
    Ok(deploy.spec.and_then(|s| s.replicas).unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_split_ordinal() {
        assert_eq!(split_ordinal("ksm-server-2").unwrap(), ("ksm-server".to_string(), 2));
    }

    #[rstest]
    fn test_split_ordinal_requires_numeric_suffix() {
        assert!(split_ordinal("ksm-server").is_err());
        assert!(split_ordinal("ksm-server-abc").is_err());
    }
}
