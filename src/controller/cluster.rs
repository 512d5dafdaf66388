//! Cluster access
//!
//! Everything that talks to the API server goes through two traits so the
//! reconciliation logic can be exercised without a cluster:
//!
//! - [`DynamicClient`]: REST mapping plus get/create/patch/delete of
//!   untyped objects
//! - [`ClusterQuery`]: read-only workload status and secret lookups
//!
//! [`KubeCluster`] implements both on top of `kube::Client`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use kube::discovery::{ApiResource, Scope};
use kube::{Client, ResourceExt};
use tokio::sync::RwLock;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::config::WorkloadKind;
use crate::error::{Error, Result};

/// Label naming the logical component an object belongs to
pub const COMPONENT_LABEL: &str = "app.kubernetes.io/component";

/// Identity of a rendered or live cluster object
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterObjectRef {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl ClusterObjectRef {
    /// Identity of a decoded object
    ///
    /// Fails when apiVersion, kind or metadata.name is missing.
    pub fn from_object(obj: &DynamicObject) -> Result<Self> {
        let types = obj
            .types
            .as_ref()
            .ok_or_else(|| Error::DecodeError("object has no apiVersion/kind".to_string()))?;
        if types.api_version.is_empty() || types.kind.is_empty() {
            return Err(Error::DecodeError(
                "object has an empty apiVersion or kind".to_string(),
            ));
        }
        let name = obj
            .metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                Error::DecodeError(format!("{} object has no metadata.name", types.kind))
            })?;

        Ok(Self {
            api_version: types.api_version.clone(),
            kind: types.kind.clone(),
            namespace: obj.metadata.namespace.clone(),
            name,
            labels: obj.labels().clone(),
        })
    }

    /// Value of the component label, if set
    pub fn component(&self) -> Option<&str> {
        self.labels.get(COMPONENT_LABEL).map(String::as_str)
    }
}

impl std::fmt::Display for ClusterObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Resolved REST mapping for an apiVersion/kind
#[derive(Clone, Debug)]
pub struct ResourceMapping {
    pub api_resource: ApiResource,
    pub namespaced: bool,
}

/// A single object addressed through its REST mapping
#[derive(Clone, Debug)]
pub struct ObjectTarget {
    pub mapping: ResourceMapping,
    /// Set for namespaced kinds only
    pub namespace: Option<String>,
    pub name: String,
}

/// Generic object access
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DynamicClient: Send + Sync {
    /// Resolve the REST mapping of a kind
    ///
    /// Returns [`Error::MappingError`] when the API server does not serve it.
    async fn resolve_mapping(&self, api_version: &str, kind: &str) -> Result<ResourceMapping>;

    /// Fetch an object; `None` when it does not exist
    async fn get(&self, target: &ObjectTarget) -> Result<Option<DynamicObject>>;

    async fn create(&self, target: &ObjectTarget, obj: &DynamicObject) -> Result<()>;

    /// Merge-patch the full desired object onto the live one
    async fn patch(&self, target: &ObjectTarget, obj: &DynamicObject) -> Result<()>;

    async fn delete(&self, target: &ObjectTarget) -> Result<()>;
}

/// Replica counts of a live workload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkloadStatus {
    pub ready: i32,
    pub desired: i32,
    pub updated: i32,
    pub generation: Option<i64>,
    pub observed_generation: Option<i64>,
}

/// Read-only cluster lookups
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterQuery: Send + Sync {
    /// Replica counts of a workload; `None` when it does not exist
    async fn workload_status(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<WorkloadStatus>>;

    /// Decoded data of a secret; `None` when it does not exist
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>>;
}

/// Split an apiVersion into group and version
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Cluster access backed by a live API server
pub struct KubeCluster {
    client: Client,
    mappings: RwLock<HashMap<(String, String), ResourceMapping>>,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            mappings: RwLock::new(HashMap::new()),
        }
    }

    fn api(&self, target: &ObjectTarget) -> Api<DynamicObject> {
        let ar = &target.mapping.api_resource;
        match (&target.namespace, target.mapping.namespaced) {
            (Some(ns), true) => Api::namespaced_with(self.client.clone(), ns, ar),
            _ => Api::all_with(self.client.clone(), ar),
        }
    }
}

#[async_trait]
impl DynamicClient for KubeCluster {
    async fn resolve_mapping(&self, api_version: &str, kind: &str) -> Result<ResourceMapping> {
        let key = (api_version.to_string(), kind.to_string());
        if let Some(mapping) = self.mappings.read().await.get(&key) {
            return Ok(mapping.clone());
        }

        let (group, version) = split_api_version(api_version);
        let gvk = kube::api::GroupVersionKind::gvk(group, version, kind);
        let (api_resource, caps) = match kube::discovery::pinned_kind(&self.client, &gvk).await {
            Ok(found) => found,
            Err(kube::Error::Discovery(e)) => {
                return Err(Error::MappingError {
                    api_version: api_version.to_string(),
                    kind: kind.to_string(),
                    message: e.to_string(),
                })
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                return Err(Error::MappingError {
                    api_version: api_version.to_string(),
                    kind: kind.to_string(),
                    message: ae.message,
                })
            }
            Err(e) => return Err(Error::KubeError(e)),
        };

        let mapping = ResourceMapping {
            api_resource,
            namespaced: caps.scope == Scope::Namespaced,
        };
        debug!(
            "Resolved {} {} to {} (namespaced: {})",
            api_version, kind, mapping.api_resource.plural, mapping.namespaced
        );
        self.mappings.write().await.insert(key, mapping.clone());
        Ok(mapping)
    }

    async fn get(&self, target: &ObjectTarget) -> Result<Option<DynamicObject>> {
        Ok(self.api(target).get_opt(&target.name).await?)
    }

    async fn create(&self, target: &ObjectTarget, obj: &DynamicObject) -> Result<()> {
        self.api(target).create(&PostParams::default(), obj).await?;
        Ok(())
    }

    async fn patch(&self, target: &ObjectTarget, obj: &DynamicObject) -> Result<()> {
        self.api(target)
            .patch(
                &target.name,
                &PatchParams::default(),
                &Patch::Merge(obj),
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, target: &ObjectTarget) -> Result<()> {
        match self
            .api(target)
            .delete(&target.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            // Already gone between get and delete
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(Error::KubeError(e)),
        }
    }
}

#[async_trait]
impl ClusterQuery for KubeCluster {
    async fn workload_status(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<WorkloadStatus>> {
        match kind {
            WorkloadKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                Ok(api.get_opt(name).await?.map(|deployment| {
                    let status = deployment.status.unwrap_or_default();
                    WorkloadStatus {
                        ready: status.ready_replicas.unwrap_or(0),
                        desired: deployment
                            .spec
                            .and_then(|s| s.replicas)
                            .unwrap_or(1),
                        updated: status.updated_replicas.unwrap_or(0),
                        generation: deployment.metadata.generation,
                        observed_generation: status.observed_generation,
                    }
                }))
            }
            WorkloadKind::DaemonSet => {
                let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
                Ok(api.get_opt(name).await?.map(|daemonset| {
                    let status = daemonset.status.unwrap_or_default();
                    WorkloadStatus {
                        ready: status.number_ready,
                        desired: status.desired_number_scheduled,
                        updated: status.updated_number_scheduled.unwrap_or(0),
                        generation: daemonset.metadata.generation,
                        observed_generation: status.observed_generation,
                    }
                }))
            }
        }
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.map(|secret| {
            secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, String::from_utf8_lossy(&v.0).into_owned()))
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: serde_json::Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_split_api_version() {
        assert_eq!(split_api_version("apps/v1"), ("apps", "v1"));
        assert_eq!(split_api_version("v1"), ("", "v1"));
    }

    #[test]
    fn test_object_ref_reads_identity_and_component() {
        let obj = object(serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "metrics-proxy",
                "namespace": "observability-system",
                "labels": { "app.kubernetes.io/component": "proxy" }
            }
        }));

        let obj_ref = ClusterObjectRef::from_object(&obj).unwrap();
        assert_eq!(obj_ref.kind, "Deployment");
        assert_eq!(obj_ref.namespace.as_deref(), Some("observability-system"));
        assert_eq!(obj_ref.component(), Some("proxy"));
        assert_eq!(
            obj_ref.to_string(),
            "Deployment observability-system/metrics-proxy"
        );
    }

    #[test]
    fn test_object_ref_requires_name() {
        let obj = object(serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {}
        }));
        assert!(matches!(
            ClusterObjectRef::from_object(&obj),
            Err(Error::DecodeError(_))
        ));
    }
}
