//! In-memory cluster used by controller tests

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use kube::api::{DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;

use super::cluster::{
    split_api_version, ClusterQuery, DynamicClient, ObjectTarget, ResourceMapping, WorkloadStatus,
};
use crate::config::WorkloadKind;
use crate::error::{Error, Result};

type ObjectKey = (String, Option<String>, String);

const CLUSTER_SCOPED_KINDS: &[&str] = &["ClusterRole", "ClusterRoleBinding", "Namespace"];

#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<BTreeMap<ObjectKey, DynamicObject>>,
    workloads: Mutex<HashMap<(WorkloadKind, String, String), WorkloadStatus>>,
    secrets: Mutex<HashMap<(String, String), BTreeMap<String, String>>>,
    unknown_kinds: Vec<String>,
    pub creates: AtomicUsize,
    pub patches: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kinds the fake API server refuses to map
    pub fn with_unknown_kind(mut self, kind: &str) -> Self {
        self.unknown_kinds.push(kind.to_string());
        self
    }

    pub fn set_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
        status: WorkloadStatus,
    ) {
        self.workloads
            .lock()
            .unwrap()
            .insert((kind, namespace.to_string(), name.to_string()), status);
    }

    pub fn remove_workload(&self, kind: WorkloadKind, namespace: &str, name: &str) {
        self.workloads
            .lock()
            .unwrap()
            .remove(&(kind, namespace.to_string(), name.to_string()));
    }

    pub fn set_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        self.secrets.lock().unwrap().insert(
            (namespace.to_string(), name.to_string()),
            data.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    pub fn insert_object(
        &self,
        kind: &str,
        namespace: Option<&str>,
        name: &str,
        obj: DynamicObject,
    ) {
        self.objects.lock().unwrap().insert(
            (kind.to_string(), namespace.map(str::to_string), name.to_string()),
            obj,
        );
    }

    pub fn object(&self, kind: &str, namespace: Option<&str>, name: &str) -> Option<DynamicObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind.to_string(), namespace.map(str::to_string), name.to_string()))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn key(target: &ObjectTarget) -> ObjectKey {
        (
            target.mapping.api_resource.kind.clone(),
            target.namespace.clone(),
            target.name.clone(),
        )
    }
}

#[async_trait]
impl DynamicClient for FakeCluster {
    async fn resolve_mapping(&self, api_version: &str, kind: &str) -> Result<ResourceMapping> {
        if self.unknown_kinds.iter().any(|k| k == kind) {
            return Err(Error::MappingError {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
                message: "the server could not find the requested resource".to_string(),
            });
        }
        let (group, version) = split_api_version(api_version);
        Ok(ResourceMapping {
            api_resource: ApiResource::from_gvk(&GroupVersionKind::gvk(group, version, kind)),
            namespaced: !CLUSTER_SCOPED_KINDS.contains(&kind),
        })
    }

    async fn get(&self, target: &ObjectTarget) -> Result<Option<DynamicObject>> {
        Ok(self.objects.lock().unwrap().get(&Self::key(target)).cloned())
    }

    async fn create(&self, target: &ObjectTarget, obj: &DynamicObject) -> Result<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .insert(Self::key(target), obj.clone());
        Ok(())
    }

    async fn patch(&self, target: &ObjectTarget, obj: &DynamicObject) -> Result<()> {
        self.patches.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .insert(Self::key(target), obj.clone());
        Ok(())
    }

    async fn delete(&self, target: &ObjectTarget) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(&Self::key(target));
        Ok(())
    }
}

#[async_trait]
impl ClusterQuery for FakeCluster {
    async fn workload_status(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<WorkloadStatus>> {
        Ok(self
            .workloads
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// Workload with every replica ready and rolled out
pub fn ready(replicas: i32) -> WorkloadStatus {
    WorkloadStatus {
        ready: replicas,
        desired: replicas,
        updated: replicas,
        generation: Some(1),
        observed_generation: Some(1),
    }
}
