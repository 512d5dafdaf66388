//! Idempotent apply and delete of rendered manifests
//!
//! Each rendered document is decoded into a `DynamicObject`, its REST
//! mapping is resolved, and the object is created, merge-patched or deleted
//! by name. Documents are processed in order; the first failure aborts the
//! batch and objects handled before it stay as they are.

use kube::api::DynamicObject;
use tracing::{debug, info};

use super::cluster::{ClusterObjectRef, DynamicClient, ObjectTarget};
use crate::error::{Error, Result};
use crate::render::RenderedDocument;

/// Outcome counts of an apply batch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub patched: usize,
    pub skipped: usize,
}

/// Outcome counts of a delete batch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted: usize,
    /// Objects that did not exist
    pub absent: usize,
}

/// Decode a rendered document
///
/// Returns `None` for documents that are empty after trimming.
pub fn decode_document(
    doc: &RenderedDocument,
) -> Result<Option<(DynamicObject, ClusterObjectRef)>> {
    if doc.is_empty() {
        return Ok(None);
    }
    let obj: DynamicObject = serde_yaml::from_str(&doc.content)
        .map_err(|e| Error::DecodeError(format!("{}: {e}", doc.fragment)))?;
    let obj_ref = ClusterObjectRef::from_object(&obj)
        .map_err(|e| Error::DecodeError(format!("{}: {e}", doc.fragment)))?;
    Ok(Some((obj, obj_ref)))
}

async fn resolve_target(
    client: &dyn DynamicClient,
    default_namespace: &str,
    obj_ref: &ClusterObjectRef,
) -> Result<ObjectTarget> {
    let mapping = client
        .resolve_mapping(&obj_ref.api_version, &obj_ref.kind)
        .await?;
    let namespace = mapping.namespaced.then(|| {
        obj_ref
            .namespace
            .clone()
            .unwrap_or_else(|| default_namespace.to_string())
    });
    Ok(ObjectTarget {
        mapping,
        namespace,
        name: obj_ref.name.clone(),
    })
}

/// Create or update every rendered object
///
/// `skip` is consulted for each decoded object; when it returns true the
/// object is left untouched.
pub async fn apply<F>(
    client: &dyn DynamicClient,
    default_namespace: &str,
    documents: &[RenderedDocument],
    skip: F,
) -> Result<ApplySummary>
where
    F: Fn(&ClusterObjectRef) -> bool,
{
    let mut summary = ApplySummary::default();

    for doc in documents {
        let Some((mut obj, obj_ref)) = decode_document(doc)? else {
            continue;
        };
        if skip(&obj_ref) {
            debug!("Skipping {}", obj_ref);
            summary.skipped += 1;
            continue;
        }

        let target = resolve_target(client, default_namespace, &obj_ref).await?;
        obj.metadata.namespace = target.namespace.clone();

        match client.get(&target).await? {
            None => {
                client.create(&target, &obj).await?;
                info!("Created {}", obj_ref);
                summary.created += 1;
            }
            Some(_) => {
                client.patch(&target, &obj).await?;
                debug!("Patched {}", obj_ref);
                summary.patched += 1;
            }
        }
    }

    Ok(summary)
}

/// Delete every rendered object that exists
pub async fn delete(
    client: &dyn DynamicClient,
    default_namespace: &str,
    documents: &[RenderedDocument],
) -> Result<DeleteSummary> {
    let mut summary = DeleteSummary::default();

    for doc in documents {
        let Some((_, obj_ref)) = decode_document(doc)? else {
            continue;
        };

        let target = resolve_target(client, default_namespace, &obj_ref).await?;
        if client.get(&target).await?.is_none() {
            debug!("{} already absent", obj_ref);
            summary.absent += 1;
            continue;
        }

        client.delete(&target).await?;
        info!("Deleted {}", obj_ref);
        summary.deleted += 1;
    }

    Ok(summary)
}
