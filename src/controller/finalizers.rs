//! Finalizer handling for ObservabilityStack cleanup
//!
//! The finalizer keeps a deleted ObservabilityStack around until every
//! object the operator installed for it has been removed. The kube-rs
//! `finalizer` helper adds and releases it; these helpers only inspect it.

use kube::ResourceExt;

use crate::crd::ObservabilityStack;

/// Finalizer name used to protect ObservabilityStack resources
pub const OBSERVABILITY_FINALIZER: &str = "observability.io/finalizer";

/// A deletion timestamp means cleanup is pending
pub fn is_being_deleted(stack: &ObservabilityStack) -> bool {
    stack.metadata.deletion_timestamp.is_some()
}

pub fn has_finalizer(stack: &ObservabilityStack) -> bool {
    stack
        .finalizers()
        .iter()
        .any(|f| f == OBSERVABILITY_FINALIZER)
}
