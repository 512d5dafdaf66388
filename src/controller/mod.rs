//! Controller module for ObservabilityStack reconciliation
//!
//! This module contains the main controller loop, the resource applier,
//! environment validation, health aggregation and the cluster access seams
//! they share.

pub mod applier;
#[cfg(test)]
mod applier_test;
pub mod cluster;
pub mod conditions;
pub mod environment;
#[cfg(test)]
mod fake_cluster;
mod finalizers;
pub mod health;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod preprocess;
mod reconciler;

pub use applier::{apply, delete, ApplySummary, DeleteSummary};
pub use cluster::{ClusterObjectRef, ClusterQuery, DynamicClient, KubeCluster, WorkloadStatus};
pub use environment::{validate_environment, EnvironmentValidation};
pub use finalizers::OBSERVABILITY_FINALIZER;
pub use health::{aggregate, AggregateStatus, ComponentStatus, HealthStatus};
pub use reconciler::{
    became_ready, cleanup_pass, reconcile_pass, run_controller, should_skip, ControllerState,
    PassOutcome, Reconciled,
};
