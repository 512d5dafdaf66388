//! Health aggregation for managed workloads
//!
//! Reads live replica counts and classifies each workload, each logical
//! component and the installation as a whole. Nothing here writes to the
//! cluster; results are rebuilt from scratch on every call.

use tracing::debug;

use super::cluster::{ClusterQuery, WorkloadStatus};
use crate::config::WorkloadKind;
use crate::crd::ResourceStatus;
use crate::desired_state::{
    DesiredState, CLUSTER_COLLECTOR_NAME, LOGGING_AGENT_NAME, NODE_COLLECTOR_NAME, PROXY_NAME,
};
use crate::error::Result;

pub const PROXY_COMPONENT: &str = "proxy";
pub const METRICS_COMPONENT: &str = "metrics";
pub const LOGGING_COMPONENT: &str = "logging";

/// Every workload the operator can install, by component
pub const MANAGED_WORKLOADS: &[(&str, Workload)] = &[
    (
        PROXY_COMPONENT,
        Workload::new(WorkloadKind::Deployment, PROXY_NAME),
    ),
    (
        METRICS_COMPONENT,
        Workload::new(WorkloadKind::Deployment, CLUSTER_COLLECTOR_NAME),
    ),
    (
        METRICS_COMPONENT,
        Workload::new(WorkloadKind::DaemonSet, NODE_COLLECTOR_NAME),
    ),
    (
        LOGGING_COMPONENT,
        Workload::new(WorkloadKind::DaemonSet, LOGGING_AGENT_NAME),
    ),
];

/// Health classification, ordered by severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HealthStatus {
    Healthy,
    Installing,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Installing => "Installing",
            HealthStatus::Unhealthy => "Unhealthy",
        }
    }

    /// Numeric form used in metrics
    pub fn metric_value(&self) -> f64 {
        match self {
            HealthStatus::Healthy => 1.0,
            HealthStatus::Installing => 0.5,
            HealthStatus::Unhealthy => 0.0,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A workload checked for health
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Workload {
    pub kind: WorkloadKind,
    pub name: &'static str,
}

impl Workload {
    pub const fn new(kind: WorkloadKind, name: &'static str) -> Self {
        Self { kind, name }
    }
}

/// A logical component and the workloads it is made of
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    pub name: &'static str,
    /// Empty for a disabled component
    pub workloads: Vec<Workload>,
}

/// Components to check for a desired state; disabled ones have no workloads
pub fn components_for(state: &DesiredState) -> Vec<Component> {
    [PROXY_COMPONENT, METRICS_COMPONENT, LOGGING_COMPONENT]
        .into_iter()
        .map(|name| {
            let enabled = state.component_enabled(name).unwrap_or(false);
            let workloads = MANAGED_WORKLOADS
                .iter()
                .filter(|(component, _)| enabled && *component == name)
                .map(|(_, workload)| *workload)
                .collect();
            Component { name, workloads }
        })
        .collect()
}

/// Result for one component
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentStatus {
    pub name: String,
    /// `None` when the component has no running workloads
    pub status: Option<HealthStatus>,
    pub message: String,
}

impl ComponentStatus {
    pub fn is_enabled(&self) -> bool {
        self.status.is_some()
    }
}

/// Result for the whole installation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateStatus {
    pub status: HealthStatus,
    pub message: String,
    pub components: Vec<ComponentStatus>,
    pub resource_statuses: Vec<ResourceStatus>,
}

/// Classify a single live workload
pub fn workload_health(name: &str, live: &WorkloadStatus) -> ResourceStatus {
    let healthy = live.ready >= live.desired;
    let rolling_out = live.observed_generation.unwrap_or(0) < live.generation.unwrap_or(0)
        || live.updated < live.desired;

    ResourceStatus {
        name: name.to_string(),
        ready_replicas: live.ready,
        desired_replicas: live.desired,
        healthy,
        installing: !healthy && rolling_out,
        message: if healthy {
            String::new()
        } else {
            format!(
                "not enough instances of {} are running ({}/{})",
                name, live.ready, live.desired
            )
        },
    }
}

/// Classify a component from the statuses of its present workloads
pub fn component_health(name: &str, statuses: &[ResourceStatus]) -> ComponentStatus {
    if statuses.is_empty() {
        return ComponentStatus {
            name: name.to_string(),
            status: None,
            message: String::new(),
        };
    }

    let message = statuses
        .iter()
        .filter(|s| !s.healthy)
        .map(|s| s.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    let status = if statuses.iter().all(|s| s.healthy) {
        HealthStatus::Healthy
    } else if statuses.iter().any(|s| s.installing) {
        HealthStatus::Installing
    } else {
        HealthStatus::Unhealthy
    };

    ComponentStatus {
        name: name.to_string(),
        status: Some(status),
        message,
    }
}

/// Combine component results into the overall classification
pub fn overall_health(
    components: Vec<ComponentStatus>,
    resource_statuses: Vec<ResourceStatus>,
) -> AggregateStatus {
    let worst = components.iter().filter_map(|c| c.status).max();

    let (status, message) = match worst {
        None => (HealthStatus::Unhealthy, String::new()),
        Some(HealthStatus::Healthy) => {
            let healthy = resource_statuses.iter().filter(|s| s.healthy).count();
            (
                HealthStatus::Healthy,
                format!(
                    "({}/{}) components are healthy",
                    healthy,
                    resource_statuses.len()
                ),
            )
        }
        Some(worst) => {
            let message = components
                .iter()
                .find(|c| c.status == Some(worst))
                .map(|c| c.message.clone())
                .unwrap_or_default();
            (worst, message)
        }
    };

    AggregateStatus {
        status,
        message,
        components,
        resource_statuses,
    }
}

/// Query every workload of `components` and aggregate
pub async fn aggregate(
    query: &dyn ClusterQuery,
    namespace: &str,
    components: &[Component],
) -> Result<AggregateStatus> {
    let mut component_statuses = Vec::with_capacity(components.len());
    let mut resource_statuses = Vec::new();

    for component in components {
        let mut statuses = Vec::new();
        for workload in &component.workloads {
            match query
                .workload_status(workload.kind, namespace, workload.name)
                .await?
            {
                Some(live) => statuses.push(workload_health(workload.name, &live)),
                None => debug!("{} {}/{} not found", workload.kind, namespace, workload.name),
            }
        }
        component_statuses.push(component_health(component.name, &statuses));
        resource_statuses.extend(statuses);
    }

    Ok(overall_health(component_statuses, resource_statuses))
}
