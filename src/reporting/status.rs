//! Health status as metrics

use super::metric::Metric;
use super::version::encode_version;
use crate::controller::health::AggregateStatus;
use crate::error::Result;

pub const STATUS_METRIC: &str = "kubernetes.observability.status";
pub const VERSION_METRIC: &str = "kubernetes.observability.version";

pub fn component_metric_name(component: &str) -> String {
    format!("kubernetes.observability.{component}.status")
}

/// Overall, per-component and version metrics for one pass
///
/// Components without running workloads are left out.
pub fn status_metrics(aggregate: &AggregateStatus, operator_version: &str) -> Result<Vec<Metric>> {
    let mut overall = Metric::new(STATUS_METRIC, aggregate.status.metric_value())
        .with_tag("status", aggregate.status.as_str());
    if !aggregate.message.is_empty() {
        overall = overall.with_tag("message", aggregate.message.as_str());
    }
    let mut metrics = vec![overall];

    for component in &aggregate.components {
        let Some(status) = component.status else {
            continue;
        };
        let mut metric = Metric::new(component_metric_name(&component.name), status.metric_value())
            .with_tag("status", status.as_str());
        if !component.message.is_empty() {
            metric = metric.with_tag("message", component.message.as_str());
        }
        metrics.push(metric);
    }

    metrics.push(Metric::new(VERSION_METRIC, encode_version(operator_version)?));
    Ok(metrics)
}
