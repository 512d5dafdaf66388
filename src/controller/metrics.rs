//! Prometheus metrics for the observability operator
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports the following metrics:
//! - `observability_reconcile_duration_seconds` (histogram): reconcile duration labeled by controller.
//! - `observability_reconcile_errors_total` (counter): reconcile errors labeled by controller and kind.
//! - `observability_objects_applied_total` (counter): objects created or patched, labeled by namespace/name/operation.
//! - `observability_objects_deleted_total` (counter): objects deleted, labeled by namespace/name.
//! - `observability_stack_health` (gauge): 1 healthy, 0.5 installing, 0 unhealthy, labeled by namespace/name.

use std::sync::atomic::AtomicU64;

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Labels for operator reconcile metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    /// Controller name, e.g. "observabilitystack"
    pub controller: String,
}

/// Labels for operator error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub controller: String,
    /// Error kind/category, e.g. "kube", "validation", "template"
    pub kind: String,
}

/// Labels identifying one ObservabilityStack
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StackLabels {
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ApplyLabels {
    pub namespace: String,
    pub name: String,
    /// "create" or "patch"
    pub operation: String,
}

/// Histogram tracking reconcile duration (seconds)
pub static RECONCILE_DURATION_SECONDS: Lazy<Family<ReconcileLabels, Histogram>> = Lazy::new(|| {
    fn reconcile_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(reconcile_histogram)
});

/// Counter tracking reconcile errors
pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static OBJECTS_APPLIED_TOTAL: Lazy<Family<ApplyLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static OBJECTS_DELETED_TOTAL: Lazy<Family<StackLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Gauge tracking the aggregate health of each stack
pub static STACK_HEALTH: Lazy<Family<StackLabels, Gauge<f64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "observability_reconcile_duration_seconds",
        "Duration of reconcile loops in seconds",
        RECONCILE_DURATION_SECONDS.clone(),
    );
    registry.register(
        "observability_reconcile_errors_total",
        "Total number of reconcile errors",
        RECONCILE_ERRORS_TOTAL.clone(),
    );
    registry.register(
        "observability_objects_applied_total",
        "Total number of managed objects created or patched",
        OBJECTS_APPLIED_TOTAL.clone(),
    );
    registry.register(
        "observability_objects_deleted_total",
        "Total number of managed objects deleted",
        OBJECTS_DELETED_TOTAL.clone(),
    );
    registry.register(
        "observability_stack_health",
        "Aggregate stack health (1 healthy, 0.5 installing, 0 unhealthy)",
        STACK_HEALTH.clone(),
    );

    registry
});

/// Observe a reconcile duration in seconds.
pub fn observe_reconcile_duration_seconds(controller: &str, seconds: f64) {
    let labels = ReconcileLabels {
        controller: controller.to_string(),
    };
    RECONCILE_DURATION_SECONDS
        .get_or_create(&labels)
        .observe(seconds);
}

/// Increment the reconcile error counter.
pub fn inc_reconcile_error(controller: &str, kind: &str) {
    let labels = ErrorLabels {
        controller: controller.to_string(),
        kind: kind.to_string(),
    };
    RECONCILE_ERRORS_TOTAL.get_or_create(&labels).inc();
}

/// Count objects created and patched in one apply batch
pub fn inc_objects_applied(namespace: &str, name: &str, created: usize, patched: usize) {
    for (operation, count) in [("create", created), ("patch", patched)] {
        if count == 0 {
            continue;
        }
        let labels = ApplyLabels {
            namespace: namespace.to_string(),
            name: name.to_string(),
            operation: operation.to_string(),
        };
        OBJECTS_APPLIED_TOTAL
            .get_or_create(&labels)
            .inc_by(count as u64);
    }
}

pub fn inc_objects_deleted(namespace: &str, name: &str, deleted: usize) {
    let labels = StackLabels {
        namespace: namespace.to_string(),
        name: name.to_string(),
    };
    OBJECTS_DELETED_TOTAL
        .get_or_create(&labels)
        .inc_by(deleted as u64);
}

pub fn set_stack_health(namespace: &str, name: &str, value: f64) {
    let labels = StackLabels {
        namespace: namespace.to_string(),
        name: name.to_string(),
    };
    STACK_HEALTH.get_or_create(&labels).set(value);
}
