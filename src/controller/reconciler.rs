//! Main reconciler for ObservabilityStack resources
//!
//! Implements the controller pattern using kube-rs runtime. Each pass
//! validates the spec and the cluster environment, renders every manifest
//! fragment, applies the objects of enabled components, aggregates workload
//! health into the status and reports it as metrics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::Event;
use kube::{
    api::{Api, Patch, PatchParams, PostParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        finalizer::{finalizer, Event as FinalizerEvent},
        reflector::ObjectRef,
        watcher::Config,
    },
    Resource, ResourceExt,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::applier::{self, ApplySummary, DeleteSummary};
use super::cluster::{ClusterObjectRef, ClusterQuery, DynamicClient, KubeCluster};
use super::conditions::{
    is_condition_true, set_condition, CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE,
    CONDITION_TYPE_READY,
};
use super::environment::{validate_environment, EnvironmentValidation};
use super::finalizers::{has_finalizer, is_being_deleted, OBSERVABILITY_FINALIZER};
use super::health::{aggregate, components_for, AggregateStatus, HealthStatus};
use super::preprocess::preprocess;
use crate::config::OperatorConfig;
use crate::crd::{
    format_validation_errors, ObservabilityStack, ObservabilityStackSpec, ObservabilityStackStatus,
};
use crate::desired_state::DesiredState;
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::reporting::{common, status_metrics, Connection};

const CONTROLLER_NAME: &str = "observabilitystack";
const FIELD_MANAGER: &str = "observability-operator";
const MANAGED_BY_SELECTOR: &str = "app.kubernetes.io/managed-by=observability-operator";
const COLLECTOR_CONFIG_COMPONENT: &str = "collector-config";

/// Shared state for the controller
pub struct ControllerState {
    pub client: Client,
    pub cluster: Arc<KubeCluster>,
    pub renderer: Renderer,
    pub config: OperatorConfig,
    /// Metric transport, held for one reporting step at a time
    pub connection: Mutex<Connection>,
}

impl ControllerState {
    pub fn new(client: Client, config: OperatorConfig) -> Result<Self> {
        Ok(Self {
            cluster: Arc::new(KubeCluster::new(client.clone())),
            client,
            renderer: Renderer::new()?,
            config,
            connection: Mutex::new(Connection::http()),
        })
    }
}

/// Main entry point to start the controller
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let client = state.client.clone();
    let stacks: Api<ObservabilityStack> = Api::all(client.clone());

    info!("Starting ObservabilityStack controller");

    // Verify CRD exists
    match stacks.list(&Default::default()).await {
        Ok(_) => info!("ObservabilityStack CRD is available"),
        Err(e) => {
            error!(
                "ObservabilityStack CRD not found. Please install the CRD first: {:?}",
                e
            );
            return Err(Error::ConfigError(
                "ObservabilityStack CRD not installed".to_string(),
            ));
        }
    }

    let namespace = state.config.namespace.clone();
    let managed = Config::default().labels(MANAGED_BY_SELECTOR);

    let controller = Controller::new(stacks, Config::default());
    let store = controller.store();
    let deployment_store = store.clone();

    // Managed workloads carry no owner references; any change to one
    // requeues every stack.
    controller
        .watches(
            Api::<Deployment>::namespaced(client.clone(), &namespace),
            managed.clone(),
            move |_| {
                deployment_store
                    .state()
                    .iter()
                    .map(|s| ObjectRef::from_obj(&**s))
                    .collect::<Vec<_>>()
            },
        )
        .watches(
            Api::<DaemonSet>::namespaced(client.clone(), &namespace),
            managed,
            move |_| {
                store
                    .state()
                    .iter()
                    .map(|s| ObjectRef::from_obj(&**s))
                    .collect::<Vec<_>>()
            },
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.clone())
        .for_each(|res| async move {
            match res {
                Ok(obj) => debug!("Reconciled: {:?}", obj),
                Err(e) => error!("Reconcile error: {:?}", e),
            }
        })
        .await;

    if let Err(e) = state.connection.lock().await.close().await {
        warn!("Failed to close metric connection: {}", e);
    }
    Ok(())
}

/// Helper to emit a Kubernetes Event
async fn emit_event(
    client: &Client,
    stack: &ObservabilityStack,
    event_type: &str,
    reason: &str,
    message: &str,
) -> Result<()> {
    let namespace = stack.namespace().unwrap_or_else(|| "default".to_string());
    let events: Api<Event> = Api::namespaced(client.clone(), &namespace);

    let time = chrono::Utc::now();
    let event = Event {
        metadata: kube::api::ObjectMeta {
            generate_name: Some(format!("{}-event-", stack.name_any())),
            ..Default::default()
        },
        type_: Some(event_type.to_string()),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        involved_object: stack.object_ref(&()),
        first_timestamp: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(time)),
        last_timestamp: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(time)),
        count: Some(1),
        ..Default::default()
    };

    events
        .create(&PostParams::default(), &event)
        .await
        .map_err(Error::KubeError)?;
    Ok(())
}

async fn emit_warning(client: &Client, stack: &ObservabilityStack, reason: &str, message: &str) {
    if let Err(e) = emit_event(client, stack, "Warning", reason, message).await {
        warn!("Failed to emit {} event for {}: {}", reason, stack.name_any(), e);
    }
}

/// The main reconciliation function
///
/// This function is called whenever:
/// - An ObservabilityStack is created, updated, or deleted
/// - A managed Deployment or DaemonSet changes
/// - The requeue timer expires
#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<ObservabilityStack>, ctx: Arc<ControllerState>) -> Result<Action> {
    let started = Instant::now();
    let client = ctx.client.clone();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<ObservabilityStack> = Api::namespaced(client.clone(), &namespace);

    info!("Reconciling ObservabilityStack {}/{}", namespace, obj.name_any());
    if is_being_deleted(&obj) && !has_finalizer(&obj) {
        debug!(
            "ObservabilityStack {}/{} is being deleted without our finalizer; nothing to clean up",
            namespace,
            obj.name_any()
        );
    }

    let result = finalizer(&api, OBSERVABILITY_FINALIZER, obj, |event| async {
        match event {
            FinalizerEvent::Apply(stack) => apply_stack(&ctx, &stack).await,
            FinalizerEvent::Cleanup(stack) => cleanup_stack(&ctx, &stack).await,
        }
    })
    .await
    .map_err(Error::from);

    #[cfg(feature = "metrics")]
    super::metrics::observe_reconcile_duration_seconds(
        CONTROLLER_NAME,
        started.elapsed().as_secs_f64(),
    );
    #[cfg(not(feature = "metrics"))]
    let _ = started;

    result
}

/// Outcome of one reconciliation pass over a present stack
#[derive(Debug)]
pub enum PassOutcome {
    /// The spec failed validation; nothing was applied
    InvalidSpec(String),
    /// A legacy installation blocks this one; nothing was applied
    Conflict(String),
    Reconciled(Box<Reconciled>),
}

/// Result of a pass that applied objects
#[derive(Debug)]
pub struct Reconciled {
    pub state: DesiredState,
    pub applied: ApplySummary,
    pub health: AggregateStatus,
    /// Legacy installation found next to this operator's workloads
    pub warning: Option<String>,
}

/// Whether the applier should leave an object alone
///
/// Objects of disabled components are skipped, as are collector
/// configurations other than the selected one.
pub fn should_skip(state: &DesiredState, obj_ref: &ClusterObjectRef) -> bool {
    let Some(component) = obj_ref.component() else {
        return false;
    };
    if state.component_enabled(component) == Some(false) {
        return true;
    }
    component == COLLECTOR_CONFIG_COMPONENT && obj_ref.name != state.metrics.collector_config_name
}

/// Validate, render, apply and aggregate for one stack
///
/// Performs no status writes and no reporting, so it can run against any
/// [`DynamicClient`] and [`ClusterQuery`].
pub async fn reconcile_pass(
    dynamic: &dyn DynamicClient,
    query: &dyn ClusterQuery,
    renderer: &Renderer,
    config: &OperatorConfig,
    spec: &ObservabilityStackSpec,
) -> Result<PassOutcome> {
    if let Err(errors) = spec.validate() {
        return Ok(PassOutcome::InvalidSpec(format_validation_errors(&errors)));
    }

    let namespace = config.namespace.as_str();
    let warning = match validate_environment(query, namespace, spec, &config.legacy_installations)
        .await?
    {
        EnvironmentValidation::Ok => None,
        EnvironmentValidation::Warning(message) => Some(message),
        EnvironmentValidation::Error(message) => return Ok(PassOutcome::Conflict(message)),
    };

    let state = DesiredState::from_spec(spec, namespace, &config.operator_version);
    let state = preprocess(query, state).await?;

    let documents = renderer.render(&state)?;
    let applied = applier::apply(dynamic, namespace, &documents, |obj_ref| {
        should_skip(&state, obj_ref)
    })
    .await?;
    debug!(
        "Applied {} created, {} patched, {} skipped",
        applied.created, applied.patched, applied.skipped
    );

    let health = aggregate(query, namespace, &components_for(&state)).await?;

    Ok(PassOutcome::Reconciled(Box::new(Reconciled {
        state,
        applied,
        health,
        warning,
    })))
}

/// Delete every object the operator could have installed
pub async fn cleanup_pass(
    dynamic: &dyn DynamicClient,
    renderer: &Renderer,
    config: &OperatorConfig,
) -> Result<DeleteSummary> {
    let state = DesiredState::for_cleanup(&config.namespace, &config.operator_version);
    let documents = renderer.render(&state)?;
    applier::delete(dynamic, &config.namespace, &documents).await
}

/// Status for a stack that could not be reconciled
pub fn unhealthy_status(
    previous: Option<&ObservabilityStackStatus>,
    reason: &str,
    message: &str,
    generation: Option<i64>,
) -> ObservabilityStackStatus {
    let mut conditions = previous.map(|s| s.conditions.clone()).unwrap_or_default();
    set_condition(
        &mut conditions,
        CONDITION_TYPE_READY,
        CONDITION_STATUS_FALSE,
        reason,
        message,
        generation,
    );

    ObservabilityStackStatus {
        status: HealthStatus::Unhealthy.as_str().to_string(),
        message: message.to_string(),
        resource_statuses: Vec::new(),
        conditions,
        observed_generation: generation,
        last_updated: Some(chrono::Utc::now().to_rfc3339()),
    }
}

/// Status built from aggregated workload health
pub fn health_status(
    previous: Option<&ObservabilityStackStatus>,
    health: &AggregateStatus,
    generation: Option<i64>,
) -> ObservabilityStackStatus {
    let (status, reason) = match health.status {
        HealthStatus::Healthy => (CONDITION_STATUS_TRUE, "ComponentsHealthy"),
        HealthStatus::Installing => (CONDITION_STATUS_FALSE, "Installing"),
        HealthStatus::Unhealthy => (CONDITION_STATUS_FALSE, "ComponentsUnhealthy"),
    };

    let mut conditions = previous.map(|s| s.conditions.clone()).unwrap_or_default();
    set_condition(
        &mut conditions,
        CONDITION_TYPE_READY,
        status,
        reason,
        &health.message,
        generation,
    );

    ObservabilityStackStatus {
        status: health.status.as_str().to_string(),
        message: health.message.clone(),
        resource_statuses: health.resource_statuses.clone(),
        conditions,
        observed_generation: generation,
        last_updated: Some(chrono::Utc::now().to_rfc3339()),
    }
}

/// Whether the Ready condition flips to true between two statuses
pub fn became_ready(
    previous: Option<&ObservabilityStackStatus>,
    current: &ObservabilityStackStatus,
) -> bool {
    let was_ready = previous
        .map(|s| is_condition_true(&s.conditions, CONDITION_TYPE_READY))
        .unwrap_or(false);
    !was_ready && is_condition_true(&current.conditions, CONDITION_TYPE_READY)
}

/// Apply/update the objects of an ObservabilityStack
#[instrument(skip(ctx, stack), fields(name = %stack.name_any(), namespace = stack.namespace()))]
async fn apply_stack(ctx: &ControllerState, stack: &ObservabilityStack) -> Result<Action> {
    let namespace = stack.namespace().unwrap_or_else(|| "default".to_string());
    let name = stack.name_any();
    let generation = stack.metadata.generation;
    let previous = stack.status.as_ref();

    let outcome = reconcile_pass(
        ctx.cluster.as_ref(),
        ctx.cluster.as_ref(),
        &ctx.renderer,
        &ctx.config,
        &stack.spec,
    )
    .await?;

    let reconciled = match outcome {
        PassOutcome::InvalidSpec(message) => {
            warn!("Validation failed for {}/{}: {}", namespace, name, message);
            let status = unhealthy_status(previous, "InvalidSpec", &message, generation);
            update_status(&ctx.client, stack, &status).await?;
            emit_warning(&ctx.client, stack, "InvalidSpec", &message).await;
            #[cfg(feature = "metrics")]
            super::metrics::set_stack_health(
                &namespace,
                &name,
                HealthStatus::Unhealthy.metric_value(),
            );
            return Err(Error::ValidationError(message));
        }
        PassOutcome::Conflict(message) => {
            warn!("Environment conflict for {}/{}: {}", namespace, name, message);
            let status = unhealthy_status(previous, "LegacyInstallDetected", &message, generation);
            update_status(&ctx.client, stack, &status).await?;
            emit_warning(&ctx.client, stack, "LegacyInstallDetected", &message).await;
            #[cfg(feature = "metrics")]
            super::metrics::set_stack_health(
                &namespace,
                &name,
                HealthStatus::Unhealthy.metric_value(),
            );
            return Ok(Action::requeue(ctx.config.requeue_interval));
        }
        PassOutcome::Reconciled(reconciled) => reconciled,
    };

    if let Some(message) = &reconciled.warning {
        warn!("{}/{}: {}", namespace, name, message);
        emit_warning(&ctx.client, stack, "LegacyInstallDetected", message).await;
    }

    #[cfg(feature = "metrics")]
    {
        super::metrics::inc_objects_applied(
            &namespace,
            &name,
            reconciled.applied.created,
            reconciled.applied.patched,
        );
        super::metrics::set_stack_health(
            &namespace,
            &name,
            reconciled.health.status.metric_value(),
        );
    }

    let status = health_status(previous, &reconciled.health, generation);
    update_status(&ctx.client, stack, &status).await?;
    info!(
        "ObservabilityStack {}/{} is {}: {}",
        namespace, name, status.status, status.message
    );
    if became_ready(previous, &status) {
        if let Err(e) = emit_event(&ctx.client, stack, "Normal", "Ready", &status.message).await {
            warn!("Failed to emit Ready event for {}: {}", name, e);
        }
    }

    if let Err(e) = report_metrics(&ctx.connection, &reconciled.state, &reconciled.health).await {
        warn!("Failed to report metrics for {}/{}: {}", namespace, name, e);
    }

    Ok(Action::requeue(ctx.config.requeue_interval))
}

/// Send the status metrics of a pass to the proxy
pub async fn report_metrics(
    connection: &Mutex<Connection>,
    state: &DesiredState,
    health: &AggregateStatus,
) -> Result<()> {
    if state.proxy_address.is_empty() {
        debug!("No proxy address; skipping metric report");
        return Ok(());
    }

    let metrics = common(
        &state.cluster_name,
        status_metrics(health, &state.operator_version)?,
    );

    let mut connection = connection.lock().await;
    connection.connect(&state.proxy_address).await?;
    connection.send(&metrics).await
}

/// Remove every installed object when the ObservabilityStack is deleted
#[instrument(skip(ctx, stack), fields(name = %stack.name_any(), namespace = stack.namespace()))]
async fn cleanup_stack(ctx: &ControllerState, stack: &ObservabilityStack) -> Result<Action> {
    let namespace = stack.namespace().unwrap_or_else(|| "default".to_string());
    let name = stack.name_any();

    info!("Cleaning up ObservabilityStack: {}/{}", namespace, name);

    let summary = cleanup_pass(ctx.cluster.as_ref(), &ctx.renderer, &ctx.config).await?;

    #[cfg(feature = "metrics")]
    super::metrics::inc_objects_deleted(&namespace, &name, summary.deleted);

    if let Err(e) = ctx.connection.lock().await.close().await {
        warn!("Failed to close metric connection: {}", e);
    }

    info!(
        "Cleanup complete for ObservabilityStack {}/{}: {} deleted, {} already absent",
        namespace, name, summary.deleted, summary.absent
    );

    // Return await_change to signal finalizer completion
    Ok(Action::await_change())
}

/// Write the whole status subresource
///
/// Merge patch replaces the arrays wholesale.
async fn update_status(
    client: &Client,
    stack: &ObservabilityStack,
    status: &ObservabilityStackStatus,
) -> Result<()> {
    let namespace = stack.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<ObservabilityStack> = Api::namespaced(client.clone(), &namespace);

    let patch = serde_json::json!({ "status": status });
    api.patch_status(
        &stack.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await
    .map_err(Error::KubeError)?;

    Ok(())
}

/// Retry quickly on transient errors, slowly on everything else
pub fn requeue_after(error: &Error) -> Duration {
    if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    }
}

/// Error policy determines how to handle reconciliation errors
fn error_policy(
    stack: Arc<ObservabilityStack>,
    error: &Error,
    _ctx: Arc<ControllerState>,
) -> Action {
    error!("Reconciliation error for {}: {:?}", stack.name_any(), error);

    #[cfg(feature = "metrics")]
    super::metrics::inc_reconcile_error(CONTROLLER_NAME, error.kind());

    Action::requeue(requeue_after(error))
}
