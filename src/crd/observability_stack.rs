//! ObservabilityStack Custom Resource Definition
//!
//! An ObservabilityStack describes which observability workloads (metrics
//! proxy, cluster and node collectors, logging agent) run in the cluster and
//! how they are configured. One object drives one installation.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::quantity::parse_quantity;
use super::types::{Condition, DataCollection, DataExport, ResourceRequirements, ResourceStatus};

/// Structured validation error for `ObservabilityStackSpec`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecValidationError {
    pub field: String,
    pub message: String,
    pub how_to_fix: String,
}

impl SpecValidationError {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        how_to_fix: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            how_to_fix: how_to_fix.into(),
        }
    }
}

impl std::fmt::Display for SpecValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Join validation errors into one human-readable message
pub fn format_validation_errors(errors: &[SpecValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "observability.io",
    version = "v1alpha1",
    kind = "ObservabilityStack",
    namespaced,
    status = "ObservabilityStackStatus",
    shortname = "obs",
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.status"}"#,
    printcolumn = r#"{"name":"Message","type":"string","jsonPath":".status.message"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityStackSpec {
    /// Name reported as the source of every metric
    pub cluster_name: String,

    /// URL of the backend the proxy forwards to
    pub endpoint_url: String,

    /// Secret holding the backend API token
    #[serde(default = "default_credential_secret")]
    pub credential_secret: String,

    #[serde(default = "default_image_registry")]
    pub image_registry: String,

    /// Permit installing alongside a legacy, differently-managed install
    #[serde(default)]
    pub allow_legacy_install: bool,

    #[serde(default)]
    pub data_export: DataExport,

    #[serde(default)]
    pub data_collection: DataCollection,
}

fn default_credential_secret() -> String {
    "observability-token".to_string()
}

fn default_image_registry() -> String {
    "docker.io/observability".to_string()
}

impl ObservabilityStackSpec {
    /// Validate the spec
    ///
    /// Every violation is collected; validation never stops at the first
    /// problem.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use observability_operator::crd::ObservabilityStackSpec;
    ///
    /// let spec = ObservabilityStackSpec::default();
    /// if let Err(errors) = spec.validate() {
    ///     for e in errors {
    ///         eprintln!("Validation error in {}: {}", e.field, e.message);
    ///     }
    /// }
    /// ```
    pub fn validate(&self) -> Result<(), Vec<SpecValidationError>> {
        let mut errors: Vec<SpecValidationError> = Vec::new();

        if self.cluster_name.trim().is_empty() {
            errors.push(SpecValidationError::new(
                "spec.clusterName",
                "clusterName must not be empty",
                "Set spec.clusterName to a name that identifies this cluster.",
            ));
        }
        if self.endpoint_url.trim().is_empty() {
            errors.push(SpecValidationError::new(
                "spec.endpointUrl",
                "endpointUrl must not be empty",
                "Set spec.endpointUrl to the URL of the metrics backend.",
            ));
        }

        let proxy = &self.data_export.proxy;
        let external = self.data_export.external_proxy.as_ref();

        // Proxy / external proxy mutual exclusion
        if proxy.enable && external.is_some() {
            errors.push(SpecValidationError::new(
                "spec.dataExport.proxy.enable / spec.dataExport.externalProxy",
                "the in-cluster proxy and an external proxy cannot both be configured",
                "Either set spec.dataExport.proxy.enable to false or remove spec.dataExport.externalProxy.",
            ));
        }

        let collecting =
            self.data_collection.metrics.enable || self.data_collection.logging.enable;
        let external_url_set = external.is_some_and(|e| !e.url.trim().is_empty());
        if collecting && !proxy.enable && !external_url_set {
            errors.push(SpecValidationError::new(
                "spec.dataExport",
                "collectors are enabled but no proxy is available to receive their data",
                "Set spec.dataExport.proxy.enable to true or configure spec.dataExport.externalProxy.url.",
            ));
        }

        if proxy.enable {
            if proxy.metric_port == 0 {
                errors.push(SpecValidationError::new(
                    "spec.dataExport.proxy.metricPort",
                    "metricPort must be between 1 and 65535",
                    "Set spec.dataExport.proxy.metricPort to a valid port, e.g. 2878.",
                ));
            }
            if proxy.delta_counter_port != 0 && proxy.delta_counter_port == proxy.metric_port {
                errors.push(SpecValidationError::new(
                    "spec.dataExport.proxy.deltaCounterPort",
                    "deltaCounterPort must differ from metricPort",
                    "Choose a different port for spec.dataExport.proxy.deltaCounterPort or set it to 0.",
                ));
            }
            if proxy.replicas < 1 {
                errors.push(SpecValidationError::new(
                    "spec.dataExport.proxy.replicas",
                    "replicas must be at least 1",
                    "Set spec.dataExport.proxy.replicas to 1 or greater.",
                ));
            }
        }

        validate_resources(
            "spec.dataExport.proxy.resources",
            &proxy.resources,
            &mut errors,
        );
        validate_resources(
            "spec.dataCollection.metrics.clusterCollector.resources",
            &self.data_collection.metrics.cluster_collector.resources,
            &mut errors,
        );
        validate_resources(
            "spec.dataCollection.metrics.nodeCollector.resources",
            &self.data_collection.metrics.node_collector.resources,
            &mut errors,
        );
        validate_resources(
            "spec.dataCollection.logging.resources",
            &self.data_collection.logging.resources,
            &mut errors,
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Check request <= limit for every dimension set on both sides
fn validate_resources(
    field: &str,
    resources: &ResourceRequirements,
    errors: &mut Vec<SpecValidationError>,
) {
    let requests = resources.requests.dimensions();
    let limits = resources.limits.dimensions();

    for ((dimension, request), (_, limit)) in requests.into_iter().zip(limits) {
        let parsed_request = request.map(|r| (r, parse_quantity(r)));
        let parsed_limit = limit.map(|l| (l, parse_quantity(l)));

        for (side, parsed) in [("requests", &parsed_request), ("limits", &parsed_limit)] {
            if let Some((raw, Err(e))) = parsed {
                errors.push(SpecValidationError::new(
                    format!("{field}.{side}.{dimension}"),
                    format!("invalid {dimension} quantity {raw:?}: {}", e.reason),
                    "Use Kubernetes quantity syntax such as \"500m\", \"0.5\" or \"1Gi\".",
                ));
            }
        }

        if let (Some((raw_request, Ok(request))), Some((raw_limit, Ok(limit)))) =
            (parsed_request, parsed_limit)
        {
            if request > limit {
                errors.push(SpecValidationError::new(
                    format!("{field}.requests.{dimension}"),
                    format!(
                        "{dimension} request {raw_request} must be less than or equal to {dimension} limit {raw_limit}"
                    ),
                    format!(
                        "Lower {field}.requests.{dimension} or raise {field}.limits.{dimension}."
                    ),
                ));
            }
        }
    }
}

/// Status subresource of an ObservabilityStack
///
/// Rewritten in full on every reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityStackStatus {
    /// Overall classification: Healthy, Unhealthy or Installing
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub resource_statuses: Vec<ResourceStatus>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}
