//! Shared types for ObservabilityStack specifications
//!
//! These types are used across the CRD definition, the renderer and the
//! controller logic.
//!
//! # Type Hierarchy
//!
//! - [`DataExport`] - where collected data goes: the in-cluster [`ProxyConfig`] or an [`ExternalProxy`]
//! - [`DataCollection`] - which collectors run: [`MetricsConfig`] and [`LoggingConfig`]
//! - [`ResourceRequirements`] - CPU, memory and ephemeral-storage requests/limits
//! - [`ResourceStatus`] and [`Condition`] - status reporting

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where collected telemetry is exported
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataExport {
    /// In-cluster metrics proxy
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Externally managed proxy; mutually exclusive with `proxy.enable`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_proxy: Option<ExternalProxy>,
}

/// Externally managed metrics proxy
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProxy {
    /// Proxy address, e.g. `proxy.monitoring.svc:2878`
    pub url: String,
}

/// In-cluster metrics proxy configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    #[serde(default = "default_proxy_replicas")]
    pub replicas: i32,

    /// Port accepting metrics in the line format
    #[serde(default = "default_metric_port")]
    pub metric_port: u16,

    /// Port for delta counters; 0 disables it
    #[serde(default)]
    pub delta_counter_port: u16,

    /// Extra command-line arguments passed to the proxy
    #[serde(default)]
    pub args: String,

    /// Outbound HTTP forward proxy used by the metrics proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<HttpProxyRef>,

    #[serde(default = "ResourceRequirements::proxy_defaults")]
    pub resources: ResourceRequirements,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enable: true,
            replicas: default_proxy_replicas(),
            metric_port: default_metric_port(),
            delta_counter_port: 0,
            args: String::new(),
            http_proxy: None,
            resources: ResourceRequirements::proxy_defaults(),
        }
    }
}

/// Reference to a secret describing an outbound HTTP forward proxy
///
/// The secret holds `http-url` and optionally `basic-auth-username`,
/// `basic-auth-password` and `tls-root-ca-bundle`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpProxyRef {
    pub secret: String,
}

/// Which collectors run in the cluster
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataCollection {
    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cluster and node metric collectors
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Name of the collector ConfigMap the collectors mount
    #[serde(default = "default_collector_config_name")]
    pub collector_config_name: String,

    #[serde(default = "CollectorConfig::cluster_defaults")]
    pub cluster_collector: CollectorConfig,

    #[serde(default = "CollectorConfig::node_defaults")]
    pub node_collector: CollectorConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable: true,
            collector_config_name: default_collector_config_name(),
            cluster_collector: CollectorConfig::cluster_defaults(),
            node_collector: CollectorConfig::node_defaults(),
        }
    }
}

/// Per-collector settings
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectorConfig {
    pub resources: ResourceRequirements,
}

impl CollectorConfig {
    fn cluster_defaults() -> Self {
        Self {
            resources: ResourceRequirements::new(("200m", "10Mi"), ("2000m", "512Mi")),
        }
    }

    fn node_defaults() -> Self {
        Self {
            resources: ResourceRequirements::new(("200m", "10Mi"), ("1000m", "256Mi")),
        }
    }
}

/// Logging agent
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable: bool,

    #[serde(default = "ResourceRequirements::logging_defaults")]
    pub resources: ResourceRequirements,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable: false,
            resources: ResourceRequirements::logging_defaults(),
        }
    }
}

/// Resource requirements for a workload
///
/// Quantities use Kubernetes syntax (`"500m"`, `"0.5"`, `"1Gi"`).
///
/// # Examples
///
/// ```rust,no_run
/// use observability_operator::crd::ResourceRequirements;
///
/// let resources = ResourceRequirements::new(("100m", "64Mi"), ("500m", "256Mi"));
/// assert_eq!(resources.limits.cpu.as_deref(), Some("500m"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    /// Minimum resources requested
    #[serde(default)]
    pub requests: ResourceSpec,
    /// Maximum resources allowed
    #[serde(default)]
    pub limits: ResourceSpec,
}

impl ResourceRequirements {
    pub fn new(requests: (&str, &str), limits: (&str, &str)) -> Self {
        Self {
            requests: ResourceSpec::new(requests.0, requests.1),
            limits: ResourceSpec::new(limits.0, limits.1),
        }
    }

    fn proxy_defaults() -> Self {
        Self::new(("100m", "1Gi"), ("1000m", "4Gi"))
    }

    fn logging_defaults() -> Self {
        Self::new(("100m", "200Mi"), ("500m", "500Mi"))
    }
}

/// CPU, memory and ephemeral storage quantities
///
/// Field names match the container resource keys so the struct can be
/// rendered straight into a pod spec.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(
        rename = "ephemeral-storage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ephemeral_storage: Option<String>,
}

impl ResourceSpec {
    pub fn new(cpu: &str, memory: &str) -> Self {
        Self {
            cpu: Some(cpu.to_string()),
            memory: Some(memory.to_string()),
            ephemeral_storage: None,
        }
    }

    /// Dimension name and value pairs, in a fixed order
    pub fn dimensions(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("cpu", self.cpu.as_deref()),
            ("memory", self.memory.as_deref()),
            ("ephemeral-storage", self.ephemeral_storage.as_deref()),
        ]
    }
}

/// Health of a single managed workload
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    pub name: String,
    pub ready_replicas: i32,
    pub desired_replicas: i32,
    pub healthy: bool,
    pub installing: bool,
    #[serde(default)]
    pub message: String,
}

/// Condition for status reporting
///
/// Reports the status of a condition on the ObservabilityStack resource.
/// Follows Kubernetes convention for condition reporting.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., "Ready", "Degraded")
    #[serde(rename = "type")]
    pub type_: String,
    /// Status of the condition: "True", "False", or "Unknown"
    pub status: String,
    /// Last time the condition transitioned
    pub last_transition_time: String,
    /// Machine-readable reason for the condition
    pub reason: String,
    /// Human-readable message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

fn default_true() -> bool {
    true
}

fn default_proxy_replicas() -> i32 {
    1
}

fn default_metric_port() -> u16 {
    2878
}

pub(crate) fn default_collector_config_name() -> String {
    "default-collector-config".to_string()
}
