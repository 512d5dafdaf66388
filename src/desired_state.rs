//! Render-ready desired state
//!
//! [`DesiredState`] is the projection of an [`ObservabilityStackSpec`] that
//! the manifest templates consume. Every field is always serialized, so a
//! template referencing an unset optional value sees `none` instead of an
//! undefined variable. The derived fields (proxy address, HTTP proxy block,
//! config hash, sanitized args) are filled by the controller's preprocessing
//! step before rendering.

use serde::Serialize;

use crate::crd::{default_collector_config_name, ObservabilityStackSpec, ResourceRequirements};

/// Name of the in-cluster proxy Deployment and Service
pub const PROXY_NAME: &str = "metrics-proxy";
/// Name of the cluster collector Deployment
pub const CLUSTER_COLLECTOR_NAME: &str = "cluster-collector";
/// Name of the node collector DaemonSet
pub const NODE_COLLECTOR_NAME: &str = "node-collector";
/// Name of the logging agent DaemonSet
pub const LOGGING_AGENT_NAME: &str = "logging-agent";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DesiredState {
    pub cluster_name: String,
    pub endpoint_url: String,
    pub credential_secret: String,
    pub namespace: String,
    pub image_registry: String,
    pub allow_legacy_install: bool,
    pub operator_version: String,
    pub proxy: ProxyState,
    /// Address collectors send to; derived
    pub proxy_address: String,
    pub metrics: MetricsState,
    pub logging: LoggingState,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProxyState {
    pub enable: bool,
    pub replicas: i32,
    pub metric_port: u16,
    pub delta_counter_port: u16,
    /// Free-form args; newlines stripped during preprocessing
    pub args: String,
    pub resources: ResourceRequirements,
    /// Secret the forward-proxy settings are read from
    pub http_proxy_secret: Option<String>,
    /// Resolved forward-proxy settings; derived
    pub http_proxy: Option<HttpProxyConfig>,
    /// Hash of `http_proxy`, empty when unset; derived
    pub config_hash: String,
}

/// Outbound HTTP forward proxy settings resolved from a secret
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HttpProxyConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ca_bundle: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricsState {
    pub enable: bool,
    pub collector_config_name: String,
    pub cluster_collector_resources: ResourceRequirements,
    pub node_collector_resources: ResourceRequirements,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LoggingState {
    pub enable: bool,
    pub resources: ResourceRequirements,
}

impl DesiredState {
    /// Project a spec into the namespace the operator installs into
    ///
    /// Derived fields are left empty.
    pub fn from_spec(
        spec: &ObservabilityStackSpec,
        namespace: &str,
        operator_version: &str,
    ) -> Self {
        let proxy = &spec.data_export.proxy;
        let metrics = &spec.data_collection.metrics;
        let logging = &spec.data_collection.logging;

        Self {
            cluster_name: spec.cluster_name.clone(),
            endpoint_url: spec.endpoint_url.clone(),
            credential_secret: spec.credential_secret.clone(),
            namespace: namespace.to_string(),
            image_registry: spec.image_registry.clone(),
            allow_legacy_install: spec.allow_legacy_install,
            operator_version: operator_version.to_string(),
            proxy: ProxyState {
                enable: proxy.enable,
                replicas: proxy.replicas,
                metric_port: proxy.metric_port,
                delta_counter_port: proxy.delta_counter_port,
                args: proxy.args.clone(),
                resources: proxy.resources.clone(),
                http_proxy_secret: proxy.http_proxy.as_ref().map(|h| h.secret.clone()),
                http_proxy: None,
                config_hash: String::new(),
            },
            proxy_address: spec
                .data_export
                .external_proxy
                .as_ref()
                .map(|e| e.url.clone())
                .unwrap_or_default(),
            metrics: MetricsState {
                enable: metrics.enable,
                collector_config_name: metrics.collector_config_name.clone(),
                cluster_collector_resources: metrics.cluster_collector.resources.clone(),
                node_collector_resources: metrics.node_collector.resources.clone(),
            },
            logging: LoggingState {
                enable: logging.enable,
                resources: logging.resources.clone(),
            },
        }
    }

    /// State used when the ObservabilityStack is gone
    ///
    /// Every component and the forward-proxy secret are enabled so that
    /// rendering produces every object name the operator could have created.
    pub fn for_cleanup(namespace: &str, operator_version: &str) -> Self {
        let mut spec = ObservabilityStackSpec {
            cluster_name: "removed".to_string(),
            endpoint_url: "http://removed".to_string(),
            credential_secret: "observability-token".to_string(),
            image_registry: "docker.io/observability".to_string(),
            ..Default::default()
        };
        spec.data_collection.metrics.collector_config_name = default_collector_config_name();
        spec.data_collection.logging.enable = true;

        let mut state = Self::from_spec(&spec, namespace, operator_version);
        state.proxy.http_proxy = Some(HttpProxyConfig {
            host: "removed".to_string(),
            port: 3128,
            ..Default::default()
        });
        state
    }

    /// Whether the named logical component is enabled
    pub fn component_enabled(&self, component: &str) -> Option<bool> {
        match component {
            "proxy" => Some(self.proxy.enable),
            "metrics" | "collector" | "cluster-collector" | "node-collector"
            | "collector-config" => Some(self.metrics.enable),
            "logging" => Some(self.logging.enable),
            _ => None,
        }
    }
}
