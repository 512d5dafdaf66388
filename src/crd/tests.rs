//! Unit tests for ObservabilityStackSpec validation
//!
//! Tests the `ObservabilityStackSpec::validate()` function to ensure it
//! accepts valid configurations and collects every violation in invalid ones.

#[cfg(test)]
mod observability_stack_spec_validation {
    use crate::crd::{
        ExternalProxy, HttpProxyRef, ObservabilityStackSpec, ResourceRequirements, ResourceSpec,
        SpecValidationError,
    };

    /// Helper to create a minimal valid spec with the in-cluster proxy
    fn valid_spec() -> ObservabilityStackSpec {
        ObservabilityStackSpec {
            cluster_name: "prod-east".to_string(),
            endpoint_url: "https://metrics.example.com".to_string(),
            credential_secret: "observability-token".to_string(),
            image_registry: "docker.io/observability".to_string(),
            ..Default::default()
        }
    }

    fn has_field(errors: &[SpecValidationError], field: &str) -> bool {
        errors.iter().any(|e| e.field == field)
    }

    #[test]
    fn test_valid_spec_passes_validation() {
        assert!(valid_spec().validate().is_ok());
    }

    #[test]
    fn test_proxy_and_external_proxy_are_mutually_exclusive() {
        let mut spec = valid_spec();
        spec.data_export.external_proxy = Some(ExternalProxy {
            url: "external-proxy:2878".to_string(),
        });

        let errors = spec.validate().unwrap_err();
        assert!(errors.iter().any(|e| {
            e == &SpecValidationError::new(
                "spec.dataExport.proxy.enable / spec.dataExport.externalProxy",
                "the in-cluster proxy and an external proxy cannot both be configured",
                "Either set spec.dataExport.proxy.enable to false or remove spec.dataExport.externalProxy.",
            )
        }));
    }

    #[test]
    fn test_external_proxy_alone_passes() {
        let mut spec = valid_spec();
        spec.data_export.proxy.enable = false;
        spec.data_export.external_proxy = Some(ExternalProxy {
            url: "external-proxy:2878".to_string(),
        });

        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_collectors_without_any_proxy_fail() {
        let mut spec = valid_spec();
        spec.data_export.proxy.enable = false;

        let errors = spec.validate().unwrap_err();
        assert!(has_field(&errors, "spec.dataExport"));
    }

    #[test]
    fn test_no_collectors_and_no_proxy_passes() {
        let mut spec = valid_spec();
        spec.data_export.proxy.enable = false;
        spec.data_collection.metrics.enable = false;
        spec.data_collection.logging.enable = false;

        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_empty_cluster_name_and_endpoint_fail_together() {
        let mut spec = valid_spec();
        spec.cluster_name = " ".to_string();
        spec.endpoint_url = String::new();

        let errors = spec.validate().unwrap_err();
        assert!(has_field(&errors, "spec.clusterName"));
        assert!(has_field(&errors, "spec.endpointUrl"));
    }

    #[test]
    fn test_equivalent_request_and_limit_pass() {
        let mut spec = valid_spec();
        spec.data_export.proxy.resources =
            ResourceRequirements::new(("0.5", "1Gi"), ("500m", "1Gi"));

        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_request_above_limit_fails() {
        let mut spec = valid_spec();
        spec.data_export.proxy.resources =
            ResourceRequirements::new(("500m", "1Gi"), ("200m", "1Gi"));

        let errors = spec.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "spec.dataExport.proxy.resources.requests.cpu");
        assert!(errors[0].message.contains("500m"));
        assert!(errors[0].message.contains("200m"));
    }

    #[test]
    fn test_every_violated_dimension_is_reported() {
        let mut spec = valid_spec();
        spec.data_collection.metrics.node_collector.resources = ResourceRequirements {
            requests: ResourceSpec {
                cpu: Some("2".to_string()),
                memory: Some("2Gi".to_string()),
                ephemeral_storage: Some("10Gi".to_string()),
            },
            limits: ResourceSpec {
                cpu: Some("1".to_string()),
                memory: Some("1Gi".to_string()),
                ephemeral_storage: Some("1Gi".to_string()),
            },
        };
        spec.data_collection.metrics.cluster_collector.resources =
            ResourceRequirements::new(("1", "1Gi"), ("500m", "1Gi"));

        let errors = spec.validate().unwrap_err();
        let prefix = "spec.dataCollection.metrics.nodeCollector.resources.requests";
        assert!(has_field(&errors, &format!("{prefix}.cpu")));
        assert!(has_field(&errors, &format!("{prefix}.memory")));
        assert!(has_field(&errors, &format!("{prefix}.ephemeral-storage")));
        assert!(has_field(
            &errors,
            "spec.dataCollection.metrics.clusterCollector.resources.requests.cpu"
        ));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_unset_limit_is_not_compared() {
        let mut spec = valid_spec();
        spec.data_collection.logging.resources = ResourceRequirements {
            requests: ResourceSpec::new("4", "8Gi"),
            limits: ResourceSpec::default(),
        };

        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_invalid_quantity_fails() {
        let mut spec = valid_spec();
        spec.data_export.proxy.resources = ResourceRequirements::new(("lots", "1Gi"), ("1", "1Gi"));

        let errors = spec.validate().unwrap_err();
        assert!(has_field(&errors, "spec.dataExport.proxy.resources.requests.cpu"));
    }

    #[test]
    fn test_out_of_range_exponent_is_a_validation_error() {
        let mut spec = valid_spec();
        spec.data_export.proxy.resources =
            ResourceRequirements::new(("1e2147483647", "1Gi"), ("1", "1Gi"));

        let errors = spec.validate().unwrap_err();
        assert!(has_field(&errors, "spec.dataExport.proxy.resources.requests.cpu"));
    }

    #[test]
    fn test_proxy_port_rules() {
        let mut spec = valid_spec();
        spec.data_export.proxy.delta_counter_port = spec.data_export.proxy.metric_port;
        spec.data_export.proxy.replicas = 0;

        let errors = spec.validate().unwrap_err();
        assert!(has_field(&errors, "spec.dataExport.proxy.deltaCounterPort"));
        assert!(has_field(&errors, "spec.dataExport.proxy.replicas"));
    }

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let spec: ObservabilityStackSpec = serde_json::from_value(serde_json::json!({
            "clusterName": "dev",
            "endpointUrl": "https://metrics.example.com",
            "dataExport": { "proxy": { "httpProxy": { "secret": "forward-proxy" } } }
        }))
        .unwrap();

        assert_eq!(spec.credential_secret, "observability-token");
        assert!(spec.data_export.proxy.enable);
        assert_eq!(spec.data_export.proxy.metric_port, 2878);
        assert_eq!(
            spec.data_export.proxy.http_proxy,
            Some(HttpProxyRef {
                secret: "forward-proxy".to_string()
            })
        );
        assert!(spec.data_collection.metrics.enable);
        assert!(!spec.data_collection.logging.enable);
        assert_eq!(
            spec.data_collection.metrics.collector_config_name,
            "default-collector-config"
        );
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_ephemeral_storage_uses_container_key() {
        let spec = ResourceSpec {
            cpu: None,
            memory: None,
            ephemeral_storage: Some("1Gi".to_string()),
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value, serde_json::json!({ "ephemeral-storage": "1Gi" }));
    }
}
