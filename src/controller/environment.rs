//! Cluster environment checks
//!
//! Detects observability installs that were set up by other means (a helm
//! chart, hand-applied manifests, a platform marketplace) and would collide
//! with the workloads this operator manages.

use super::cluster::ClusterQuery;
use super::health::MANAGED_WORKLOADS;
use crate::config::LegacyInstallation;
use crate::crd::ObservabilityStackSpec;
use crate::error::Result;

/// Outcome of the environment check
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvironmentValidation {
    Ok,
    /// Legacy install coexists with this operator's workloads; reconcile anyway
    Warning(String),
    /// Only the legacy install is present; do not install alongside it
    Error(String),
}

/// Check for legacy installations
pub async fn validate_environment(
    query: &dyn ClusterQuery,
    namespace: &str,
    spec: &ObservabilityStackSpec,
    legacy_installations: &[LegacyInstallation],
) -> Result<EnvironmentValidation> {
    let mut detected = Vec::new();
    for legacy in legacy_installations {
        let is_own = legacy.namespace == namespace
            && MANAGED_WORKLOADS
                .iter()
                .any(|(_, w)| w.kind == legacy.kind && w.name == legacy.name);
        if is_own {
            continue;
        }
        if query
            .workload_status(legacy.kind, &legacy.namespace, &legacy.name)
            .await?
            .is_some()
        {
            detected.push(legacy);
        }
    }

    if detected.is_empty() || spec.allow_legacy_install {
        return Ok(EnvironmentValidation::Ok);
    }

    let listing = detected
        .iter()
        .map(|l| {
            if l.source.is_empty() {
                format!("{} {}/{}", l.kind, l.namespace, l.name)
            } else {
                format!("{} {}/{} ({})", l.kind, l.namespace, l.name, l.source)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut own_running = false;
    for (_, workload) in MANAGED_WORKLOADS {
        if query
            .workload_status(workload.kind, namespace, workload.name)
            .await?
            .is_some()
        {
            own_running = true;
            break;
        }
    }

    if own_running {
        Ok(EnvironmentValidation::Warning(format!(
            "legacy installation detected alongside the operator's workloads: {listing}"
        )))
    } else {
        Ok(EnvironmentValidation::Error(format!(
            "legacy installation detected: {listing}; uninstall it or set spec.allowLegacyInstall to true"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_legacy_installations, WorkloadKind};
    use crate::controller::cluster::MockClusterQuery;
    use crate::controller::fake_cluster::{ready, FakeCluster};
    use crate::error::Error;

    const NS: &str = "observability-system";

    fn legacy() -> Vec<LegacyInstallation> {
        default_legacy_installations()
    }

    #[tokio::test]
    async fn test_clean_cluster_is_ok() {
        let result = validate_environment(
            &FakeCluster::new(),
            NS,
            &ObservabilityStackSpec::default(),
            &legacy(),
        )
        .await
        .unwrap();
        assert_eq!(result, EnvironmentValidation::Ok);
    }

    #[tokio::test]
    async fn test_legacy_only_is_error_naming_every_workload() {
        let cluster = FakeCluster::new();
        cluster.set_workload(
            WorkloadKind::Deployment,
            "observability",
            "observability-proxy",
            ready(1),
        );
        cluster.set_workload(
            WorkloadKind::DaemonSet,
            "observability",
            "observability-collector",
            ready(2),
        );

        let spec = ObservabilityStackSpec::default();
        let result = validate_environment(&cluster, NS, &spec, &legacy()).await.unwrap();
        match result {
            EnvironmentValidation::Error(message) => {
                assert!(message.contains("Deployment observability/observability-proxy (helm)"));
                assert!(message.contains("DaemonSet observability/observability-collector (helm)"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_legacy_alongside_own_workloads_is_warning() {
        let cluster = FakeCluster::new();
        cluster.set_workload(WorkloadKind::Deployment, "default", "observability-proxy", ready(1));
        cluster.set_workload(WorkloadKind::Deployment, NS, "metrics-proxy", ready(1));

        let spec = ObservabilityStackSpec::default();
        let result = validate_environment(&cluster, NS, &spec, &legacy()).await.unwrap();
        assert!(matches!(result, EnvironmentValidation::Warning(m) if m.contains("(manual)")));
    }

    #[tokio::test]
    async fn test_allow_legacy_install_overrides() {
        let cluster = FakeCluster::new();
        cluster.set_workload(WorkloadKind::Deployment, "default", "observability-proxy", ready(1));
        let spec = ObservabilityStackSpec {
            allow_legacy_install: true,
            ..Default::default()
        };

        let result = validate_environment(&cluster, NS, &spec, &legacy()).await.unwrap();
        assert_eq!(result, EnvironmentValidation::Ok);
    }

    #[tokio::test]
    async fn test_own_workloads_are_never_legacy() {
        let cluster = FakeCluster::new();
        cluster.set_workload(WorkloadKind::Deployment, NS, "metrics-proxy", ready(1));
        let list = vec![LegacyInstallation::new(
            NS,
            WorkloadKind::Deployment,
            "metrics-proxy",
            "manual",
        )];

        let result = validate_environment(&cluster, NS, &ObservabilityStackSpec::default(), &list)
            .await
            .unwrap();
        assert_eq!(result, EnvironmentValidation::Ok);
    }

    #[tokio::test]
    async fn test_lookup_failure_aborts_the_check() {
        let mut query = MockClusterQuery::new();
        query
            .expect_workload_status()
            .times(1)
            .returning(|_, _, _| Err(Error::ConfigError("api server unavailable".to_string())));

        let spec = ObservabilityStackSpec::default();
        let result = validate_environment(&query, NS, &spec, &legacy()).await;
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }
}
