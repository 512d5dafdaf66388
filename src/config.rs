//! Operator configuration
//!
//! Values resolved from the command line and environment, plus the list of
//! legacy installations the environment check looks for.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Namespace the operator installs into unless overridden
pub const DEFAULT_NAMESPACE: &str = "observability-system";

/// Fixed delay between successful reconciliation passes
pub const DEFAULT_REQUEUE_SECONDS: u64 = 30;

/// Output format of the log subscriber
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Kind of workload the operator manages or looks for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum WorkloadKind {
    Deployment,
    DaemonSet,
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadKind::Deployment => write!(f, "Deployment"),
            WorkloadKind::DaemonSet => write!(f, "DaemonSet"),
        }
    }
}

/// A workload left behind by a differently-managed install
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyInstallation {
    pub namespace: String,
    pub kind: WorkloadKind,
    pub name: String,
    /// How the workload was installed, e.g. "helm" or "manual"
    #[serde(default)]
    pub source: String,
}

impl LegacyInstallation {
    pub fn new(namespace: &str, kind: WorkloadKind, name: &str, source: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            kind,
            name: name.to_string(),
            source: source.to_string(),
        }
    }
}

/// Built-in legacy install locations: helm chart, manual manifests and the
/// platform marketplace install
pub fn default_legacy_installations() -> Vec<LegacyInstallation> {
    vec![
        LegacyInstallation::new(
            "observability",
            WorkloadKind::Deployment,
            "observability-proxy",
            "helm",
        ),
        LegacyInstallation::new(
            "observability",
            WorkloadKind::DaemonSet,
            "observability-collector",
            "helm",
        ),
        LegacyInstallation::new(
            "default",
            WorkloadKind::Deployment,
            "observability-proxy",
            "manual",
        ),
        LegacyInstallation::new(
            "observability-collector",
            WorkloadKind::DaemonSet,
            "observability-collector",
            "manual",
        ),
        LegacyInstallation::new(
            "observability-platform",
            WorkloadKind::Deployment,
            "observability-cluster-collector",
            "platform",
        ),
    ]
}

/// Load a legacy installation list from a YAML file
///
/// The file holds a sequence of `{namespace, kind, name, source}` entries and
/// replaces the built-in list entirely.
pub fn load_legacy_installations(path: &Path) -> Result<Vec<LegacyInstallation>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!(
            "failed to read legacy installations from {}: {e}",
            path.display()
        ))
    })?;
    serde_yaml::from_str(&raw).map_err(|e| {
        Error::ConfigError(format!(
            "failed to parse legacy installations in {}: {e}",
            path.display()
        ))
    })
}

/// Resolved operator configuration
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Namespace the managed workloads are installed into
    pub namespace: String,
    pub requeue_interval: Duration,
    pub legacy_installations: Vec<LegacyInstallation>,
    pub operator_version: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            requeue_interval: Duration::from_secs(DEFAULT_REQUEUE_SECONDS),
            legacy_installations: default_legacy_installations(),
            operator_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl OperatorConfig {
    /// Build the configuration, reading the legacy list from `legacy_file`
    /// when one is given
    pub fn new(
        namespace: &str,
        requeue_seconds: u64,
        legacy_file: Option<&Path>,
    ) -> Result<Self> {
        if namespace.trim().is_empty() {
            return Err(Error::ConfigError(
                "operator namespace must not be empty".to_string(),
            ));
        }
        if requeue_seconds == 0 {
            return Err(Error::ConfigError(
                "requeue interval must be at least one second".to_string(),
            ));
        }

        let legacy_installations = match legacy_file {
            Some(path) => load_legacy_installations(path)?,
            None => default_legacy_installations(),
        };

        Ok(Self {
            namespace: namespace.to_string(),
            requeue_interval: Duration::from_secs(requeue_seconds),
            legacy_installations,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_cover_every_install_source() {
        let defaults = default_legacy_installations();
        for source in ["helm", "manual", "platform"] {
            assert!(defaults.iter().any(|l| l.source == source), "{source}");
        }
    }

    #[test]
    fn test_legacy_file_replaces_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "- namespace: monitoring\n  kind: DaemonSet\n  name: old-agent\n  source: helm\n- namespace: tools\n  kind: Deployment\n  name: old-proxy"
        )
        .unwrap();

        let config = OperatorConfig::new("observability-system", 30, Some(file.path())).unwrap();
        assert_eq!(
            config.legacy_installations,
            vec![
                LegacyInstallation::new("monitoring", WorkloadKind::DaemonSet, "old-agent", "helm"),
                LegacyInstallation::new("tools", WorkloadKind::Deployment, "old-proxy", ""),
            ]
        );
    }

    #[test]
    fn test_malformed_legacy_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "- namespace: monitoring\n  kind: StatefulSet\n  name: x").unwrap();

        let err = load_legacy_installations(file.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_zero_requeue_is_rejected() {
        assert!(OperatorConfig::new("observability-system", 0, None).is_err());
        assert!(OperatorConfig::new("", 30, None).is_err());
    }
}
