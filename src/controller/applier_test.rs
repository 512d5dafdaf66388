//! Unit tests for the resource applier

#[cfg(test)]
mod tests {
    use crate::controller::applier::{apply, delete, ApplySummary, DeleteSummary};
    use crate::controller::cluster::{MockDynamicClient, ResourceMapping};
    use crate::controller::fake_cluster::FakeCluster;
    use crate::error::Error;
    use crate::render::RenderedDocument;
    use kube::api::{ApiResource, GroupVersionKind};

    const NS: &str = "observability-system";

    fn doc(fragment: &str, content: &str) -> RenderedDocument {
        RenderedDocument {
            fragment: fragment.to_string(),
            content: content.to_string(),
        }
    }

    fn config_map(name: &str, component: &str, value: &str) -> RenderedDocument {
        doc(
            &format!("{name}.yaml"),
            &format!(
                "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {name}\n  labels:\n    app.kubernetes.io/component: {component}\ndata:\n  key: {value}\n"
            ),
        )
    }

    fn cluster_role(name: &str) -> RenderedDocument {
        doc(
            &format!("{name}.yaml"),
            &format!(
                "apiVersion: rbac.authorization.k8s.io/v1\nkind: ClusterRole\nmetadata:\n  name: {name}\nrules: []\n"
            ),
        )
    }

    fn batch() -> Vec<RenderedDocument> {
        vec![
            config_map("proxy-config", "proxy", "a"),
            cluster_role("collector"),
            config_map("logging-config", "logging", "b"),
        ]
    }

    #[tokio::test]
    async fn test_apply_twice_creates_once_then_patches() {
        let cluster = FakeCluster::new();

        let first = apply(&cluster, NS, &batch(), |_| false).await.unwrap();
        assert_eq!(
            first,
            ApplySummary {
                created: 3,
                patched: 0,
                skipped: 0
            }
        );

        let second = apply(&cluster, NS, &batch(), |_| false).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.patched, 3);

        assert_eq!(FakeCluster::count(&cluster.creates), 3);
        assert_eq!(FakeCluster::count(&cluster.patches), 3);
        assert_eq!(cluster.object_count(), 3);
    }

    #[tokio::test]
    async fn test_live_state_matches_rendered_state() {
        let cluster = FakeCluster::new();
        apply(&cluster, NS, &batch(), |_| false).await.unwrap();
        apply(
            &cluster,
            NS,
            &[config_map("proxy-config", "proxy", "changed")],
            |_| false,
        )
        .await
        .unwrap();

        let live = cluster
            .object("ConfigMap", Some(NS), "proxy-config")
            .unwrap();
        assert_eq!(live.data["data"]["key"], "changed");
    }

    #[tokio::test]
    async fn test_namespace_defaults_only_for_namespaced_kinds() {
        let cluster = FakeCluster::new();
        apply(&cluster, NS, &batch(), |_| false).await.unwrap();

        let cm = cluster
            .object("ConfigMap", Some(NS), "proxy-config")
            .unwrap();
        assert_eq!(cm.metadata.namespace.as_deref(), Some(NS));
        assert!(cluster.object("ClusterRole", None, "collector").is_some());
    }

    #[tokio::test]
    async fn test_explicit_namespace_is_kept() {
        let cluster = FakeCluster::new();
        let docs = [doc(
            "cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: elsewhere\n  namespace: tools\n",
        )];
        apply(&cluster, NS, &docs, |_| false).await.unwrap();
        assert!(cluster.object("ConfigMap", Some("tools"), "elsewhere").is_some());
    }

    #[tokio::test]
    async fn test_filtered_objects_are_untouched() {
        let cluster = FakeCluster::new();
        let summary = apply(&cluster, NS, &batch(), |obj| obj.component() == Some("logging"))
            .await
            .unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(summary.skipped, 1);
        assert!(cluster
            .object("ConfigMap", Some(NS), "logging-config")
            .is_none());
    }

    #[tokio::test]
    async fn test_empty_documents_are_skipped() {
        let cluster = FakeCluster::new();
        let docs = [doc("secret.yaml", "  \n\n"), config_map("a", "proxy", "x")];
        let summary = apply(&cluster, NS, &docs, |_| false).await.unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn test_decode_error_aborts_without_rollback() {
        let cluster = FakeCluster::new();
        let docs = [
            config_map("first", "proxy", "x"),
            doc("broken.yaml", "kind: ConfigMap\nmetadata:\n  name: broken\n"),
            config_map("third", "proxy", "x"),
        ];

        let err = apply(&cluster, NS, &docs, |_| false).await.unwrap_err();
        assert!(matches!(err, Error::DecodeError(ref m) if m.starts_with("broken.yaml")));
        assert!(cluster.object("ConfigMap", Some(NS), "first").is_some());
        assert!(cluster.object("ConfigMap", Some(NS), "third").is_none());
    }

    #[tokio::test]
    async fn test_unmapped_kind_is_fatal() {
        let cluster = FakeCluster::new().with_unknown_kind("ServiceMonitor");
        let docs = [
            doc(
                "monitor.yaml",
                "apiVersion: monitoring.coreos.com/v1\nkind: ServiceMonitor\nmetadata:\n  name: proxy\n",
            ),
            config_map("after", "proxy", "x"),
        ];

        let err = apply(&cluster, NS, &docs, |_| false).await.unwrap_err();
        assert!(matches!(err, Error::MappingError { .. }));
        assert_eq!(cluster.object_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_skips_objects_that_never_existed() {
        let cluster = FakeCluster::new();
        apply(&cluster, NS, &batch()[..1], |_| false).await.unwrap();

        let summary = delete(&cluster, NS, &batch()).await.unwrap();
        assert_eq!(
            summary,
            DeleteSummary {
                deleted: 1,
                absent: 2
            }
        );
        assert_eq!(FakeCluster::count(&cluster.deletes), 1);
        assert_eq!(cluster.object_count(), 0);
    }

    #[tokio::test]
    async fn test_api_errors_propagate() {
        let mut client = MockDynamicClient::new();
        client.expect_resolve_mapping().returning(|_, kind| {
            Ok(ResourceMapping {
                api_resource: ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", kind)),
                namespaced: true,
            })
        });
        client.expect_get().returning(|_| {
            Err(Error::KubeError(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "etcd unavailable".to_string(),
                reason: "InternalError".to_string(),
                code: 500,
            })))
        });
        client.expect_create().never();
        client.expect_delete().never();

        let docs = [config_map("a", "proxy", "x")];
        assert!(matches!(
            apply(&client, NS, &docs, |_| false).await,
            Err(Error::KubeError(_))
        ));
        assert!(matches!(
            delete(&client, NS, &docs).await,
            Err(Error::KubeError(_))
        ));
    }
}
