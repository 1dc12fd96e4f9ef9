//! Collection scenarios
//!
//! These tests drive the collector against an in-memory cluster that records
//! every call it receives, so fan-out, caching, deadlines and derivations can
//! be checked without a live API server.

#[cfg(test)]
mod collector_scenarios {
    use crate::collector::{async_trait, ClusterClient, Collector, CollectorBuilder, Selectors};
    use crate::error::{ClusterError, CollectError, DataError};
    use crate::kind::{ResourceKind, SYSTEM_NAMESPACE};
    use crate::models::{
        pod_containers, Application, Container, DeploymentConfig, ObjectRecord, Pod, Project,
        Resource, Service, APPLICATION_LABEL, BUILD_LABEL, DEPLOYER_POD_LABEL,
    };
    use k8s_openapi::api::core::v1::PodSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    /// In-memory cluster recording the calls it receives
    #[derive(Default)]
    struct MockCluster {
        projects: Vec<String>,
        records: HashMap<(ResourceKind, String), Vec<Resource>>,
        failures: HashMap<(ResourceKind, String), String>,
        delays: HashMap<ResourceKind, Duration>,
        project_failure: Option<String>,
        project_delay: Option<Duration>,
        project_calls: AtomicUsize,
        calls: Mutex<Vec<(ResourceKind, String)>>,
    }

    impl MockCluster {
        fn with_projects(projects: &[&str]) -> Self {
            Self {
                projects: projects.iter().map(|p| p.to_string()).collect(),
                ..Default::default()
            }
        }

        fn records(mut self, kind: ResourceKind, namespace: &str, records: Vec<Resource>) -> Self {
            self.records.insert((kind, namespace.to_string()), records);
            self
        }

        fn failing(mut self, kind: ResourceKind, namespace: &str) -> Self {
            self.failures
                .insert((kind, namespace.to_string()), format!("{kind} unavailable"));
            self
        }

        fn delayed(mut self, kind: ResourceKind, delay: Duration) -> Self {
            self.delays.insert(kind, delay);
            self
        }

        fn calls_for(&self, kind: ResourceKind) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, ns)| ns.clone())
                .collect()
        }
    }

    fn api_error(message: &str) -> ClusterError {
        ClusterError::Kube(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: "ServiceUnavailable".to_string(),
            code: 503,
        }))
    }

    #[async_trait]
    impl ClusterClient for MockCluster {
        async fn list_projects(&self) -> Result<Vec<Project>, ClusterError> {
            self.project_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.project_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &self.project_failure {
                return Err(api_error(message));
            }
            Ok(self
                .projects
                .iter()
                .map(|name| Project {
                    metadata: meta(name, "", &[]),
                    ..Default::default()
                })
                .collect())
        }

        async fn list(
            &self,
            kind: ResourceKind,
            namespace: &str,
            selectors: &Selectors,
        ) -> Result<Vec<Resource>, ClusterError> {
            assert_eq!(selectors, &Selectors::everything());
            self.calls
                .lock()
                .unwrap()
                .push((kind, namespace.to_string()));

            if let Some(delay) = self.delays.get(&kind) {
                tokio::time::sleep(*delay).await;
            }

            let key = (kind, namespace.to_string());
            if let Some(message) = self.failures.get(&key) {
                return Err(api_error(message));
            }
            Ok(self.records.get(&key).cloned().unwrap_or_default())
        }
    }

    fn meta(name: &str, namespace: &str, labels: &[(&str, &str)]) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn pod(name: &str, namespace: &str, labels: &[(&str, &str)], containers: &[&str]) -> Resource {
        Resource::Pod(Pod {
            metadata: meta(name, namespace, labels),
            spec: Some(PodSpec {
                containers: containers
                    .iter()
                    .map(|c| Container {
                        name: c.to_string(),
                        image: Some(format!("registry/{c}:latest")),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn service(name: &str, namespace: &str) -> Resource {
        Resource::Service(Service {
            metadata: meta(name, namespace, &[]),
            ..Default::default()
        })
    }

    fn dc(name: &str, application: Option<&str>) -> Resource {
        let labels: Vec<(&str, &str)> = application
            .map(|app| vec![(APPLICATION_LABEL, app)])
            .unwrap_or_default();
        Resource::DeploymentConfig(DeploymentConfig {
            metadata: meta(name, "a", &labels),
            ..Default::default()
        })
    }

    fn collector(cluster: &Arc<MockCluster>) -> Collector {
        CollectorBuilder::new()
            .client(cluster.clone())
            .build()
            .unwrap()
    }

    fn pod_names(pods: &[Pod]) -> Vec<&str> {
        pods.iter().map(|p| p.name()).collect()
    }

    #[tokio::test]
    async fn test_two_namespaces_pods_and_containers() {
        let cluster = Arc::new(
            MockCluster::with_projects(&["a", "b"])
                .records(ResourceKind::Pod, "a", vec![pod("p-a", "a", &[], &["c1", "c2"])])
                .records(ResourceKind::Pod, "b", vec![pod("p-b", "b", &[], &["c3"])]),
        );

        let data = collector(&cluster)
            .collect(&[ResourceKind::Pod, ResourceKind::Container])
            .await
            .unwrap();

        assert_eq!(pod_names(data.pods.as_deref().unwrap()), vec!["p-a", "p-b"]);
        let containers: Vec<&str> = data
            .containers
            .as_deref()
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(containers, vec!["c1", "c2", "c3"]);
        assert_eq!(cluster.calls_for(ResourceKind::Pod), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_containers_match_pod_specs() {
        let cluster = Arc::new(
            MockCluster::with_projects(&["a"]).records(
                ResourceKind::Pod,
                "a",
                vec![
                    pod("web", "a", &[], &["web", "proxy"]),
                    pod("web-1-build", "a", &[(BUILD_LABEL, "web-1")], &["sti-build"]),
                    pod("db", "a", &[], &["postgres"]),
                ],
            ),
        );

        let data = collector(&cluster)
            .collect(&[ResourceKind::Container, ResourceKind::Pod])
            .await
            .unwrap();

        let expected: Vec<Container> = data
            .pods
            .as_deref()
            .unwrap()
            .iter()
            .flat_map(|p| pod_containers(p).iter().cloned())
            .collect();
        assert_eq!(data.containers.as_ref(), Some(&expected));
        assert!(expected.iter().all(|c| c.name != "sti-build"));
    }

    #[tokio::test]
    async fn test_builder_and_deployer_pods_are_filtered() {
        let cluster = Arc::new(
            MockCluster::with_projects(&["a"]).records(
                ResourceKind::Pod,
                "a",
                vec![
                    pod("p", "a", &[], &["app"]),
                    pod("builder", "a", &[(BUILD_LABEL, "app-1")], &["build"]),
                    pod("deployer", "a", &[(DEPLOYER_POD_LABEL, "app-1")], &["deploy"]),
                ],
            ),
        );

        let data = collector(&cluster)
            .collect(&[ResourceKind::Pod])
            .await
            .unwrap();

        let pods = data.pods.as_deref().unwrap();
        assert_eq!(pod_names(pods), vec!["p"]);
        assert!(pods
            .iter()
            .all(|p| !p.has_label(BUILD_LABEL) && !p.has_label(DEPLOYER_POD_LABEL)));
        assert!(data.containers.is_none());
    }

    #[tokio::test]
    async fn test_application_extraction() {
        let cluster = Arc::new(MockCluster::with_projects(&["a"]).records(
            ResourceKind::DeploymentConfig,
            "a",
            vec![
                dc("web-1", Some("web")),
                dc("api-1", Some("api")),
                dc("web-2", Some("web")),
                dc("blank", Some("")),
                dc("plain", None),
            ],
        ));

        let data = collector(&cluster)
            .collect(&[ResourceKind::DeploymentConfig, ResourceKind::Application])
            .await
            .unwrap();

        assert_eq!(
            data.applications,
            Some(vec![Application::new("api"), Application::new("web")])
        );
        assert_eq!(data.deployment_configs.map(|d| d.len()), Some(5));
    }

    #[tokio::test]
    async fn test_single_namespace_failure_fails_the_kind() {
        let cluster = Arc::new(
            MockCluster::with_projects(&["a", "b"])
                .records(ResourceKind::Service, "a", vec![service("s1", "a")])
                .failing(ResourceKind::Service, "b"),
        );

        let err = collector(&cluster)
            .collect(&[ResourceKind::Service])
            .await
            .unwrap_err();

        match err {
            CollectError::PartialFetchFailed { kind, errors } => {
                assert_eq!(kind, ResourceKind::Service);
                assert_eq!(errors.len(), 1);
                assert!(errors.to_string().contains("service unavailable"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_aborts_later_namespaces() {
        let cluster = Arc::new(
            MockCluster::with_projects(&["a", "b", "c"]).failing(ResourceKind::Route, "a"),
        );

        let result = collector(&cluster).collect(&[ResourceKind::Route]).await;

        assert!(matches!(
            result,
            Err(CollectError::PartialFetchFailed { .. })
        ));
        assert_eq!(cluster.calls_for(ResourceKind::Route), vec!["a"]);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cluster = Arc::new(
            MockCluster::with_projects(&["a"]).failing(ResourceKind::Build, "a"),
        );
        let collector = collector(&cluster);

        assert!(collector.collect(&[ResourceKind::Build]).await.is_err());
        assert!(collector.collect(&[ResourceKind::Build]).await.is_err());

        assert_eq!(cluster.calls_for(ResourceKind::Build).len(), 2);
    }

    #[tokio::test]
    async fn test_deadline_expiry_discards_results() {
        let cluster = Arc::new(
            MockCluster::with_projects(&["a"])
                .records(ResourceKind::Service, "a", vec![service("s1", "a")])
                .delayed(ResourceKind::Event, Duration::from_secs(5))
                .delayed(ResourceKind::Service, Duration::from_millis(10)),
        );
        let collector = CollectorBuilder::new()
            .client(cluster.clone())
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        let start = Instant::now();
        let err = collector
            .collect(&[ResourceKind::Service, ResourceKind::Event])
            .await
            .unwrap_err();

        assert!(matches!(err, CollectError::CollectionTimeout(d) if d == Duration::from_millis(200)));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(collector.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_fetches_run_concurrently() {
        let kinds = [
            ResourceKind::Service,
            ResourceKind::Route,
            ResourceKind::Build,
            ResourceKind::Event,
        ];
        let mut cluster = MockCluster::with_projects(&["a"]);
        for kind in kinds {
            cluster = cluster.delayed(kind, Duration::from_millis(150));
        }
        let cluster = Arc::new(cluster);
        // One after another the fetches would need 600ms
        let collector = CollectorBuilder::new()
            .client(cluster.clone())
            .timeout(Duration::from_millis(300))
            .build()
            .unwrap();

        let data = tokio_test::assert_ok!(collector.collect(&kinds).await);

        for kind in kinds {
            assert!(data.is_loaded(kind), "{kind} should be present");
            assert_eq!(cluster.calls_for(kind), vec!["a"]);
        }
    }

    #[tokio::test]
    async fn test_deadline_covers_namespace_resolution() {
        let cluster = Arc::new(MockCluster {
            projects: vec!["a".to_string()],
            project_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let collector = CollectorBuilder::new()
            .client(cluster.clone())
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();

        let start = Instant::now();
        let err = collector
            .collect(&[ResourceKind::Service])
            .await
            .unwrap_err();

        assert!(matches!(err, CollectError::CollectionTimeout(_)));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(cluster.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resources_cache_serves_second_collection() {
        let cluster = Arc::new(
            MockCluster::with_projects(&["a", "b"])
                .records(ResourceKind::Service, "a", vec![service("s1", "a")])
                .records(ResourceKind::Service, "b", vec![service("s2", "b")]),
        );
        let collector = collector(&cluster);

        let first = collector.collect(&[ResourceKind::Service]).await.unwrap();
        let second = collector.collect(&[ResourceKind::Service]).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cluster.calls_for(ResourceKind::Service), vec!["a", "b"]);
        assert_eq!(cluster.project_calls.load(Ordering::SeqCst), 1);

        let stats = collector.stats();
        assert_eq!(stats.collections, 2);
        assert_eq!(stats.resources_cache_hits, 1);
        assert_eq!(stats.resources_cache_misses, 1);
        assert_eq!(stats.namespaces_cache_hits, 1);
    }

    #[tokio::test]
    async fn test_disabled_resources_cache_refetches() {
        let cluster = Arc::new(MockCluster::with_projects(&["a"]));
        let collector = CollectorBuilder::new()
            .client(cluster.clone())
            .resources_cache(false)
            .build()
            .unwrap();

        tokio_test::assert_ok!(collector.collect(&[ResourceKind::Event]).await);
        tokio_test::assert_ok!(collector.collect(&[ResourceKind::Event]).await);

        assert_eq!(cluster.calls_for(ResourceKind::Event).len(), 2);
        // Namespaces stay cached regardless
        assert_eq!(cluster.project_calls.load(Ordering::SeqCst), 1);
        assert!(!collector.stats().resources_cache_enabled);
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let cluster = Arc::new(MockCluster::with_projects(&["a"]));
        let collector = CollectorBuilder::new()
            .client(cluster.clone())
            .cache_ttl(Duration::from_millis(20))
            .build()
            .unwrap();

        collector.collect(&[ResourceKind::Route]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        collector.collect(&[ResourceKind::Route]).await.unwrap();

        assert_eq!(cluster.calls_for(ResourceKind::Route).len(), 2);
        assert_eq!(cluster.project_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_projects_use_system_namespace() {
        let cluster = Arc::new(MockCluster::with_projects(&["a", "b"]));

        let data = collector(&cluster)
            .collect(&[ResourceKind::Project])
            .await
            .unwrap();

        assert_eq!(data.projects, Some(vec![]));
        assert_eq!(
            cluster.calls_for(ResourceKind::Project),
            vec![SYSTEM_NAMESPACE]
        );
    }

    #[tokio::test]
    async fn test_empty_namespace_set() {
        let cluster = Arc::new(MockCluster::with_projects(&[]));

        let data = collector(&cluster)
            .collect(&ResourceKind::ALL)
            .await
            .unwrap();

        assert_eq!(data.pods, Some(vec![]));
        assert_eq!(data.services, Some(vec![]));
        assert_eq!(data.containers, Some(vec![]));
        assert_eq!(data.applications, Some(vec![]));
        for kind in ResourceKind::ALL {
            assert!(data.is_loaded(kind), "{kind} should be present");
        }
        // Only the system-scoped project fetch reaches the cluster
        assert_eq!(cluster.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_containers_without_pods() {
        let cluster = Arc::new(MockCluster::with_projects(&["a"]));

        let err = collector(&cluster)
            .collect(&[ResourceKind::Container])
            .await
            .unwrap_err();

        assert!(matches!(err, CollectError::Data(DataError::PodsNotLoaded)));
    }

    #[tokio::test]
    async fn test_cluster_unreachable() {
        let cluster = Arc::new(MockCluster {
            project_failure: Some("connection refused".to_string()),
            ..Default::default()
        });

        let err = collector(&cluster)
            .collect(&[ResourceKind::Service])
            .await
            .unwrap_err();

        assert!(matches!(err, CollectError::ClusterUnreachable(_)));
        assert!(cluster.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_kinds_fetch_once() {
        let cluster = Arc::new(MockCluster::with_projects(&["a"]));

        collector(&cluster)
            .collect(&[ResourceKind::Service, ResourceKind::Service])
            .await
            .unwrap();

        assert_eq!(cluster.calls_for(ResourceKind::Service), vec!["a"]);
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected() {
        let cluster = Arc::new(MockCluster::with_projects(&["a"]));

        let err = collector(&cluster).collect(&[]).await.unwrap_err();

        assert!(matches!(err, CollectError::NoKindsRequested));
        assert_eq!(cluster.project_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrequested_kinds_stay_absent() {
        let cluster = Arc::new(MockCluster::with_projects(&["a"]));

        let data = collector(&cluster)
            .collect(&[ResourceKind::Service])
            .await
            .unwrap();

        assert!(data.is_loaded(ResourceKind::Service));
        assert!(!data.is_loaded(ResourceKind::Pod));
        assert!(!data.is_loaded(ResourceKind::Application));
    }

    #[tokio::test]
    async fn test_builder_requires_client() {
        assert!(CollectorBuilder::new().build().is_err());
    }

    #[tokio::test]
    async fn test_builder_overrides_defaults() {
        let cluster = Arc::new(MockCluster::with_projects(&["a"]));
        let collector = CollectorBuilder::new()
            .client(cluster.clone())
            .system_namespace("platform")
            .sweep_interval(Duration::from_secs(1))
            .build()
            .unwrap();

        assert_eq!(collector.config().system_namespace, "platform");
        assert_eq!(collector.config().timeout, Duration::from_secs(10));

        collector.collect(&[ResourceKind::Project]).await.unwrap();
        assert_eq!(cluster.calls_for(ResourceKind::Project), vec!["platform"]);
    }
}
