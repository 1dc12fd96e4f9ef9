//! Data aggregate
//!
//! One list per resource kind plus the derived applications and containers.
//! A list is `None` until populated, which keeps "not loaded" distinct from
//! "loaded and empty".

use crate::error::DataError;
use crate::kind::ResourceKind;
use crate::models::{
    pod_containers, Application, Build, BuildConfig, Container, DeploymentConfig, Event,
    ImageStream, ObjectRecord, Pod, Project, ReplicationController, Resource, Route, Service,
    APPLICATION_LABEL, BUILD_LABEL, DEPLOYER_POD_LABEL,
};
use serde::Serialize;
use std::collections::BTreeSet;

/// All data retrieved from the cluster for one collection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    pub applications: Option<Vec<Application>>,
    pub projects: Option<Vec<Project>>,
    pub routes: Option<Vec<Route>>,
    pub services: Option<Vec<Service>>,
    pub pods: Option<Vec<Pod>>,
    pub containers: Option<Vec<Container>>,
    pub image_streams: Option<Vec<ImageStream>>,
    pub build_configs: Option<Vec<BuildConfig>>,
    pub builds: Option<Vec<Build>>,
    pub deployment_configs: Option<Vec<DeploymentConfig>>,
    pub replication_controllers: Option<Vec<ReplicationController>>,
    pub events: Option<Vec<Event>>,
}

/// Keep every record of the expected variant, failing on the first stranger
macro_rules! typed_records {
    ($kind:expr, $records:expr, $variant:ident) => {
        $records
            .into_iter()
            .map(|record| match record {
                Resource::$variant(r) => Ok(r),
                other => Err(DataError::KindMismatch {
                    expected: $kind,
                    found: other.kind(),
                }),
            })
            .collect::<Result<Vec<_>, DataError>>()?
    };
}

fn fill<T>(slot: &mut Option<T>, other: Option<T>) {
    if slot.is_none() {
        *slot = other;
    }
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list for `kind` with the given records
    ///
    /// Fails with [`DataError::KindMismatch`] if any record is of another
    /// kind, leaving the previous value untouched. Applications are derived,
    /// never set from records.
    pub fn set(&mut self, kind: ResourceKind, records: Vec<Resource>) -> Result<(), DataError> {
        match kind {
            ResourceKind::Project => {
                self.projects = Some(typed_records!(kind, records, Project));
            }
            ResourceKind::Route => {
                self.routes = Some(typed_records!(kind, records, Route));
            }
            ResourceKind::Service => {
                self.services = Some(typed_records!(kind, records, Service));
            }
            ResourceKind::Pod => {
                self.pods = Some(typed_records!(kind, records, Pod));
            }
            ResourceKind::Container => {
                self.containers = Some(typed_records!(kind, records, Container));
            }
            ResourceKind::ImageStream => {
                self.image_streams = Some(typed_records!(kind, records, ImageStream));
            }
            ResourceKind::BuildConfig => {
                self.build_configs = Some(typed_records!(kind, records, BuildConfig));
            }
            ResourceKind::Build => {
                self.builds = Some(typed_records!(kind, records, Build));
            }
            ResourceKind::DeploymentConfig => {
                self.deployment_configs = Some(typed_records!(kind, records, DeploymentConfig));
            }
            ResourceKind::ReplicationController => {
                self.replication_controllers =
                    Some(typed_records!(kind, records, ReplicationController));
            }
            ResourceKind::Event => {
                self.events = Some(typed_records!(kind, records, Event));
            }
            ResourceKind::Application => return Err(DataError::UnknownKind(kind)),
        }
        Ok(())
    }

    /// Whether the list for `kind` has been populated
    pub fn is_loaded(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Application => self.applications.is_some(),
            ResourceKind::Project => self.projects.is_some(),
            ResourceKind::Route => self.routes.is_some(),
            ResourceKind::Service => self.services.is_some(),
            ResourceKind::Pod => self.pods.is_some(),
            ResourceKind::Container => self.containers.is_some(),
            ResourceKind::ImageStream => self.image_streams.is_some(),
            ResourceKind::BuildConfig => self.build_configs.is_some(),
            ResourceKind::Build => self.builds.is_some(),
            ResourceKind::DeploymentConfig => self.deployment_configs.is_some(),
            ResourceKind::ReplicationController => self.replication_controllers.is_some(),
            ResourceKind::Event => self.events.is_some(),
        }
    }

    /// Copy every list of `other` that is still absent here
    ///
    /// Left-biased: a list already present in `self` is never replaced.
    pub fn merge(&mut self, other: Data) {
        fill(&mut self.applications, other.applications);
        fill(&mut self.projects, other.projects);
        fill(&mut self.routes, other.routes);
        fill(&mut self.services, other.services);
        fill(&mut self.pods, other.pods);
        fill(&mut self.containers, other.containers);
        fill(&mut self.image_streams, other.image_streams);
        fill(&mut self.build_configs, other.build_configs);
        fill(&mut self.builds, other.builds);
        fill(&mut self.deployment_configs, other.deployment_configs);
        fill(&mut self.replication_controllers, other.replication_controllers);
        fill(&mut self.events, other.events);
    }

    /// Remove builder and deployer pods, returning them as `(builders, deployers)`
    ///
    /// A pod carrying both labels counts as a builder.
    pub fn remove_builder_and_deployer_pods(&mut self) -> (Vec<Pod>, Vec<Pod>) {
        let Some(pods) = self.pods.take() else {
            return (Vec::new(), Vec::new());
        };

        let mut builders = Vec::new();
        let mut deployers = Vec::new();
        let mut retained = Vec::with_capacity(pods.len());
        for pod in pods {
            if pod.has_label(BUILD_LABEL) {
                builders.push(pod);
            } else if pod.has_label(DEPLOYER_POD_LABEL) {
                deployers.push(pod);
            } else {
                retained.push(pod);
            }
        }

        self.pods = Some(retained);
        (builders, deployers)
    }

    /// Replace containers with the container specs of every pod
    pub fn extract_containers_from_pods(&mut self) -> Result<(), DataError> {
        let pods = self.pods.as_ref().ok_or(DataError::PodsNotLoaded)?;
        let containers = pods
            .iter()
            .flat_map(|pod| pod_containers(pod).iter().cloned())
            .collect();
        self.containers = Some(containers);
        Ok(())
    }

    /// Derive the sorted, distinct applications from deployment-config labels
    pub fn extract_applications_from_deployment_configs(&mut self) {
        let names: BTreeSet<&str> = self
            .deployment_configs
            .iter()
            .flatten()
            .filter_map(|dc| dc.label(APPLICATION_LABEL))
            .filter(|name| !name.is_empty())
            .collect();

        self.applications = Some(names.into_iter().map(Application::new).collect());
    }
}

/// Records belonging to the given namespace
pub fn filter_by_namespace<T: ObjectRecord + Clone>(records: &[T], namespace: &str) -> Vec<T> {
    records
        .iter()
        .filter(|r| r.namespace() == namespace)
        .cloned()
        .collect()
}

/// Records carrying the exact `key=value` label
pub fn filter_by_label_value<T: ObjectRecord + Clone>(
    records: &[T],
    key: &str,
    value: &str,
) -> Vec<T> {
    records
        .iter()
        .filter(|r| r.label(key) == Some(value))
        .cloned()
        .collect()
}

/// Records belonging to the given application
pub fn filter_by_application<T: ObjectRecord + Clone>(
    records: &[T],
    application: &Application,
) -> Vec<T> {
    filter_by_label_value(records, APPLICATION_LABEL, application.name())
}
