//! Resource records aggregated by the dashboard
//!
//! Core Kubernetes kinds reuse the `k8s-openapi` types. OpenShift kinds are
//! not part of `k8s-openapi`, so they are modelled as their metadata plus an
//! opaque `spec` and `status`; the dashboard carries them through without
//! interpreting them.

use crate::kind::ResourceKind;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use k8s_openapi::api::core::v1::{Container, Event, Pod, ReplicationController, Service};

/// Label carrying the application name on deployment-configs
pub const APPLICATION_LABEL: &str = "application";

/// Label set by the cluster on builder pods
pub const BUILD_LABEL: &str = "openshift.io/build.name";

/// Label set by the cluster on deployer pods
pub const DEPLOYER_POD_LABEL: &str = "openshift.io/deployer-pod-for.name";

/// Common view over a labeled, namespaced record
pub trait ObjectRecord {
    fn meta(&self) -> &ObjectMeta;

    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.meta().labels.as_ref()
    }

    fn label(&self, key: &str) -> Option<&str> {
        self.labels()?.get(key).map(String::as_str)
    }

    fn has_label(&self, key: &str) -> bool {
        self.label(key).is_some()
    }
}

macro_rules! openshift_record {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(default)]
            pub metadata: ObjectMeta,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub spec: Option<serde_json::Value>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub status: Option<serde_json::Value>,
        }

        impl ObjectRecord for $name {
            fn meta(&self) -> &ObjectMeta {
                &self.metadata
            }
        }
    };
}

openshift_record!(
    /// `project.openshift.io/v1` Project
    Project
);
openshift_record!(
    /// `route.openshift.io/v1` Route
    Route
);
openshift_record!(
    /// `image.openshift.io/v1` ImageStream
    ImageStream
);
openshift_record!(
    /// `build.openshift.io/v1` BuildConfig
    BuildConfig
);
openshift_record!(
    /// `build.openshift.io/v1` Build
    Build
);
openshift_record!(
    /// `apps.openshift.io/v1` DeploymentConfig
    DeploymentConfig
);

impl ObjectRecord for Service {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl ObjectRecord for Pod {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl ObjectRecord for ReplicationController {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl ObjectRecord for Event {
    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

/// Container specs of a pod, in spec order
pub fn pod_containers(pod: &Pod) -> &[Container] {
    pod.spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default()
}

/// A logical application, identified only by the value of its label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Application(String);

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single record of any kind, tagged with its kind
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Project(Project),
    Route(Route),
    Service(Service),
    Pod(Pod),
    Container(Container),
    ImageStream(ImageStream),
    BuildConfig(BuildConfig),
    Build(Build),
    DeploymentConfig(DeploymentConfig),
    ReplicationController(ReplicationController),
    Event(Event),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Project(_) => ResourceKind::Project,
            Resource::Route(_) => ResourceKind::Route,
            Resource::Service(_) => ResourceKind::Service,
            Resource::Pod(_) => ResourceKind::Pod,
            Resource::Container(_) => ResourceKind::Container,
            Resource::ImageStream(_) => ResourceKind::ImageStream,
            Resource::BuildConfig(_) => ResourceKind::BuildConfig,
            Resource::Build(_) => ResourceKind::Build,
            Resource::DeploymentConfig(_) => ResourceKind::DeploymentConfig,
            Resource::ReplicationController(_) => ResourceKind::ReplicationController,
            Resource::Event(_) => ResourceKind::Event,
        }
    }

    /// Object metadata; containers are not API objects and have none
    pub fn object_meta(&self) -> Option<&ObjectMeta> {
        match self {
            Resource::Project(r) => Some(r.meta()),
            Resource::Route(r) => Some(r.meta()),
            Resource::Service(r) => Some(r.meta()),
            Resource::Pod(r) => Some(r.meta()),
            Resource::Container(_) => None,
            Resource::ImageStream(r) => Some(r.meta()),
            Resource::BuildConfig(r) => Some(r.meta()),
            Resource::Build(r) => Some(r.meta()),
            Resource::DeploymentConfig(r) => Some(r.meta()),
            Resource::ReplicationController(r) => Some(r.meta()),
            Resource::Event(r) => Some(r.meta()),
        }
    }
}
