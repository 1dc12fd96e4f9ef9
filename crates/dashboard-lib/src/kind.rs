//! Resource kind registry
//!
//! Enumerates every kind of resource the collector understands and
//! classifies each one for dispatch: fetched from user namespaces,
//! fetched from the fixed system namespace, or derived after fetching.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace that hosts cluster-wide objects such as projects
pub const SYSTEM_NAMESPACE: &str = "openshift";

/// Kinds of resources aggregated by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Application,
    Project,
    Route,
    Service,
    Pod,
    Container,
    ImageStream,
    BuildConfig,
    Build,
    DeploymentConfig,
    ReplicationController,
    Event,
}

/// Where a kind's records come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindSource {
    /// Listed from the cluster in the given namespace scope
    Fetched(NamespaceScope),
    /// Derived from other kinds once fetching is done
    Synthetic,
}

/// Namespace scope of a fetched kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceScope {
    /// Every project visible to the dashboard, resolved at runtime
    UserNamespaces,
    /// The fixed [`SYSTEM_NAMESPACE`]
    System,
}

/// Post-processing steps run after all fetches complete
///
/// The ordering of the variants is the order in which they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Derivation {
    RemoveBuilderAndDeployerPods,
    ExtractContainers,
    ExtractApplications,
}

impl ResourceKind {
    /// Every kind, in the order the dashboard requests them
    pub const ALL: [ResourceKind; 12] = [
        ResourceKind::Application,
        ResourceKind::Project,
        ResourceKind::Route,
        ResourceKind::Service,
        ResourceKind::Pod,
        ResourceKind::Container,
        ResourceKind::ImageStream,
        ResourceKind::BuildConfig,
        ResourceKind::Build,
        ResourceKind::DeploymentConfig,
        ResourceKind::ReplicationController,
        ResourceKind::Event,
    ];

    /// Stable string tag, also used as the resources cache key
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Application => "application",
            ResourceKind::Project => "project",
            ResourceKind::Route => "route",
            ResourceKind::Service => "service",
            ResourceKind::Pod => "pod",
            ResourceKind::Container => "container",
            ResourceKind::ImageStream => "imagestream",
            ResourceKind::BuildConfig => "buildconfig",
            ResourceKind::Build => "build",
            ResourceKind::DeploymentConfig => "deploymentconfig",
            ResourceKind::ReplicationController => "replicationcontroller",
            ResourceKind::Event => "event",
        }
    }

    pub fn source(&self) -> KindSource {
        match self {
            ResourceKind::Application | ResourceKind::Container => KindSource::Synthetic,
            ResourceKind::Project => KindSource::Fetched(NamespaceScope::System),
            _ => KindSource::Fetched(NamespaceScope::UserNamespaces),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source() == KindSource::Synthetic
    }

    /// Derivation triggered by requesting this kind, if any
    pub fn derivation(&self) -> Option<Derivation> {
        match self {
            ResourceKind::Pod => Some(Derivation::RemoveBuilderAndDeployerPods),
            ResourceKind::Container => Some(Derivation::ExtractContainers),
            ResourceKind::Application => Some(Derivation::ExtractApplications),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown kind tag
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind '{0}'")]
pub struct ParseKindError(pub String);

impl FromStr for ResourceKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseKindError(s.to_string()))
    }
}
