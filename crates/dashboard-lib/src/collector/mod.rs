//! Parallel multi-namespace resource collection
//!
//! The [`Collector`] resolves the visible projects, fans out one fetch per
//! requested kind, bounds the whole operation with a deadline, merges the
//! partial results into a [`Data`](crate::data::Data) aggregate and runs the
//! post-processing derivations. It talks to the cluster only through the
//! [`ClusterClient`] trait.

mod engine;
mod kube_client;

#[cfg(test)]
mod tests;

pub use engine::{Collector, CollectorBuilder, CollectorConfig, CollectorStats};
pub use kube_client::KubeClusterClient;

use crate::error::ClusterError;
use crate::kind::ResourceKind;
use crate::models::{Project, Resource};

pub use async_trait::async_trait;

/// Label and field selectors for a list call; `None` means everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selectors {
    pub label: Option<String>,
    pub field: Option<String>,
}

impl Selectors {
    /// Selectors matching every object
    pub fn everything() -> Self {
        Self::default()
    }
}

/// Read-only access to the cluster API
///
/// Implementations must tolerate concurrent calls.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List every project visible to the dashboard
    async fn list_projects(&self) -> Result<Vec<Project>, ClusterError>;

    /// List the records of `kind` in `namespace`
    ///
    /// Every returned record is of the variant associated with `kind`.
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selectors: &Selectors,
    ) -> Result<Vec<Resource>, ClusterError>;
}
