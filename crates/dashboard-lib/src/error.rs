//! Error types for the collector, the cluster client and the Data aggregate

use crate::kind::ResourceKind;
use std::fmt;
use std::time::Duration;

/// Errors raised by a [`ClusterClient`](crate::collector::ClusterClient)
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("kubernetes API request failed: {0}")]
    Kube(#[from] kube::Error),

    #[error("failed to decode {kind} list: {source}")]
    Decode {
        kind: ResourceKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("resource kind {0} is derived and cannot be listed from the cluster")]
    NotListable(ResourceKind),

    #[error("failed to load cluster configuration: {0}")]
    Config(String),
}

/// Errors raised while populating or deriving a [`Data`](crate::data::Data) aggregate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    #[error("wrong record type for {expected}: found a {found}")]
    KindMismatch {
        expected: ResourceKind,
        found: ResourceKind,
    },

    #[error("resource kind {0} cannot be set from records")]
    UnknownKind(ResourceKind),

    #[error("cannot extract containers: pods are not loaded")]
    PodsNotLoaded,
}

/// Errors that terminate a collection
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("no resource kinds requested")]
    NoKindsRequested,

    #[error("cluster unreachable while listing projects: {0}")]
    ClusterUnreachable(#[source] ClusterError),

    #[error("failed to load {kind}: {errors}")]
    PartialFetchFailed { kind: ResourceKind, errors: FetchErrors },

    #[error("timed out after {0:?} while loading data")]
    CollectionTimeout(Duration),

    #[error("fetch task did not complete: {0}")]
    FetchAborted(String),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Errors accumulated by a single fetch
#[derive(Debug)]
pub struct FetchErrors(pub Vec<ClusterError>);

impl FetchErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClusterError> {
        self.0.iter()
    }
}

impl fmt::Display for FetchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl CollectError {
    /// Short reason label used for metrics and structured logs
    pub fn reason(&self) -> &'static str {
        match self {
            CollectError::NoKindsRequested => "no_kinds",
            CollectError::ClusterUnreachable(_) => "cluster_unreachable",
            CollectError::PartialFetchFailed { .. } => "partial_fetch_failed",
            CollectError::CollectionTimeout(_) => "timeout",
            CollectError::FetchAborted(_) => "fetch_aborted",
            CollectError::Data(_) => "data",
        }
    }
}
