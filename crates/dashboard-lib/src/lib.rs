//! Core library of the OpenShift dashboard
//!
//! This crate provides:
//! - The resource kind registry and record types
//! - The `Data` aggregate with its filters and derivations
//! - Parallel, cached, deadline-bounded collection across namespaces
//! - Health checks and observability

pub mod cache;
pub mod collector;
pub mod data;
pub mod error;
pub mod health;
pub mod kind;
pub mod models;
pub mod observability;

pub use collector::{
    ClusterClient, Collector, CollectorBuilder, CollectorConfig, CollectorStats,
    KubeClusterClient, Selectors,
};
pub use data::Data;
pub use error::{ClusterError, CollectError, DataError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use kind::ResourceKind;
pub use models::*;
pub use observability::{DashboardMetrics, StructuredLogger};
