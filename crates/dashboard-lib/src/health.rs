//! Health tracking for the dashboard's liveness and readiness probes
//!
//! Two components are tracked: the cluster API as seen through project
//! listing, and the collector as seen through whole collections. Request
//! handlers report collection outcomes with [`HealthRegistry::record_collection`];
//! the probe endpoints re-check a cluster marked unhealthy before answering.

use crate::error::CollectError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but the last operation failed
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Unix timestamp of the last status change
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of the liveness endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components; no components means healthy
    pub fn compute_status(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        let mut degraded = false;
        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => degraded = true,
                ComponentStatus::Healthy => {}
            }
        }
        if degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Body of the readiness endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub mod components {
    /// Cluster API reachability
    pub const CLUSTER: &str = "cluster";
    /// Outcome of the last collection
    pub const COLLECTOR: &str = "collector";
}

#[derive(Debug, Default)]
struct RegistryState {
    serving: bool,
    components: BTreeMap<String, ComponentHealth>,
}

/// Shared, cloneable view of the dashboard's component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a component as healthy
    pub async fn register(&self, name: &str) {
        self.report(name, ComponentHealth::healthy()).await;
    }

    /// Replace the health of a component
    pub async fn report(&self, name: &str, health: ComponentHealth) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), health);
    }

    /// Mark the dashboard as serving (or not) for the readiness probe
    pub async fn set_ready(&self, serving: bool) {
        self.state.write().await.serving = serving;
    }

    /// Fold a collection outcome into the component statuses
    ///
    /// Success marks both components healthy. A failure degrades the
    /// collector; only an unreachable cluster marks the cluster unhealthy.
    pub async fn record_collection(&self, outcome: Result<(), &CollectError>) {
        let (collector, cluster) = match outcome {
            Ok(()) => (ComponentHealth::healthy(), Some(ComponentHealth::healthy())),
            Err(err) if matches!(err, CollectError::ClusterUnreachable(_)) => (
                ComponentHealth::degraded(err.to_string()),
                Some(ComponentHealth::unhealthy(err.to_string())),
            ),
            Err(err) => (ComponentHealth::degraded(err.to_string()), None),
        };

        let mut state = self.state.write().await;
        state
            .components
            .insert(components::COLLECTOR.to_string(), collector);
        if let Some(cluster) = cluster {
            state
                .components
                .insert(components::CLUSTER.to_string(), cluster);
        }
    }

    /// Whether a component is healthy or degraded; unknown components are not
    pub async fn is_operational(&self, name: &str) -> bool {
        self.state
            .read()
            .await
            .components
            .get(name)
            .is_some_and(|h| h.status.is_operational())
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        HealthResponse {
            status: HealthResponse::compute_status(&components),
            components,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let failing: Vec<&str> = state
            .components
            .iter()
            .filter(|(_, h)| !h.status.is_operational())
            .map(|(name, _)| name.as_str())
            .collect();

        let reason = if !state.serving {
            Some("Dashboard is still starting".to_string())
        } else if !failing.is_empty() {
            Some(format!("Unhealthy components: {}", failing.join(", ")))
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}
