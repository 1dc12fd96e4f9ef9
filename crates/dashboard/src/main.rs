//! OpenShift dashboard
//!
//! Serves a read-only overview of the projects, applications, pods and
//! events visible to its service account.

use anyhow::Result;
use dashboard_lib::{
    health::{components, HealthRegistry},
    observability::{DashboardMetrics, StructuredLogger},
    CollectorBuilder, KubeClusterClient,
};
use openshift_dashboard::{api, config::DashboardConfig, view::HomeView};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DASHBOARD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting openshift-dashboard");

    let config = DashboardConfig::load()?;
    info!(
        port = config.port,
        public_dir = %config.public_dir.display(),
        dev = config.is_dev(),
        "Dashboard configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLUSTER).await;
    health_registry.register(components::COLLECTOR).await;

    // Register the collector metrics before the first scrape
    DashboardMetrics::new();

    let logger = StructuredLogger::new(format!("openshift-dashboard-{}", std::process::id()));

    let client = KubeClusterClient::discover(config.insecure_skip_tls_verify).await?;
    let collector = CollectorBuilder::new()
        .client(Arc::new(client))
        .config(config.collector_config())
        .build()?;

    let view = HomeView::load(&config.template_dir, config.title(), config.is_dev()).await;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    logger.log_startup(
        DASHBOARD_VERSION,
        config.port,
        collector.config().resources_cache_enabled,
    );

    let state = Arc::new(api::AppState::new(
        Arc::new(collector),
        health_registry.clone(),
        logger.clone(),
        view,
        config,
    ));
    health_registry.set_ready(true).await;

    api::serve(listener, state, api::shutdown_signal()).await?;
    logger.log_shutdown("signal received");

    Ok(())
}
