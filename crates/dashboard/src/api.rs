//! HTTP surface: home page, stats, health probes, metrics and static files

use crate::assets;
use crate::config::DashboardConfig;
use crate::stats::{track_requests, RequestStats, StatsSnapshot};
use crate::view::HomeView;
use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dashboard_lib::{
    health::{components, ComponentHealth, ComponentStatus},
    CollectError, Collector, CollectorStats, HealthRegistry,
    ResourceKind, StructuredLogger,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Time given to in-flight requests once shutdown starts
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shared application state
pub struct AppState {
    pub collector: Arc<Collector>,
    pub health_registry: HealthRegistry,
    pub logger: StructuredLogger,
    pub view: HomeView,
    pub stats: Arc<RequestStats>,
    pub config: DashboardConfig,
}

impl AppState {
    pub fn new(
        collector: Arc<Collector>,
        health_registry: HealthRegistry,
        logger: StructuredLogger,
        view: HomeView,
        config: DashboardConfig,
    ) -> Self {
        Self {
            collector,
            health_registry,
            logger,
            view,
            stats: Arc::new(RequestStats::new()),
            config,
        }
    }
}

/// HTTP status for a failed home page collection
fn failure_status(err: &CollectError) -> StatusCode {
    match err {
        CollectError::ClusterUnreachable(_) | CollectError::PartialFetchFailed { .. } => {
            StatusCode::BAD_GATEWAY
        }
        CollectError::CollectionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CollectError::NoKindsRequested
        | CollectError::FetchAborted(_)
        | CollectError::Data(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Home page: every kind, collected fresh (or from cache) per request
async fn home(State(state): State<Arc<AppState>>) -> Response {
    let start = Instant::now();
    let result = state.collector.collect(&ResourceKind::ALL).await;

    match result {
        Ok(data) => {
            state.health_registry.record_collection(Ok(())).await;
            let projects = data.projects.as_ref().map_or(0, Vec::len);
            state
                .logger
                .log_collection(ResourceKind::ALL.len(), projects, start.elapsed());
            Html(state.view.render(&data).await).into_response()
        }
        Err(e) => {
            state.health_registry.record_collection(Err(&e)).await;
            state.logger.log_collection_failed(e.reason(), &e);
            (failure_status(&e), format!("failed to load data: {e}")).into_response()
        }
    }
}

#[derive(Serialize)]
struct StatsResponse {
    requests: StatsSnapshot,
    collector: CollectorStats,
}

async fn stats(State(state): State<Arc<AppState>>) -> Response {
    let body = StatsResponse {
        requests: state.stats.snapshot(),
        collector: state.collector.stats(),
    };

    match serde_json::to_vec(&body) {
        Ok(json) => (
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            json,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// List projects again when the cluster is marked unhealthy
///
/// A failed home page collection is the only other writer of the cluster
/// status, and an unready instance receives no home page traffic.
async fn recheck_cluster(state: &AppState) {
    if state.health_registry.is_operational(components::CLUSTER).await {
        return;
    }

    let deadline = state.collector.config().timeout;
    let health = match tokio::time::timeout(deadline, state.collector.namespaces()).await {
        Ok(Ok(namespaces)) => {
            info!(namespaces = namespaces.len(), "Cluster reachable again");
            ComponentHealth::healthy()
        }
        Ok(Err(e)) => ComponentHealth::unhealthy(e.to_string()),
        Err(_) => ComponentHealth::unhealthy(
            CollectError::CollectionTimeout(deadline).to_string(),
        ),
    };
    state
        .health_registry
        .report(components::CLUSTER, health)
        .await;
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    recheck_cluster(&state).await;
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    recheck_cluster(&state).await;
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type())],
        buffer,
    )
        .into_response()
}

async fn static_files(State(state): State<Arc<AppState>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::NOT_FOUND.into_response();
    }
    assets::serve_file(&state.config.public_dir, uri.path()).await
}

/// Answer 500 when a handler panics instead of dropping the connection
async fn recover_panics(request: Request, next: Next) -> Response {
    match tokio::spawn(next.run(request)).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Request handler panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}

/// Create the dashboard router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/stats", get(stats))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .fallback(static_files)
        .layer(middleware::from_fn(recover_panics))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.stats),
            track_requests,
        ))
        .with_state(state)
}

/// Serve the dashboard until `shutdown` resolves
///
/// Once shutdown starts, in-flight requests get [`SHUTDOWN_GRACE`] to finish.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);
    info!(addr = %listener.local_addr()?, "Starting HTTP server");

    let (draining_tx, mut draining_rx) = watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            let _ = draining_tx.send(true);
        })
        .into_future();

    let drain_deadline = async move {
        let draining = draining_rx.wait_for(|draining| *draining).await.is_ok();
        if draining {
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result?,
        _ = drain_deadline => {
            warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Dropping connections still open after grace period");
        }
    }

    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
