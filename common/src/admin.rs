// Admin HTTP endpoints: liveness and aggregated health checks

use crate::config::AdminConfig;
use crate::health::{HealthCheckRegistry, HealthReport, HealthStatus};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

/// Create the admin router
pub fn create_router(health: HealthCheckRegistry) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/healthcheck", get(healthcheck))
        .layer(TraceLayer::new_for_http())
        .with_state(health)
}

/// Liveness endpoint
#[tracing::instrument]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// Run every registered health check; 500 when any is unhealthy
#[tracing::instrument(skip(health))]
pub async fn healthcheck(State(health): State<HealthCheckRegistry>) -> impl IntoResponse {
    let results = health.run_health_checks().await;

    let status = if results.values().all(HealthStatus::is_healthy) {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let reports: BTreeMap<String, HealthReport> = results
        .iter()
        .map(|(name, result)| (name.clone(), HealthReport::from(result)))
        .collect();

    (status, Json(reports))
}

/// Serve the admin router until `shutdown` resolves
pub async fn serve<S>(
    config: &AdminConfig,
    health: HealthCheckRegistry,
    shutdown: S,
) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    tracing::info!(addr = %addr, "Starting admin server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, create_router(health))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Admin server stopped");
    Ok(())
}
