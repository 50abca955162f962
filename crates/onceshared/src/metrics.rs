//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  - Prometheus text format
//!   GET /healthz  - Liveness probe (always 200 if process is running)

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use onceshare_store::MemoryStore;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use rustls::ServerConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Counters updated by the API handlers.
#[derive(Debug, Clone, Default)]
pub struct ShareMetrics {
    pub created: Counter,
    pub retrieved: Counter,
    pub missing: Counter,
    pub login_failures: Counter,
    pub live: Gauge,
}

impl ShareMetrics {
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "onceshare_secrets_created",
            "Secrets stored",
            metrics.created.clone(),
        );
        registry.register(
            "onceshare_secrets_retrieved",
            "Successful fetch-and-burn calls",
            metrics.retrieved.clone(),
        );
        registry.register(
            "onceshare_secrets_missing",
            "Fetches for missing, expired, or already viewed secrets",
            metrics.missing.clone(),
        );
        registry.register(
            "onceshare_login_failures",
            "Rejected admin logins",
            metrics.login_failures.clone(),
        );
        registry.register(
            "onceshare_live_records",
            "Records currently held, including expired ones not yet swept",
            metrics.live.clone(),
        );
        metrics
    }
}

/// Shared state for the metrics listener
#[derive(Clone)]
pub struct HealthState {
    pub registry: Arc<Registry>,
    pub metrics: ShareMetrics,
    pub store: Arc<MemoryStore>,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

/// Serve Prometheus metrics and health endpoints on `addr` (e.g. "127.0.0.1:9100")
pub async fn serve(
    addr: String,
    state: HealthState,
    tls: Option<Arc<ServerConfig>>,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("metrics bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, tls = tls.is_some(), "metrics: listening on /metrics, /healthz");

    crate::tls::serve(listener, router(state), tls, cancel)
        .await
        .map_err(|e| anyhow::anyhow!("metrics server: {e}"))
}

async fn metrics_handler(State(state): State<HealthState>) -> impl IntoResponse {
    state.metrics.live.set(state.store.len().await as i64);

    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness probe: returns 200 if the process is running.
pub async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
