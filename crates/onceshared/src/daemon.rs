//! Service lifecycle: auth setup, TLS, sweeper, metrics listener, API listener

use anyhow::Result;
use onceshare_auth::Authorizer;
use onceshare_core::config::OnceshareConfig;
use onceshare_store::{spawn_sweeper, MemoryStore};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{self, AppState, Limits};
use crate::metrics::{self, HealthState, ShareMetrics};
use crate::tls;

pub async fn run(config: OnceshareConfig) -> Result<()> {
    let tls_config = match config.server.tls_files()? {
        Some((cert, key)) => Some(tls::load_tls_config(cert, key)?),
        None => None,
    };
    let auth = Arc::new(Authorizer::from_config(&config.auth)?);
    let store = Arc::new(MemoryStore::new());
    let cancel = CancellationToken::new();

    let mut registry = Registry::default();
    let share_metrics = ShareMetrics::register(&mut registry);

    let sweeper = spawn_sweeper(
        store.clone(),
        Duration::from_secs(config.server.sweep_interval_secs.max(1)),
        cancel.clone(),
    );

    if let Some(addr) = config.server.metrics_addr.clone() {
        let state = HealthState {
            registry: Arc::new(registry),
            metrics: share_metrics.clone(),
            store: store.clone(),
        };
        let cancel = cancel.clone();
        let tls_config = tls_config.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::serve(addr, state, tls_config, cancel).await {
                error!("metrics server failed: {e}");
            }
        });
    }

    let limits = Limits::from(&config.server);
    let app = api::router(AppState {
        store,
        auth: auth.clone(),
        metrics: share_metrics,
        limits,
    });

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .map_err(|e| anyhow::anyhow!("bind {}: {e}", config.server.listen))?;

    info!(
        addr = %config.server.listen,
        auth = ?auth.mode(),
        max_length = limits.max_length,
        force_onetime = limits.force_onetime_secrets,
        tls = tls_config.is_some(),
        "api: listening"
    );

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        shutdown.cancel();
    });

    tls::serve(listener, app, tls_config, cancel.clone())
        .await
        .map_err(|e| anyhow::anyhow!("api server: {e}"))?;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        error!("sweeper task failed: {e}");
    }
    info!("onceshared stopped");
    Ok(())
}
