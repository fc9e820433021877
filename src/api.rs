// src/api.rs
//! Liveness listener. Answers 200 on any path for as long as the process is up;
//! nothing here waits on a cycle, the store, or a fetcher.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::StartupError;
use crate::ingest::scheduler::{shutdown_requested, CycleStatus, StatusSnapshot};

#[derive(Clone)]
pub struct AppState {
    status: Arc<CycleStatus>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(status: Arc<CycleStatus>, metrics: Option<PrometheusHandle>) -> Self {
        Self { status, metrics }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/status", get(status))
        .route("/metrics", get(render_metrics))
        .fallback(alive)
        .with_state(state)
}

async fn alive() -> &'static str {
    "OK"
}

async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot())
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(|h| h.render())
        .unwrap_or_default()
}

/// Bind before the scheduler starts so a port clash fails startup.
pub async fn bind(port: u16) -> Result<TcpListener, StartupError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { port, source })
}

/// Serve until `shutdown` flips to `true`.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(target: "api", %addr, "liveness listener up");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown_requested(&mut shutdown).await })
        .await
}
