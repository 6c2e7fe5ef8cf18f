//! Health & Status API endpoints
//!
//! - GET /health - Simple health check
//! - GET /metrics - Prometheus metrics
//! - GET /status - Event counts, chain checkpoints, uptime

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use eyre::{Result, WrapErr};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::db;
use crate::metrics;

#[derive(Clone)]
struct AppState {
    db: SqlitePool,
    started_at: Instant,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub total_events: i64,
    pub pending_deposits: i64,
    pub chains: Vec<ChainStatus>,
}

#[derive(Debug, Serialize)]
pub struct ChainStatus {
    pub chain: String,
    pub last_scanned_block: i64,
    pub updated_at: String,
}

/// Build the API router
pub fn router(db: SqlitePool) -> Router {
    let state = AppState {
        db,
        started_at: Instant::now(),
    };

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .route("/status", get(status))
        .with_state(state)
}

/// Serve the API until a shutdown signal arrives
pub async fn start_api_server(
    addr: SocketAddr,
    db: SqlitePool,
    mut shutdown: mpsc::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("Failed to bind API server to {}", addr))?;
    info!(%addr, "API server started");

    metrics::UP.set(1);

    axum::serve(listener, router(db))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .wrap_err("API server failed")?;

    info!("API server stopped");
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn prometheus_metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
    }

    ([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response()
}

async fn status(State(state): State<AppState>) -> Response {
    match build_status(&state).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            warn!(error = ?e, "Failed to build status response");
            (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable").into_response()
        }
    }
}

async fn build_status(state: &AppState) -> Result<StatusResponse> {
    let chains = db::get_checkpoints(&state.db)
        .await?
        .into_iter()
        .map(|c| ChainStatus {
            chain: c.chain,
            last_scanned_block: c.last_scanned_block,
            updated_at: c.updated_at.to_rfc3339(),
        })
        .collect();

    Ok(StatusResponse {
        status: "ok".to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        total_events: db::count_events(&state.db).await?,
        pending_deposits: db::count_unprocessed_deposits(&state.db).await?,
        chains,
    })
}
