//! Operator status endpoint
//!
//! `GET /health` returns the pool status as JSON (200 while any account is
//! usable, 503 otherwise) and `GET /metrics` the Prometheus exposition.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use access_pool::Pool;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Concurrent status requests served at once.
const MAX_CONNECTIONS: usize = 32;

#[derive(Clone)]
pub struct StatusState {
    pub pool: Arc<Pool>,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
    pub job: &'static str,
}

pub fn build_router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(MAX_CONNECTIONS))
        .with_state(state)
}

/// Serve the status router on `addr` until `cancel` fires.
pub async fn spawn(
    addr: SocketAddr,
    state: StatusState,
    cancel: CancellationToken,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(addr = %local, "status endpoint listening");

    let app = build_router(state);
    Ok(tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "status server failed");
        }
    }))
}

async fn health_handler(State(state): State<StatusState>) -> impl IntoResponse {
    let pool = state.pool.status().await;
    let code = if pool.is_usable() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = serde_json::json!({
        "status": pool.health,
        "job": state.job,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "next_available_in_ms": pool.next_available_in().map(|d| d.as_millis() as u64),
        "pool": pool,
    });

    (
        code,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

async fn metrics_handler(State(state): State<StatusState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}
