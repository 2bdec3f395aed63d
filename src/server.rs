//! HTTP face of the relay: `POST /api/solve` and `GET /api/health`.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;

use crate::error::RelayError;
use crate::relay::{SolveRequest, SolveResponse, Solver};

/// Request bodies carry data-URL images, so allow more than axum's 2 MiB default.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct ServerState {
    solver: Arc<dyn Solver>,
}

impl ServerState {
    pub fn new(solver: Arc<dyn Solver>) -> Self {
        Self { solver }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/solve", post(solve_handler))
        .route("/api/health", get(health_handler))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Bind `addr` and serve until the process receives ctrl-c.
pub async fn serve(addr: &str, state: ServerState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr().context("Failed to read bound address")?;
    tracing::info!(%local, "relay listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down relay");
        })
        .await
        .context("Relay server failed")?;

    Ok(())
}

async fn solve_handler(
    State(state): State<ServerState>,
    Json(request): Json<SolveRequest>,
) -> Response {
    match state.solver.solve(request).await {
        Ok(answer) => Json(SolveResponse { answer }).into_response(),
        Err(e) => relay_error_response(&e),
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

fn relay_error_response(error: &RelayError) -> Response {
    let status = if error.is_configuration() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::BAD_GATEWAY
    };
    tracing::error!(%status, %error, "solve request failed");
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
