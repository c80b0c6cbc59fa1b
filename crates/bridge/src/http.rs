//! HTTP endpoints the host polls.
//!
//! The host add-in runs in a webview on its own origin, so CORS is open.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::poll::{PollCommand, PollTransport};
use crate::{BridgeStatus, HostBridge};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct PollServerState {
    pub poll: PollTransport,
    pub bridge: Arc<HostBridge>,
}

/// GET /poll response. `command` is absent when idle.
#[derive(Debug, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<PollCommand>,
}

/// POST /result body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPost {
    pub request_id: String,
    #[serde(default)]
    pub result: Value,
}

/// POST /result response. Always `ok: true`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

/// GET /poll - Hand out the pending command, if any
async fn poll(State(state): State<PollServerState>) -> Json<PollResponse> {
    Json(PollResponse {
        command: state.poll.poll().await,
    })
}

/// POST /result - Deliver a command result
///
/// Acknowledged even when the body is malformed or the id is stale, so the
/// host never retries a result we have already decided to drop.
async fn post_result(State(state): State<PollServerState>, body: Bytes) -> Json<Ack> {
    match serde_json::from_slice::<ResultPost>(&body) {
        Ok(post) => {
            state.poll.post_result(&post.request_id, post.result).await;
        }
        Err(e) => warn!(error = %e, "discarding malformed result post"),
    }
    Json(Ack { ok: true })
}

/// GET /status - Bridge status
async fn status(State(state): State<PollServerState>) -> Json<BridgeStatus> {
    Json(state.bridge.status().await)
}

/// GET /health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Create the HTTP router
pub fn create_router(state: PollServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/poll", get(poll))
        .route("/result", post(post_result))
        .route("/status", get(status))
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

/// Serve the poll endpoints until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: PollServerState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "poll server listening");
    }
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
