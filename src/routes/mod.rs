use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::completion::CompletionSignal;
use crate::sweep::SweepProgress;

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// State shared with the status handlers
#[derive(Clone)]
pub struct StatusState {
    pub completion: CompletionSignal,
    pub progress: Arc<SweepProgress>,
}

/// Health check routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}

/// Sweep status routes
pub fn status_routes(state: StatusState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .with_state(state)
}

/// Full status router served by the orchestrator
pub fn build_app(state: StatusState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(status_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Serve the status router until the process exits
pub async fn serve_status(addr: SocketAddr, state: StatusState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Status endpoint listening on http://{}", addr);
    axum::serve(listener, build_app(state)).await?;
    Ok(())
}

/// GET / - Simple health check
async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Latency profile generator is running",
        "version": VERSION
    }))
}

/// GET /health - Detailed health check
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION
    }))
}

/// GET /status - Sweep completion and progress
///
/// `finished` flips to true only after every rate has run and cooled down.
async fn status_handler(State(state): State<StatusState>) -> Json<Value> {
    Json(json!({
        "finished": state.completion.is_complete(),
        "progress": state.progress.snapshot(),
    }))
}
