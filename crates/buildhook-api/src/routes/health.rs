//! Health check endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready(State(state): State<AppState>) -> Json<Value> {
    let runner = &state.settings.runner;
    Json(json!({
        "status": "ready",
        "trigger_event": state.settings.trigger_event,
        "deploy_enabled": runner.deploy_enabled(),
        "max_concurrent_jobs": runner.max_concurrent_jobs,
    }))
}
