//! `GET /health` (spec.md §6): `{status, activeConnections, timestamp}`.

use axum::{extract::State, response::IntoResponse, Json};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let active_connections = state.sockets.device_ids().await.len();
    Json(serde_json::json!({
        "status": "ok",
        "activeConnections": active_connections,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
