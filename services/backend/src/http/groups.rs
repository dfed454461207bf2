//! `GET /api/groups/:deviceId` (spec.md §6).

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::auth::extract_bearer;
use super::response::{bad_request, internal_error, too_many_requests, unauthorized};
use crate::state::AppState;

pub async fn list_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<Uuid>,
) -> impl IntoResponse {
    let Some(token) = extract_bearer(&headers) else {
        return unauthorized("missing bearer token");
    };
    if token != state.api_key {
        return unauthorized("invalid API key");
    }
    if !state.rate_limiter.check(token).await {
        return too_many_requests("rate limit of 100 requests/minute exceeded");
    }

    let Some(socket) = state.sockets.get(device_id).await else {
        return bad_request("device has no live connection");
    };

    match socket.group_fetch_all_participating().await {
        Ok(groups) => {
            let groups: Vec<serde_json::Value> = groups
                .into_iter()
                .map(|g| serde_json::json!({"jid": g.jid.to_string(), "subject": g.subject}))
                .collect();
            Json(serde_json::json!({"groups": groups})).into_response()
        }
        Err(err) => internal_error(err),
    }
}
