//! `POST /send-message` (spec.md §6).

use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;
use wa_baileys::MessageContent;
use wa_protocol::Jid;

use super::auth::extract_bearer;
use super::response::{bad_request, internal_error, not_found, too_many_requests, unauthorized};
use super::validation::{validate_media_url, validate_message_length};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub device_id: Uuid,
    pub target_jid: String,
    #[allow(dead_code)]
    pub message_type: String,
    pub message: String,
    pub media_url: Option<String>,
    pub caption: Option<String>,
}

pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SendMessageRequest>,
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

    if let Err(msg) = validate_message_length(&body.message) {
        return bad_request(msg);
    }
    let Ok(jid) = body.target_jid.parse::<Jid>() else {
        return bad_request("target_jid is not a valid WhatsApp JID");
    };
    if let Some(media_url) = &body.media_url {
        if let Err(msg) = validate_media_url(media_url).await {
            return bad_request(msg);
        }
    }

    match wa_store::devices::get_device(&state.pool, body.device_id).await {
        Ok(None) => return not_found("device not found"),
        Err(err) => return internal_error(err),
        Ok(Some(_)) => {}
    }

    let Some(socket) = state.sockets.get(body.device_id).await else {
        return bad_request("device has no live connection");
    };

    let content = MessageContent {
        text: Some(body.message),
        media_url: body.media_url,
        caption: body.caption,
    };

    match socket.send_message(&jid, content).await {
        Ok(()) => Json(serde_json::json!({"status": "sent"})).into_response(),
        Err(err) => internal_error(err),
    }
}
