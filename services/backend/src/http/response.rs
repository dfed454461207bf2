//! JSON error envelope helpers (spec.md §7 "Error messages shown to end
//! users are mapped through a whitelist").

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use wa_protocol::HttpErrorEnvelope;

pub type HttpResult<T = ()> = Result<T, Response>;

fn json_error(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Response {
    (
        status,
        Json(HttpErrorEnvelope {
            code: code.into(),
            message: message.into(),
            details: None,
        }),
    )
        .into_response()
}

pub fn unauthorized(message: impl Into<String>) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}

pub fn bad_request(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
}

pub fn not_found(message: impl Into<String>) -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

pub fn too_many_requests(message: impl Into<String>) -> Response {
    json_error(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", message)
}

pub fn internal_error(err: impl std::fmt::Display) -> Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn bad_request_carries_the_bad_request_code() {
        let response = bad_request("message too long");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: HttpErrorEnvelope = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.code, "BAD_REQUEST");
        assert_eq!(parsed.message, "message too long");
    }
}
