pub mod config;
pub mod connection_manager;
pub mod credentials;
pub mod http;
pub mod identity;
pub mod scheduler;
pub mod socket_map;
pub mod state;
pub mod supervisor;
pub mod worker;

pub use state::AppState;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::health::health))
        .route("/send-message", axum::routing::post(http::send_message::send_message))
        .route("/api/groups/:deviceId", get(http::groups::list_groups))
        .fallback(fallback_404)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}
