//! Health check endpoint.

use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::web::state::SharedState;

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.lock().await;
    let leaves = state.store.leaf_count().unwrap_or(0);
    let users = state
        .store
        .child_count(crate::paths::USERS)
        .unwrap_or(0);
    let posts = state
        .store
        .child_count(crate::paths::POSTS)
        .unwrap_or(0);

    let body = serde_json::json!({
        "status": "ok",
        "users": users,
        "posts": posts,
        "leaves": leaves,
        "sessions": state.sessions.len(),
        "previews_cached": state.previews.len(),
        "ws_connections": state.ws_connection_count.load(Ordering::Relaxed),
    });
    (StatusCode::OK, axum::Json(body))
}
